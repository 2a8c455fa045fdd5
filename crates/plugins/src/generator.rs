//! Manifest generation from a natural-language description.

use {
    parrot_providers::{ChatMessage, ModelClient, ModelRequest},
    tracing::debug,
};

use crate::{Error, PluginManifest, Result};

const GENERATOR_SYSTEM: &str = "\
You design declarative plugin commands for a chat bot. Given a description, \
produce ONLY a JSON object with these fields and nothing else:\n\
  \"name\": short lowercase command name (letters, digits, underscores, \
starting with a letter)\n\
  \"description\": one sentence shown in the plugin list\n\
  \"prompt_template\": the instruction given to the model when the command \
runs; include the literal placeholder {input} where the user's text goes\n\
  \"allowed_tools\": array of tool names the command may use, chosen only \
from the available tools listed below\n\
Do not wrap the JSON in markdown fences or add commentary.";

/// Ask the model for a manifest matching `description`. The result is a
/// candidate: callers still run [`PluginManifest::validate`] before
/// registering it.
pub async fn generate_manifest(
    client: &dyn ModelClient,
    description: &str,
    available_tools: &[String],
) -> Result<PluginManifest> {
    let system = format!(
        "{GENERATOR_SYSTEM}\n\nAvailable tools: {}",
        available_tools.join(", ")
    );
    let request = ModelRequest {
        system: Some(system),
        messages: vec![ChatMessage::user_text(description)],
        tools: vec![],
    };

    let reply = client.complete(&request).await?;
    let text = reply
        .text
        .ok_or_else(|| Error::message("model returned no manifest"))?;
    let json = strip_fences(&text);
    debug!(bytes = json.len(), "parsing generated manifest");
    let manifest: PluginManifest = serde_json::from_str(json)
        .map_err(|e| Error::invalid(format!("model output is not a valid manifest: {e}")))?;
    Ok(manifest)
}

/// Models routinely fence JSON despite instructions; tolerate it.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
