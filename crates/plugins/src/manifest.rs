//! Declarative plugin manifests.
//!
//! A plugin is not code: it is a named prompt template plus the subset of
//! tools the resulting run may use. Generated candidates pass a static
//! check before they can be registered.

use {
    serde::{Deserialize, Serialize},
    std::sync::OnceLock,
};

use crate::{Error, Result};

/// Placeholder in a prompt template replaced with the user's input.
pub const INPUT_PLACEHOLDER: &str = "{input}";

const MAX_NAME_LEN: usize = 32;
const MAX_PROMPT_LEN: usize = 4000;

/// One declarative plugin command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Command name, used as `!<name>`.
    pub name: String,
    pub description: String,
    /// Prompt handed to the model; `{input}` is replaced with the user's
    /// text, or the text is appended when the placeholder is absent.
    pub prompt_template: String,
    /// Tool names this plugin's runs may use. Intersected with the
    /// caller's own catalog at invocation time.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
}

fn name_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    #[allow(clippy::expect_used)] // static pattern
    PATTERN.get_or_init(|| regex::Regex::new(r"^[a-z][a-z0-9_]*$").expect("static regex"))
}

impl PluginManifest {
    /// Expand the template with the user's input.
    #[must_use]
    pub fn render_prompt(&self, input: &str) -> String {
        if self.prompt_template.contains(INPUT_PLACEHOLDER) {
            self.prompt_template.replace(INPUT_PLACEHOLDER, input)
        } else if input.is_empty() {
            self.prompt_template.clone()
        } else {
            format!("{}\n\n{input}", self.prompt_template)
        }
    }

    /// Static validity check. `reserved` holds command names the bot
    /// already answers to; `known_tools` is the full tool catalog.
    pub fn validate(&self, reserved: &[&str], known_tools: &[String]) -> Result<()> {
        if self.name.is_empty() || self.name.len() > MAX_NAME_LEN {
            return Err(Error::invalid(format!(
                "name must be 1-{MAX_NAME_LEN} characters"
            )));
        }
        if !name_pattern().is_match(&self.name) {
            return Err(Error::invalid(
                "name must be lowercase letters, digits, and underscores, starting with a letter",
            ));
        }
        if reserved.contains(&self.name.as_str()) {
            return Err(Error::invalid(format!(
                "name '{}' collides with a built-in command",
                self.name
            )));
        }
        if self.prompt_template.trim().is_empty() {
            return Err(Error::invalid("prompt template is empty"));
        }
        if self.prompt_template.len() > MAX_PROMPT_LEN {
            return Err(Error::invalid(format!(
                "prompt template exceeds {MAX_PROMPT_LEN} characters"
            )));
        }
        for tool in &self.allowed_tools {
            if !known_tools.contains(tool) {
                return Err(Error::invalid(format!("unknown tool '{tool}'")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn manifest(name: &str) -> PluginManifest {
        PluginManifest {
            name: name.into(),
            description: "test".into(),
            prompt_template: "Summarize: {input}".into(),
            allowed_tools: vec!["fetch_url".into()],
        }
    }

    fn tools() -> Vec<String> {
        vec!["fetch_url".into(), "generate_image".into()]
    }

    #[test]
    fn valid_manifest_passes() {
        assert!(manifest("summarize").validate(&["ask"], &tools()).is_ok());
    }

    #[test]
    fn bad_names_are_rejected() {
        for name in ["", "9abc", "Has-Caps", "with space", &"x".repeat(40)] {
            assert!(manifest(name).validate(&[], &tools()).is_err(), "{name}");
        }
    }

    #[test]
    fn builtin_collision_is_rejected() {
        let err = manifest("ask").validate(&["ask"], &tools()).unwrap_err();
        assert!(err.to_string().contains("collides"));
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let mut m = manifest("summarize");
        m.allowed_tools.push("rm_rf".into());
        assert!(m.validate(&[], &tools()).is_err());
    }

    #[test]
    fn render_substitutes_or_appends() {
        assert_eq!(
            manifest("s").render_prompt("the page"),
            "Summarize: the page"
        );
        let mut m = manifest("s");
        m.prompt_template = "Summarize the following.".into();
        assert_eq!(
            m.render_prompt("the page"),
            "Summarize the following.\n\nthe page"
        );
    }
}
