//! Image tools: generation and editing through the multimodal image model,
//! background removal and upscaling through the media task API.

use {
    anyhow::{Context as _, Result},
    async_trait::async_trait,
    base64::{Engine as _, engine::general_purpose::STANDARD as BASE64},
    secrecy::{ExposeSecret, Secret},
    serde_json::{Value, json},
    tracing::{debug, info},
};

use {
    crate::{
        Error, media_entry, media_tasks::MediaTaskClient, params::require_str,
        shared_http_client,
    },
    parrot_agents::AgentTool,
};

/// Reference images passed along with a generation prompt, capped to keep
/// requests small.
const MAX_REFERENCE_IMAGES: usize = 3;

/// Client for the image-capable multimodal model: prompt (plus optional
/// reference images) in, inline image bytes out.
#[derive(Clone)]
pub struct ImageModelClient {
    base_url: String,
    api_key: Secret<String>,
    model: String,
}

impl ImageModelClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Secret<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            model: "gemini-3-pro-image-preview".into(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Generate one image. `references` are `(mime_type, base64)` pairs.
    pub async fn generate(
        &self,
        prompt: &str,
        references: &[(String, String)],
    ) -> crate::Result<(String, Vec<u8>)> {
        let mut parts: Vec<Value> = references
            .iter()
            .take(MAX_REFERENCE_IMAGES)
            .map(|(mime_type, data)| json!({"inlineData": {"mimeType": mime_type, "data": data}}))
            .collect();
        parts.push(json!({"text": prompt}));

        let body = json!({"contents": [{"role": "user", "parts": parts}]});
        let endpoint = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        debug!(model = %self.model, references = references.len(), "image generation request");
        let response = shared_http_client()
            .post(endpoint)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let payload: Value = response.json().await?;

        let parts = payload
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::message("image model returned no content"))?;

        for part in parts {
            if let Some(inline) = part.get("inlineData") {
                let mime_type = inline
                    .get("mimeType")
                    .and_then(Value::as_str)
                    .unwrap_or("image/png")
                    .to_string();
                let data = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::message("inlineData without data"))?;
                let bytes = BASE64
                    .decode(data)
                    .map_err(|e| Error::external("image payload decode", e))?;
                return Ok((mime_type, bytes));
            }
        }
        Err(Error::message("image model returned no image part"))
    }
}

/// Download an image URL and return it as a `(mime_type, base64)` reference.
async fn fetch_reference(url: &str) -> Result<(String, String)> {
    let response = shared_http_client()
        .get(url)
        .send()
        .await
        .with_context(|| format!("fetching image {url}"))?;
    if !response.status().is_success() {
        anyhow::bail!("image fetch returned status {}", response.status());
    }
    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/png")
        .to_string();
    let bytes = response.bytes().await?;
    Ok((mime_type, BASE64.encode(&bytes)))
}

/// Text-to-image generation.
pub struct GenerateImageTool {
    client: ImageModelClient,
}

impl GenerateImageTool {
    #[must_use]
    pub fn new(client: ImageModelClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for GenerateImageTool {
    fn name(&self) -> &str {
        "generate_image"
    }

    fn description(&self) -> &str {
        "Generates a new image based on a detailed textual prompt. Can use images found \
         with search_messages as references."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["prompt_text"],
            "properties": {
                "prompt_text": {
                    "type": "string",
                    "description": "The detailed, final prompt for image generation."
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let prompt = require_str(&params, "prompt_text")?;
        info!("generating image");
        let (mime_type, bytes) = self.client.generate(prompt, &[]).await?;
        let extension = extension_for(&mime_type);
        Ok(json!({
            "status": "success",
            "media": [media_entry(&format!("generated.{extension}"), &mime_type, &bytes)],
        }))
    }
}

/// Instruction-based editing of an existing image.
pub struct EditImageTool {
    client: ImageModelClient,
}

impl EditImageTool {
    #[must_use]
    pub fn new(client: ImageModelClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for EditImageTool {
    fn name(&self) -> &str {
        "edit_image"
    }

    fn description(&self) -> &str {
        "Edits an existing image based on instructions. Use when the user provides an \
         image and asks to modify, add to, or transform it. Requires the image URL from \
         the attachment context."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["edit_prompt", "image_url"],
            "properties": {
                "edit_prompt": {
                    "type": "string",
                    "description": "Detailed instructions for how to edit the image."
                },
                "image_url": {
                    "type": "string",
                    "description": "URL of the image to edit (from attachment context)."
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let edit_prompt = require_str(&params, "edit_prompt")?;
        let image_url = require_str(&params, "image_url")?;

        info!("editing image");
        let reference = fetch_reference(image_url).await?;
        let (mime_type, bytes) = self.client.generate(edit_prompt, &[reference]).await?;
        let extension = extension_for(&mime_type);
        Ok(json!({
            "status": "success",
            "media": [media_entry(&format!("edited.{extension}"), &mime_type, &bytes)],
        }))
    }
}

/// Background removal via the task API (`recraft/remove-background`).
pub struct RemoveBackgroundTool {
    client: MediaTaskClient,
}

impl RemoveBackgroundTool {
    #[must_use]
    pub fn new(client: MediaTaskClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for RemoveBackgroundTool {
    fn name(&self) -> &str {
        "remove_background"
    }

    fn description(&self) -> &str {
        "Removes the background from an image, leaving only the subject with transparency. \
         Requires a direct image URL (PNG, JPG, or WEBP). Returns a transparent PNG."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["image_url"],
            "properties": {
                "image_url": {
                    "type": "string",
                    "description": "Direct URL to the image (PNG, JPG, or WEBP)"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let image_url = require_str(&params, "image_url")?;
        info!("removing background");
        let urls = self
            .client
            .run_job("recraft/remove-background", json!({"image": image_url}))
            .await?;
        let bytes = self.client.download(&urls[0]).await?;
        Ok(json!({
            "status": "success",
            "media": [media_entry("no_background.png", "image/png", &bytes)],
        }))
    }
}

/// AI upscaling via the task API (`recraft/crisp-upscale`).
pub struct UpscaleImageTool {
    client: MediaTaskClient,
}

impl UpscaleImageTool {
    #[must_use]
    pub fn new(client: MediaTaskClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for UpscaleImageTool {
    fn name(&self) -> &str {
        "upscale_image"
    }

    fn description(&self) -> &str {
        "Upscales an image to higher resolution using AI enhancement. Requires a direct \
         image URL (PNG, JPG, or WEBP)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["image_url"],
            "properties": {
                "image_url": {
                    "type": "string",
                    "description": "Direct URL to the image (PNG, JPG, or WEBP)"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let image_url = require_str(&params, "image_url")?;
        info!("upscaling image");
        let urls = self
            .client
            .run_job("recraft/crisp-upscale", json!({"image": image_url}))
            .await?;
        let bytes = self.client.download(&urls[0]).await?;
        Ok(json!({
            "status": "success",
            "media": [media_entry("upscaled.png", "image/png", &bytes)],
        }))
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}
