//! Gemini `generateContent` client.
//!
//! Speaks the REST wire format: `contents` with role/parts, camelCase
//! `functionCall`/`functionResponse`/`inlineData` part keys, tool schemas
//! under `tools[].functionDeclarations`.

use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde_json::{Value, json},
    tracing::{debug, warn},
};

use crate::{
    Error, Result,
    model::{ChatMessage, ContentPart, ModelClient, ModelReply, ModelRequest, Role, ToolCall},
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client for the Gemini API.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Secret<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-call timeout (applies to each `complete` call).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn build_body(request: &ModelRequest) -> Value {
        let contents: Vec<Value> = request.messages.iter().map(encode_message).collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {"temperature": 0.7},
        });

        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            body["tools"] = json!([{"functionDeclarations": declarations}]);
        }
        body
    }

    fn parse_reply(body: &Value) -> Result<ModelReply> {
        let parts = body
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::message("response has no candidate content"))?;

        let mut text_parts: Vec<&str> = Vec::new();
        let mut tool_calls = Vec::new();

        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                text_parts.push(text);
            }
            if let Some(call) = part.get("functionCall") {
                let name = call
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::message("functionCall without a name"))?;
                let arguments = call.get("args").cloned().unwrap_or_else(|| json!({}));
                tool_calls.push(ToolCall {
                    name: name.to_string(),
                    arguments,
                });
            }
        }

        let text = if text_parts.is_empty() {
            None
        } else {
            Some(text_parts.join(""))
        };
        Ok(ModelReply { text, tool_calls })
    }
}

fn encode_message(message: &ChatMessage) -> Value {
    let role = match message.role {
        Role::User => "user",
        Role::Model => "model",
        Role::Tool => "tool",
    };
    let parts: Vec<Value> = message
        .parts
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => json!({"text": text}),
            ContentPart::InlineMedia { mime_type, data } => {
                json!({"inlineData": {"mimeType": mime_type, "data": data}})
            },
            ContentPart::ToolCall(call) => {
                json!({"functionCall": {"name": call.name, "args": call.arguments}})
            },
            ContentPart::ToolResult { name, response } => {
                json!({"functionResponse": {"name": name, "response": response}})
            },
        })
        .collect();
    json!({"role": role, "parts": parts})
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply> {
        let body = Self::build_body(request);
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "gemini request"
        );

        let send = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, "gemini request failed");
            return Err(Error::message(format!(
                "gemini returned {status}: {}",
                truncate(&detail, 300)
            )));
        }

        let payload: Value = response.json().await?;
        Self::parse_reply(&payload)
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
