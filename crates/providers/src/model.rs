//! Conversation and tool-calling types shared between the reasoning loop
//! and provider implementations.

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::Result;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
    /// Tool observations fed back to the model.
    Tool,
}

/// One part of a turn's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPart {
    Text(String),
    /// Base64-encoded inline media (attachment images, avatars).
    InlineMedia { mime_type: String, data: String },
    /// A tool invocation the model requested, echoed back as history.
    ToolCall(ToolCall),
    /// Result of executing one tool invocation.
    ToolResult { name: String, response: Value },
}

/// One turn of the running conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl ChatMessage {
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    #[must_use]
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// Model turn reconstructed from a reply, preserving text and tool
    /// calls so later requests carry the full history.
    #[must_use]
    pub fn from_reply(reply: &ModelReply) -> Self {
        let mut parts = Vec::new();
        if let Some(text) = &reply.text {
            parts.push(ContentPart::Text(text.clone()));
        }
        parts.extend(reply.tool_calls.iter().cloned().map(ContentPart::ToolCall));
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// Tool-role turn carrying observations in request order.
    #[must_use]
    pub fn tool_results(results: Vec<(String, Value)>) -> Self {
        Self {
            role: Role::Tool,
            parts: results
                .into_iter()
                .map(|(name, response)| ContentPart::ToolResult { name, response })
                .collect(),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Declared schema for one tool, as presented to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON schema for the argument object.
    pub parameters: Value,
}

/// One request to the remote model.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    /// System instruction (persona prompt), if any.
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSchema>,
}

/// The model's reply: free text, tool-invocation requests, or both.
/// A reply with no tool calls is final.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelReply {
    /// A final answer carries no further tool requests.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// Abstract remote-model contract the reasoning loop depends on.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// One conversation + tool-schema round-trip. A single attempt: callers
    /// decide whether a failure is resurfaced, never retried here.
    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply>;
}
