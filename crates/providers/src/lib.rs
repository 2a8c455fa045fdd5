//! Remote generative-model clients.
//!
//! Defines the abstract [`ModelClient`] contract the reasoning loop depends
//! on (conversation turns plus a tool schema in, a tagged reply of final
//! text or tool-invocation requests out) and the Gemini HTTP
//! implementation of it.

pub mod error;
pub mod gemini;
pub mod model;

pub use {
    error::{Error, Result},
    gemini::GeminiClient,
    model::{
        ChatMessage, ContentPart, ModelClient, ModelReply, ModelRequest, Role, ToolCall,
        ToolSchema,
    },
};
