//! Tool implementations for the reasoning loop.
//!
//! Tools: message-history search, URL fetch, browser automation, image
//! generation/editing, background removal, upscaling, video, music, and
//! sound effects. Each is an [`parrot_agents::AgentTool`] invoking an
//! external API.

pub mod audio;
pub mod browser;
pub mod error;
pub mod image;
pub mod media_tasks;
pub mod params;
pub mod search;
pub mod ssrf;
pub mod video;
pub mod web_fetch;

pub use error::{Error, Result};

static SHARED_CLIENT: std::sync::OnceLock<reqwest::Client> = std::sync::OnceLock::new();

/// Shared HTTP client for tools that don't need custom configuration.
///
/// Reusing a single `reqwest::Client` avoids per-request connection pool,
/// DNS resolver, and TLS session cache overhead.
pub fn shared_http_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(reqwest::Client::new)
}

/// Encode generated bytes as a media entry the runner lifts out of the
/// observation and delivers as a platform attachment.
#[must_use]
pub fn media_entry(filename: &str, mime_type: &str, bytes: &[u8]) -> serde_json::Value {
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    serde_json::json!({
        "filename": filename,
        "mime_type": mime_type,
        "data": BASE64.encode(bytes),
    })
}

/// Keep only filename-safe characters, for titles used as attachment names.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "untitled".into()
    } else {
        trimmed.into()
    }
}
