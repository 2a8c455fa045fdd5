use serde::{Deserialize, Serialize};

/// Kind of conversation a message arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    /// Direct message with a single user.
    Dm,
    /// Guild/server channel.
    Channel,
}

/// A binary attachment produced by a tool or delivered by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaAttachment {
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}
