//! Inbound access policies shared by platform layers.

use serde::{Deserialize, Serialize};

/// Who may talk to the bot in direct messages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmPolicy {
    Disabled,
    Open,
    #[default]
    Allowlist,
}

/// Whether the bot responds in guild channels at all.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupPolicy {
    Disabled,
    #[default]
    Open,
    Allowlist,
}

/// When the bot reacts to guild messages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionMode {
    /// Respond to every command regardless of mention.
    #[default]
    Always,
    /// Respond only when the bot is mentioned.
    Mention,
    /// Never respond in guilds.
    None,
}

/// Case-insensitive membership test for id/username allowlists.
#[must_use]
pub fn is_allowed(candidate: &str, allowlist: &[String]) -> bool {
    allowlist
        .iter()
        .any(|entry| entry.eq_ignore_ascii_case(candidate))
}
