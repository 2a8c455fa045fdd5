use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::{
    Error, Result,
    gating::{DmPolicy, GroupPolicy, MentionMode},
};

/// Top-level parrot configuration, loaded from a single TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    /// Named system-prompt presets selectable with `!persona`.
    #[serde(default)]
    pub personas: Vec<Persona>,
    /// Persona applied when the user picked none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_persona: Option<String>,
}

impl Config {
    /// Cross-field validation beyond what serde can express.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for persona in &self.personas {
            if persona.name.trim().is_empty() {
                return Err(Error::Message {
                    message: "persona with empty name".into(),
                });
            }
            if !seen.insert(persona.name.to_ascii_lowercase()) {
                return Err(Error::Message {
                    message: format!("duplicate persona: {}", persona.name),
                });
            }
        }
        if let Some(name) = &self.default_persona
            && self.persona(name).is_none()
        {
            return Err(Error::Message {
                message: format!("default_persona '{name}' is not defined"),
            });
        }
        if self.agent.max_iterations == 0 {
            return Err(Error::Message {
                message: "agent.max_iterations must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Look up a persona by name (case-insensitive).
    #[must_use]
    pub fn persona(&self, name: &str) -> Option<&Persona> {
        self.personas
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// A named system-prompt preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub prompt: String,
}

/// Discord account settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Discord bot token.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Prefix for text commands.
    pub command_prefix: String,

    /// DM access policy.
    pub dm_policy: DmPolicy,

    /// Guild channel access policy.
    pub group_policy: GroupPolicy,

    /// Mention activation mode for guild channels.
    pub mention_mode: MentionMode,

    /// User allowlist (Discord user IDs or usernames).
    pub allowlist: Vec<String>,

    /// Guild allowlist (Discord guild IDs).
    pub guild_allowlist: Vec<String>,

    /// Users allowed to use admin-scoped tools and manage plugins.
    pub admin_users: Vec<String>,

    /// Emoji reaction added to a request while the loop is running. Users
    /// react with it to cancel the run.
    pub stop_reaction: String,

    /// Send bot responses as Discord replies to the user's message.
    pub reply_to_message: bool,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"[REDACTED]")
            .field("command_prefix", &self.command_prefix)
            .field("dm_policy", &self.dm_policy)
            .field("group_policy", &self.group_policy)
            .field("mention_mode", &self.mention_mode)
            .field("allowlist", &self.allowlist)
            .field("guild_allowlist", &self.guild_allowlist)
            .field("admin_users", &self.admin_users)
            .field("stop_reaction", &self.stop_reaction)
            .field("reply_to_message", &self.reply_to_message)
            .finish()
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            command_prefix: "!".into(),
            dm_policy: DmPolicy::Allowlist,
            group_policy: GroupPolicy::Open,
            mention_mode: MentionMode::Always,
            allowlist: Vec::new(),
            guild_allowlist: Vec::new(),
            admin_users: Vec::new(),
            stop_reaction: "🛑".into(),
            reply_to_message: true,
        }
    }
}

/// Remote API credentials and endpoints.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Gemini API key (text, tool calling, image generation/editing).
    #[serde(serialize_with = "serialize_secret")]
    pub gemini_api_key: Secret<String>,

    /// Gemini API base URL. Overridable for tests.
    pub gemini_base_url: String,

    /// Model id used for the tool-calling loop.
    pub model: String,

    /// Media task API key (music, sound effects, video, background
    /// removal, upscaling).
    #[serde(serialize_with = "serialize_secret")]
    pub media_api_key: Secret<String>,

    /// Media task API base URL.
    pub media_base_url: String,
}

impl std::fmt::Debug for ProvidersConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvidersConfig")
            .field("gemini_api_key", &"[REDACTED]")
            .field("gemini_base_url", &self.gemini_base_url)
            .field("model", &self.model)
            .field("media_api_key", &"[REDACTED]")
            .field("media_base_url", &self.media_base_url)
            .finish()
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: Secret::new(String::new()),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.5-pro".into(),
            media_api_key: Secret::new(String::new()),
            media_base_url: "https://api.kie.ai".into(),
        }
    }
}

/// Reasoning-loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum model round-trips per request.
    pub max_iterations: u32,

    /// Timeout applied to each model call and each tool call, in seconds.
    pub request_timeout_secs: u64,

    /// Channel history messages gathered as context (hard cap 100).
    pub context_messages: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            request_timeout_secs: 120,
            context_messages: 30,
        }
    }
}

/// Tool execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Maximum bytes `fetch_url` will download.
    pub fetch_max_bytes: usize,

    /// CIDR ranges exempt from the private-IP fetch guard.
    pub ssrf_allowlist: Vec<String>,

    /// WebDriver endpoint for the browser automation tool. The tool is
    /// not offered when unset.
    pub webdriver_url: Option<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fetch_max_bytes: 2 * 1024 * 1024,
            ssrf_allowlist: Vec::new(),
            webdriver_url: None,
        }
    }
}

/// Dynamic plugin settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Directory where plugin manifests are persisted.
    pub dir: String,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: "plugins".into(),
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
