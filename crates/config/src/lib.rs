//! Startup configuration for the parrot bot.
//!
//! Admin lists, persona prompts, provider keys, and gating policies are
//! all declared here and passed into components at construction time;
//! nothing reads the environment after startup.

use std::path::Path;

pub mod gating;
pub mod schema;

pub use schema::{
    AgentConfig, Config, DiscordConfig, Persona, PluginsConfig, ProvidersConfig, ToolsConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("config parse: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{message}")]
    Message { message: String },
}

impl parrot_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

parrot_common::impl_context!();

/// Load and validate a config file.
pub fn load(path: impl AsRef<Path>) -> Result<Config> {
    let data = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&data)?;
    config.validate()?;
    Ok(config)
}
