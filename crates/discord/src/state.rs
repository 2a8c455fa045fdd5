//! Shared bot state threaded through the event handler.

use std::{collections::HashMap, sync::Arc};

use {
    serenity::all::{MessageId, UserId},
    tokio::sync::RwLock,
    tokio_util::sync::CancellationToken,
};

use {
    parrot_config::Config, parrot_plugins::{PluginRegistry, PluginStore},
    parrot_providers::ModelClient,
};

use crate::catalog::ToolServices;

/// A reasoning loop currently in flight, keyed by the request message.
pub struct ActiveRun {
    pub requester: UserId,
    pub cancel: CancellationToken,
}

pub struct BotState {
    pub config: Config,
    pub model: Arc<dyn ModelClient>,
    pub tools: ToolServices,
    pub plugins: PluginRegistry,
    pub plugin_store: PluginStore,
    /// Persona selected per user, by user id.
    pub personas: RwLock<HashMap<UserId, String>>,
    /// Runs eligible for stop-reaction cancellation.
    pub active_runs: RwLock<HashMap<MessageId, ActiveRun>>,
    /// Filled in on the `ready` event.
    pub bot_user_id: std::sync::RwLock<Option<UserId>>,
}

impl BotState {
    #[must_use]
    pub fn new(
        config: Config,
        model: Arc<dyn ModelClient>,
        tools: ToolServices,
        plugins: PluginRegistry,
        plugin_store: PluginStore,
    ) -> Self {
        Self {
            config,
            model,
            tools,
            plugins,
            plugin_store,
            personas: RwLock::new(HashMap::new()),
            active_runs: RwLock::new(HashMap::new()),
            bot_user_id: std::sync::RwLock::new(None),
        }
    }

    /// The system prompt for a user: their selected persona, else the
    /// configured default, else none.
    pub async fn system_prompt(&self, user: UserId) -> Option<String> {
        let selected = { self.personas.read().await.get(&user).cloned() };
        let name = selected.or_else(|| self.config.default_persona.clone())?;
        self.config
            .persona(&name)
            .map(|persona| persona.prompt.clone())
    }

    pub fn bot_user_id(&self) -> Option<UserId> {
        *self.bot_user_id.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_bot_user_id(&self, id: UserId) {
        *self.bot_user_id.write().unwrap_or_else(|e| e.into_inner()) = Some(id);
    }
}
