//! Serenity event handler: wires prefix commands to the reasoning loop.

use std::{sync::Arc, time::Duration};

use {
    base64::{Engine as _, engine::general_purpose::STANDARD as BASE64},
    serenity::{
        all::{Context, GatewayIntents, GetMessages, Message, Reaction, ReactionType, Ready},
        async_trait,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    parrot_agents::{RunOptions, run_agent},
    parrot_common::types::ChatType,
    parrot_plugins::PluginManifest,
    parrot_providers::{ChatMessage, ContentPart},
};

use crate::{
    access,
    catalog,
    commands::{self, Invocation, PluginAction, RESERVED_COMMANDS},
    outbound,
    state::{ActiveRun, BotState},
};

/// Required gateway intents for the bot.
#[must_use]
pub fn required_intents() -> GatewayIntents {
    GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::DIRECT_MESSAGE_REACTIONS
}

/// History cap imposed regardless of configuration.
const CONTEXT_HARD_CAP: u32 = 100;

pub struct Handler {
    pub state: Arc<BotState>,
}

/// Strip the bot mention (e.g. `<@123456789>`) from the beginning of a
/// message.
#[must_use]
pub fn strip_bot_mention(text: &str, bot_id: u64) -> String {
    let mention = format!("<@{bot_id}>");
    let mention_nick = format!("<@!{bot_id}>");
    let stripped = text
        .trim()
        .strip_prefix(&mention)
        .or_else(|| text.trim().strip_prefix(&mention_nick))
        .unwrap_or(text);
    stripped.trim().to_string()
}

#[async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(bot_user = %ready.user.name, "connected to Discord");
        self.state.set_bot_user_id(ready.user.id);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Ignore messages from bots (including ourselves).
        if msg.author.bot {
            return;
        }

        let config = &self.state.config.discord;
        let is_guild = msg.guild_id.is_some();
        let chat_type = if is_guild {
            ChatType::Channel
        } else {
            ChatType::Dm
        };
        let bot_user_id = self.state.bot_user_id();
        let bot_mentioned =
            bot_user_id.is_some_and(|bot_id| msg.mentions.iter().any(|u| u.id == bot_id));

        let text = if let Some(bot_id) = bot_user_id
            && bot_mentioned
        {
            strip_bot_mention(&msg.content, bot_id.get())
        } else {
            msg.content.clone()
        };

        let peer_id = msg.author.id.to_string();
        let username = msg.author.name.clone();
        let guild_id = msg.guild_id.map(|g| g.to_string());
        if let Err(denied) = access::check_access(
            config,
            &chat_type,
            &peer_id,
            Some(&username),
            guild_id.as_deref(),
            bot_mentioned,
        ) {
            debug!(peer_id, %denied, "inbound message dropped");
            return;
        }

        let Some(invocation) = commands::parse(&text, &config.command_prefix) else {
            return;
        };
        info!(peer_id, username, is_guild, "command received");

        match invocation {
            Invocation::Ask(prompt) => self.handle_ask(&ctx, &msg, &prompt).await,
            Invocation::Persona(name) => self.handle_persona(&ctx, &msg, name.as_deref()).await,
            Invocation::Plugin(action) => self.handle_plugin(&ctx, &msg, action).await,
            Invocation::Help => self.handle_help(&ctx, &msg).await,
            Invocation::Custom { name, input } => {
                self.handle_custom(&ctx, &msg, &name, &input).await;
            },
        }
    }

    async fn reaction_add(&self, _ctx: Context, reaction: Reaction) {
        let ReactionType::Unicode(ref emoji) = reaction.emoji else {
            return;
        };
        if *emoji != self.state.config.discord.stop_reaction {
            return;
        }
        let Some(user_id) = reaction.user_id else {
            return;
        };

        let runs = self.state.active_runs.read().await;
        let Some(run) = runs.get(&reaction.message_id) else {
            return;
        };
        let admin = access::is_admin(
            &self.state.config.discord,
            &user_id.to_string(),
            None,
        );
        if user_id == run.requester || admin {
            info!(message_id = %reaction.message_id, %user_id, "run cancelled by stop reaction");
            run.cancel.cancel();
        }
    }
}

impl Handler {
    async fn reply(&self, ctx: &Context, msg: &Message, text: &str) {
        let reference = self
            .state
            .config
            .discord
            .reply_to_message
            .then_some(msg.id);
        if let Err(e) = outbound::send_text(&ctx.http, msg.channel_id, reference, text).await {
            warn!(channel_id = %msg.channel_id, "failed to send response: {e}");
        }
    }

    async fn handle_ask(&self, ctx: &Context, msg: &Message, prompt: &str) {
        let admin = access::is_admin(
            &self.state.config.discord,
            &msg.author.id.to_string(),
            Some(&msg.author.name),
        );
        self.add_stop_reaction(ctx, msg).await;

        let mut initial = self.gather_context(ctx, msg).await;
        initial.push(self.build_user_turn(ctx, msg, prompt).await);

        let guild_id = msg.guild_id.map(|g| g.to_string());
        let catalog = self.state.tools.build_catalog(
            guild_id.as_deref(),
            &msg.channel_id.to_string(),
            admin,
        );
        let options = RunOptions {
            max_iterations: self.state.config.agent.max_iterations,
            timeout: Duration::from_secs(self.state.config.agent.request_timeout_secs),
            cancel: CancellationToken::new(),
            system: self.state.system_prompt(msg.author.id).await,
        };
        self.run_and_deliver(ctx, msg, &catalog, initial, options)
            .await;
    }

    async fn handle_custom(&self, ctx: &Context, msg: &Message, name: &str, input: &str) {
        // Unknown command words are not errors: people type `!whatever`.
        let Some(manifest) = self.state.plugins.get(name).await else {
            return;
        };
        info!(plugin = name, "running plugin command");
        self.add_stop_reaction(ctx, msg).await;

        let admin = access::is_admin(
            &self.state.config.discord,
            &msg.author.id.to_string(),
            Some(&msg.author.name),
        );
        let guild_id = msg.guild_id.map(|g| g.to_string());
        let catalog = self
            .state
            .tools
            .build_catalog(guild_id.as_deref(), &msg.channel_id.to_string(), admin)
            .subset(&manifest.allowed_tools);

        let initial = vec![ChatMessage::user_text(manifest.render_prompt(input))];
        let options = RunOptions {
            max_iterations: self.state.config.agent.max_iterations,
            timeout: Duration::from_secs(self.state.config.agent.request_timeout_secs),
            cancel: CancellationToken::new(),
            system: None,
        };
        self.run_and_deliver(ctx, msg, &catalog, initial, options)
            .await;
    }

    /// Run the loop with cancellation registered, then deliver the result.
    async fn run_and_deliver(
        &self,
        ctx: &Context,
        msg: &Message,
        catalog: &parrot_agents::ToolCatalog,
        initial: Vec<ChatMessage>,
        options: RunOptions,
    ) {
        {
            let mut runs = self.state.active_runs.write().await;
            runs.insert(msg.id, ActiveRun {
                requester: msg.author.id,
                cancel: options.cancel.clone(),
            });
        }

        let result = run_agent(self.state.model.as_ref(), catalog, initial, options).await;

        {
            let mut runs = self.state.active_runs.write().await;
            runs.remove(&msg.id);
        }

        let text = outbound::render_result(&result);
        self.reply(ctx, msg, &text).await;
        if let parrot_agents::FinalResult::Answer { attachments, .. } = &result
            && let Err(e) =
                outbound::send_attachments(&ctx.http, msg.channel_id, attachments).await
        {
            warn!(channel_id = %msg.channel_id, "failed to upload attachments: {e}");
        }
    }

    async fn add_stop_reaction(&self, ctx: &Context, msg: &Message) {
        let emoji = ReactionType::Unicode(self.state.config.discord.stop_reaction.clone());
        if let Err(e) = msg.react(ctx, emoji).await {
            debug!("failed to add stop reaction: {e}");
        }
    }

    /// Context turns preceding the user's request: channel identity,
    /// recent history, mentioned users, attached image URLs.
    async fn gather_context(&self, ctx: &Context, msg: &Message) -> Vec<ChatMessage> {
        let mut turns = Vec::new();

        let mut identity = format!(
            "Current channel ID: {}\nUser: {} (ID: {})",
            msg.channel_id, msg.author.name, msg.author.id
        );
        if let Some(guild_id) = msg.guild_id {
            identity.push_str(&format!("\nCurrent server ID: {guild_id}"));
        }
        turns.push(ChatMessage::user_text(identity));

        let cap = self
            .state
            .config
            .agent
            .context_messages
            .min(CONTEXT_HARD_CAP);
        if cap > 0 {
            let builder = GetMessages::new().before(msg.id).limit(cap as u8);
            match msg.channel_id.messages(&ctx.http, builder).await {
                Ok(mut history) => {
                    // Newest first from the API; flip to reading order.
                    history.reverse();
                    let lines: Vec<String> = history
                        .iter()
                        .filter(|m| !m.content.is_empty())
                        .map(|m| format!("{}: {}", m.author.name, m.content))
                        .collect();
                    if !lines.is_empty() {
                        turns.push(ChatMessage::user_text(format!(
                            "Recent channel messages:\n{}",
                            lines.join("\n")
                        )));
                    }
                },
                Err(e) => debug!("failed to fetch channel history: {e}"),
            }
        }

        if !msg.mentions.is_empty() {
            let lines: Vec<String> = msg
                .mentions
                .iter()
                .map(|u| format!("- {}: ID {}", u.name, u.id))
                .collect();
            turns.push(ChatMessage::user_text(format!(
                "Mentioned users:\n{}",
                lines.join("\n")
            )));
        }

        let image_urls: Vec<String> = msg
            .attachments
            .iter()
            .filter(|a| {
                a.content_type
                    .as_deref()
                    .is_some_and(|t| t.starts_with("image/"))
            })
            .map(|a| format!("- {}: {}", a.filename, a.url))
            .collect();
        if !image_urls.is_empty() {
            turns.push(ChatMessage::user_text(format!(
                "Attached images (use these URLs with edit_image or other image tools):\n{}",
                image_urls.join("\n")
            )));
        }

        turns
    }

    /// The user's request turn: prompt text plus inline copies of image
    /// and audio attachments.
    async fn build_user_turn(&self, _ctx: &Context, msg: &Message, prompt: &str) -> ChatMessage {
        let mut parts = vec![ContentPart::Text(prompt.to_string())];
        for attachment in &msg.attachments {
            let Some(mime_type) = attachment.content_type.as_deref() else {
                continue;
            };
            if !(mime_type.starts_with("image/") || mime_type.starts_with("audio/")) {
                continue;
            }
            match attachment.download().await {
                Ok(bytes) => parts.push(ContentPart::InlineMedia {
                    mime_type: mime_type.to_string(),
                    data: BASE64.encode(bytes),
                }),
                Err(e) => warn!(filename = %attachment.filename, "attachment download failed: {e}"),
            }
        }
        ChatMessage::user_parts(parts)
    }

    async fn handle_persona(&self, ctx: &Context, msg: &Message, name: Option<&str>) {
        let config = &self.state.config;
        match name {
            None => {
                if config.personas.is_empty() {
                    self.reply(ctx, msg, "No personas are configured.").await;
                    return;
                }
                let current = {
                    let personas = self.state.personas.read().await;
                    personas
                        .get(&msg.author.id)
                        .cloned()
                        .or_else(|| config.default_persona.clone())
                };
                let lines: Vec<String> = config
                    .personas
                    .iter()
                    .map(|p| {
                        let marker = current
                            .as_deref()
                            .is_some_and(|c| c.eq_ignore_ascii_case(&p.name));
                        format!("{} {}", if marker { "•" } else { "-" }, p.name)
                    })
                    .collect();
                self.reply(ctx, msg, &format!("Personas:\n{}", lines.join("\n")))
                    .await;
            },
            Some(name) => {
                let Some(persona) = config.persona(name) else {
                    self.reply(ctx, msg, &format!("Unknown persona '{name}'."))
                        .await;
                    return;
                };
                let canonical = persona.name.clone();
                self.state
                    .personas
                    .write()
                    .await
                    .insert(msg.author.id, canonical.clone());
                self.reply(ctx, msg, &format!("Persona set to '{canonical}'."))
                    .await;
            },
        }
    }

    async fn handle_plugin(&self, ctx: &Context, msg: &Message, action: PluginAction) {
        let admin = access::is_admin(
            &self.state.config.discord,
            &msg.author.id.to_string(),
            Some(&msg.author.name),
        );
        match action {
            PluginAction::List => {
                let plugins = self.state.plugins.list().await;
                if plugins.is_empty() {
                    self.reply(ctx, msg, "No plugins registered.").await;
                    return;
                }
                let prefix = &self.state.config.discord.command_prefix;
                let lines: Vec<String> = plugins
                    .iter()
                    .map(|(name, description)| format!("- {prefix}{name}: {description}"))
                    .collect();
                self.reply(ctx, msg, &format!("Plugins:\n{}", lines.join("\n")))
                    .await;
            },
            PluginAction::Create(description) => {
                if !admin {
                    self.reply(ctx, msg, "Plugin creation is admin-only.").await;
                    return;
                }
                match self.create_plugin(&description).await {
                    Ok(manifest) => {
                        let prefix = &self.state.config.discord.command_prefix;
                        self.reply(
                            ctx,
                            msg,
                            &format!(
                                "Created plugin `{prefix}{}` — {}\nAllowed tools: {}",
                                manifest.name,
                                manifest.description,
                                if manifest.allowed_tools.is_empty() {
                                    "none".to_string()
                                } else {
                                    manifest.allowed_tools.join(", ")
                                },
                            ),
                        )
                        .await;
                    },
                    Err(e) => {
                        self.reply(ctx, msg, &format!("Plugin creation failed: {e}"))
                            .await;
                    },
                }
            },
            PluginAction::Remove(name) => {
                if !admin {
                    self.reply(ctx, msg, "Plugin removal is admin-only.").await;
                    return;
                }
                if !self.state.plugins.remove(&name).await {
                    self.reply(ctx, msg, &format!("No plugin named '{name}'."))
                        .await;
                    return;
                }
                if let Err(e) = self.state.plugin_store.remove(&name) {
                    warn!(name, "failed to delete plugin manifest: {e}");
                }
                self.reply(ctx, msg, &format!("Removed plugin '{name}'."))
                    .await;
            },
        }
    }

    /// Generate → validate → persist → register. A name already present
    /// in the registry or on disk fails the flow; existing plugins are
    /// never replaced in place.
    async fn create_plugin(
        &self,
        description: &str,
    ) -> parrot_plugins::Result<PluginManifest> {
        let known_tools = catalog::tool_names();
        let manifest = parrot_plugins::generate_manifest(
            self.state.model.as_ref(),
            description,
            &known_tools,
        )
        .await?;
        manifest.validate(RESERVED_COMMANDS, &known_tools)?;
        if self.state.plugins.get(&manifest.name).await.is_some() {
            return Err(parrot_plugins::Error::message(format!(
                "plugin '{}' is already registered",
                manifest.name
            )));
        }
        self.state.plugin_store.save(&manifest)?;
        self.state.plugins.register(manifest.clone()).await?;
        Ok(manifest)
    }

    async fn handle_help(&self, ctx: &Context, msg: &Message) {
        let prefix = &self.state.config.discord.command_prefix;
        let mut help = format!(
            "Commands:\n\
             - {prefix}ask <prompt> — ask with tools (search, image/video/music, web fetch)\n\
             - {prefix}persona [name] — list or select a persona\n\
             - {prefix}plugin create <description> | list | remove <name>\n\
             - {prefix}help — this message"
        );
        let plugins = self.state.plugins.list().await;
        if !plugins.is_empty() {
            help.push_str("\nPlugins:");
            for (name, description) in plugins {
                help.push_str(&format!("\n- {prefix}{name} — {description}"));
            }
        }
        self.reply(ctx, msg, &help).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_plain_and_nick_mentions() {
        assert_eq!(strip_bot_mention("<@42> hello", 42), "hello");
        assert_eq!(strip_bot_mention("<@!42> hello", 42), "hello");
        assert_eq!(strip_bot_mention("hello <@42>", 42), "hello <@42>");
        assert_eq!(strip_bot_mention("no mention", 42), "no mention");
    }

    #[test]
    fn intents_cover_messages_and_reactions() {
        let intents = required_intents();
        assert!(intents.contains(GatewayIntents::MESSAGE_CONTENT));
        assert!(intents.contains(GatewayIntents::GUILD_MESSAGE_REACTIONS));
        assert!(intents.contains(GatewayIntents::DIRECT_MESSAGE_REACTIONS));
    }
}
