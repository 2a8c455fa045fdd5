//! The `parrot` binary: load config, wire the clients together, and run
//! the Discord gateway until interrupted.

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::Context as _,
    clap::Parser,
    secrecy::ExposeSecret,
    tracing::info,
    tracing_subscriber::EnvFilter,
};

use {
    parrot_discord::{BotState, Handler, ToolServices, required_intents},
    parrot_plugins::{PluginRegistry, PluginStore},
    parrot_providers::GeminiClient,
};

#[derive(Parser)]
#[command(name = "parrot", version, about)]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, short, env = "PARROT_CONFIG", default_value = "parrot.toml")]
    config: PathBuf,

    /// Log filter (tracing `EnvFilter` syntax).
    #[arg(long, env = "PARROT_LOG", default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log)?)
        .init();

    let config = parrot_config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    anyhow::ensure!(
        !config.discord.token.expose_secret().is_empty(),
        "discord.token is required"
    );
    anyhow::ensure!(
        !config.providers.gemini_api_key.expose_secret().is_empty(),
        "providers.gemini_api_key is required"
    );

    let model = Arc::new(
        GeminiClient::new(
            config.providers.gemini_base_url.clone(),
            config.providers.gemini_api_key.clone(),
            config.providers.model.clone(),
        )
        .with_timeout(Duration::from_secs(config.agent.request_timeout_secs)),
    );

    let plugin_store = PluginStore::open(&config.plugins.dir)
        .with_context(|| format!("opening plugin directory {}", config.plugins.dir))?;
    let plugins = PluginRegistry::new();
    let persisted = plugin_store.load_all().context("loading plugins")?;
    info!(count = persisted.len(), "plugins loaded from disk");
    plugins.load(persisted).await;

    let tools = ToolServices::from_config(&config);
    let token = config.discord.token.expose_secret().clone();
    let state = Arc::new(BotState::new(config, model, tools, plugins, plugin_store));

    let mut client = serenity::Client::builder(&token, required_intents())
        .event_handler(Handler {
            state: Arc::clone(&state),
        })
        .await
        .context("building Discord client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await.context("Discord client")?;
    Ok(())
}
