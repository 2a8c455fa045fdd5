//! Per-caller tool catalog construction.

use std::sync::Arc;

use secrecy::{ExposeSecret, Secret};

use {
    parrot_agents::{AgentTool, ToolCatalog},
    parrot_config::Config,
    parrot_tools::{
        audio::{GenerateMusicTool, GenerateSoundEffectTool},
        browser::{BrowserTool, WebDriverClient},
        image::{EditImageTool, GenerateImageTool, ImageModelClient, RemoveBackgroundTool,
            UpscaleImageTool},
        media_tasks::MediaTaskClient,
        search::{DiscordSearchClient, SearchMessagesTool},
        ssrf,
        video::GenerateVideoTool,
        web_fetch::FetchUrlTool,
    },
};

/// Shared clients behind the tool implementations. Cheap to clone per
/// message; catalogs are rebuilt per caller because search scope and
/// admin rights differ.
#[derive(Clone)]
pub struct ToolServices {
    image: ImageModelClient,
    media: MediaTaskClient,
    search: DiscordSearchClient,
    webdriver_url: Option<String>,
    ssrf_allowlist: Vec<ipnet::IpNet>,
    fetch_max_bytes: usize,
}

impl ToolServices {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let providers = &config.providers;
        Self {
            image: ImageModelClient::new(
                providers.gemini_base_url.clone(),
                providers.gemini_api_key.clone(),
            ),
            media: MediaTaskClient::new(
                providers.media_base_url.clone(),
                providers.media_api_key.clone(),
            ),
            search: DiscordSearchClient::new(Secret::new(
                config.discord.token.expose_secret().clone(),
            )),
            webdriver_url: config.tools.webdriver_url.clone(),
            ssrf_allowlist: ssrf::parse_allowlist(&config.tools.ssrf_allowlist),
            fetch_max_bytes: config.tools.fetch_max_bytes,
        }
    }

    /// Build the catalog for one caller. `guild_id`/`channel_id` scope the
    /// search tool (absent in DMs); `admin` unlocks cross-guild search and
    /// the browser tool.
    #[must_use]
    pub fn build_catalog(
        &self,
        guild_id: Option<&str>,
        channel_id: &str,
        admin: bool,
    ) -> ToolCatalog {
        let mut tools: Vec<Arc<dyn AgentTool>> = vec![
            Arc::new(FetchUrlTool::new(
                self.ssrf_allowlist.clone(),
                self.fetch_max_bytes,
            )),
            Arc::new(GenerateImageTool::new(self.image.clone())),
            Arc::new(EditImageTool::new(self.image.clone())),
            Arc::new(RemoveBackgroundTool::new(self.media.clone())),
            Arc::new(UpscaleImageTool::new(self.media.clone())),
            Arc::new(GenerateVideoTool::new(self.media.clone())),
            Arc::new(GenerateMusicTool::new(self.media.clone())),
            Arc::new(GenerateSoundEffectTool::new(self.media.clone())),
        ];
        if let Some(guild_id) = guild_id {
            tools.push(Arc::new(SearchMessagesTool::new(
                self.search.clone(),
                guild_id,
                channel_id,
                admin,
            )));
        }
        // Browser automation drives a real browser; admin-only, and only
        // when a WebDriver endpoint is configured.
        if admin && let Some(webdriver_url) = &self.webdriver_url {
            tools.push(Arc::new(BrowserTool::new(
                WebDriverClient::new(webdriver_url.clone()),
                self.ssrf_allowlist.clone(),
            )));
        }
        ToolCatalog::from_tools(tools)
    }
}

/// All tool names a plugin manifest may reference.
#[must_use]
pub fn tool_names() -> Vec<String> {
    [
        "fetch_url",
        "generate_image",
        "edit_image",
        "remove_background",
        "upscale_image",
        "generate_video",
        "generate_music",
        "generate_sound_effect",
        "search_messages",
        "browser",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}
