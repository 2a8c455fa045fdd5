//! `fetch_url` tool — retrieve a web page and return readable text.

use {
    anyhow::{Result, bail},
    async_trait::async_trait,
    serde_json::{Value, json},
    tracing::debug,
    url::Url,
};

use {
    crate::{params::require_str, shared_http_client, ssrf},
    parrot_agents::AgentTool,
};

const DEFAULT_MAX_BYTES: usize = 2 * 1024 * 1024;
/// Characters of extracted text handed back to the model.
const MAX_TEXT_CHARS: usize = 20_000;

/// URL fetching tool with a private-address guard.
pub struct FetchUrlTool {
    allowlist: Vec<ipnet::IpNet>,
    max_bytes: usize,
}

impl Default for FetchUrlTool {
    fn default() -> Self {
        Self {
            allowlist: Vec::new(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl FetchUrlTool {
    #[must_use]
    pub fn new(ssrf_allowlist: Vec<ipnet::IpNet>, max_bytes: usize) -> Self {
        Self {
            allowlist: ssrf_allowlist,
            max_bytes,
        }
    }
}

#[async_trait]
impl AgentTool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetches content from a URL and returns the text. Use this to read web pages, \
         articles, documentation, or any URL the user provides. May not work with pages \
         requiring login or heavy client-side rendering."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["url"],
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The full URL to fetch (including https://)"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let raw_url = require_str(&params, "url")?;
        let url = Url::parse(raw_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("only http and https URLs are supported");
        }
        ssrf::ssrf_check(&url, &self.allowlist).await?;

        debug!(url = %url, "fetching");
        let response = shared_http_client().get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("fetch failed with status {status}");
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        let body = response.bytes().await?;
        let body = &body[..body.len().min(self.max_bytes)];
        let text = String::from_utf8_lossy(body);

        let content = if content_type.contains("html") {
            html_to_text(&text)
        } else {
            text.to_string()
        };
        let content: String = content.chars().take(MAX_TEXT_CHARS).collect();

        Ok(json!({
            "status": "success",
            "url": url.as_str(),
            "content_type": content_type,
            "content": content,
        }))
    }
}

/// Crude but dependable HTML → readable-text conversion: drop script/style
/// subtrees, strip tags, decode common entities, collapse blank runs.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    use std::sync::OnceLock;
    static SCRUB: OnceLock<(regex::Regex, regex::Regex, regex::Regex)> = OnceLock::new();
    #[allow(clippy::expect_used)] // static patterns
    let (drop_blocks, tags, blank_runs) = SCRUB.get_or_init(|| {
        (
            regex::Regex::new(
                r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<head\b.*?</head\s*>|<noscript\b.*?</noscript\s*>",
            )
            .expect("static regex"),
            regex::Regex::new(r"(?s)<[^>]*>").expect("static regex"),
            regex::Regex::new(r"\n{3,}").expect("static regex"),
        )
    });

    let scrubbed = drop_blocks.replace_all(html, "");
    // Block-level closers become newlines so paragraphs survive.
    let scrubbed = scrubbed
        .replace("</p>", "\n")
        .replace("</div>", "\n")
        .replace("</li>", "\n")
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n");
    let stripped = tags.replace_all(&scrubbed, "");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    let trimmed: Vec<&str> = decoded.lines().map(str::trim).collect();
    blank_runs
        .replace_all(trimmed.join("\n").trim(), "\n\n")
        .into_owned()
}
