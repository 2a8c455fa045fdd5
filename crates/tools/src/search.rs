//! `search_messages` tool over Discord's guild message search endpoint.
//!
//! The endpoint (`GET /guilds/{guild_id}/messages/search`) is not part of
//! the bot API surface, so it is called directly over HTTP. Results come
//! back as hit groups (context messages around each hit); the target is
//! the middle message of each group.

use std::time::Duration;

use {
    anyhow::{Result, bail},
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde_json::{Value, json},
    tracing::{debug, info, warn},
};

use {
    crate::{
        Error, shared_http_client,
        params::{str_param, u64_param},
    },
    parrot_agents::AgentTool,
};

/// API per-request ceiling.
const PAGE_LIMIT: u64 = 25;
/// Hard cap on messages fetched across pages.
const MAX_MESSAGES: u64 = 500;
const DEFAULT_LIMIT: u64 = 20;
const MAX_RETRIES: u32 = 3;

/// One message extracted from a search hit group.
#[derive(Debug, Clone)]
pub struct FoundMessage {
    pub author_id: String,
    pub author_name: String,
    pub content: String,
}

/// One page of search results.
#[derive(Debug, Default)]
pub struct SearchPage {
    pub total_results: u64,
    pub messages: Vec<FoundMessage>,
}

impl SearchPage {
    fn from_api(payload: &Value) -> Self {
        let total_results = payload
            .get("total_results")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let messages = payload
            .get("messages")
            .and_then(Value::as_array)
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(|group| {
                        let group = group.as_array()?;
                        // Target is the middle message of each hit group.
                        let target = group.get(group.len() / 2)?;
                        let author = target.get("author")?;
                        Some(FoundMessage {
                            author_id: author
                                .get("id")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            author_name: author
                                .get("username")
                                .and_then(Value::as_str)
                                .unwrap_or("unknown")
                                .to_string(),
                            content: target
                                .get("content")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            total_results,
            messages,
        }
    }
}

/// Filters accepted by [`DiscordSearchClient::search`]. Multi-valued
/// fields are repeated as query parameters.
#[derive(Debug, Default, Clone)]
pub struct SearchQuery {
    pub content: Option<String>,
    pub author_id: Option<String>,
    pub author_type: Option<String>,
    pub channel_ids: Vec<String>,
    pub has: Vec<String>,
    pub mentions: Option<String>,
    pub pinned: Option<bool>,
    pub link_hostname: Vec<String>,
    pub attachment_extension: Vec<String>,
    pub sort_by: String,
    pub sort_order: String,
}

/// Low-level search client. Holds the authorization value directly since
/// the endpoint expects a user-level token without a scheme prefix.
#[derive(Clone)]
pub struct DiscordSearchClient {
    base_url: String,
    authorization: Secret<String>,
    page_pause: Duration,
}

impl DiscordSearchClient {
    #[must_use]
    pub fn new(authorization: Secret<String>) -> Self {
        Self {
            base_url: "https://discord.com/api/v9".into(),
            authorization,
            page_pause: Duration::from_millis(300),
        }
    }

    /// Point at a different API root (tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.page_pause = Duration::from_millis(1);
        self
    }

    fn query_pairs(query: &SearchQuery, limit: u64, offset: u64) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut push = |key: &str, value: String| pairs.push((key.to_string(), value));

        if let Some(content) = &query.content {
            push("content", content.chars().take(1024).collect());
        }
        if let Some(author_id) = &query.author_id {
            push("author_id", author_id.clone());
        }
        if let Some(author_type) = &query.author_type {
            push("author_type", author_type.clone());
        }
        for channel_id in &query.channel_ids {
            push("channel_id", channel_id.clone());
        }
        for has in &query.has {
            push("has", has.clone());
        }
        if let Some(mentions) = &query.mentions {
            push("mentions", mentions.clone());
        }
        if let Some(pinned) = query.pinned {
            push("pinned", pinned.to_string());
        }
        for hostname in &query.link_hostname {
            push("link_hostname", hostname.clone());
        }
        for extension in &query.attachment_extension {
            push("attachment_extension", extension.clone());
        }
        push("sort_by", query.sort_by.clone());
        push("sort_order", query.sort_order.clone());
        push("include_nsfw", "true".into());
        push("limit", limit.clamp(1, PAGE_LIMIT).to_string());
        push("offset", offset.min(9975).to_string());
        pairs
    }

    /// One search request, retried on index-warmup (202) and rate-limit
    /// (429) responses.
    pub async fn search(
        &self,
        guild_id: &str,
        query: &SearchQuery,
        limit: u64,
        offset: u64,
    ) -> crate::Result<SearchPage> {
        let endpoint = format!(
            "{}/guilds/{guild_id}/messages/search",
            self.base_url.trim_end_matches('/')
        );
        let pairs = Self::query_pairs(query, limit, offset);

        for attempt in 0..MAX_RETRIES {
            let response = shared_http_client()
                .get(&endpoint)
                .header("Authorization", self.authorization.expose_secret())
                .query(&pairs)
                .send()
                .await?;

            match response.status().as_u16() {
                200 => {
                    let payload: Value = response.json().await?;
                    return Ok(SearchPage::from_api(&payload));
                },
                202 => {
                    // Search index still warming up.
                    let payload: Value = response.json().await.unwrap_or(Value::Null);
                    let retry_after = payload
                        .get("retry_after")
                        .and_then(Value::as_f64)
                        .unwrap_or(5.0);
                    warn!(attempt, retry_after, "search index not ready");
                    tokio::time::sleep(Duration::from_secs_f64(retry_after)).await;
                },
                429 => {
                    let retry_after = response
                        .headers()
                        .get("X-RateLimit-Reset-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<f64>().ok())
                        .unwrap_or(5.0);
                    warn!(attempt, retry_after, "search rate limited");
                    tokio::time::sleep(Duration::from_secs_f64(retry_after)).await;
                },
                status => {
                    let body = response.text().await.unwrap_or_default();
                    let body: String = body.chars().take(200).collect();
                    return Err(Error::message(format!("search API error {status}: {body}")));
                },
            }
        }
        Err(Error::message("search retries exhausted"))
    }

    /// Fetch up to `limit` messages, paging 25 at a time, oldest first in
    /// the returned vec.
    pub async fn search_paged(
        &self,
        guild_id: &str,
        query: &SearchQuery,
        limit: u64,
    ) -> crate::Result<(u64, Vec<FoundMessage>)> {
        let mut collected: Vec<FoundMessage> = Vec::new();
        let mut remaining = limit.min(MAX_MESSAGES);
        let mut offset = 0;
        let mut total = 0;

        while remaining > 0 {
            let page = self.search(guild_id, query, remaining, offset).await?;
            total = page.total_results;
            if page.messages.is_empty() {
                break;
            }
            let fetched = page.messages.len() as u64;
            collected.extend(page.messages);
            remaining = remaining.saturating_sub(fetched);
            offset += fetched;
            debug!(fetched, offset, total, "search page");
            if offset >= total {
                break;
            }
            tokio::time::sleep(self.page_pause).await;
        }

        collected.reverse();
        Ok((total, collected))
    }
}

/// Agent tool over [`DiscordSearchClient`], scoped to the invoking guild
/// and channel. Cross-guild search is only available when constructed for
/// an admin caller.
pub struct SearchMessagesTool {
    client: DiscordSearchClient,
    guild_id: String,
    channel_id: String,
    cross_guild: bool,
}

impl SearchMessagesTool {
    #[must_use]
    pub fn new(
        client: DiscordSearchClient,
        guild_id: impl Into<String>,
        channel_id: impl Into<String>,
        cross_guild: bool,
    ) -> Self {
        Self {
            client,
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
            cross_guild,
        }
    }
}

fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl AgentTool for SearchMessagesTool {
    fn name(&self) -> &str {
        "search_messages"
    }

    fn description(&self) -> &str {
        "Searches Discord message history. Defaults to the current server and channel. \
         Use the filters to narrow results: content text, author, attachments, pins, \
         link hostnames. Default limit is 20 messages; use larger limits (100-500) when \
         the user asks for extensive history."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "Text to search for in messages. Max 1024 chars."
                },
                "author_id": {
                    "type": "string",
                    "description": "Filter by user ID. Get this from the context provided."
                },
                "guild_id": {
                    "type": "string",
                    "description": "Server to search. Defaults to the current server."
                },
                "channel_id": {
                    "type": "string",
                    "description": "Channel ID(s) to search, comma-separated. Defaults to the current channel."
                },
                "limit": {
                    "type": "number",
                    "description": "Number of messages to return. Default 20, max 500."
                },
                "author_type": {
                    "type": "string",
                    "description": "Filter by author type: 'user', 'bot', or 'webhook'."
                },
                "has": {
                    "type": "string",
                    "description": "Filter by content type: 'image', 'video', 'file', 'link', 'embed', 'sticker', 'sound', 'poll'. Comma-separated."
                },
                "mentions": {
                    "type": "string",
                    "description": "Filter messages mentioning a specific user ID."
                },
                "pinned": {
                    "type": "boolean",
                    "description": "If true, only return pinned messages."
                },
                "link_hostname": {
                    "type": "string",
                    "description": "Filter by URL hostname (e.g. 'github.com'). Comma-separated."
                },
                "attachment_extension": {
                    "type": "string",
                    "description": "Filter by file extension (e.g. 'png', 'pdf'). Comma-separated."
                },
                "sort_by": {
                    "type": "string",
                    "description": "'timestamp' (default) or 'relevance'."
                },
                "sort_order": {
                    "type": "string",
                    "description": "'desc' (newest first, default) or 'asc'."
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let guild_id = str_param(&params, "guild_id")
            .map(String::from)
            .unwrap_or_else(|| self.guild_id.clone());
        if guild_id != self.guild_id && !self.cross_guild {
            bail!("searching other servers requires admin access");
        }

        let mut channel_ids = split_csv(str_param(&params, "channel_id"));
        if channel_ids.is_empty() && guild_id == self.guild_id && !self.channel_id.is_empty() {
            channel_ids.push(self.channel_id.clone());
        }

        let query = SearchQuery {
            content: str_param(&params, "content").map(String::from),
            author_id: str_param(&params, "author_id").map(String::from),
            author_type: str_param(&params, "author_type").map(String::from),
            channel_ids,
            has: split_csv(str_param(&params, "has")),
            mentions: str_param(&params, "mentions").map(String::from),
            pinned: params.get("pinned").and_then(Value::as_bool),
            link_hostname: split_csv(str_param(&params, "link_hostname")),
            attachment_extension: split_csv(str_param(&params, "attachment_extension")),
            sort_by: str_param(&params, "sort_by").unwrap_or("timestamp").into(),
            sort_order: str_param(&params, "sort_order").unwrap_or("desc").into(),
        };
        let limit = u64_param(&params, "limit", DEFAULT_LIMIT).min(MAX_MESSAGES);

        info!(%guild_id, limit, "searching messages");
        let (total, messages) = self.client.search_paged(&guild_id, &query, limit).await?;

        let transcript: Vec<String> = messages
            .iter()
            .map(|m| format!("{}: {}", m.author_name, m.content))
            .collect();

        Ok(json!({
            "status": "success",
            "total_results": total,
            "returned": messages.len(),
            "messages": transcript.join("\n"),
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {mockito::Matcher, super::*};

    fn hit(author_id: &str, author_name: &str, content: &str) -> Value {
        json!([{
            "author": {"id": author_id, "username": author_name},
            "content": content,
            "channel_id": "c1",
        }])
    }

    #[tokio::test]
    async fn search_formats_transcript_in_chronological_order() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/guilds/g1/messages/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("content".into(), "hello".into()),
                Matcher::UrlEncoded("channel_id".into(), "c1".into()),
                Matcher::UrlEncoded("sort_by".into(), "timestamp".into()),
            ]))
            .with_body(
                json!({
                    "total_results": 2,
                    "messages": [hit("1", "alice", "newest"), hit("2", "bob", "oldest")],
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = DiscordSearchClient::new(Secret::new("tok".into()))
            .with_base_url(server.url());
        let tool = SearchMessagesTool::new(client, "g1", "c1", false);
        let result = tool
            .execute(json!({"content": "hello"}))
            .await
            .unwrap();

        assert_eq!(result["total_results"], 2);
        assert_eq!(result["messages"], "bob: oldest\nalice: newest");
    }

    #[tokio::test]
    async fn cross_guild_search_requires_admin_scope() {
        let client = DiscordSearchClient::new(Secret::new("tok".into()))
            .with_base_url("http://127.0.0.1:1");
        let tool = SearchMessagesTool::new(client, "g1", "c1", false);
        let err = tool
            .execute(json!({"guild_id": "other"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("admin"));
    }

    #[tokio::test]
    async fn retries_after_index_warmup_response() {
        let mut server = mockito::Server::new_async().await;
        let _warming = server
            .mock("GET", "/guilds/g1/messages/search")
            .match_query(Matcher::Any)
            .with_status(202)
            .with_body(json!({"retry_after": 0.01}).to_string())
            .expect(1)
            .create_async()
            .await;

        // mockito serves mocks newest-first, so register the 200 after a
        // single-use 202.
        let _ready = server
            .mock("GET", "/guilds/g1/messages/search")
            .match_query(Matcher::Any)
            .with_body(
                json!({"total_results": 1, "messages": [hit("1", "alice", "hi")]}).to_string(),
            )
            .create_async()
            .await;

        let client = DiscordSearchClient::new(Secret::new("tok".into()))
            .with_base_url(server.url());
        let (total, messages) = client
            .search_paged("g1", &SearchQuery::default(), 20)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn csv_splitting_trims_and_drops_empties() {
        assert_eq!(split_csv(Some("a, b,,c")), vec!["a", "b", "c"]);
        assert!(split_csv(None).is_empty());
    }
}
