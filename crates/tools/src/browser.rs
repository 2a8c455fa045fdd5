//! `browser` tool: drive a real browser through a WebDriver endpoint.
//!
//! Unlike `fetch_url`, which only retrieves page content, this tool can
//! click, type, run JavaScript, and capture screenshots. It talks the
//! W3C WebDriver REST protocol to a configured remote endpoint
//! (chromedriver or geckodriver); the bot never launches a browser
//! itself. One session is tracked per tool instance and reused across
//! calls until an explicit `close`.

use {
    anyhow::Result,
    async_trait::async_trait,
    serde_json::{Value, json},
    tokio::sync::RwLock,
    tracing::{debug, info},
    url::Url,
};

use {
    crate::{
        params::{require_str, str_param},
        shared_http_client,
        ssrf::ssrf_check,
    },
    parrot_agents::AgentTool,
};

use crate::Error;

/// Minimal W3C WebDriver client over the shared HTTP client.
#[derive(Clone)]
pub struct WebDriverClient {
    base_url: String,
}

impl WebDriverClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// Unwrap a WebDriver response envelope, surfacing the protocol error
    /// message on failure.
    async fn unwrap_value(response: reqwest::Response) -> crate::Result<Value> {
        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            let message = body
                .pointer("/value/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown webdriver error");
            return Err(Error::message(format!("webdriver error: {message}")));
        }
        Ok(body.get("value").cloned().unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: &Value) -> crate::Result<Value> {
        let response = shared_http_client()
            .post(self.url(path))
            .json(body)
            .send()
            .await?;
        Self::unwrap_value(response).await
    }

    async fn get(&self, path: &str) -> crate::Result<Value> {
        let response = shared_http_client().get(self.url(path)).send().await?;
        Self::unwrap_value(response).await
    }

    /// Create a headless session and return its ID.
    pub async fn new_session(&self) -> crate::Result<String> {
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": {"args": ["--headless=new"]},
                    "moz:firefoxOptions": {"args": ["-headless"]},
                }
            }
        });
        let value = self.post("/session", &capabilities).await?;
        value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| Error::message("webdriver returned no session ID"))
    }

    pub async fn delete_session(&self, session: &str) -> crate::Result<()> {
        let response = shared_http_client()
            .delete(self.url(&format!("/session/{session}")))
            .send()
            .await?;
        Self::unwrap_value(response).await?;
        Ok(())
    }

    pub async fn navigate(&self, session: &str, url: &str) -> crate::Result<()> {
        self.post(&format!("/session/{session}/url"), &json!({"url": url}))
            .await?;
        Ok(())
    }

    pub async fn current_url(&self, session: &str) -> crate::Result<String> {
        let value = self.get(&format!("/session/{session}/url")).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn title(&self, session: &str) -> crate::Result<String> {
        let value = self.get(&format!("/session/{session}/title")).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Capture the viewport as base64-encoded PNG.
    pub async fn screenshot(&self, session: &str) -> crate::Result<String> {
        let value = self.get(&format!("/session/{session}/screenshot")).await?;
        value
            .as_str()
            .map(String::from)
            .ok_or_else(|| Error::message("screenshot returned no image data"))
    }

    /// Find one element by CSS selector and return its element ID.
    ///
    /// The W3C wire format keys the ID under an opaque constant, so the
    /// first string value of the returned object is taken.
    pub async fn find_element(&self, session: &str, selector: &str) -> crate::Result<String> {
        let value = self
            .post(
                &format!("/session/{session}/element"),
                &json!({"using": "css selector", "value": selector}),
            )
            .await?;
        value
            .as_object()
            .and_then(|obj| obj.values().next())
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| Error::message(format!("no element matches selector: {selector}")))
    }

    pub async fn click(&self, session: &str, element: &str) -> crate::Result<()> {
        self.post(
            &format!("/session/{session}/element/{element}/click"),
            &json!({}),
        )
        .await?;
        Ok(())
    }

    pub async fn send_keys(&self, session: &str, element: &str, text: &str) -> crate::Result<()> {
        self.post(
            &format!("/session/{session}/element/{element}/value"),
            &json!({"text": text}),
        )
        .await?;
        Ok(())
    }

    /// Execute synchronous JavaScript in the page and return its result.
    pub async fn execute_script(&self, session: &str, script: &str) -> crate::Result<Value> {
        self.post(
            &format!("/session/{session}/execute/sync"),
            &json!({"script": script, "args": []}),
        )
        .await
    }
}

/// Browser automation over a WebDriver endpoint.
///
/// The session is tracked and reused across calls, so `navigate` followed
/// by `click` or `screenshot` acts on the same page. `close` ends the
/// session; the next action starts a fresh one.
pub struct BrowserTool {
    client: WebDriverClient,
    ssrf_allowlist: Vec<ipnet::IpNet>,
    session: RwLock<Option<String>>,
}

impl BrowserTool {
    #[must_use]
    pub fn new(client: WebDriverClient, ssrf_allowlist: Vec<ipnet::IpNet>) -> Self {
        Self {
            client,
            ssrf_allowlist,
            session: RwLock::new(None),
        }
    }

    /// The tracked session, creating one on first use.
    async fn ensure_session(&self) -> crate::Result<String> {
        if let Some(existing) = self.session.read().await.clone() {
            return Ok(existing);
        }
        let created = self.client.new_session().await?;
        debug!(session = %created, "webdriver session created");
        *self.session.write().await = Some(created.clone());
        Ok(created)
    }

    async fn clear_session(&self) -> Option<String> {
        self.session.write().await.take()
    }

    async fn page_state(&self, session: &str) -> crate::Result<Value> {
        let url = self.client.current_url(session).await?;
        let title = self.client.title(session).await?;
        Ok(json!({"status": "success", "url": url, "title": title}))
    }
}

#[async_trait]
impl AgentTool for BrowserTool {
    fn name(&self) -> &str {
        "browser"
    }

    fn description(&self) -> &str {
        "Controls a real browser for pages that need interaction: clicking, typing into \
         forms, running JavaScript, taking screenshots. Use fetch_url instead when you \
         only need page text. The browser session persists across calls; start with \
         'navigate', then 'click'/'type'/'evaluate'/'screenshot', and 'close' when done."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["action"],
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["navigate", "screenshot", "click", "type", "evaluate", "close"],
                    "description": "The browser action to perform."
                },
                "url": {
                    "type": "string",
                    "description": "URL to open (for 'navigate')."
                },
                "selector": {
                    "type": "string",
                    "description": "CSS selector of the target element (for 'click' and 'type')."
                },
                "text": {
                    "type": "string",
                    "description": "Text to type into the selected element (for 'type')."
                },
                "script": {
                    "type": "string",
                    "description": "JavaScript to run in the page; its return value is the result (for 'evaluate')."
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let action = require_str(&params, "action")?;
        info!(action, "browser action");

        match action {
            "navigate" => {
                let target = require_str(&params, "url")?;
                let parsed = Url::parse(target).map_err(Error::from)?;
                ssrf_check(&parsed, &self.ssrf_allowlist).await?;
                let session = self.ensure_session().await?;
                self.client.navigate(&session, target).await?;
                Ok(self.page_state(&session).await?)
            },
            "screenshot" => {
                let session = self.ensure_session().await?;
                let image = self.client.screenshot(&session).await?;
                Ok(json!({
                    "status": "success",
                    "media": [{
                        "filename": "page.png",
                        "mime_type": "image/png",
                        "data": image,
                    }],
                }))
            },
            "click" => {
                let selector = require_str(&params, "selector")?;
                let session = self.ensure_session().await?;
                let element = self.client.find_element(&session, selector).await?;
                self.client.click(&session, &element).await?;
                Ok(self.page_state(&session).await?)
            },
            "type" => {
                let selector = require_str(&params, "selector")?;
                let text = str_param(&params, "text").unwrap_or_default();
                let session = self.ensure_session().await?;
                let element = self.client.find_element(&session, selector).await?;
                self.client.send_keys(&session, &element, text).await?;
                Ok(self.page_state(&session).await?)
            },
            "evaluate" => {
                let script = require_str(&params, "script")?;
                let session = self.ensure_session().await?;
                let result = self.client.execute_script(&session, script).await?;
                Ok(json!({"status": "success", "result": result}))
            },
            "close" => {
                if let Some(session) = self.clear_session().await {
                    self.client.delete_session(&session).await?;
                }
                Ok(json!({"status": "success"}))
            },
            other => Err(Error::message(format!("unknown browser action: {other}")).into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tool(base: &str) -> BrowserTool {
        let allowlist = crate::ssrf::parse_allowlist(&["127.0.0.0/8".to_string()]);
        BrowserTool::new(WebDriverClient::new(base), allowlist)
    }

    async fn session_mock(server: &mut mockito::Server) -> mockito::Mock {
        server
            .mock("POST", "/session")
            .with_body(json!({"value": {"sessionId": "s1"}}).to_string())
            .expect(1)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn navigate_creates_then_reuses_one_session() {
        let mut server = mockito::Server::new_async().await;
        let session = session_mock(&mut server).await;
        let _nav = server
            .mock("POST", "/session/s1/url")
            .with_body(json!({"value": null}).to_string())
            .expect(2)
            .create_async()
            .await;
        let _url = server
            .mock("GET", "/session/s1/url")
            .with_body(json!({"value": "http://127.0.0.1/page"}).to_string())
            .expect(2)
            .create_async()
            .await;
        let _title = server
            .mock("GET", "/session/s1/title")
            .with_body(json!({"value": "Example"}).to_string())
            .expect(2)
            .create_async()
            .await;

        let tool = tool(&server.url());
        let first = tool
            .execute(json!({"action": "navigate", "url": "http://127.0.0.1/page"}))
            .await
            .unwrap();
        assert_eq!(first["status"], "success");
        assert_eq!(first["title"], "Example");

        tool.execute(json!({"action": "navigate", "url": "http://127.0.0.1/other"}))
            .await
            .unwrap();
        session.assert_async().await;
    }

    #[tokio::test]
    async fn screenshot_becomes_a_media_attachment() {
        let mut server = mockito::Server::new_async().await;
        let _session = session_mock(&mut server).await;
        let _shot = server
            .mock("GET", "/session/s1/screenshot")
            .with_body(json!({"value": "cG5nYnl0ZXM="}).to_string())
            .create_async()
            .await;

        let result = tool(&server.url())
            .execute(json!({"action": "screenshot"}))
            .await
            .unwrap();
        assert_eq!(result["media"][0]["filename"], "page.png");
        assert_eq!(result["media"][0]["data"], "cG5nYnl0ZXM=");
    }

    #[tokio::test]
    async fn click_resolves_selector_to_element() {
        let mut server = mockito::Server::new_async().await;
        let _session = session_mock(&mut server).await;
        let _find = server
            .mock("POST", "/session/s1/element")
            .with_body(
                json!({"value": {"element-6066-11e4-a52e-4f735466cecf": "e9"}}).to_string(),
            )
            .create_async()
            .await;
        let _click = server
            .mock("POST", "/session/s1/element/e9/click")
            .with_body(json!({"value": null}).to_string())
            .expect(1)
            .create_async()
            .await;
        let _url = server
            .mock("GET", "/session/s1/url")
            .with_body(json!({"value": "http://127.0.0.1/after"}).to_string())
            .create_async()
            .await;
        let _title = server
            .mock("GET", "/session/s1/title")
            .with_body(json!({"value": "After"}).to_string())
            .create_async()
            .await;

        let result = tool(&server.url())
            .execute(json!({"action": "click", "selector": "#submit"}))
            .await
            .unwrap();
        assert_eq!(result["url"], "http://127.0.0.1/after");
    }

    #[tokio::test]
    async fn navigation_to_private_targets_is_blocked() {
        let allowlist = Vec::new();
        let tool = BrowserTool::new(WebDriverClient::new("http://127.0.0.1:1"), allowlist);
        let err = tool
            .execute(json!({"action": "navigate", "url": "http://192.168.1.1/admin"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("private"));
    }

    #[tokio::test]
    async fn webdriver_protocol_errors_are_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _session = session_mock(&mut server).await;
        let _find = server
            .mock("POST", "/session/s1/element")
            .with_status(404)
            .with_body(
                json!({"value": {"error": "no such element", "message": "#missing not found"}})
                    .to_string(),
            )
            .create_async()
            .await;

        let err = tool(&server.url())
            .execute(json!({"action": "click", "selector": "#missing"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("#missing not found"));
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let tool = tool("http://127.0.0.1:1");
        assert!(tool.execute(json!({"action": "teleport"})).await.is_err());
        assert!(tool.execute(json!({})).await.is_err());
    }
}
