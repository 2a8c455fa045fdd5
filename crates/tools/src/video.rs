//! `generate_video` tool.

use {
    anyhow::Result,
    async_trait::async_trait,
    serde_json::{Value, json},
    tracing::info,
};

use {
    crate::{
        media_entry,
        media_tasks::MediaTaskClient,
        params::{require_str, str_param},
    },
    parrot_agents::AgentTool,
};

const VIDEO_MODEL: &str = "google/veo3-fast";
const ASPECT_RATIOS: &[&str] = &["16:9", "9:16", "1:1"];

/// Short-video generation through the media task API. Videos take minutes
/// to render, so the tool rides the same submit-and-poll flow as music.
pub struct GenerateVideoTool {
    client: MediaTaskClient,
}

impl GenerateVideoTool {
    #[must_use]
    pub fn new(client: MediaTaskClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for GenerateVideoTool {
    fn name(&self) -> &str {
        "generate_video"
    }

    fn description(&self) -> &str {
        "Generates a short video based on a detailed textual prompt. Generation takes a \
         few minutes."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["prompt_text"],
            "properties": {
                "prompt_text": {
                    "type": "string",
                    "description": "The detailed, final prompt for video generation."
                },
                "aspect_ratio": {
                    "type": "string",
                    "description": "'16:9' (default), '9:16', or '1:1'."
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let prompt = require_str(&params, "prompt_text")?;
        let aspect_ratio = str_param(&params, "aspect_ratio")
            .filter(|r| ASPECT_RATIOS.contains(r))
            .unwrap_or("16:9");

        info!(aspect_ratio, "generating video");
        let urls = self
            .client
            .run_job(
                VIDEO_MODEL,
                json!({"prompt": prompt, "aspect_ratio": aspect_ratio}),
            )
            .await?;
        let bytes = self.client.download(&urls[0]).await?;

        Ok(json!({
            "status": "success",
            "media": [media_entry("generated.mp4", "video/mp4", &bytes)],
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {secrecy::Secret, super::*};

    #[tokio::test]
    async fn missing_prompt_is_rejected() {
        let tool = GenerateVideoTool::new(MediaTaskClient::new(
            "http://127.0.0.1:1",
            Secret::new("k".into()),
        ));
        assert!(tool.execute(json!({})).await.is_err());
    }

    #[tokio::test]
    async fn generated_video_becomes_a_media_attachment() {
        let mut server = mockito::Server::new_async().await;
        let _create = server
            .mock("POST", "/api/v1/jobs/createTask")
            .with_body(json!({"code": 200, "data": {"taskId": "v1"}}).to_string())
            .create_async()
            .await;
        let _poll = server
            .mock("GET", "/api/v1/jobs/recordInfo?taskId=v1")
            .with_body(
                json!({"code": 200, "data": {
                    "state": "success",
                    "resultJson": format!(
                        "{{\"resultUrls\": [\"{}/out.mp4\"]}}",
                        server.url()
                    ),
                }})
                .to_string(),
            )
            .create_async()
            .await;
        let _file = server
            .mock("GET", "/out.mp4")
            .with_body("mp4bytes")
            .create_async()
            .await;

        let client = MediaTaskClient::new(server.url(), Secret::new("k".into()))
            .with_polling(std::time::Duration::from_millis(5), 3);
        let result = GenerateVideoTool::new(client)
            .execute(json!({"prompt_text": "a fox running"}))
            .await
            .unwrap();

        assert_eq!(result["status"], "success");
        assert_eq!(result["media"][0]["filename"], "generated.mp4");
    }
}
