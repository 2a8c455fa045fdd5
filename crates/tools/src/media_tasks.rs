//! Client for the asynchronous media-generation API.
//!
//! The API is task-based: submit a job, then poll its record until it
//! reaches a terminal state. Two families exist with slightly different
//! shapes: the music endpoint (`/api/v1/generate`, Suno-style records) and
//! the generic jobs endpoint (`/api/v1/jobs`, `resultJson.resultUrls`).

use std::time::Duration;

use {
    secrecy::{ExposeSecret, Secret},
    serde_json::{Value, json},
    tracing::{debug, warn},
};

use crate::{Error, Result, shared_http_client};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_POLL_ATTEMPTS: u32 = 60;

/// One generated music track.
#[derive(Debug, Clone)]
pub struct MusicTrack {
    pub title: String,
    pub audio_url: String,
}

/// Task-API client shared by the music, sound-effect, video, and
/// image-operation tools.
#[derive(Clone)]
pub struct MediaTaskClient {
    base_url: String,
    api_key: Secret<String>,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl MediaTaskClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Secret<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }

    /// Shorten the polling cadence (tests).
    #[must_use]
    pub fn with_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = attempts;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let response = shared_http_client()
            .post(self.url(path))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let response = shared_http_client()
            .get(self.url(path))
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    fn check_envelope(payload: &Value) -> Result<()> {
        let code = payload.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 200 {
            let msg = payload
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown API error");
            return Err(Error::message(format!("media API error: {msg}")));
        }
        Ok(())
    }

    fn task_id(payload: &Value) -> Result<String> {
        payload
            .pointer("/data/taskId")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| Error::message("task submission returned no taskId"))
    }

    /// Submit a custom-mode music generation and poll until tracks are
    /// ready. `prompt` is truncated to the API's 5000-character limit.
    pub async fn generate_music(
        &self,
        title: &str,
        prompt: &str,
        style: &str,
        instrumental: bool,
        model: &str,
    ) -> Result<Vec<MusicTrack>> {
        let prompt: String = prompt.chars().take(5000).collect();
        let payload = json!({
            "title": title,
            "prompt": prompt,
            "tags": style,
            "customMode": true,
            "instrumental": instrumental,
            "model": model,
            "callBackUrl": "https://example.com/callback",
        });

        let submitted = self.post_json("/api/v1/generate", &payload).await?;
        Self::check_envelope(&submitted)?;
        let task_id = Self::task_id(&submitted)?;
        debug!(%task_id, "music task submitted");

        for _ in 0..self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;
            let record = self
                .get_json(&format!("/api/v1/generate/record-info?taskId={task_id}"))
                .await?;
            Self::check_envelope(&record)?;

            let status = record
                .pointer("/data/status")
                .and_then(Value::as_str)
                .unwrap_or("");
            match status {
                "SUCCESS" | "FIRST_SUCCESS" => {
                    let tracks = record
                        .pointer("/data/response/sunoData")
                        .and_then(Value::as_array)
                        .map(|entries| {
                            entries
                                .iter()
                                .filter_map(|track| {
                                    let audio_url =
                                        track.get("audioUrl").and_then(Value::as_str)?;
                                    Some(MusicTrack {
                                        title: track
                                            .get("title")
                                            .and_then(Value::as_str)
                                            .unwrap_or("Untitled")
                                            .to_string(),
                                        audio_url: audio_url.to_string(),
                                    })
                                })
                                .collect::<Vec<_>>()
                        })
                        .unwrap_or_default();
                    if !tracks.is_empty() {
                        return Ok(tracks);
                    }
                },
                "CREATE_TASK_FAILED" | "GENERATE_AUDIO_FAILED" | "SENSITIVE_WORD_ERROR" => {
                    let reason = record
                        .pointer("/data/errorMessage")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error");
                    return Err(Error::message(format!("music generation failed: {reason}")));
                },
                _ => {},
            }
        }

        Err(Error::message("music generation timed out"))
    }

    /// Submit a generic job (`model` + `input`) and poll until its result
    /// URLs are available.
    pub async fn run_job(&self, model: &str, input: Value) -> Result<Vec<String>> {
        let payload = json!({"model": model, "input": input});
        let submitted = self.post_json("/api/v1/jobs/createTask", &payload).await?;
        Self::check_envelope(&submitted)?;
        let task_id = Self::task_id(&submitted)?;
        debug!(%task_id, model, "job submitted");

        for _ in 0..self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;
            let record = self
                .get_json(&format!("/api/v1/jobs/recordInfo?taskId={task_id}"))
                .await?;
            Self::check_envelope(&record)?;

            let state = record
                .pointer("/data/state")
                .and_then(Value::as_str)
                .unwrap_or("");
            match state {
                "success" => {
                    let result_json = record
                        .pointer("/data/resultJson")
                        .and_then(Value::as_str)
                        .unwrap_or("{}");
                    let result: Value = serde_json::from_str(result_json)?;
                    let urls: Vec<String> = result
                        .get("resultUrls")
                        .and_then(Value::as_array)
                        .map(|arr| {
                            arr.iter()
                                .filter_map(Value::as_str)
                                .map(String::from)
                                .collect()
                        })
                        .unwrap_or_default();
                    if urls.is_empty() {
                        return Err(Error::message("job succeeded without result URLs"));
                    }
                    return Ok(urls);
                },
                "fail" => {
                    let reason = record
                        .pointer("/data/failMsg")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error");
                    return Err(Error::message(format!("job failed: {reason}")));
                },
                _ => {},
            }
        }

        Err(Error::message("job timed out"))
    }

    /// Download a result URL into memory.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = shared_http_client().get(url).send().await?;
        if !response.status().is_success() {
            warn!(url, status = %response.status(), "result download failed");
            return Err(Error::message(format!(
                "download failed with status {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
