//! `generate_music` and `generate_sound_effect` tools.

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
        params::{bool_param, f64_param, require_str, str_param},
        sanitize_filename,
    },
    parrot_agents::AgentTool,
};

const MUSIC_MODELS: &[&str] = &["V3_5", "V4", "V4_5", "V5"];

/// Music generation in custom mode: title + style + lyrics/description.
pub struct GenerateMusicTool {
    client: MediaTaskClient,
}

impl GenerateMusicTool {
    #[must_use]
    pub fn new(client: MediaTaskClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for GenerateMusicTool {
    fn name(&self) -> &str {
        "generate_music"
    }

    fn description(&self) -> &str {
        "Generates music in custom mode. Requires a title, style, and a prompt up to 5000 \
         characters (lyrics or musical description). Can create songs with vocals or \
         instrumental tracks."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["prompt", "title", "style"],
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The detailed lyrics or musical description. MUST be under 5000 characters."
                },
                "title": {"type": "string", "description": "The title of the music track."},
                "style": {
                    "type": "string",
                    "description": "Specific music style tags (e.g., 'Upbeat Pop', 'Lo-fi Hip Hop')."
                },
                "instrumental": {
                    "type": "boolean",
                    "description": "If true, generates an instrumental track (no vocals). Defaults to false."
                },
                "model": {
                    "type": "string",
                    "description": "Model version: 'V3_5', 'V4', 'V4_5', 'V5'. Defaults to 'V5'."
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let prompt = require_str(&params, "prompt")?;
        let title = require_str(&params, "title")?;
        let style = require_str(&params, "style")?;
        let instrumental = bool_param(&params, "instrumental", false);
        let model = str_param(&params, "model")
            .filter(|m| MUSIC_MODELS.contains(m))
            .unwrap_or("V5");

        info!(title, style, instrumental, "generating music");
        let tracks = self
            .client
            .generate_music(title, prompt, style, instrumental, model)
            .await?;

        let mut media = Vec::new();
        for track in &tracks {
            let bytes = self.client.download(&track.audio_url).await?;
            let filename = format!("{}.mp3", sanitize_filename(&track.title));
            media.push(media_entry(&filename, "audio/mpeg", &bytes));
        }

        Ok(json!({
            "status": "success",
            "tracks": tracks.iter().map(|t| &t.title).collect::<Vec<_>>(),
            "media": media,
        }))
    }
}

/// Text-described sound effects (0.5–22 s), optionally looping.
pub struct GenerateSoundEffectTool {
    client: MediaTaskClient,
}

impl GenerateSoundEffectTool {
    #[must_use]
    pub fn new(client: MediaTaskClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for GenerateSoundEffectTool {
    fn name(&self) -> &str {
        "generate_sound_effect"
    }

    fn description(&self) -> &str {
        "Generates a sound effect from a text description. Describe the sound in detail \
         (e.g. 'heavy rain on a metal roof with distant thunder'). Duration 0.5-22 seconds, \
         auto-determined when omitted. Can create seamlessly looping ambient sounds."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["text"],
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Detailed description of the sound effect to generate"
                },
                "duration_seconds": {
                    "type": "number",
                    "description": "Duration in seconds (0.5-22). Leave empty for auto duration."
                },
                "loop": {
                    "type": "boolean",
                    "description": "If true, creates a seamlessly looping sound. Default false."
                },
                "prompt_influence": {
                    "type": "number",
                    "description": "How closely to follow the prompt (0.0-1.0). Default 0.3."
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let text = require_str(&params, "text")?;
        let mut input = json!({
            "text": text,
            "loop": bool_param(&params, "loop", false),
            "prompt_influence": f64_param(&params, "prompt_influence", 0.3),
            "output_format": "mp3_44100_128",
        });
        if let Some(duration) = params.get("duration_seconds").and_then(Value::as_f64) {
            if !(0.5..=22.0).contains(&duration) {
                anyhow::bail!("duration_seconds must be between 0.5 and 22");
            }
            input["duration_seconds"] = json!(duration);
        }

        info!(text, "generating sound effect");
        let urls = self
            .client
            .run_job("elevenlabs/sound-effect-v2", input)
            .await?;
        let bytes = self.client.download(&urls[0]).await?;

        Ok(json!({
            "status": "success",
            "media": [media_entry("sound_effect.mp3", "audio/mpeg", &bytes)],
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {secrecy::Secret, super::*};

    fn tool() -> GenerateSoundEffectTool {
        GenerateSoundEffectTool::new(MediaTaskClient::new(
            "http://127.0.0.1:1",
            Secret::new("k".into()),
        ))
    }

    #[tokio::test]
    async fn out_of_range_duration_is_rejected_before_any_request() {
        let err = tool()
            .execute(json!({"text": "boom", "duration_seconds": 60}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("0.5 and 22"));
    }

    #[tokio::test]
    async fn missing_text_is_rejected() {
        assert!(tool().execute(json!({})).await.is_err());
    }
}
