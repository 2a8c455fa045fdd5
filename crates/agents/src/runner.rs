//! The bounded tool-calling loop.
//!
//! One `run_agent` call serves one user request. Tool calls within a model
//! turn run sequentially in request order; their observations land in one
//! tool-role turn before the next model call, so later calls in the same
//! turn never see earlier observations. A failing tool is feedback for the
//! model, not a loop termination; only model transport failure or the
//! iteration cap end a run unsuccessfully.

use std::time::Duration;

use {
    base64::{Engine as _, engine::general_purpose::STANDARD as BASE64},
    serde_json::{Value, json},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    parrot_common::types::MediaAttachment,
    parrot_providers::{ChatMessage, ModelClient, ModelRequest, ToolCall},
};

use crate::{tool_registry::ToolCatalog, validate::validate_arguments};

/// Default model round-trip cap per request.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Unrecoverable loop failures.
#[derive(Debug, thiserror::Error)]
pub enum AgentRunError {
    #[error("model transport: {0}")]
    Transport(#[from] parrot_providers::Error),
    #[error("tool '{name}' timed out after {timeout:?}")]
    ToolTimeout { name: String, timeout: Duration },
}

/// Why a run stopped without a final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The cancellation token was set before an iteration started.
    Cancelled,
    /// The iteration cap was exhausted.
    IterationLimit,
}

/// Outcome of one reasoning-loop invocation.
#[derive(Debug)]
pub enum FinalResult {
    /// The model produced a final answer; attachments were collected from
    /// tool observations along the way.
    Answer {
        text: Option<String>,
        attachments: Vec<MediaAttachment>,
    },
    Aborted(AbortReason),
    Failed(AgentRunError),
}

/// Per-run knobs supplied by the platform layer.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum remote-model round-trips.
    pub max_iterations: u32,
    /// Bound on each model call and each tool call.
    pub timeout: Duration,
    /// Checked before every iteration; set by the platform's stop control.
    pub cancel: CancellationToken,
    /// System instruction (persona prompt), if any.
    pub system: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            timeout: Duration::from_secs(120),
            cancel: CancellationToken::new(),
            system: None,
        }
    }
}

/// Run the bounded reasoning loop over `initial` conversation turns.
///
/// `initial` must end with the user's request turn; context turns (channel
/// history, attachment notes) come before it.
pub async fn run_agent(
    client: &dyn ModelClient,
    catalog: &ToolCatalog,
    initial: Vec<ChatMessage>,
    options: RunOptions,
) -> FinalResult {
    let mut conversation = initial;
    let tools = catalog.schemas();
    let mut attachments: Vec<MediaAttachment> = Vec::new();

    for iteration in 1..=options.max_iterations {
        if options.cancel.is_cancelled() {
            info!(iteration, "run cancelled before iteration start");
            return FinalResult::Aborted(AbortReason::Cancelled);
        }

        let request = ModelRequest {
            system: options.system.clone(),
            messages: conversation.clone(),
            tools: tools.clone(),
        };

        debug!(iteration, turns = conversation.len(), "querying model");
        let reply = match tokio::time::timeout(options.timeout, client.complete(&request)).await
        {
            Err(_) => {
                return FinalResult::Failed(AgentRunError::Transport(
                    parrot_providers::Error::Timeout(options.timeout),
                ));
            },
            Ok(Err(e)) => return FinalResult::Failed(AgentRunError::Transport(e)),
            Ok(Ok(reply)) => reply,
        };

        conversation.push(ChatMessage::from_reply(&reply));

        if reply.is_final() {
            info!(iteration, attachments = attachments.len(), "final answer");
            return FinalResult::Answer {
                text: reply.text,
                attachments,
            };
        }

        // Execute requested tools strictly in request order; no intra-turn
        // chaining, observations only become visible next iteration.
        let mut observations = Vec::with_capacity(reply.tool_calls.len());
        for call in &reply.tool_calls {
            match execute_one(catalog, call, &options, &mut attachments).await {
                Ok(observation) => observations.push((call.name.clone(), observation)),
                Err(e) => return FinalResult::Failed(e),
            }
        }
        conversation.push(ChatMessage::tool_results(observations));
    }

    info!(cap = options.max_iterations, "iteration cap exhausted");
    FinalResult::Aborted(AbortReason::IterationLimit)
}

/// Execute a single tool call, converting recoverable problems into
/// failure observations.
async fn execute_one(
    catalog: &ToolCatalog,
    call: &ToolCall,
    options: &RunOptions,
    attachments: &mut Vec<MediaAttachment>,
) -> Result<Value, AgentRunError> {
    let Some(tool) = catalog.get(&call.name) else {
        warn!(tool = %call.name, "model requested unknown tool");
        return Ok(failure(format!("tool not found: {}", call.name)));
    };

    if let Err(reason) = validate_arguments(&call.arguments, &tool.parameters_schema()) {
        debug!(tool = %call.name, %reason, "argument validation failed");
        return Ok(failure(reason));
    }

    info!(tool = %call.name, "executing tool");
    let executed =
        tokio::time::timeout(options.timeout, tool.execute(call.arguments.clone())).await;
    match executed {
        Err(_) => Err(AgentRunError::ToolTimeout {
            name: call.name.clone(),
            timeout: options.timeout,
        }),
        Ok(Err(e)) => {
            warn!(tool = %call.name, error = %e, "tool failed");
            Ok(failure(e.to_string()))
        },
        Ok(Ok(mut value)) => {
            collect_media(&mut value, attachments);
            Ok(value)
        },
    }
}

fn failure(reason: impl Into<String>) -> Value {
    json!({"status": "error", "error": reason.into()})
}

/// Pull `media` payloads out of a tool observation.
///
/// Tools return generated bytes as
/// `{"media": [{"filename", "mime_type", "data"}], ...}` with base64 data.
/// The bytes ride out-of-band on the final result; the model-visible
/// observation keeps only a delivery note, so megabytes of base64 never
/// re-enter the conversation.
fn collect_media(value: &mut Value, attachments: &mut Vec<MediaAttachment>) {
    let Some(object) = value.as_object_mut() else {
        return;
    };
    let Some(media) = object.remove("media") else {
        return;
    };
    let Some(entries) = media.as_array() else {
        return;
    };

    let mut delivered = 0usize;
    for entry in entries {
        let filename = entry.get("filename").and_then(Value::as_str);
        let mime_type = entry.get("mime_type").and_then(Value::as_str);
        let data = entry.get("data").and_then(Value::as_str);
        let (Some(filename), Some(mime_type), Some(data)) = (filename, mime_type, data) else {
            warn!("malformed media entry in tool observation");
            continue;
        };
        match BASE64.decode(data) {
            Ok(bytes) => {
                attachments.push(MediaAttachment::new(filename, mime_type, bytes));
                delivered += 1;
            },
            Err(e) => warn!(filename, error = %e, "undecodable media entry"),
        }
    }
    object.insert("media_delivered".into(), json!(delivered));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use {async_trait::async_trait, serde_json::json};

    use {
        super::*,
        crate::tool_registry::AgentTool,
        parrot_providers::{ContentPart, ModelReply, Role},
    };

    /// Scripted model client: pops one canned reply per call and records
    /// every request it saw.
    struct ScriptedClient {
        replies: Mutex<Vec<parrot_providers::Result<ModelReply>>>,
        requests: Mutex<Vec<ModelRequest>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(replies: Vec<parrot_providers::Result<ModelReply>>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_request(&self) -> ModelRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        async fn complete(&self, request: &ModelRequest) -> parrot_providers::Result<ModelReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(ModelReply::default()))
        }
    }

    /// Tool that records invocation order into a shared log.
    struct RecordingTool {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        result: Value,
    }

    #[async_trait]
    impl AgentTool for RecordingTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "records calls"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"prompt_text": {"type": "string"}},
                "required": ["prompt_text"]
            })
        }

        async fn execute(&self, params: Value) -> anyhow::Result<Value> {
            self.log.lock().unwrap().push(format!(
                "{}:{}",
                self.name,
                params["prompt_text"].as_str().unwrap_or("")
            ));
            Ok(self.result.clone())
        }
    }

    fn final_reply(text: &str) -> parrot_providers::Result<ModelReply> {
        Ok(ModelReply {
            text: Some(text.into()),
            tool_calls: vec![],
        })
    }

    fn tool_reply(calls: &[(&str, Value)]) -> parrot_providers::Result<ModelReply> {
        Ok(ModelReply {
            text: None,
            tool_calls: calls
                .iter()
                .map(|(name, arguments)| ToolCall {
                    name: (*name).to_string(),
                    arguments: arguments.clone(),
                })
                .collect(),
        })
    }

    fn catalog_with(log: &Arc<Mutex<Vec<String>>>, result: Value) -> ToolCatalog {
        ToolCatalog::from_tools([Arc::new(RecordingTool {
            name: "generate_image",
            log: Arc::clone(log),
            result,
        }) as Arc<dyn AgentTool>])
    }

    fn user(text: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::user_text(text)]
    }

    #[tokio::test]
    async fn first_call_final_answer_makes_one_model_call_and_no_tool_calls() {
        let client = ScriptedClient::new(vec![final_reply("42")]);
        let log = Arc::new(Mutex::new(Vec::new()));
        let catalog = catalog_with(&log, json!({"status": "success"}));

        let result = run_agent(&client, &catalog, user("hi"), RunOptions::default()).await;

        match result {
            FinalResult::Answer { text, attachments } => {
                assert_eq!(text.as_deref(), Some("42"));
                assert!(attachments.is_empty());
            },
            other => panic!("expected answer, got {other:?}"),
        }
        assert_eq!(client.call_count(), 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn always_tool_calling_model_aborts_after_exactly_cap_calls() {
        let tool_turn = || tool_reply(&[("generate_image", json!({"prompt_text": "x"}))]);
        let client = ScriptedClient::new((0..10).map(|_| tool_turn()).collect());
        let log = Arc::new(Mutex::new(Vec::new()));
        let catalog = catalog_with(&log, json!({"status": "success"}));

        let result = run_agent(&client, &catalog, user("go"), RunOptions::default()).await;

        assert!(matches!(
            result,
            FinalResult::Aborted(AbortReason::IterationLimit)
        ));
        assert_eq!(client.call_count(), 5);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_failure_observation_and_loop_continues() {
        let client = ScriptedClient::new(vec![
            tool_reply(&[("nonexistent_tool", json!({}))]),
            final_reply("recovered"),
        ]);
        let catalog = ToolCatalog::default();

        let result = run_agent(&client, &catalog, user("go"), RunOptions::default()).await;

        assert!(matches!(result, FinalResult::Answer { .. }));
        assert_eq!(client.call_count(), 2);

        // The second request carries the failure observation.
        let request = client.last_request();
        let tool_turn = request
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        match &tool_turn.parts[0] {
            ContentPart::ToolResult { name, response } => {
                assert_eq!(name, "nonexistent_tool");
                assert_eq!(response["status"], "error");
                assert!(response["error"].as_str().unwrap().contains("tool not found"));
            },
            other => panic!("expected tool result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_calls_execute_and_append_in_request_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let catalog = ToolCatalog::from_tools(["alpha", "beta"].map(|name| {
            Arc::new(RecordingTool {
                name,
                log: Arc::clone(&log),
                result: json!({"status": "success"}),
            }) as Arc<dyn AgentTool>
        }));
        let client = ScriptedClient::new(vec![
            tool_reply(&[
                ("beta", json!({"prompt_text": "1"})),
                ("alpha", json!({"prompt_text": "2"})),
                ("beta", json!({"prompt_text": "3"})),
            ]),
            final_reply("done"),
        ]);

        let result = run_agent(&client, &catalog, user("go"), RunOptions::default()).await;
        assert!(matches!(result, FinalResult::Answer { .. }));

        assert_eq!(*log.lock().unwrap(), vec!["beta:1", "alpha:2", "beta:3"]);

        let request = client.last_request();
        let tool_turn = request
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        let order: Vec<&str> = tool_turn
            .parts
            .iter()
            .map(|p| match p {
                ContentPart::ToolResult { name, .. } => name.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(order, vec!["beta", "alpha", "beta"]);
    }

    #[tokio::test]
    async fn cancellation_before_first_iteration_makes_no_calls() {
        let client = ScriptedClient::new(vec![final_reply("never")]);
        let catalog = ToolCatalog::default();
        let options = RunOptions::default();
        options.cancel.cancel();

        let result = run_agent(&client, &catalog, user("go"), options).await;

        assert!(matches!(result, FinalResult::Aborted(AbortReason::Cancelled)));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn successful_tool_feeds_success_observation_into_next_call() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let catalog = catalog_with(&log, json!({"status": "success"}));
        let client = ScriptedClient::new(vec![
            tool_reply(&[("generate_image", json!({"prompt_text": "a fox"}))]),
            final_reply("here you go"),
        ]);

        let result = run_agent(&client, &catalog, user("draw a fox"), RunOptions::default()).await;
        assert!(matches!(result, FinalResult::Answer { .. }));

        let request = client.last_request();
        let tool_turn = request
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        match &tool_turn.parts[0] {
            ContentPart::ToolResult { name, response } => {
                assert_eq!(name, "generate_image");
                assert_eq!(response["status"], "success");
            },
            other => panic!("expected tool result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn media_payloads_are_collected_and_stripped_from_observations() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let encoded = BASE64.encode(b"pngbytes");
        let catalog = catalog_with(
            &log,
            json!({
                "status": "success",
                "media": [{"filename": "generated.png", "mime_type": "image/png", "data": encoded}],
            }),
        );
        let client = ScriptedClient::new(vec![
            tool_reply(&[("generate_image", json!({"prompt_text": "a fox"}))]),
            final_reply("done"),
        ]);

        let result = run_agent(&client, &catalog, user("go"), RunOptions::default()).await;

        match result {
            FinalResult::Answer { attachments, .. } => {
                assert_eq!(attachments.len(), 1);
                assert_eq!(attachments[0].filename, "generated.png");
                assert_eq!(attachments[0].bytes, b"pngbytes");
            },
            other => panic!("expected answer, got {other:?}"),
        }

        // The observation fed back to the model carries a note, not bytes.
        let request = client.last_request();
        let tool_turn = request
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        match &tool_turn.parts[0] {
            ContentPart::ToolResult { response, .. } => {
                assert!(response.get("media").is_none());
                assert_eq!(response["media_delivered"], 1);
            },
            other => panic!("expected tool result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_arguments_skip_execution_and_report_reason() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let catalog = catalog_with(&log, json!({"status": "success"}));
        let client = ScriptedClient::new(vec![
            tool_reply(&[("generate_image", json!({"wrong": 1}))]),
            final_reply("ok"),
        ]);

        let result = run_agent(&client, &catalog, user("go"), RunOptions::default()).await;
        assert!(matches!(result, FinalResult::Answer { .. }));
        assert!(log.lock().unwrap().is_empty());

        let request = client.last_request();
        let tool_turn = request
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        match &tool_turn.parts[0] {
            ContentPart::ToolResult { response, .. } => {
                assert!(
                    response["error"]
                        .as_str()
                        .unwrap()
                        .contains("prompt_text")
                );
            },
            other => panic!("expected tool result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn model_transport_failure_fails_immediately_without_retry() {
        let client = ScriptedClient::new(vec![Err(parrot_providers::Error::message(
            "connection refused",
        ))]);
        let catalog = ToolCatalog::default();

        let result = run_agent(&client, &catalog, user("go"), RunOptions::default()).await;

        assert!(matches!(result, FinalResult::Failed(_)));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn failing_tool_does_not_terminate_the_loop() {
        struct FailingTool;

        #[async_trait]
        impl AgentTool for FailingTool {
            fn name(&self) -> &str {
                "generate_video"
            }

            fn description(&self) -> &str {
                "always fails"
            }

            fn parameters_schema(&self) -> Value {
                json!({"type": "object", "properties": {}})
            }

            async fn execute(&self, _params: Value) -> anyhow::Result<Value> {
                anyhow::bail!("render farm offline")
            }
        }

        let catalog = ToolCatalog::from_tools([Arc::new(FailingTool) as Arc<dyn AgentTool>]);
        let client = ScriptedClient::new(vec![
            tool_reply(&[("generate_video", json!({}))]),
            final_reply("sorry, no video"),
        ]);

        let result = run_agent(&client, &catalog, user("go"), RunOptions::default()).await;

        assert!(matches!(result, FinalResult::Answer { .. }));
        assert_eq!(client.call_count(), 2);
    }
}
