//! Turns one utterance plus a project snapshot into at most one command.
//!
//! The translator never touches the project. It asks the model backend for a
//! reply, keeps the first tool call, and decodes and validates it against the
//! command registry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::llm::{self, ModelReply, ResolvedProvider, ToolArguments};
use crate::model::ProjectSnapshot;
use crate::registry::{catalog, Command, ToolCallError};
use crate::settings::{LlmProviderConfig, TranslatorConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("Nothing to translate")]
    EmptyUtterance,
    #[error("Model backend unavailable: {0}")]
    Backend(String),
    #[error("Model backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Model did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Arguments for {tool} are not valid JSON: {error}")]
    MalformedArguments { tool: String, error: String },
    #[error("Model asked for unknown command \"{0}\"")]
    UnknownCommand(String),
    #[error("Invalid arguments for {command}: {message}")]
    InvalidArguments { command: String, message: String },
}

impl From<ToolCallError> for TranslateError {
    fn from(e: ToolCallError) -> Self {
        match e {
            ToolCallError::UnknownCommand(name) => TranslateError::UnknownCommand(name),
            ToolCallError::InvalidArguments { command, message } => TranslateError::InvalidArguments {
                command: command.to_string(),
                message,
            },
        }
    }
}

/// What the backend is asked for one translation.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub utterance: String,
    /// Anthropic-shaped tool list (`name`, `description`, `input_schema`).
    pub tools: Value,
    pub max_tokens: u32,
}

/// A model-serving backend. The HTTP implementation talks to a real provider;
/// tests script replies.
pub trait ModelBackend: Send + Sync {
    fn complete<'a>(&'a self, request: &'a ModelRequest) -> BoxFuture<'a, Result<ModelReply, TranslateError>>;
}

/// Chat-completions backend over HTTP (OpenAI-compatible or Anthropic).
pub struct HttpBackend {
    client: reqwest::Client,
    provider: ResolvedProvider,
}

impl HttpBackend {
    pub fn new(provider: ResolvedProvider) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider,
        }
    }

    pub fn from_config(config: &LlmProviderConfig) -> Result<Self, TranslateError> {
        ResolvedProvider::from_config(config)
            .map(Self::new)
            .map_err(TranslateError::Backend)
    }

    pub fn model(&self) -> &str {
        &self.provider.model
    }
}

impl ModelBackend for HttpBackend {
    fn complete<'a>(&'a self, request: &'a ModelRequest) -> BoxFuture<'a, Result<ModelReply, TranslateError>> {
        Box::pin(async move {
            let response = llm::build_request(
                &self.client,
                &self.provider,
                &request.system_prompt,
                &request.utterance,
                &request.tools,
                request.max_tokens,
            )
            .send()
            .await
            .map_err(|e| TranslateError::Backend(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(status = status.as_u16(), model = %self.provider.model, "model backend error");
                return Err(TranslateError::Http {
                    status: status.as_u16(),
                    body,
                });
            }

            let json: Value = response
                .json()
                .await
                .map_err(|e| TranslateError::Backend(format!("Unreadable reply: {e}")))?;
            llm::parse_response(self.provider.provider, &json).map_err(TranslateError::Backend)
        })
    }
}

/// Result of one translation: optional chat text and at most one command.
#[derive(Debug, Clone)]
pub struct Translation {
    pub assistant_text: Option<String>,
    pub command: Option<Command>,
    /// Tool calls beyond the first, dropped.
    pub discarded_calls: usize,
}

#[derive(Clone)]
pub struct Translator {
    backend: Arc<dyn ModelBackend>,
    timeout: Duration,
    max_tokens: u32,
}

impl Translator {
    pub fn new(backend: Arc<dyn ModelBackend>, config: &TranslatorConfig) -> Self {
        Self {
            backend,
            timeout: config.timeout(),
            max_tokens: config.max_tokens,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn translate(
        &self,
        utterance: &str,
        snapshot: &ProjectSnapshot,
    ) -> Result<Translation, TranslateError> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(TranslateError::EmptyUtterance);
        }

        let request = ModelRequest {
            system_prompt: crate::prompt::system_prompt(crate::util::today(), snapshot),
            utterance: utterance.to_string(),
            tools: catalog::to_llm_tools(),
            max_tokens: self.max_tokens,
        };
        tracing::debug!(
            prompt_bytes = request.system_prompt.len(),
            tasks = snapshot.tasks.len(),
            links = snapshot.links.len(),
            "translating utterance"
        );

        let started = Instant::now();
        let reply = tokio::time::timeout(self.timeout, self.backend.complete(&request))
            .await
            .map_err(|_| TranslateError::Timeout(self.timeout))??;

        if let Some(usage) = &reply.usage {
            tracing::info!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "model replied"
            );
        }

        decode_reply(reply)
    }
}

/// Keep the first tool call and turn it into a validated command.
fn decode_reply(reply: ModelReply) -> Result<Translation, TranslateError> {
    let discarded_calls = reply.tool_calls.len().saturating_sub(1);
    if discarded_calls > 0 {
        tracing::warn!(discarded = discarded_calls, "model returned several tool calls; using the first");
    }

    let Some(call) = reply.tool_calls.into_iter().next() else {
        return Ok(Translation {
            assistant_text: reply.text,
            command: None,
            discarded_calls,
        });
    };

    let input = match call.arguments {
        ToolArguments::Parsed { value } => value,
        ToolArguments::Malformed { error, .. } => {
            return Err(TranslateError::MalformedArguments {
                tool: call.name,
                error,
            })
        }
    };

    let command = Command::from_tool_call(&call.name, &input)?;
    let info = command.info();
    if info.llm_hidden {
        return Err(TranslateError::UnknownCommand(call.name));
    }
    command
        .validate()
        .map_err(|e| TranslateError::InvalidArguments {
            command: info.name.to_string(),
            message: e.to_string(),
        })?;

    Ok(Translation {
        assistant_text: reply.text,
        command: Some(command),
        discarded_calls,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::ToolCall;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Backend that replays canned replies and records the requests it saw.
    #[derive(Default)]
    pub(crate) struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<ModelReply, TranslateError>>>,
        pub(crate) requests: Mutex<Vec<ModelRequest>>,
        delay: Option<Duration>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(replies: impl IntoIterator<Item = Result<ModelReply, TranslateError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                ..Self::default()
            }
        }

        pub(crate) fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    impl ModelBackend for ScriptedBackend {
        fn complete<'a>(&'a self, request: &'a ModelRequest) -> BoxFuture<'a, Result<ModelReply, TranslateError>> {
            Box::pin(async move {
                self.requests.lock().push(request.clone());
                let next = self.replies.lock().pop_front();
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                next.unwrap_or_else(|| Err(TranslateError::Backend("script exhausted".into())))
            })
        }
    }

    pub(crate) fn call(name: &str, args: Value) -> ToolCall {
        ToolCall {
            id: format!("call-{name}"),
            name: name.to_string(),
            arguments: ToolArguments::Parsed { value: args },
        }
    }

    pub(crate) fn reply(text: Option<&str>, calls: Vec<ToolCall>) -> ModelReply {
        ModelReply {
            text: text.map(str::to_string),
            tool_calls: calls,
            usage: None,
        }
    }

    fn translator(backend: ScriptedBackend) -> (Translator, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        (Translator::new(backend.clone(), &TranslatorConfig::default()), backend)
    }

    #[tokio::test]
    async fn first_tool_call_wins() {
        let (t, _) = translator(ScriptedBackend::new([Ok(reply(
            Some("Zooming."),
            vec![
                call("zoom", json!({"level": "week"})),
                call("clear_all", json!({})),
            ],
        ))]));
        let out = t.translate("zoom to weeks", &ProjectSnapshot::default()).await.unwrap();
        assert!(matches!(out.command, Some(Command::Zoom(_))));
        assert_eq!(out.discarded_calls, 1);
        assert_eq!(out.assistant_text.as_deref(), Some("Zooming."));
    }

    #[tokio::test]
    async fn text_only_reply_has_no_command() {
        let (t, _) = translator(ScriptedBackend::new([Ok(reply(Some("Which task?"), vec![]))]));
        let out = t.translate("make it red", &ProjectSnapshot::default()).await.unwrap();
        assert!(out.command.is_none());
    }

    #[tokio::test]
    async fn request_carries_snapshot_and_visible_tools() {
        let (t, backend) = translator(ScriptedBackend::new([Ok(reply(None, vec![]))]));
        let snapshot = ProjectSnapshot {
            tasks: vec![crate::model::TaskRef {
                id: "12".into(),
                text: "Design review".into(),
            }],
            ..ProjectSnapshot::default()
        };
        t.translate("hi", &snapshot).await.unwrap();
        let requests = backend.requests.lock();
        let request = &requests[0];
        assert!(request.system_prompt.contains("12  Design review"));
        let tools = request.tools.as_array().unwrap();
        assert!(tools.iter().all(|t| t["name"] != "set_link_wrapper_width"));
    }

    #[tokio::test]
    async fn decode_failures_are_typed() {
        let (t, _) = translator(ScriptedBackend::new([
            Ok(reply(None, vec![call("teleport", json!({}))])),
            Ok(reply(None, vec![call("add_link", json!({"source": 1}))])),
            Ok(reply(
                None,
                vec![ToolCall {
                    id: "x".into(),
                    name: "zoom".into(),
                    arguments: ToolArguments::Malformed {
                        raw: "{".into(),
                        error: "EOF".into(),
                    },
                }],
            )),
            Ok(reply(None, vec![call("style_task", json!({"id": 1, "color": "url(x)"}))])),
            Ok(reply(None, vec![call("set_link_wrapper_width", json!({"width": 4}))])),
        ]));
        let snap = ProjectSnapshot::default();
        assert!(matches!(t.translate("a", &snap).await, Err(TranslateError::UnknownCommand(_))));
        assert!(matches!(t.translate("b", &snap).await, Err(TranslateError::InvalidArguments { .. })));
        assert!(matches!(t.translate("c", &snap).await, Err(TranslateError::MalformedArguments { .. })));
        assert!(matches!(t.translate("d", &snap).await, Err(TranslateError::InvalidArguments { .. })));
        assert!(matches!(t.translate("e", &snap).await, Err(TranslateError::UnknownCommand(_))));
    }

    #[tokio::test]
    async fn backend_errors_pass_through() {
        let (t, _) = translator(ScriptedBackend::new([Err(TranslateError::Http {
            status: 401,
            body: "bad key".into(),
        })]));
        let err = t.translate("x", &ProjectSnapshot::default()).await.unwrap_err();
        assert!(matches!(err, TranslateError::Http { status: 401, .. }));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let backend = Arc::new(ScriptedBackend::new([Ok(reply(None, vec![]))]).delayed(Duration::from_millis(500)));
        let t = Translator::new(backend, &TranslatorConfig::default()).with_timeout(Duration::from_millis(20));
        let err = t.translate("x", &ProjectSnapshot::default()).await.unwrap_err();
        assert!(matches!(err, TranslateError::Timeout(_)));
    }

    #[tokio::test]
    async fn empty_utterance_is_rejected_without_a_call() {
        let (t, backend) = translator(ScriptedBackend::new([]));
        let err = t.translate("   ", &ProjectSnapshot::default()).await.unwrap_err();
        assert_eq!(err, TranslateError::EmptyUtterance);
        assert!(backend.requests.lock().is_empty());
    }
}
