//! OpenAI-compatible chat-completions transport (ChatCompletionsClient).
//!
//! Talks to a single backend endpoint (e.g. a vLLM server) over its
//! OpenAI-compatible surface: `POST {base}/chat/completions` and
//! `GET {base}/models` via `async_openai`, plus the bare `GET /health`
//! endpoint on the base host via `reqwest` (health lives outside the `/v1`
//! prefix). Auth is a static bearer token.
//!
//! Tool calls come back with arguments as JSON strings; they are decoded
//! into generic value trees here so the scheduler records an opaque mapping.
//!
//! **Interaction**: Implements [`InferenceClient`]; constructed by the CLI,
//! shared `Arc`'d across scheduler runs so usage counters span a comparison.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionMessageToolCalls, ChatCompletionRequestMessage,
        ChatCompletionRequestUserMessage, ChatCompletionTool, ChatCompletionToolChoiceOption,
        ChatCompletionTools, CreateChatCompletionRequestArgs, FinishReason as ApiFinishReason,
        FunctionObject, ToolChoiceOptions,
    },
    Client,
};

use super::{
    ClientStatistics, FinishReason, InferenceClient, InferenceRequest, InferenceResponse,
    ToolInvocation, UsageCounters,
};

/// Default request timeout; generation against a loaded backend can be slow.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for the lightweight health and model-discovery probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Chat-completions client for one OpenAI-compatible backend.
pub struct ChatCompletionsClient {
    client: Client<OpenAIConfig>,
    probe: reqwest::Client,
    base_url: String,
    model: String,
    counters: UsageCounters,
}

impl ChatCompletionsClient {
    /// Builds a client for `base_url` (e.g. `http://127.0.0.1:8000/v1`) with
    /// the default 120 s request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self::with_timeout(base_url, api_key, model, DEFAULT_TIMEOUT)
    }

    /// Builds a client with an explicit request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url.into();
        let config = OpenAIConfig::new()
            .with_api_base(base_url.trim_end_matches('/'))
            .with_api_key(api_key);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client: Client::with_config(config).with_http_client(http),
            probe: reqwest::Client::builder()
                .timeout(PROBE_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            counters: UsageCounters::default(),
        }
    }

    /// Model identifier sent with every completion.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// `GET /health` on the backend host (the path outside the `/v1` prefix).
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/health", self.base_url.trim_end_matches("/v1"));
        match self.probe.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                warn!(url = %url, error = %error, "health check failed");
                false
            }
        }
    }

    /// Model identifiers reported by `GET {base}/models`. Failures log and
    /// yield an empty list; discovery is advisory.
    pub async fn list_models(&self) -> Vec<String> {
        match self.client.models().list().await {
            Ok(response) => response.data.into_iter().map(|model| model.id).collect(),
            Err(error) => {
                warn!(error = %error, "model discovery failed");
                Vec::new()
            }
        }
    }

    /// One completion round-trip; any failure becomes an `Err(message)` for
    /// `generate` to convert into the error-response shape.
    async fn complete(&self, request: &InferenceRequest) -> Result<InferenceResponse, String> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(vec![ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage::from(request.prompt.as_str()),
        )]);
        args.max_tokens(request.max_tokens);
        args.temperature(request.temperature);

        let tools_count = request.tools.as_ref().map(Vec::len).unwrap_or(0);
        if let Some(tools) = request.tools.as_ref().filter(|tools| !tools.is_empty()) {
            let chat_tools: Vec<ChatCompletionTools> = tools
                .iter()
                .map(|tool| {
                    ChatCompletionTools::Function(ChatCompletionTool {
                        function: FunctionObject {
                            name: tool.name.clone(),
                            description: tool.description.clone(),
                            parameters: Some(tool.parameters.clone()),
                            ..Default::default()
                        },
                    })
                })
                .collect();
            args.tools(chat_tools);
            args.tool_choice(ChatCompletionToolChoiceOption::Mode(ToolChoiceOptions::Auto));
        }

        let body = args
            .build()
            .map_err(|error| format!("request build failed: {error}"))?;

        debug!(
            node_id = %request.node_id,
            model = %self.model,
            agent = %request.agent_name,
            max_tokens = request.max_tokens,
            temperature = request.temperature,
            tools_count = tools_count,
            "chat completion"
        );
        if let Ok(js) = serde_json::to_string(&body) {
            trace!(node_id = %request.node_id, request = %js, "chat completion request body");
        }

        let response = self
            .client
            .chat()
            .create(body)
            .await
            .map_err(|error| format!("chat completion failed: {error}"))?;

        let usage = response.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0);
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| "backend returned no choices".to_string())?;

        let finish_reason = match choice.finish_reason {
            Some(ApiFinishReason::Length) => FinishReason::Length,
            Some(ApiFinishReason::ToolCalls) => FinishReason::ToolCalls,
            _ => FinishReason::Stop,
        };

        let message = choice.message;
        let content = message.content.unwrap_or_default();
        let tool_calls = match message.tool_calls {
            Some(calls) if !calls.is_empty() => {
                let mut decoded = Vec::with_capacity(calls.len());
                for call in calls {
                    if let ChatCompletionMessageToolCalls::Function(function_call) = call {
                        let arguments: serde_json::Value =
                            serde_json::from_str(&function_call.function.arguments).map_err(
                                |error| format!("tool-call argument decode failed: {error}"),
                            )?;
                        decoded.push(ToolInvocation {
                            id: function_call.id,
                            name: function_call.function.name,
                            arguments,
                        });
                    }
                }
                (!decoded.is_empty()).then_some(decoded)
            }
            _ => None,
        };

        Ok(InferenceResponse {
            node_id: request.node_id.clone(),
            content,
            finish_reason,
            tokens_used: usage,
            latency_ms: 0.0,
            tool_calls,
        })
    }
}

#[async_trait]
impl InferenceClient for ChatCompletionsClient {
    async fn generate(&self, request: &InferenceRequest) -> InferenceResponse {
        let started = Instant::now();
        match self.complete(request).await {
            Ok(mut response) => {
                response.latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.counters
                    .record(response.tokens_used, response.latency_ms);
                response
            }
            Err(message) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                warn!(node_id = %request.node_id, error = %message, "inference failed");
                InferenceResponse::error(request.node_id.clone(), &message, latency_ms)
            }
        }
    }

    fn statistics(&self) -> ClientStatistics {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(node_id: &str) -> InferenceRequest {
        InferenceRequest {
            node_id: node_id.to_string(),
            prompt: "hello".to_string(),
            agent_name: "Supervisor".to_string(),
            node_type: "agent_response".to_string(),
            max_tokens: 16,
            temperature: 0.0,
            tools: None,
        }
    }

    #[test]
    fn new_trims_trailing_slash_from_base_url() {
        let client =
            ChatCompletionsClient::new("http://127.0.0.1:8000/v1/", "sk-local-demo", "m");
        assert_eq!(client.base_url, "http://127.0.0.1:8000/v1");
        assert_eq!(client.model(), "m");
    }

    /// **Scenario**: an unreachable backend never raises across the client
    /// boundary; the error response carries measured latency.
    #[tokio::test]
    async fn generate_against_unreachable_backend_yields_error_response() {
        let client = ChatCompletionsClient::with_timeout(
            "http://127.0.0.1:1/v1",
            "sk-local-demo",
            "m",
            Duration::from_millis(250),
        );
        let response = client.generate(&request("n1")).await;
        assert_eq!(response.node_id, "n1");
        assert_eq!(response.finish_reason, FinishReason::Error);
        assert!(response.content.starts_with("ERROR: "));
        assert_eq!(response.tokens_used, 0);
        assert!(response.latency_ms >= 0.0);
    }

    #[tokio::test]
    async fn failed_generation_does_not_advance_counters() {
        let client = ChatCompletionsClient::with_timeout(
            "http://127.0.0.1:1/v1",
            "sk-local-demo",
            "m",
            Duration::from_millis(250),
        );
        let _ = client.generate(&request("n1")).await;
        assert_eq!(client.statistics().total_requests, 0);
    }

    #[tokio::test]
    async fn check_health_is_false_for_unreachable_host() {
        let client = ChatCompletionsClient::new("http://127.0.0.1:1/v1", "sk-local-demo", "m");
        assert!(!client.check_health().await);
    }

    #[tokio::test]
    async fn list_models_is_empty_for_unreachable_host() {
        let client = ChatCompletionsClient::new("http://127.0.0.1:1/v1", "sk-local-demo", "m");
        assert!(client.list_models().await.is_empty());
    }
}
