//! Mock inference client for tests.
//!
//! Returns scripted content (`<prefix><node-id>`), fixed token and latency
//! figures, optional scripted tool calls, and injected failures for chosen
//! node ids. Every request is captured so tests can assert on composed
//! prompts and attached tool schemas without a backend.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    ClientStatistics, FinishReason, InferenceClient, InferenceRequest, InferenceResponse,
    ToolInvocation, UsageCounters,
};

/// Scripted [`InferenceClient`] implementation.
///
/// **Interaction**: Passed to the scheduler as `Arc<dyn InferenceClient>`;
/// tests keep their own `Arc` to inspect [`MockInferenceClient::requests`].
pub struct MockInferenceClient {
    content_prefix: String,
    tokens_per_response: u32,
    latency_ms: f64,
    tool_calls: Vec<ToolInvocation>,
    failing_nodes: HashSet<String>,
    requests_seen: Mutex<Vec<InferenceRequest>>,
    counters: UsageCounters,
}

impl MockInferenceClient {
    /// Mock that answers every request with `ok-<node-id>`, 10 tokens, 5 ms.
    pub fn ok() -> Self {
        Self {
            content_prefix: "ok-".to_string(),
            tokens_per_response: 10,
            latency_ms: 5.0,
            tool_calls: Vec::new(),
            failing_nodes: HashSet::new(),
            requests_seen: Mutex::new(Vec::new()),
            counters: UsageCounters::default(),
        }
    }

    /// Set the content prefix (builder).
    pub fn with_content_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.content_prefix = prefix.into();
        self
    }

    /// Set tokens reported per successful response (builder).
    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens_per_response = tokens;
        self
    }

    /// Set the latency figure reported in responses (builder).
    pub fn with_latency_ms(mut self, latency_ms: f64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Attach scripted tool calls to every successful response (builder).
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolInvocation>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Inject a transport failure for the given node ids (builder).
    pub fn failing_for<I, S>(mut self, node_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_nodes = node_ids.into_iter().map(Into::into).collect();
        self
    }

    /// All requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests_seen.lock().expect("requests lock").clone()
    }

    /// Number of requests seen so far.
    pub fn request_count(&self) -> usize {
        self.requests_seen.lock().expect("requests lock").len()
    }

    /// The last captured request for a node id, if any.
    pub fn request_for(&self, node_id: &str) -> Option<InferenceRequest> {
        self.requests_seen
            .lock()
            .expect("requests lock")
            .iter()
            .rev()
            .find(|request| request.node_id == node_id)
            .cloned()
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn generate(&self, request: &InferenceRequest) -> InferenceResponse {
        self.requests_seen
            .lock()
            .expect("requests lock")
            .push(request.clone());

        if self.failing_nodes.contains(&request.node_id) {
            return InferenceResponse::error(
                request.node_id.clone(),
                "injected transport failure",
                self.latency_ms,
            );
        }

        self.counters
            .record(self.tokens_per_response, self.latency_ms);
        InferenceResponse {
            node_id: request.node_id.clone(),
            content: format!("{}{}", self.content_prefix, request.node_id),
            finish_reason: if self.tool_calls.is_empty() {
                FinishReason::Stop
            } else {
                FinishReason::ToolCalls
            },
            tokens_used: self.tokens_per_response,
            latency_ms: self.latency_ms,
            tool_calls: (!self.tool_calls.is_empty()).then(|| self.tool_calls.clone()),
        }
    }

    fn statistics(&self) -> ClientStatistics {
        self.counters.snapshot()
    }
}
