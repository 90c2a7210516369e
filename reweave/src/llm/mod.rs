//! Inference client abstraction for the scheduler.
//!
//! The scheduler depends on a narrow, policy-agnostic surface: send one
//! composed prompt (plus optional tool schemas) to a chat-completion backend
//! and get content, finish reason, token usage, and decoded tool calls back.
//! This module defines that trait and the shared request/response types;
//! implementations are [`ChatCompletionsClient`] (real transport) and
//! [`MockInferenceClient`] (tests).
//!
//! # Failure policy
//!
//! Transport and decode failures never cross the client boundary as `Err`.
//! They become a response with finish reason [`FinishReason::Error`], content
//! `ERROR: <message>`, zero tokens, and the measured wall latency; the
//! scheduler's recovery logic depends on this.

mod chat;
mod mock;

pub use chat::ChatCompletionsClient;
pub use mock::MockInferenceClient;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::tools::ToolSpec;

/// Why a completion stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Normal termination.
    #[default]
    Stop,
    /// Hit the max-tokens limit.
    Length,
    /// The model stopped to emit tool calls.
    ToolCalls,
    /// Transport or decode failure, surfaced as content `ERROR: ...`.
    Error,
}

impl FinishReason {
    pub fn is_error(self) -> bool {
        self == FinishReason::Error
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Error => "error",
        };
        f.write_str(label)
    }
}

/// One structured tool call from a response. Arguments arrive on the wire as
/// a JSON string and are decoded into a generic value tree; downstream
/// consumers treat it as opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Correlation id assigned by the backend.
    pub id: String,
    /// Function name.
    pub name: String,
    /// Decoded arguments mapping.
    pub arguments: serde_json::Value,
}

/// One inference request, correlated to a workflow node.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub node_id: String,
    pub prompt: String,
    pub agent_name: String,
    pub node_type: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Tool schemas to attach; `None` leaves tool calling off for this request.
    pub tools: Option<Vec<ToolSpec>>,
}

/// One inference response, correlated back by node id.
#[derive(Debug, Clone)]
pub struct InferenceResponse {
    pub node_id: String,
    pub content: String,
    pub finish_reason: FinishReason,
    pub tokens_used: u32,
    pub latency_ms: f64,
    pub tool_calls: Option<Vec<ToolInvocation>>,
}

impl InferenceResponse {
    /// Builds the error response shape: `ERROR: <message>`, zero tokens,
    /// measured latency preserved.
    pub fn error(node_id: impl Into<String>, message: &str, latency_ms: f64) -> Self {
        Self {
            node_id: node_id.into(),
            content: format!("ERROR: {message}"),
            finish_reason: FinishReason::Error,
            tokens_used: 0,
            latency_ms,
            tool_calls: None,
        }
    }
}

/// Snapshot of a client's cumulative usage.
///
/// Counters live for the process; callers sharing one client across runs
/// snapshot before each run and difference.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientStatistics {
    pub total_requests: u64,
    pub total_tokens: u64,
    pub total_latency_ms: f64,
    pub average_latency_ms: f64,
    pub average_tokens_per_request: f64,
}

/// Monotonic per-process usage counters, shared by client implementations.
/// Latency is accumulated in integer microseconds so updates stay atomic.
#[derive(Debug, Default)]
pub(crate) struct UsageCounters {
    requests: AtomicU64,
    tokens: AtomicU64,
    latency_us: AtomicU64,
}

impl UsageCounters {
    /// Records one completed call.
    pub(crate) fn record(&self, tokens: u32, latency_ms: f64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.tokens.fetch_add(u64::from(tokens), Ordering::Relaxed);
        self.latency_us
            .fetch_add((latency_ms * 1000.0) as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ClientStatistics {
        let total_requests = self.requests.load(Ordering::Relaxed);
        let total_tokens = self.tokens.load(Ordering::Relaxed);
        let total_latency_ms = self.latency_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let (average_latency_ms, average_tokens_per_request) = if total_requests > 0 {
            (
                total_latency_ms / total_requests as f64,
                total_tokens as f64 / total_requests as f64,
            )
        } else {
            (0.0, 0.0)
        };
        ClientStatistics {
            total_requests,
            total_tokens,
            total_latency_ms,
            average_latency_ms,
            average_tokens_per_request,
        }
    }
}

/// Chat-completion transport used by the scheduler.
///
/// `generate` must not fail across the boundary: any failure is converted to
/// an [`InferenceResponse::error`] response. `batch_generate` is a logical
/// batch surface — the backend is assumed to batch continuously, so the
/// default implementation dispatches sequentially; implementations may
/// dispatch concurrently up to `max_parallel` but must keep responses in
/// request order so callers can align them.
///
/// **Interaction**: Implemented by [`ChatCompletionsClient`] and
/// [`MockInferenceClient`]; consumed by the scheduler.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Single request/response chat completion.
    async fn generate(&self, request: &InferenceRequest) -> InferenceResponse;

    /// Logical batch: responses come back in request order.
    async fn batch_generate(
        &self,
        requests: &[InferenceRequest],
        max_parallel: usize,
    ) -> Vec<InferenceResponse> {
        let _ = max_parallel;
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            responses.push(self.generate(request).await);
        }
        responses
    }

    /// Cumulative usage counters for this client instance.
    fn statistics(&self) -> ClientStatistics;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_display_labels() {
        assert_eq!(FinishReason::Stop.to_string(), "stop");
        assert_eq!(FinishReason::Length.to_string(), "length");
        assert_eq!(FinishReason::ToolCalls.to_string(), "tool_calls");
        assert_eq!(FinishReason::Error.to_string(), "error");
        assert!(FinishReason::Error.is_error());
        assert!(!FinishReason::Stop.is_error());
    }

    #[test]
    fn finish_reason_serde_uses_snake_case() {
        let json = serde_json::to_string(&FinishReason::ToolCalls).unwrap();
        assert_eq!(json, "\"tool_calls\"");
        let back: FinishReason = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(back, FinishReason::Error);
    }

    #[test]
    fn error_response_shape() {
        let response = InferenceResponse::error("n1", "connection refused", 12.5);
        assert_eq!(response.node_id, "n1");
        assert_eq!(response.content, "ERROR: connection refused");
        assert_eq!(response.finish_reason, FinishReason::Error);
        assert_eq!(response.tokens_used, 0);
        assert_eq!(response.latency_ms, 12.5);
        assert!(response.tool_calls.is_none());
    }

    #[test]
    fn usage_counters_accumulate_and_average() {
        let counters = UsageCounters::default();
        assert_eq!(counters.snapshot().total_requests, 0);
        assert_eq!(counters.snapshot().average_latency_ms, 0.0);

        counters.record(10, 5.0);
        counters.record(30, 15.0);
        let stats = counters.snapshot();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.total_tokens, 40);
        assert!((stats.total_latency_ms - 20.0).abs() < 1e-6);
        assert!((stats.average_latency_ms - 10.0).abs() < 1e-6);
        assert!((stats.average_tokens_per_request - 20.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn default_batch_generate_preserves_request_order() {
        struct Echo;
        #[async_trait]
        impl InferenceClient for Echo {
            async fn generate(&self, request: &InferenceRequest) -> InferenceResponse {
                InferenceResponse {
                    node_id: request.node_id.clone(),
                    content: format!("echo-{}", request.node_id),
                    finish_reason: FinishReason::Stop,
                    tokens_used: 1,
                    latency_ms: 0.0,
                    tool_calls: None,
                }
            }
            fn statistics(&self) -> ClientStatistics {
                ClientStatistics::default()
            }
        }

        let requests: Vec<InferenceRequest> = ["a", "b", "c"]
            .iter()
            .map(|id| InferenceRequest {
                node_id: id.to_string(),
                prompt: String::new(),
                agent_name: String::new(),
                node_type: "agent_response".to_string(),
                max_tokens: 16,
                temperature: 0.0,
                tools: None,
            })
            .collect();
        let responses = Echo.batch_generate(&requests, 2).await;
        let ids: Vec<_> = responses.iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}
