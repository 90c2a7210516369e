//! Execution result types: one record per node, one per workflow run.
//!
//! Results are append-only during a run and serialize to the result-file
//! shape; [`WorkflowExecutionResult::write_json`] adds the ISO-8601
//! `execution_timestamp` the result files carry.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::llm::ToolInvocation;

/// Wall-clock epoch seconds, for the start/end fields of node results.
/// Latency is measured separately with a monotonic clock.
pub(crate) fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1e6
}

/// Outcome of executing a single workflow node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionResult {
    pub node_id: String,
    pub node_type: String,
    pub agent_name: String,
    /// Wall-clock start, epoch seconds.
    pub start_time: f64,
    /// Wall-clock end, epoch seconds.
    pub end_time: f64,
    /// Monotonic latency of the node execution.
    pub latency_ms: f64,
    /// Recorded trace content, verbatim.
    pub original_content: String,
    /// Regenerated content, `[Simulated: <type>]` for non-LLM nodes, or the
    /// `ERROR: ...` marker on failure.
    pub generated_content: String,
    /// Zero when no LLM call was made.
    pub tokens_used: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolInvocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// False iff the node was visited before all predecessors completed;
    /// an anomaly, not a normal outcome.
    pub dependencies_met: bool,
}

/// Outcome of a full workflow run under one policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionResult {
    pub task_id: String,
    pub task_description: String,
    pub total_nodes: usize,
    /// Size of the completed set.
    pub nodes_executed: usize,
    /// Equals `nodes_executed` under `sequential`; the number of layers
    /// run under the batched policies.
    pub total_batches: usize,
    pub total_time_ms: f64,
    /// Sum of `tokens_used` over all node results.
    pub total_tokens: u64,
    /// Policy label (`sequential` | `dependency_aware` | `parallel`).
    pub scheduling_policy: String,
    /// Node results in batch order; order within a batch is unspecified.
    pub node_results: Vec<NodeExecutionResult>,
    /// True iff the failed set is empty and no fatal error occurred.
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowExecutionResult {
    /// Serializes with the `execution_timestamp` field the result files carry.
    pub fn to_value_with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(object) = value.as_object_mut() {
            object.insert(
                "execution_timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }

    /// Writes the result document (pretty JSON) to `path`.
    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let value = self.to_value_with_timestamp();
        let text = serde_json::to_string_pretty(&value)?;
        std::fs::write(path, text)
    }
}
