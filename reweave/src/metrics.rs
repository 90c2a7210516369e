//! Metrics collection and policy comparison.
//!
//! Consumes workflow execution results tagged by policy name, derives the
//! per-policy aggregates (average latency per node, tokens per second,
//! parallelism factor), and renders a deterministic text report: an overall
//! table, speedups against the `sequential` baseline when present, per-policy
//! detail, per-node-type aggregates, and a tool-call inventory. The metric
//! mapping also exports as JSON.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::scheduler::{NodeExecutionResult, WorkflowExecutionResult};

/// Baseline policy for the speedup section.
const BASELINE_POLICY: &str = "sequential";

/// Derived metrics for one scheduling policy.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyMetrics {
    pub policy_name: String,
    pub total_time_ms: f64,
    pub total_tokens: u64,
    pub nodes_executed: usize,
    pub total_nodes: usize,
    pub total_batches: usize,
    /// total time / nodes executed.
    pub avg_latency_per_node_ms: f64,
    /// total tokens x 1000 / total time.
    pub tokens_per_second: f64,
    /// nodes executed / batches; 1.0 under `sequential`.
    pub parallelism_factor: f64,
    pub success: bool,
}

impl PolicyMetrics {
    /// Derives the aggregates from one workflow result.
    pub fn from_result(policy_name: &str, result: &WorkflowExecutionResult) -> Self {
        let avg_latency_per_node_ms = if result.nodes_executed > 0 {
            result.total_time_ms / result.nodes_executed as f64
        } else {
            0.0
        };
        let tokens_per_second = if result.total_time_ms > 0.0 {
            result.total_tokens as f64 * 1000.0 / result.total_time_ms
        } else {
            0.0
        };
        let parallelism_factor = if result.total_batches > 0 {
            result.nodes_executed as f64 / result.total_batches as f64
        } else {
            1.0
        };
        Self {
            policy_name: policy_name.to_string(),
            total_time_ms: result.total_time_ms,
            total_tokens: result.total_tokens,
            nodes_executed: result.nodes_executed,
            total_nodes: result.total_nodes,
            total_batches: result.total_batches,
            avg_latency_per_node_ms,
            tokens_per_second,
            parallelism_factor,
            success: result.success,
        }
    }
}

/// Collects execution results per policy and renders the comparison.
///
/// Entries keep insertion order so reports are stable across runs.
#[derive(Default)]
pub struct MetricsCollector {
    entries: Vec<(String, WorkflowExecutionResult, PolicyMetrics)>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one execution result under a policy name, replacing any earlier
    /// entry for the same policy.
    pub fn add_result(&mut self, policy_name: &str, result: WorkflowExecutionResult) {
        let metrics = PolicyMetrics::from_result(policy_name, &result);
        self.entries.retain(|(name, _, _)| name != policy_name);
        self.entries
            .push((policy_name.to_string(), result, metrics));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Metrics for one policy, if collected.
    pub fn metrics_for(&self, policy_name: &str) -> Option<&PolicyMetrics> {
        self.entries
            .iter()
            .find(|(name, _, _)| name == policy_name)
            .map(|(_, _, metrics)| metrics)
    }

    /// Renders the full comparison report.
    pub fn generate_report(&self) -> String {
        if self.entries.is_empty() {
            return "No metrics collected".to_string();
        }

        let mut out = String::new();
        let rule = "=".repeat(80);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "SCHEDULING POLICY COMPARISON REPORT");
        let _ = writeln!(out, "{rule}");

        let _ = writeln!(out, "\n## Overall Metrics\n");
        let _ = writeln!(
            out,
            "{:<20} {:<12} {:<10} {:<10} {:<10} {:<8}",
            "Policy", "Time (ms)", "Tokens", "Batches", "Parallel", "Success"
        );
        let _ = writeln!(out, "{}", "-".repeat(80));
        for (name, _, metrics) in &self.entries {
            let _ = writeln!(
                out,
                "{:<20} {:<12.0} {:<10} {:<10} {:<10.2} {:<8}",
                name,
                metrics.total_time_ms,
                metrics.total_tokens,
                metrics.total_batches,
                metrics.parallelism_factor,
                if metrics.success { "ok" } else { "FAILED" }
            );
        }

        if self.entries.len() >= 2 {
            if let Some(baseline) = self.metrics_for(BASELINE_POLICY).cloned() {
                let _ = writeln!(out, "\n## Performance Improvements\n");
                for (name, _, metrics) in &self.entries {
                    if name == BASELINE_POLICY {
                        continue;
                    }
                    let speedup = if metrics.total_time_ms > 0.0 {
                        baseline.total_time_ms / metrics.total_time_ms
                    } else {
                        0.0
                    };
                    let time_saved = baseline.total_time_ms - metrics.total_time_ms;
                    let throughput_delta = if baseline.tokens_per_second > 0.0 {
                        (metrics.tokens_per_second - baseline.tokens_per_second)
                            / baseline.tokens_per_second
                            * 100.0
                    } else {
                        0.0
                    };
                    let _ = writeln!(out, "{name} vs {BASELINE_POLICY}:");
                    let _ = writeln!(out, "  Speedup: {speedup:.2}x");
                    let _ = writeln!(
                        out,
                        "  Time saved: {time_saved:.0}ms ({:.2}s)",
                        time_saved / 1000.0
                    );
                    let _ = writeln!(
                        out,
                        "  Throughput improvement: {throughput_delta:+.1}%"
                    );
                    let _ = writeln!(
                        out,
                        "  Parallelism factor: {:.2}\n",
                        metrics.parallelism_factor
                    );
                }
            }
        }

        let _ = writeln!(out, "\n## Detailed Metrics by Policy\n");
        for (name, _, metrics) in &self.entries {
            let _ = writeln!(out, "### {}", name.to_uppercase());
            let _ = writeln!(
                out,
                "  Total execution time: {:.0}ms ({:.2}s)",
                metrics.total_time_ms,
                metrics.total_time_ms / 1000.0
            );
            let _ = writeln!(out, "  Total tokens: {}", metrics.total_tokens);
            let _ = writeln!(out, "  Tokens/second: {:.2}", metrics.tokens_per_second);
            let _ = writeln!(
                out,
                "  Nodes executed: {}/{}",
                metrics.nodes_executed, metrics.total_nodes
            );
            let _ = writeln!(out, "  Total batches: {}", metrics.total_batches);
            let _ = writeln!(
                out,
                "  Avg parallelism: {:.2} nodes/batch",
                metrics.parallelism_factor
            );
            let _ = writeln!(
                out,
                "  Avg latency per node: {:.0}ms",
                metrics.avg_latency_per_node_ms
            );
            let _ = writeln!(
                out,
                "  Success: {}\n",
                if metrics.success { "ok" } else { "FAILED" }
            );
        }

        let _ = writeln!(out, "\n## Node-Level Analysis\n");
        for (name, result, _) in &self.entries {
            let _ = writeln!(out, "### {}", name.to_uppercase());
            let mut by_type: BTreeMap<&str, Vec<&NodeExecutionResult>> = BTreeMap::new();
            for node_result in &result.node_results {
                by_type
                    .entry(node_result.node_type.as_str())
                    .or_default()
                    .push(node_result);
            }
            for (node_type, nodes) in by_type {
                let avg_latency =
                    nodes.iter().map(|n| n.latency_ms).sum::<f64>() / nodes.len() as f64;
                let tokens: u64 = nodes.iter().map(|n| u64::from(n.tokens_used)).sum();
                let _ = writeln!(out, "  {node_type}:");
                let _ = writeln!(out, "    Count: {}", nodes.len());
                let _ = writeln!(out, "    Avg latency: {avg_latency:.0}ms");
                let _ = writeln!(out, "    Total tokens: {tokens}");
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "\n## Tool Calls Analysis\n");
        for (name, result, _) in &self.entries {
            let with_tools: Vec<&NodeExecutionResult> = result
                .node_results
                .iter()
                .filter(|node| {
                    node.tool_calls
                        .as_ref()
                        .is_some_and(|calls| !calls.is_empty())
                })
                .collect();
            if with_tools.is_empty() {
                continue;
            }
            let _ = writeln!(out, "### {}", name.to_uppercase());
            let _ = writeln!(out, "  Nodes with tool calls: {}", with_tools.len());
            for node in with_tools {
                let _ = writeln!(out, "    {} ({}):", node.node_id, node.agent_name);
                for call in node.tool_calls.as_deref().unwrap_or(&[]) {
                    let _ = writeln!(out, "      - {}({})", call.name, call.arguments);
                }
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "{rule}");
        out
    }

    /// The per-policy metric mapping, as JSON.
    pub fn export_json(&self) -> serde_json::Value {
        let mut policies = serde_json::Map::new();
        for (name, _, metrics) in &self.entries {
            policies.insert(
                name.clone(),
                serde_json::to_value(metrics).unwrap_or_default(),
            );
        }
        serde_json::json!({ "policy_metrics": policies })
    }

    /// Writes the JSON export to `path`.
    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let text = serde_json::to_string_pretty(&self.export_json())?;
        std::fs::write(path, text)
    }
}
