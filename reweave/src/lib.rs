//! # Reweave
//!
//! Replay recorded multi-agent conversation traces as executable workflows
//! against an OpenAI-compatible inference backend. A trace arrives as a DAG
//! of steps (agent responses, tool/API exchanges, code-execution sites);
//! reweave re-runs it under a chosen **scheduling policy** — sequential,
//! dependency-aware batched, or parallel — and collects latency, token, and
//! throughput metrics so policies can be compared.
//!
//! ## Design
//!
//! - **Immutable DAG**: [`WorkflowDag`] is read-only after load; topology
//!   functions ([`topological_sort`], [`execution_batches`], [`critical_path`])
//!   are free functions over it.
//! - **Narrow client seam**: the scheduler talks to the backend through the
//!   [`InferenceClient`] trait; failures never cross that boundary as errors,
//!   they become error-shaped responses the scheduler records.
//! - **Single-writer state**: the scheduler owns the completed/failed sets
//!   and the result map; batch members run concurrently, their results are
//!   committed after the batch joins.
//! - **Deterministic replay**: node input order breaks topological ties,
//!   adjacency preserves edge input order, and prompt excerpts are bounded,
//!   so identical inputs and mocked responses reproduce identical runs.
//!
//! ## Main modules
//!
//! - [`dag`]: [`WorkflowDag`], [`WorkflowNode`], [`WorkflowEdge`] — the loader;
//!   [`dag::topology`] — ordering, batching, critical path, statistics.
//! - [`prompt`]: role rules and four-block prompt assembly.
//! - [`llm`]: [`InferenceClient`] trait, [`ChatCompletionsClient`],
//!   [`MockInferenceClient`], request/response types, usage counters.
//! - [`tools`]: agent-role tool catalog ([`tools_for_agent`], [`ToolSpec`]).
//! - [`scheduler`]: [`WorkflowScheduler`], [`SchedulerConfig`],
//!   [`SchedulingPolicy`], execution results.
//! - [`metrics`]: [`MetricsCollector`], [`PolicyMetrics`], comparison report.

pub mod dag;
pub mod llm;
pub mod metrics;
pub mod prompt;
pub mod scheduler;
pub mod tools;

pub use dag::topology::{
    critical_path, execution_batches, node_depths, render_structure, statistics,
    topological_sort, DagStatistics, TopologyError,
};
pub use dag::{DagError, WorkflowDag, WorkflowEdge, WorkflowMetadata, WorkflowNode};
pub use llm::{
    ChatCompletionsClient, ClientStatistics, FinishReason, InferenceClient, InferenceRequest,
    InferenceResponse, MockInferenceClient, ToolInvocation,
};
pub use metrics::{MetricsCollector, PolicyMetrics};
pub use prompt::{compose_prompt, system_prompt_for_agent};
pub use scheduler::{
    ConfigError, NodeExecutionResult, SchedulerConfig, SchedulingPolicy,
    WorkflowExecutionResult, WorkflowScheduler,
};
pub use tools::{tools_for_agent, ToolSpec};
