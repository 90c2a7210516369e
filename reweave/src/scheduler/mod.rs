//! DAG-aware workflow scheduler.
//!
//! Owns the execution state of one run: the completed and failed sets and the
//! result map. A policy decides what runs when; dependencies are satisfied by
//! construction because batches only start after the previous batch is fully
//! committed. Within a batch, prompts are composed against the frozen
//! pre-batch result map and nodes run concurrently up to `max_parallel`
//! (`buffered` keeps completion results in batch order), so intra-batch
//! ordering can never leak into observable behavior.
//!
//! Node failures never abort a run: a failed node records its error and its
//! successors proceed with that predecessor dropped from their context.
//! Only structural failures (a cycle surfacing at the first topology call)
//! end a run early, and even then everything executed so far is preserved in
//! the workflow result.

mod result;

pub use result::{NodeExecutionResult, WorkflowExecutionResult};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dag::topology::{execution_batches, topological_sort};
use crate::dag::{WorkflowDag, WorkflowNode};
use crate::llm::{InferenceClient, InferenceRequest};
use crate::prompt::compose_prompt;
use crate::tools::{tools_for_agent, ToolSpec};
use result::epoch_seconds;

/// Execution strategy for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchedulingPolicy {
    /// One node at a time, in topological order.
    Sequential,
    /// Dependency-layer batches; members run concurrently up to `max_parallel`.
    #[default]
    DependencyAware,
    /// Same batch walk, but every batch runs at full width.
    Parallel,
}

impl SchedulingPolicy {
    /// All policies, in report order.
    pub const ALL: [SchedulingPolicy; 3] = [
        SchedulingPolicy::Sequential,
        SchedulingPolicy::DependencyAware,
        SchedulingPolicy::Parallel,
    ];
}

impl std::str::FromStr for SchedulingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "dependency_aware" => Ok(Self::DependencyAware),
            "parallel" => Ok(Self::Parallel),
            _ => Err(format!(
                "unknown scheduling policy: {} (use sequential, dependency_aware, or parallel)",
                s
            )),
        }
    }
}

impl std::fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SchedulingPolicy::Sequential => "sequential",
            SchedulingPolicy::DependencyAware => "dependency_aware",
            SchedulingPolicy::Parallel => "parallel",
        };
        f.write_str(label)
    }
}

/// Invalid scheduler configuration; fatal at construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_parallel must be at least 1")]
    InvalidMaxParallel,
    #[error("max_tokens must be at least 1")]
    InvalidMaxTokens,
    #[error("temperature must be within [0, 2], got {0}")]
    InvalidTemperature(f32),
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub policy: SchedulingPolicy,
    /// Upper bound on concurrent in-flight requests within a batch.
    pub max_parallel: usize,
    /// Attach tool schemas to agent-response requests.
    pub enable_tools: bool,
    /// Per-node generation limit.
    pub max_tokens: u32,
    /// Sampling temperature, within [0, 2].
    pub temperature: f32,
    /// Reattempt failed agent-response nodes with the same prompt.
    pub retry_failed: bool,
    /// Upper bound on reattempts per node.
    pub max_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: SchedulingPolicy::DependencyAware,
            max_parallel: 4,
            enable_tools: true,
            max_tokens: 512,
            temperature: 0.7,
            retry_failed: false,
            max_retries: 2,
        }
    }
}

impl SchedulerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel == 0 {
            return Err(ConfigError::InvalidMaxParallel);
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens);
        }
        if !(0.0..=2.0).contains(&self.temperature) || !self.temperature.is_finite() {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        Ok(())
    }
}

/// A node lifted out of the DAG with everything its execution needs, so the
/// in-flight future borrows nothing from the scheduler.
struct PreparedNode {
    node: WorkflowNode,
    prompt: Option<String>,
    tools: Option<Vec<ToolSpec>>,
    dependencies_met: bool,
}

/// Scheduler for one workflow run. Create a fresh scheduler per run; state
/// (completed/failed sets, result map) accumulates across `execute`.
pub struct WorkflowScheduler {
    dag: Arc<WorkflowDag>,
    client: Arc<dyn InferenceClient>,
    config: SchedulerConfig,
    completed: HashSet<String>,
    failed: HashSet<String>,
    results: HashMap<String, NodeExecutionResult>,
    ordered: Vec<NodeExecutionResult>,
    batches_run: usize,
}

impl WorkflowScheduler {
    /// Builds a scheduler; invalid configuration is fatal here.
    pub fn new(
        dag: Arc<WorkflowDag>,
        client: Arc<dyn InferenceClient>,
        config: SchedulerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            dag,
            client,
            config,
            completed: HashSet::new(),
            failed: HashSet::new(),
            results: HashMap::new(),
            ordered: Vec::new(),
            batches_run: 0,
        })
    }

    /// Node ids that completed successfully.
    pub fn completed_nodes(&self) -> &HashSet<String> {
        &self.completed
    }

    /// Node ids that failed.
    pub fn failed_nodes(&self) -> &HashSet<String> {
        &self.failed
    }

    /// The result map (completed and failed nodes).
    pub fn node_results(&self) -> &HashMap<String, NodeExecutionResult> {
        &self.results
    }

    /// Executes the whole workflow under the configured policy.
    pub async fn execute(&mut self) -> WorkflowExecutionResult {
        let started = Instant::now();
        info!(
            task_id = %self.dag.metadata.task_id_or_unknown(),
            policy = %self.config.policy,
            total_nodes = self.dag.len(),
            "executing workflow"
        );

        let outcome = match self.config.policy {
            SchedulingPolicy::Sequential => self.run_sequential().await,
            SchedulingPolicy::DependencyAware => self.run_batched(false).await,
            SchedulingPolicy::Parallel => self.run_batched(true).await,
        };

        let total_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let total_tokens: u64 = self.ordered.iter().map(|r| u64::from(r.tokens_used)).sum();
        // Sequential batches are singletons; the batch total counts only the
        // nodes that completed, so it always equals `nodes_executed`.
        let total_batches = match self.config.policy {
            SchedulingPolicy::Sequential => self.completed.len(),
            SchedulingPolicy::DependencyAware | SchedulingPolicy::Parallel => self.batches_run,
        };
        let error = outcome.err().map(|e| e.to_string());
        if let Some(ref message) = error {
            warn!(error = %message, "workflow execution failed");
        }
        let success = error.is_none() && self.failed.is_empty();
        info!(
            nodes_executed = self.completed.len(),
            failed = self.failed.len(),
            total_tokens,
            total_time_ms,
            success,
            "workflow finished"
        );

        WorkflowExecutionResult {
            task_id: self.dag.metadata.task_id_or_unknown().to_string(),
            task_description: self.dag.metadata.task_description_or_empty().to_string(),
            total_nodes: self.dag.len(),
            nodes_executed: self.completed.len(),
            total_batches,
            total_time_ms,
            total_tokens,
            scheduling_policy: self.config.policy.to_string(),
            node_results: self.ordered.clone(),
            success,
            error,
        }
    }

    /// Sequential policy: every node is its own batch, in topological order.
    async fn run_sequential(&mut self) -> Result<(), crate::dag::topology::TopologyError> {
        let order = topological_sort(&self.dag)?;
        debug!(nodes = order.len(), "sequential execution");
        for id in order {
            self.run_batch(std::slice::from_ref(&id), 1).await;
        }
        Ok(())
    }

    /// Batched policies: dependency layers in order; `full_width` lifts the
    /// concurrency bound to the batch size (the `parallel` policy).
    async fn run_batched(
        &mut self,
        full_width: bool,
    ) -> Result<(), crate::dag::topology::TopologyError> {
        let batches = execution_batches(&self.dag)?;
        debug!(batches = batches.len(), "dependency-aware execution");
        for batch in batches {
            let width = if full_width {
                batch.len().max(1)
            } else {
                self.config.max_parallel
            };
            self.run_batch(&batch, width).await;
        }
        Ok(())
    }

    /// Runs one batch: prepare every node against the frozen result map, run
    /// the executions concurrently, then commit results single-writer.
    async fn run_batch(&mut self, node_ids: &[String], max_parallel: usize) {
        debug!(batch_size = node_ids.len(), max_parallel, "executing batch");

        let prepared: Vec<PreparedNode> =
            node_ids.iter().map(|id| self.prepare_node(id)).collect();

        let client = Arc::clone(&self.client);
        let config = self.config.clone();
        let batch_results: Vec<NodeExecutionResult> = stream::iter(
            prepared
                .into_iter()
                .map(|node| Self::execute_prepared(Arc::clone(&client), config.clone(), node)),
        )
        .buffered(max_parallel.max(1))
        .collect()
        .await;

        for node_result in batch_results {
            self.commit(node_result);
        }
        self.batches_run += 1;
    }

    /// Lifts a node out of the DAG with its prompt and tools. Prompts are
    /// composed here, before the batch starts, so siblings cannot observe
    /// each other's output.
    fn prepare_node(&self, node_id: &str) -> PreparedNode {
        let node = self
            .dag
            .node(node_id)
            .expect("scheduled id comes from the node list")
            .clone();
        let dependencies_met = self
            .dag
            .dependencies(node_id)
            .iter()
            .all(|dependency| self.results.contains_key(dependency));
        if !dependencies_met {
            warn!(node_id, "node visited before all predecessors completed");
        }

        let (prompt, tools) = if node.is_agent_response {
            let prompt = compose_prompt(&self.dag, &node, &self.results);
            let tools = if self.config.enable_tools {
                let tools = tools_for_agent(&node.agent);
                (!tools.is_empty()).then_some(tools)
            } else {
                None
            };
            (Some(prompt), tools)
        } else {
            (None, None)
        };

        PreparedNode {
            node,
            prompt,
            tools,
            dependencies_met,
        }
    }

    /// Executes one prepared node. Agent responses go to the inference
    /// client (with retries when configured); every other node type is an
    /// observation site and records a simulated marker without an LLM call.
    async fn execute_prepared(
        client: Arc<dyn InferenceClient>,
        config: SchedulerConfig,
        prepared: PreparedNode,
    ) -> NodeExecutionResult {
        let node = prepared.node;
        let start_time = epoch_seconds();
        let started = Instant::now();

        if node.is_agent_response {
            let request = InferenceRequest {
                node_id: node.id.clone(),
                prompt: prepared.prompt.unwrap_or_default(),
                agent_name: node.agent.clone(),
                node_type: node.node_type.clone(),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                tools: prepared.tools,
            };

            let mut response = client.generate(&request).await;
            if config.retry_failed {
                let mut attempts = 0;
                while response.finish_reason.is_error() && attempts < config.max_retries {
                    attempts += 1;
                    debug!(node_id = %node.id, attempt = attempts, "retrying failed node");
                    response = client.generate(&request).await;
                }
            }

            let error = response
                .finish_reason
                .is_error()
                .then(|| response.content.clone());
            NodeExecutionResult {
                node_id: node.id,
                node_type: node.node_type,
                agent_name: node.agent,
                start_time,
                end_time: epoch_seconds(),
                latency_ms: started.elapsed().as_secs_f64() * 1000.0,
                original_content: node.content,
                generated_content: response.content,
                tokens_used: response.tokens_used,
                tool_calls: response.tool_calls,
                error,
                dependencies_met: prepared.dependencies_met,
            }
        } else {
            NodeExecutionResult {
                node_id: node.id,
                node_type: node.node_type.clone(),
                agent_name: if node.agent.is_empty() {
                    "system".to_string()
                } else {
                    node.agent
                },
                start_time,
                end_time: epoch_seconds(),
                latency_ms: started.elapsed().as_secs_f64() * 1000.0,
                original_content: node.content,
                generated_content: format!("[Simulated: {}]", node.node_type),
                tokens_used: 0,
                tool_calls: None,
                error: None,
                dependencies_met: prepared.dependencies_met,
            }
        }
    }

    /// Single-writer commit: moves the node into completed or failed and
    /// inserts into the result map.
    fn commit(&mut self, node_result: NodeExecutionResult) {
        if let Some(ref message) = node_result.error {
            self.failed.insert(node_result.node_id.clone());
            debug!(node_id = %node_result.node_id, error = %message, "node failed");
        } else {
            self.completed.insert(node_result.node_id.clone());
            debug!(
                node_id = %node_result.node_id,
                latency_ms = node_result.latency_ms,
                tokens = node_result.tokens_used,
                "node completed"
            );
        }
        self.results
            .insert(node_result.node_id.clone(), node_result.clone());
        self.ordered.push(node_result);
    }
}
