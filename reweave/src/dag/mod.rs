//! Workflow DAG model and loader.
//!
//! A recorded multi-agent trace arrives as a JSON document with `metadata`,
//! `nodes`, and `edges`. The loader validates the document (required fields,
//! unique node ids, resolvable edge endpoints, no self-loops) and builds
//! forward and reverse adjacency maps whose list order preserves the order
//! edges appeared in the file, so replays are deterministic.
//!
//! Cycle detection is deferred to the first topology call (see
//! [`topology::topological_sort`]); the loader only rejects structurally
//! malformed input.

pub mod topology;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading a workflow document (malformed input).
///
/// **Interaction**: Returned by [`WorkflowDag::from_path`] and
/// [`WorkflowDag::from_json_str`]; the CLI treats these as fatal at load.
#[derive(Debug, Error)]
pub enum DagError {
    #[error("read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parse workflow JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),
    #[error("edge {edge_source} -> {target} references unknown node: {missing}")]
    UnknownEndpoint {
        edge_source: String,
        target: String,
        missing: String,
    },
    #[error("self-loop on node: {0}")]
    SelfLoop(String),
}

/// One step of the recorded trace: an agent turn, a tool/API exchange, or a
/// code-execution site.
///
/// The four `is_*` booleans are classification flags computed once at load
/// from the type tag and content; they never travel on the wire.
///
/// **Interaction**: Read by the scheduler to decide whether a node needs an
/// inference call and by the prompt composer for role/content excerpts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique id within the workflow (e.g. "node_12").
    pub id: String,
    /// Display label from the trace.
    pub label: String,
    /// Type tag: agent_response, agent_message, agent_entry, agent_exit,
    /// agent_reply, code_execution, api_response, system, ...
    #[serde(rename = "type")]
    pub node_type: String,
    /// Agent name; empty for system-originated steps.
    #[serde(default)]
    pub agent: String,
    /// Original recorded content, verbatim.
    pub content: String,
    /// Source line in the raw trace, for traceability.
    pub line_number: u64,
    /// Enclosing agent scope, when the trace recorded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// True when `node_type == "agent_response"` (the only nodes that reach the LLM).
    #[serde(skip)]
    pub is_agent_response: bool,
    /// True when `node_type == "code_execution"`.
    #[serde(skip)]
    pub is_code_execution: bool,
    /// True when the content mentions the API-docs pattern or a `show_` call.
    #[serde(skip)]
    pub is_tool_call: bool,
    /// True when `node_type == "api_response"`.
    #[serde(skip)]
    pub is_api_call: bool,
}

impl WorkflowNode {
    fn classify(&mut self) {
        self.is_agent_response = self.node_type == "agent_response";
        self.is_code_execution = self.node_type == "code_execution";
        self.is_tool_call = self.content.contains("api_docs") || self.content.contains("show_");
        self.is_api_call = self.node_type == "api_response";
    }
}

/// Ordering dependency between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub source: String,
    pub target: String,
    /// e.g. sequential, request_response, context_entry, context_exit, execution_result.
    pub edge_type: String,
}

/// Task description attached to the trace. Consulted for reporting and prompt
/// composition only, never for scheduling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_description: Option<String>,
    /// Remaining free-form fields (task numbering etc.).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WorkflowMetadata {
    /// Task id for reports; "unknown" when the trace did not record one.
    pub fn task_id_or_unknown(&self) -> &str {
        self.task_id.as_deref().unwrap_or("unknown")
    }

    /// Task description for prompts; empty when absent.
    pub fn task_description_or_empty(&self) -> &str {
        self.task_description.as_deref().unwrap_or("")
    }
}

/// Wire shape of the workflow document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WorkflowDocument {
    #[serde(default)]
    metadata: WorkflowMetadata,
    #[serde(default)]
    nodes: Vec<WorkflowNode>,
    #[serde(default)]
    edges: Vec<WorkflowEdge>,
}

/// Loaded workflow DAG: nodes in input order, edges, and adjacency both ways.
///
/// Immutable after load. Adjacency lists preserve edge input order; node
/// iteration preserves node input order (used as the topological tie-break).
///
/// **Interaction**: Consumed by [`topology`] for ordering/batching and by the
/// scheduler for per-node dependency lookups.
#[derive(Debug, Clone)]
pub struct WorkflowDag {
    pub metadata: WorkflowMetadata,
    nodes: Vec<WorkflowNode>,
    index: HashMap<String, usize>,
    edges: Vec<WorkflowEdge>,
    adjacency: HashMap<String, Vec<String>>,
    reverse: HashMap<String, Vec<String>>,
}

impl WorkflowDag {
    /// Loads and validates a workflow document from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DagError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DagError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parses and validates a workflow document from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self, DagError> {
        let document: WorkflowDocument = serde_json::from_str(content)?;
        Self::from_document(document)
    }

    fn from_document(document: WorkflowDocument) -> Result<Self, DagError> {
        let mut nodes = document.nodes;
        let mut index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter_mut().enumerate() {
            node.classify();
            if index.insert(node.id.clone(), position).is_some() {
                return Err(DagError::DuplicateNode(node.id.clone()));
            }
        }

        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        let mut reverse: HashMap<String, Vec<String>> = HashMap::new();
        for edge in &document.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !index.contains_key(endpoint) {
                    return Err(DagError::UnknownEndpoint {
                        edge_source: edge.source.clone(),
                        target: edge.target.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
            if edge.source == edge.target {
                return Err(DagError::SelfLoop(edge.source.clone()));
            }
            adjacency
                .entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
            reverse
                .entry(edge.target.clone())
                .or_default()
                .push(edge.source.clone());
        }

        Ok(Self {
            metadata: document.metadata,
            nodes,
            index,
            edges: document.edges,
            adjacency,
            reverse,
        })
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the workflow has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in the order they appeared in the input document.
    pub fn nodes(&self) -> &[WorkflowNode] {
        &self.nodes
    }

    /// Edges in input order.
    pub fn edges(&self) -> &[WorkflowEdge] {
        &self.edges
    }

    /// Looks up a node by id.
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.index.get(id).map(|&position| &self.nodes[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Direct predecessors of `id`, in edge input order. Unknown ids yield an
    /// empty slice.
    pub fn dependencies(&self, id: &str) -> &[String] {
        self.reverse.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct successors of `id`, in edge input order.
    pub fn dependents(&self, id: &str) -> &[String] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All nodes with the given type tag, in input order.
    pub fn nodes_by_type<'a>(&'a self, node_type: &str) -> Vec<&'a WorkflowNode> {
        self.nodes
            .iter()
            .filter(|node| node.node_type == node_type)
            .collect()
    }

    /// All nodes belonging to the given agent, in input order.
    pub fn nodes_for_agent<'a>(&'a self, agent: &str) -> Vec<&'a WorkflowNode> {
        self.nodes.iter().filter(|node| node.agent == agent).collect()
    }

    /// Serializes back to the wire shape (metadata/nodes/edges). Classification
    /// flags are derived, so a load of the output reproduces this DAG.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "metadata": self.metadata,
            "nodes": self.nodes,
            "edges": self.edges,
        })
    }
}
