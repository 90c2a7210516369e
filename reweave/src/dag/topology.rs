//! Topology analysis over a loaded workflow DAG: topological order, layered
//! execution batches, critical path, depths, and statistics.
//!
//! All functions are free functions over `&WorkflowDag`, following the
//! read-only style of the graph: the DAG never changes after load. Among
//! simultaneously ready nodes, every ordering here preserves node input
//! order, so replays are deterministic for a given document.
//!
//! **Interaction**: Called by the scheduler (`topological_sort` /
//! `execution_batches`) and by the CLI (`statistics`, `render_structure`).

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::Serialize;
use thiserror::Error;

use super::WorkflowDag;

/// Errors from ordering or batching a workflow graph.
///
/// The loader accepts cyclic edge sets; the cycle surfaces here, on the
/// first topology call.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("workflow graph contains a cycle; topological sort is impossible")]
    Cycle,
    #[error("batching stalled with {remaining} nodes unscheduled; the graph has a cycle")]
    BatchingStalled { remaining: usize },
}

/// Produces a total order of node ids consistent with the edges (Kahn).
///
/// Tie-break: the ready queue is seeded in node input order, and successors
/// are enqueued in edge input order, so simultaneously ready nodes keep the
/// order they appeared in the document.
pub fn topological_sort(dag: &WorkflowDag) -> Result<Vec<String>, TopologyError> {
    let mut in_degree: HashMap<&str, usize> = dag
        .nodes()
        .iter()
        .map(|node| (node.id.as_str(), dag.dependencies(&node.id).len()))
        .collect();

    let mut queue: VecDeque<&str> = dag
        .nodes()
        .iter()
        .map(|node| node.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut order = Vec::with_capacity(dag.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        for dependent in dag.dependents(id) {
            let degree = in_degree
                .get_mut(dependent.as_str())
                .expect("dependent resolves to a loaded node");
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(dependent.as_str());
            }
        }
    }

    if order.len() != dag.len() {
        return Err(TopologyError::Cycle);
    }
    Ok(order)
}

/// Partitions the nodes into ordered batches: batch k+1 holds exactly the
/// nodes whose full predecessor set lies in batches 0..=k.
///
/// Members of one batch are pairwise independent and may run concurrently;
/// concatenating the batches is itself a valid topological order.
pub fn execution_batches(dag: &WorkflowDag) -> Result<Vec<Vec<String>>, TopologyError> {
    let mut batches = Vec::new();
    let mut scheduled: HashSet<&str> = HashSet::with_capacity(dag.len());

    while scheduled.len() < dag.len() {
        let batch: Vec<String> = dag
            .nodes()
            .iter()
            .map(|node| node.id.as_str())
            .filter(|id| !scheduled.contains(id))
            .filter(|id| {
                dag.dependencies(id)
                    .iter()
                    .all(|dep| scheduled.contains(dep.as_str()))
            })
            .map(str::to_string)
            .collect();

        if batch.is_empty() {
            return Err(TopologyError::BatchingStalled {
                remaining: dag.len() - scheduled.len(),
            });
        }
        for id in &batch {
            let node = dag.node(id).expect("batched id comes from the node list");
            scheduled.insert(node.id.as_str());
        }
        batches.push(batch);
    }

    Ok(batches)
}

/// Longest directed path through the DAG, by node count.
///
/// Relaxes distances along outgoing edges in topological order, then
/// reconstructs from the node with maximum distance (first such node in
/// input order on ties). Empty workflows yield an empty path.
pub fn critical_path(dag: &WorkflowDag) -> Result<Vec<String>, TopologyError> {
    if dag.is_empty() {
        return Ok(Vec::new());
    }

    let order = topological_sort(dag)?;
    let mut distance: HashMap<&str, usize> =
        dag.nodes().iter().map(|n| (n.id.as_str(), 0)).collect();
    let mut predecessor: HashMap<&str, &str> = HashMap::new();

    for id in &order {
        let source = dag.node(id).expect("ordered id comes from the node list");
        let base = distance[source.id.as_str()];
        for dependent in dag.dependents(id) {
            if base + 1 > distance[dependent.as_str()] {
                let target = dag
                    .node(dependent)
                    .expect("dependent resolves to a loaded node");
                distance.insert(target.id.as_str(), base + 1);
                predecessor.insert(target.id.as_str(), source.id.as_str());
            }
        }
    }

    let mut end: &str = dag.nodes()[0].id.as_str();
    for node in dag.nodes() {
        if distance[node.id.as_str()] > distance[end] {
            end = node.id.as_str();
        }
    }

    let mut path = vec![end.to_string()];
    let mut current = end;
    while let Some(&prev) = predecessor.get(current) {
        path.push(prev.to_string());
        current = prev;
    }
    path.reverse();
    Ok(path)
}

/// Depth of each node from the roots (BFS from all in-degree-0 nodes).
pub fn node_depths(dag: &WorkflowDag) -> HashMap<String, usize> {
    let mut depths: HashMap<String, usize> = HashMap::new();
    let mut queue: VecDeque<(&str, usize)> = dag
        .nodes()
        .iter()
        .filter(|node| dag.dependencies(&node.id).is_empty())
        .map(|node| (node.id.as_str(), 0))
        .collect();

    while let Some((id, depth)) = queue.pop_front() {
        if depths.contains_key(id) {
            continue;
        }
        depths.insert(id.to_string(), depth);
        for dependent in dag.dependents(id) {
            queue.push_back((dependent.as_str(), depth + 1));
        }
    }

    depths
}

/// Aggregate shape of a workflow graph, for reports and sanity checks.
#[derive(Debug, Clone, Serialize)]
pub struct DagStatistics {
    pub total_nodes: usize,
    pub total_edges: usize,
    /// Distinct non-empty agent names.
    pub num_agents: usize,
    pub node_type_counts: BTreeMap<String, usize>,
    pub edge_type_counts: BTreeMap<String, usize>,
    /// Maximum BFS depth from the roots.
    pub max_depth: usize,
    /// Node count of the critical path.
    pub critical_path_length: usize,
}

/// Computes [`DagStatistics`] for the graph.
pub fn statistics(dag: &WorkflowDag) -> Result<DagStatistics, TopologyError> {
    let mut node_type_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut agents: HashSet<&str> = HashSet::new();
    for node in dag.nodes() {
        *node_type_counts.entry(node.node_type.clone()).or_default() += 1;
        if !node.agent.is_empty() {
            agents.insert(node.agent.as_str());
        }
    }

    let mut edge_type_counts: BTreeMap<String, usize> = BTreeMap::new();
    for edge in dag.edges() {
        *edge_type_counts.entry(edge.edge_type.clone()).or_default() += 1;
    }

    Ok(DagStatistics {
        total_nodes: dag.len(),
        total_edges: dag.edges().len(),
        num_agents: agents.len(),
        node_type_counts,
        edge_type_counts,
        max_depth: node_depths(dag).into_values().max().unwrap_or(0),
        critical_path_length: critical_path(dag)?.len(),
    })
}

/// Renders a text view of the DAG structure: task header, node/edge counts,
/// and the batch-by-batch execution plan.
pub fn render_structure(dag: &WorkflowDag) -> Result<String, TopologyError> {
    let mut lines = Vec::new();
    lines.push(format!(
        "=== DAG Structure: {} ===",
        dag.metadata.task_id_or_unknown()
    ));
    lines.push(format!(
        "Task: {}",
        dag.metadata.task_description.as_deref().unwrap_or("N/A")
    ));
    lines.push(format!("\nTotal Nodes: {}", dag.len()));
    lines.push(format!("Total Edges: {}", dag.edges().len()));
    lines.push("\nExecution Batches:".to_string());

    for (position, batch) in execution_batches(dag)?.iter().enumerate() {
        lines.push(format!(
            "\n  Batch {} ({} nodes - can run in parallel):",
            position + 1,
            batch.len()
        ));
        for id in batch {
            let node = dag.node(id).expect("batched id comes from the node list");
            let agent = if node.agent.is_empty() {
                "N/A"
            } else {
                node.agent.as_str()
            };
            lines.push(format!(
                "    - {}: {} ({}) [Agent: {}]",
                id, node.label, node.node_type, agent
            ));
        }
    }

    Ok(lines.join("\n"))
}
