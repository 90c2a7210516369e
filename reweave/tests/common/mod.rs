//! Shared builders for scheduler integration tests: small workflow documents
//! assembled as JSON, the way they arrive from the trace-ingestion side.
#![allow(dead_code)] // each test binary uses its own subset of these builders

use std::sync::Arc;

use reweave::WorkflowDag;

/// Builds a DAG from `(id, type, agent)` nodes and `(source, target)` edges.
pub fn build_dag(nodes: &[(&str, &str, &str)], edges: &[(&str, &str)]) -> Arc<WorkflowDag> {
    let nodes: Vec<_> = nodes
        .iter()
        .map(|(id, node_type, agent)| {
            serde_json::json!({
                "id": id,
                "label": format!("label-{id}"),
                "type": node_type,
                "agent": agent,
                "content": format!("recorded content of {id}"),
                "line_number": 1,
            })
        })
        .collect();
    let edges: Vec<_> = edges
        .iter()
        .map(|(source, target)| {
            serde_json::json!({"source": source, "target": target, "edge_type": "sequential"})
        })
        .collect();
    let json = serde_json::json!({
        "metadata": {"task_id": "task-1", "task_description": "replay the recorded task"},
        "nodes": nodes,
        "edges": edges,
    });
    Arc::new(WorkflowDag::from_json_str(&json.to_string()).expect("valid test workflow"))
}

/// Diamond: a -> {b, c} -> d, all agent responses.
pub fn diamond() -> Arc<WorkflowDag> {
    build_dag(
        &[
            ("a", "agent_response", "Supervisor"),
            ("b", "agent_response", "Spotify"),
            ("c", "agent_response", "Spotify"),
            ("d", "agent_response", "Supervisor"),
        ],
        &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
    )
}

/// Linear chain of `n` agent-response nodes n0 -> n1 -> ... .
pub fn chain(n: usize) -> Arc<WorkflowDag> {
    let ids: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();
    let nodes: Vec<(&str, &str, &str)> = ids
        .iter()
        .map(|id| (id.as_str(), "agent_response", "Supervisor"))
        .collect();
    let edges: Vec<(&str, &str)> = ids
        .windows(2)
        .map(|pair| (pair[0].as_str(), pair[1].as_str()))
        .collect();
    build_dag(&nodes, &edges)
}
