//! Prompt composition for agent-response nodes.
//!
//! A prompt is four blocks joined by blank lines: role/system text selected
//! from the agent name, bounded excerpts of already-completed predecessor
//! results, the task instruction (agent responses only), and a reference
//! excerpt of the originally recorded content. The bounds keep prompt size
//! O(1) per node regardless of history length, and the reference block lets
//! the model anchor on the trace without copying it outright.
//!
//! **Interaction**: Called by the scheduler with the result map as of the
//! start of the node's batch; predecessors that failed or never produced a
//! result are dropped from the context block silently.

use std::collections::HashMap;

use crate::dag::{WorkflowDag, WorkflowNode};
use crate::scheduler::NodeExecutionResult;

/// How many trailing predecessors (in adjacency order) feed the context block.
/// Part of the observable contract: it bounds what a replay can depend on.
pub const MAX_CONTEXT_PREDECESSORS: usize = 3;

/// Per-predecessor excerpt width, in characters.
pub const CONTEXT_EXCERPT_CHARS: usize = 200;

/// Reference-block excerpt width, in characters.
pub const REFERENCE_EXCERPT_CHARS: usize = 300;

const SUPERVISOR_PROMPT: &str = "You are a Supervisor Agent in a multi-agent system. Your role is to:
- Coordinate tasks between different app-specific agents
- Manage workflow and delegate subtasks
- Retrieve necessary information from system APIs
- Make decisions about next steps
You have access to supervisor APIs and can send messages to other agents.";

const SPOTIFY_PROMPT: &str = "You are a Spotify Agent. Your role is to:
- Handle Spotify-related tasks and API calls
- Retrieve liked songs, playlists, and artist information
- Follow/unfollow artists
- Manage Spotify authentication
You have access to Spotify APIs.";

/// Role rules, first match wins (case-insensitive substring); the tail is the
/// generic role text.
const ROLE_RULES: &[(&str, &str)] = &[
    ("supervisor", SUPERVISOR_PROMPT),
    ("spotify", SPOTIFY_PROMPT),
];

/// Selects the role/system block for an agent name.
pub fn system_prompt_for_agent(agent_name: &str) -> String {
    let agent_lower = agent_name.to_lowercase();
    for (needle, text) in ROLE_RULES {
        if agent_lower.contains(needle) {
            return (*text).to_string();
        }
    }
    format!(
        "You are an agent in a multi-agent system. Your role: {agent_name}.\n\
         Assist with your specific responsibilities and communicate with other agents as needed."
    )
}

/// First `max` characters of `text` (char boundaries, UTF-8 safe).
fn excerpt(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Composes the prompt for `node` against the current result map.
pub fn compose_prompt(
    dag: &WorkflowDag,
    node: &WorkflowNode,
    results: &HashMap<String, NodeExecutionResult>,
) -> String {
    let mut parts = vec![system_prompt_for_agent(&node.agent)];

    let dependencies = dag.dependencies(&node.id);
    if !dependencies.is_empty() {
        let mut context_lines = vec!["=== Previous Context ===".to_string()];
        let window_start = dependencies.len().saturating_sub(MAX_CONTEXT_PREDECESSORS);
        for dependency in &dependencies[window_start..] {
            // Failed predecessors contribute nothing; drop them silently.
            if let Some(result) = results.get(dependency).filter(|r| r.error.is_none()) {
                context_lines.push(format!(
                    "[{}]: {}",
                    result.agent_name,
                    excerpt(&result.generated_content, CONTEXT_EXCERPT_CHARS)
                ));
            }
        }
        parts.push(context_lines.join("\n"));
    }

    if node.is_agent_response {
        parts.push(format!(
            "\n=== Current Task ===\n{}",
            dag.metadata.task_description_or_empty()
        ));
        parts.push("\n=== Your Response ===".to_string());
        parts.push("Generate the next action or response as the agent.".to_string());
    }

    parts.push(format!(
        "\n=== Reference (Original Trace) ===\n{}...",
        excerpt(&node.content, REFERENCE_EXCERPT_CHARS)
    ));

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::WorkflowDag;

    fn dag_with(content: &str, dependencies: usize) -> WorkflowDag {
        // Node "target" with `dependencies` predecessors p0..pN in edge order.
        let mut nodes = vec![serde_json::json!({
            "id": "target",
            "label": "target",
            "type": "agent_response",
            "agent": "Spotify",
            "content": content,
            "line_number": 1,
        })];
        let mut edges = Vec::new();
        for i in 0..dependencies {
            let id = format!("p{i}");
            nodes.push(serde_json::json!({
                "id": id,
                "label": id,
                "type": "agent_response",
                "agent": format!("Agent{i}"),
                "content": "",
                "line_number": 1,
            }));
            edges.push(serde_json::json!({
                "source": format!("p{i}"),
                "target": "target",
                "edge_type": "sequential",
            }));
        }
        let json = serde_json::json!({
            "metadata": {"task_id": "t", "task_description": "find liked songs"},
            "nodes": nodes,
            "edges": edges,
        });
        WorkflowDag::from_json_str(&json.to_string()).unwrap()
    }

    fn done(id: &str, agent: &str, content: &str) -> NodeExecutionResult {
        NodeExecutionResult {
            node_id: id.to_string(),
            node_type: "agent_response".to_string(),
            agent_name: agent.to_string(),
            start_time: 0.0,
            end_time: 0.0,
            latency_ms: 0.0,
            original_content: String::new(),
            generated_content: content.to_string(),
            tokens_used: 0,
            tool_calls: None,
            error: None,
            dependencies_met: true,
        }
    }

    #[test]
    fn role_block_matches_by_substring() {
        assert!(system_prompt_for_agent("Supervisor").contains("Supervisor Agent"));
        assert!(system_prompt_for_agent("the_supervisor_2").contains("Supervisor Agent"));
        assert!(system_prompt_for_agent("SPOTIFY").contains("Spotify Agent"));
        let generic = system_prompt_for_agent("FileSystem");
        assert!(generic.contains("Your role: FileSystem"));
    }

    #[test]
    fn prompt_contains_task_and_reference_blocks_for_agent_response() {
        let dag = dag_with("recorded reply text", 0);
        let node = dag.node("target").unwrap();
        let prompt = compose_prompt(&dag, node, &HashMap::new());
        assert!(prompt.contains("You are a Spotify Agent"));
        assert!(prompt.contains("=== Current Task ===\nfind liked songs"));
        assert!(prompt.contains("=== Your Response ==="));
        assert!(prompt.contains("=== Reference (Original Trace) ===\nrecorded reply text..."));
        assert!(!prompt.contains("=== Previous Context ==="));
    }

    #[test]
    fn context_block_keeps_only_the_last_three_predecessors() {
        let dag = dag_with("x", 5);
        let node = dag.node("target").unwrap();
        let mut results = HashMap::new();
        for i in 0..5 {
            results.insert(
                format!("p{i}"),
                done(&format!("p{i}"), &format!("Agent{i}"), &format!("out{i}")),
            );
        }
        let prompt = compose_prompt(&dag, node, &results);
        assert!(!prompt.contains("[Agent0]"));
        assert!(!prompt.contains("[Agent1]"));
        assert!(prompt.contains("[Agent2]: out2"));
        assert!(prompt.contains("[Agent3]: out3"));
        assert!(prompt.contains("[Agent4]: out4"));
    }

    #[test]
    fn missing_predecessor_results_are_skipped_silently() {
        let dag = dag_with("x", 2);
        let node = dag.node("target").unwrap();
        let mut results = HashMap::new();
        results.insert("p1".to_string(), done("p1", "Agent1", "survivor"));
        let prompt = compose_prompt(&dag, node, &results);
        assert!(prompt.contains("=== Previous Context ==="));
        assert!(prompt.contains("[Agent1]: survivor"));
        assert!(!prompt.contains("[Agent0]"));
    }

    #[test]
    fn failed_predecessors_are_dropped_from_the_context_block() {
        let dag = dag_with("x", 2);
        let node = dag.node("target").unwrap();
        let mut results = HashMap::new();
        let mut failed = done("p0", "Agent0", "ERROR: injected transport failure");
        failed.error = Some("ERROR: injected transport failure".to_string());
        results.insert("p0".to_string(), failed);
        results.insert("p1".to_string(), done("p1", "Agent1", "survivor"));
        let prompt = compose_prompt(&dag, node, &results);
        assert!(prompt.contains("[Agent1]: survivor"));
        assert!(!prompt.contains("[Agent0]"));
        assert!(!prompt.contains("ERROR: injected"));
    }

    #[test]
    fn header_is_emitted_whenever_the_node_has_predecessors() {
        let dag = dag_with("x", 2);
        let node = dag.node("target").unwrap();
        let prompt = compose_prompt(&dag, node, &HashMap::new());
        assert!(prompt.contains("=== Previous Context ==="));

        let root_dag = dag_with("x", 0);
        let root = root_dag.node("target").unwrap();
        let root_prompt = compose_prompt(&root_dag, root, &HashMap::new());
        assert!(!root_prompt.contains("=== Previous Context ==="));
    }

    #[test]
    fn excerpts_are_bounded_and_utf8_safe() {
        let long = "é".repeat(500);
        let dag = dag_with(&long, 1);
        let node = dag.node("target").unwrap();
        let mut results = HashMap::new();
        results.insert("p0".to_string(), done("p0", "Agent0", &long));
        let prompt = compose_prompt(&dag, node, &results);

        let context_line = prompt
            .lines()
            .find(|line| line.starts_with("[Agent0]: "))
            .expect("context line present");
        let excerpt_len = context_line.chars().count() - "[Agent0]: ".chars().count();
        assert_eq!(excerpt_len, CONTEXT_EXCERPT_CHARS);

        let reference = prompt
            .split("=== Reference (Original Trace) ===\n")
            .nth(1)
            .expect("reference block present");
        assert_eq!(
            reference.trim_end_matches("...").chars().count(),
            REFERENCE_EXCERPT_CHARS
        );
    }
}
