//! Tool catalog: agent-role tags to function-calling schemas.
//!
//! The catalog is a pure function of the agent name, matched by
//! case-insensitive substring with first-match semantics; roles without an
//! entry get no tools. Schemas follow the OpenAI chat-completion
//! function-calling convention and are opaque to the rest of the core; the
//! scheduler only attaches them to agent-response requests when tool calling
//! is enabled.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// One tool schema: function name, description, and a JSON-Schema parameters
/// object declaring typed properties and the required subset.
///
/// **Interaction**: Returned by [`tools_for_agent`]; the transport wraps each
/// entry in the `{"type": "function", "function": ...}` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    fn new(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            parameters,
        }
    }
}

/// Role rules, first match wins; the default tail is the empty catalog.
const ROLE_RULES: &[(&str, fn() -> Vec<ToolSpec>)] =
    &[("supervisor", supervisor_tools), ("spotify", spotify_tools)];

/// Tool schemas for the given agent name (case-insensitive substring match).
pub fn tools_for_agent(agent_name: &str) -> Vec<ToolSpec> {
    let agent_lower = agent_name.to_lowercase();
    for (needle, tools) in ROLE_RULES {
        if agent_lower.contains(needle) {
            return tools();
        }
    }
    Vec::new()
}

/// Spotify agent surface: library reads and artist follows.
fn spotify_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "show_liked_songs",
            "Get a list of songs you have liked on Spotify",
            json!({
                "type": "object",
                "properties": {
                    "access_token": {
                        "type": "string",
                        "description": "Access token obtained from spotify app login"
                    },
                    "page_index": {
                        "type": "integer",
                        "description": "The index of the page to return",
                        "default": 0
                    },
                    "page_limit": {
                        "type": "integer",
                        "description": "The maximum number of results to return per page",
                        "default": 5
                    }
                },
                "required": ["access_token"]
            }),
        ),
        ToolSpec::new(
            "follow_artist",
            "Follow an artist on Spotify",
            json!({
                "type": "object",
                "properties": {
                    "access_token": {
                        "type": "string",
                        "description": "Access token for Spotify"
                    },
                    "artist_id": {
                        "type": "integer",
                        "description": "ID of the artist to follow"
                    }
                },
                "required": ["access_token", "artist_id"]
            }),
        ),
    ]
}

/// Supervisor agent surface: account introspection and task completion.
fn supervisor_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "show_account_passwords",
            "Show your supervisor's app account passwords",
            json!({
                "type": "object",
                "properties": {}
            }),
        ),
        ToolSpec::new(
            "show_profile",
            "Show your supervisor's profile information",
            json!({
                "type": "object",
                "properties": {}
            }),
        ),
        ToolSpec::new(
            "complete_task",
            "Mark the currently active task as complete",
            json!({
                "type": "object",
                "properties": {
                    "status": {
                        "type": "string",
                        "enum": ["success", "fail"],
                        "description": "Status of task completion"
                    }
                },
                "required": ["status"]
            }),
        ),
    ]
}
