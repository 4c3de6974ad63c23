//! Stream event contract.
//!
//! One invocation yields exactly one `Routing` event first and exactly one
//! terminal event (`Complete` or `Error`) last. `Tool` and `Metadata`
//! events only occur on the incident route.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::route::Route;

/// Status of a collaborator call or pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Running,
    Completed,
    Failed,
}

/// Events delivered to a stream subscriber, in production order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Routing {
        routed_to: Route,
        orchestrator: String,
        timestamp: DateTime<Utc>,
    },
    Token {
        content: String,
    },
    Tool {
        tool_name: String,
        status: ToolStatus,
    },
    Metadata {
        tools_used: Vec<String>,
        confidence: f64,
        incident_id: String,
        requires_approval: bool,
    },
    Complete {
        stop_reason: String,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn routing(route: Route) -> Self {
        StreamEvent::Routing {
            routed_to: route,
            orchestrator: "main".to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn token(content: impl Into<String>) -> Self {
        StreamEvent::Token { content: content.into() }
    }

    pub fn tool(tool_name: impl Into<String>, status: ToolStatus) -> Self {
        StreamEvent::Tool {
            tool_name: tool_name.into(),
            status,
        }
    }

    pub fn complete(stop_reason: impl Into<String>) -> Self {
        StreamEvent::Complete {
            stop_reason: stop_reason.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error { message: message.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Routing { .. } => "routing",
            StreamEvent::Token { .. } => "token",
            StreamEvent::Tool { .. } => "tool",
            StreamEvent::Metadata { .. } => "metadata",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }
}

/// Concatenate the token payloads of an event sequence.
pub fn collect_text(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Token { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

/// Check a complete event sequence against the ordering contract.
pub fn check_sequence(events: &[StreamEvent]) -> Result<(), String> {
    match events.first() {
        Some(StreamEvent::Routing { .. }) => {}
        Some(other) => return Err(format!("first event is {}, expected routing", other.kind())),
        None => return Err("empty event sequence".to_string()),
    }

    let routing = events.iter().filter(|e| matches!(e, StreamEvent::Routing { .. })).count();
    if routing != 1 {
        return Err(format!("expected one routing event, found {}", routing));
    }

    let terminals: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_terminal())
        .map(|(i, _)| i)
        .collect();
    match terminals.as_slice() {
        [index] if *index == events.len() - 1 => {}
        [index] => return Err(format!("events follow terminal at position {}", index)),
        [] => return Err("no terminal event".to_string()),
        many => return Err(format!("expected one terminal event, found {}", many.len())),
    }

    let metadata = events.iter().filter(|e| matches!(e, StreamEvent::Metadata { .. })).count();
    if metadata > 1 {
        return Err(format!("expected at most one metadata event, found {}", metadata));
    }
    Ok(())
}
