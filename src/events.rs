//! `ExecutionUpdateEvent`: the server-to-client stream contract for
//! `onExecutionUpdate` (C9, §6).
//!
//! Grounded on `api/ws/events.rs::RealtimeEvent` — a tagged enum with
//! `event_type()`/`priority()`/id-extractor helper methods. The same shape
//! is used here, trimmed to five variants and without the websocket-specific
//! priority concept (there's no ordering requirement beyond "the terminal
//! event is emitted last").

use crate::model::NodeState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ExecutionUpdateEvent {
    NodeStarted {
        execution_id: String,
        node_id: String,
        timestamp: i64,
    },
    NodeCompleted {
        execution_id: String,
        node_id: String,
        node_state: NodeState,
        timestamp: i64,
    },
    NodeFailed {
        execution_id: String,
        node_id: String,
        node_state: NodeState,
        timestamp: i64,
    },
    ExecutionCompleted {
        execution_id: String,
        timestamp: i64,
    },
    ExecutionFailed {
        execution_id: String,
        message: String,
        timestamp: i64,
    },
}

impl ExecutionUpdateEvent {
    pub fn execution_id(&self) -> &str {
        match self {
            ExecutionUpdateEvent::NodeStarted { execution_id, .. }
            | ExecutionUpdateEvent::NodeCompleted { execution_id, .. }
            | ExecutionUpdateEvent::NodeFailed { execution_id, .. }
            | ExecutionUpdateEvent::ExecutionCompleted { execution_id, .. }
            | ExecutionUpdateEvent::ExecutionFailed { execution_id, .. } => execution_id,
        }
    }

    /// Whether this is one of the two run-terminal variants, after which
    /// no further events for this `execution_id` are emitted (§4.6).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionUpdateEvent::ExecutionCompleted { .. }
                | ExecutionUpdateEvent::ExecutionFailed { .. }
        )
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ExecutionUpdateEvent::NodeStarted { .. } => "nodeStarted",
            ExecutionUpdateEvent::NodeCompleted { .. } => "nodeCompleted",
            ExecutionUpdateEvent::NodeFailed { .. } => "nodeFailed",
            ExecutionUpdateEvent::ExecutionCompleted { .. } => "executionCompleted",
            ExecutionUpdateEvent::ExecutionFailed { .. } => "executionFailed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_events_are_identified() {
        let completed = ExecutionUpdateEvent::ExecutionCompleted {
            execution_id: "e1".into(),
            timestamp: 0,
        };
        let started = ExecutionUpdateEvent::NodeStarted {
            execution_id: "e1".into(),
            node_id: "n1".into(),
            timestamp: 0,
        };
        assert!(completed.is_terminal());
        assert!(!started.is_terminal());
    }

    #[test]
    fn serializes_with_tagged_envelope() {
        let event = ExecutionUpdateEvent::NodeStarted {
            execution_id: "e1".into(),
            node_id: "n1".into(),
            timestamp: 42,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "nodeStarted");
        assert_eq!(json["data"]["nodeId"], "n1");
    }
}
