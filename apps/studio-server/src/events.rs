// [[EKO]]/apps/studio-server/src/events.rs
// Purpose: Events published on the task bus while an agent runs.
// Architecture: Domain Event Layer
// Dependencies: Serde, Chrono, Uuid

use serde::{Deserialize, Serialize};
use serde_json::Value;
use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventType {
    /// The task was accepted and the agent engine is being contacted
    TaskStarted,
    /// One event streamed by the agent engine (thinking, tool call, result...)
    AgentMessage,
    /// The agent stream ended normally
    TaskCompleted,
    /// The agent stream or the recorder failed
    TaskFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: String,
    pub task_id: String,
    pub event_type: EventType,
    pub timestamp: String,
    pub payload: Value,
}

impl TaskEvent {
    pub fn new(task_id: &str, event_type: EventType, payload: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            event_type,
            timestamp: Utc::now().to_rfc3339(),
            payload,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.event_type, EventType::TaskCompleted | EventType::TaskFailed)
    }
}
