// [[EKO]]/apps/studio-server/src/sink.rs
// Purpose: Consumers of live agent events, including the recording tap.
// Architecture: Domain Logic Layer
// Dependencies: async-trait, tokio broadcast

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::eventlog::EventLogWriter;
use crate::events::{EventType, TaskEvent};

/// Single-method capability every live event consumer implements.
#[async_trait]
pub trait EventSink: Send {
    async fn on_message(&mut self, message: Value) -> anyhow::Result<()>;
}

/// Publishes agent events for one task on the shared bus.
pub struct BusSink {
    task_id: String,
    bus: broadcast::Sender<TaskEvent>,
    delivered: u64,
}

impl BusSink {
    pub fn new(task_id: &str, bus: broadcast::Sender<TaskEvent>) -> Self {
        Self {
            task_id: task_id.to_string(),
            bus,
            delivered: 0,
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

#[async_trait]
impl EventSink for BusSink {
    async fn on_message(&mut self, message: Value) -> anyhow::Result<()> {
        // No subscriber is not an error; the run keeps going unobserved.
        let _ = self
            .bus
            .send(TaskEvent::new(&self.task_id, EventType::AgentMessage, message));
        self.delivered += 1;
        Ok(())
    }
}

/// Records every event before handing it, unchanged, to the wrapped sink.
pub struct RecordingSink<S> {
    writer: EventLogWriter,
    inner: S,
}

impl<S: EventSink> RecordingSink<S> {
    pub fn new(writer: EventLogWriter, inner: S) -> Self {
        Self { writer, inner }
    }

    pub fn writer(&self) -> &EventLogWriter {
        &self.writer
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_parts(self) -> (EventLogWriter, S) {
        (self.writer, self.inner)
    }
}

#[async_trait]
impl<S: EventSink> EventSink for RecordingSink<S> {
    async fn on_message(&mut self, message: Value) -> anyhow::Result<()> {
        self.writer.append(&message).await?;
        self.inner.on_message(message).await
    }
}
