// [[EKO]]/apps/studio-server/src/runtime.rs
// Purpose: Starts agent tasks, records their event streams and publishes them on the bus.
// Architecture: Domain Logic Layer
// Dependencies: dashmap, tokio, futures

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::agent::{AgentEngine, AgentError};
use crate::config::StudioConfig;
use crate::eventlog::EventLogWriter;
use crate::events::{EventType, TaskEvent};
use crate::models::*;
use crate::sink::{BusSink, RecordingSink};

pub struct StudioRuntime {
    tasks: DashMap<String, TaskState>,
    engine: Arc<dyn AgentEngine>,
    pub config: Arc<StudioConfig>,
    pub event_bus: broadcast::Sender<TaskEvent>,
}

impl StudioRuntime {
    pub fn new(config: StudioConfig, engine: Arc<dyn AgentEngine>) -> Self {
        let (tx, _) = broadcast::channel(256);

        StudioRuntime {
            tasks: DashMap::new(),
            engine,
            config: Arc::new(config),
            event_bus: tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.event_bus.subscribe()
    }

    fn emit_event(&self, event: TaskEvent) {
        let _ = self.event_bus.send(event);
    }

    /// Registers the task and spawns its run. Returns the task id immediately.
    pub fn start_task(self: &Arc<Self>, request: TaskRequest) -> Result<String, AgentError> {
        if request.prompt.trim().is_empty() {
            return Err(AgentError::InvalidRequest("prompt is empty".to_string()));
        }

        let task_id = Uuid::new_v4().to_string();
        self.tasks.insert(
            task_id.clone(),
            TaskState {
                task_id: task_id.clone(),
                label: request.source_label().to_string(),
                status: TaskStatus::Running,
                started_at: Utc::now().to_rfc3339(),
                finished_at: None,
                event_count: 0,
                log_file: None,
                recording_error: None,
                error: None,
            },
        );

        let runtime = self.clone();
        let id = task_id.clone();
        tokio::spawn(async move {
            runtime.execute_task(id, request).await;
        });

        Ok(task_id)
    }

    async fn execute_task(&self, task_id: String, request: TaskRequest) {
        tracing::info!("Starting task {} ({})", task_id, request.source_label());

        let (writer, recording_error) = match EventLogWriter::open(
            &self.config.log_dir,
            request.source_label(),
            self.config.record_enabled,
        )
        .await
        {
            Ok(writer) => (writer, None),
            Err(e) => {
                tracing::error!("Recording unavailable for task {}: {}", task_id, e);
                (EventLogWriter::default(), Some(format!("{}: {}", e.kind(), e)))
            }
        };

        let log_file = writer
            .path()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string());
        if let Some(mut state) = self.tasks.get_mut(&task_id) {
            state.log_file = log_file.clone();
            state.recording_error = recording_error.clone();
        }

        self.emit_event(TaskEvent::new(
            &task_id,
            EventType::TaskStarted,
            serde_json::json!({
                "label": request.source_label(),
                "log_file": log_file,
                "recording_error": recording_error,
            }),
        ));

        let mut sink = RecordingSink::new(writer, BusSink::new(&task_id, self.event_bus.clone()));
        let run_result = match AssertUnwindSafe(self.engine.run(&request, &mut sink))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => Err(AgentError::Aborted("agent engine panicked".to_string())),
        };

        // The log is closed on every exit path before the run is reported.
        let (mut writer, bus_sink) = sink.into_parts();
        let close_result = writer.close().await;

        let error = match (run_result, close_result) {
            (Ok(()), Ok(())) => None,
            (Err(e), _) => Some(e.to_string()),
            (Ok(()), Err(e)) => Some(e.to_string()),
        };

        self.finish_task(&task_id, bus_sink.delivered(), error);
    }

    fn finish_task(&self, task_id: &str, event_count: u64, error: Option<String>) {
        if let Some(mut state) = self.tasks.get_mut(task_id) {
            state.status = if error.is_some() {
                TaskStatus::Failed
            } else {
                TaskStatus::Completed
            };
            state.finished_at = Some(Utc::now().to_rfc3339());
            state.event_count = event_count;
            state.error = error.clone();
        }
        self.prune_finished();

        match error {
            None => {
                tracing::info!("Task {} completed ({} events)", task_id, event_count);
                self.emit_event(TaskEvent::new(
                    task_id,
                    EventType::TaskCompleted,
                    serde_json::json!({"event_count": event_count}),
                ));
            }
            Some(error) => {
                tracing::error!("Task {} failed: {}", task_id, error);
                self.emit_event(TaskEvent::new(
                    task_id,
                    EventType::TaskFailed,
                    serde_json::json!({"event_count": event_count, "error": error}),
                ));
            }
        }
    }

    /// Drops the oldest finished tasks beyond the configured retention.
    fn prune_finished(&self) {
        let mut finished: Vec<(DateTime<FixedOffset>, String)> = self
            .tasks
            .iter()
            .filter_map(|t| {
                let at = DateTime::parse_from_rfc3339(t.finished_at.as_deref()?).ok()?;
                Some((at, t.task_id.clone()))
            })
            .collect();
        if finished.len() <= self.config.task_retention {
            return;
        }

        finished.sort();
        let excess = finished.len() - self.config.task_retention;
        for (_, task_id) in finished.into_iter().take(excess) {
            self.tasks.remove(&task_id);
        }
        tracing::debug!("Pruned {} finished tasks", excess);
    }

    pub fn get_task(&self, task_id: &str) -> Option<TaskState> {
        self.tasks.get(task_id).map(|t| (*t).clone())
    }
}
