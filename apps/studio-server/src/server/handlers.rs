// [[EKO]]/apps/studio-server/src/server/handlers.rs
// Purpose: API handlers for live tasks, log discovery and replay push streams.
// Architecture: API Layer
// Dependencies: Axum, Runtime, Replay

use axum::{
    extract::{Path, State, Json, Query, ws::{WebSocket, WebSocketUpgrade}},
    http::StatusCode,
    response::IntoResponse,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use futures::{sink::SinkExt, stream::{SplitSink, StreamExt}};
use axum::extract::ws::Message;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::error::EventLogError;
use crate::eventlog::{locator, reader};
use crate::events::EventType;
use crate::models::*;
use crate::replay::{self, ReplayMetadata, ReplayMode, ReplayOptions, ReplaySink, ReplayStart};
use crate::runtime::StudioRuntime;

#[derive(serde::Serialize)]
pub struct HealthResponse {
    status: String,
    message: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "EKO Studio kernel is running".to_string(),
    })
}

pub async fn start_task(
    State(runtime): State<Arc<StudioRuntime>>,
    Json(request): Json<TaskRequest>,
) -> Result<Json<Value>, StatusCode> {
    match runtime.start_task(request) {
        Ok(task_id) => Ok(Json(json!({
            "success": true,
            "task_id": task_id
        }))),
        Err(e) => {
            tracing::error!("Failed to start task: {}", e);
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

pub async fn get_task(
    State(runtime): State<Arc<StudioRuntime>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskState>, StatusCode> {
    runtime
        .get_task(&task_id)
        .ok_or(StatusCode::NOT_FOUND)
        .map(Json)
}

pub async fn list_logs(
    State(runtime): State<Arc<StudioRuntime>>,
) -> Result<Json<LogListing>, StatusCode> {
    let directory = &runtime.config.log_dir;
    let files = locator::list(directory).map_err(|e| {
        tracing::error!("Failed to list {}: {}", directory.display(), e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(LogListing {
        directory: directory.display().to_string(),
        latest: files.first().cloned(),
        files,
    }))
}

pub async fn get_log_summary(
    State(runtime): State<Arc<StudioRuntime>>,
    Path(file): Path<String>,
) -> Result<Json<LogFileSummary>, StatusCode> {
    let path = locator::resolve(&runtime.config.log_dir, &file).map_err(status_for)?;
    let summary = reader::summary(&path).await.map_err(status_for)?;

    Ok(Json(LogFileSummary { file, summary }))
}

fn status_for(error: EventLogError) -> StatusCode {
    match error {
        EventLogError::NotFound(_) => StatusCode::NOT_FOUND,
        EventLogError::InvalidOptions(_) => StatusCode::BAD_REQUEST,
        e => {
            tracing::error!("Log lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn text_frame(value: Value) -> Message {
    Message::Text(value.to_string())
}

fn error_frame(error: &EventLogError) -> Message {
    text_frame(json!({
        "type": "error",
        "kind": error.kind(),
        "detail": error.to_string(),
    }))
}

// === LIVE STREAM ===

pub async fn ws_task_stream(
    State(runtime): State<Arc<StudioRuntime>>,
    Path(task_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_task_stream(socket, runtime, task_id))
}

async fn handle_task_stream(
    socket: WebSocket,
    runtime: Arc<StudioRuntime>,
    task_id: String,
) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading state so a terminal event cannot slip between.
    let mut events = runtime.subscribe();

    let Some(state) = runtime.get_task(&task_id) else {
        let _ = sender
            .send(text_frame(json!({"type": "error", "kind": "NotFound", "detail": "Task not found"})))
            .await;
        return;
    };

    let _ = sender
        .send(text_frame(json!({"type": "task_state", "state": state})))
        .await;

    if state.status != TaskStatus::Running {
        let _ = sender
            .send(text_frame(json!({
                "type": "task_finished",
                "status": state.status,
                "error": state.error,
            })))
            .await;
        let _ = sender.close().await;
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        tracing::info!("Client disconnected from task stream: {}", task_id);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }

            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("Task stream {} lagged, {} events dropped", task_id, missed);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if event.task_id != task_id {
                    continue;
                }

                match event.event_type {
                    EventType::TaskStarted => {}
                    EventType::AgentMessage => {
                        let frame = text_frame(json!({"type": "message", "data": event.payload}));
                        if sender.send(frame).await.is_err() {
                            tracing::info!("Failed to send task event, client disconnected");
                            break;
                        }
                    }
                    EventType::TaskCompleted | EventType::TaskFailed => {
                        let status = runtime.get_task(&task_id).map(|s| s.status);
                        let _ = sender
                            .send(text_frame(json!({
                                "type": "task_finished",
                                "status": status,
                                "error": event.payload.get("error"),
                            })))
                            .await;
                        tracing::info!("Task {} finished. Closing stream.", task_id);
                        let _ = sender.close().await;
                        break;
                    }
                }
            }
        }
    }
}

// === REPLAY STREAM ===

/// Narrates a replay onto the socket with the same frame shapes as a live run.
struct WsReplaySink {
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl ReplaySink for WsReplaySink {
    async fn on_start(&mut self, start: &ReplayStart) -> anyhow::Result<()> {
        self.sender
            .send(text_frame(json!({
                "type": "replay_start",
                "totalEntries": start.total_entries,
                "durationMs": start.duration_ms,
            })))
            .await?;
        Ok(())
    }

    async fn on_message(&mut self, payload: &Value, metadata: ReplayMetadata) -> anyhow::Result<()> {
        self.sender
            .send(text_frame(json!({
                "type": "message",
                "data": payload,
                "replay": metadata,
            })))
            .await?;
        Ok(())
    }

    async fn on_complete(&mut self) -> anyhow::Result<()> {
        self.sender.send(text_frame(json!({"type": "complete"}))).await?;
        Ok(())
    }

    async fn on_error(&mut self, error: EventLogError) -> Result<(), EventLogError> {
        // The peer may already be gone; nothing else to report to.
        let _ = self.sender.send(error_frame(&error)).await;
        Ok(())
    }
}

fn replay_options(runtime: &StudioRuntime, query: &ReplayQuery) -> Result<ReplayOptions, EventLogError> {
    let mode = query
        .mode
        .as_deref()
        .map(str::parse::<ReplayMode>)
        .transpose()?;
    let options = runtime
        .config
        .replay_options(mode, query.speed, query.interval_ms);
    options.validate(&runtime.config.replay_bounds())?;
    Ok(options)
}

pub async fn ws_replay_stream(
    State(runtime): State<Arc<StudioRuntime>>,
    Query(query): Query<ReplayQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_replay_stream(socket, runtime, query))
}

async fn handle_replay_stream(
    socket: WebSocket,
    runtime: Arc<StudioRuntime>,
    query: ReplayQuery,
) {
    let (sender, mut receiver) = socket.split();
    let mut sink = WsReplaySink { sender };

    let prepared = replay_options(&runtime, &query).and_then(|options| {
        locator::select(&runtime.config.log_dir, query.log_file.as_deref()).map(|path| (options, path))
    });
    let (options, path) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::warn!("Rejected replay request: {}", e);
            let _ = sink.on_error(e).await;
            let _ = sink.sender.close().await;
            return;
        }
    };

    // A closed socket stops the replay at the next wait.
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while let Some(msg) = receiver.next().await {
                if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
                    break;
                }
            }
            cancel.cancel();
        })
    };

    match replay::narrate(&path, options, &mut sink, cancel).await {
        Ok(outcome) => tracing::info!("Replay stream for {} ended: {:?}", path.display(), outcome),
        Err(e) => tracing::error!("Replay stream for {} failed: {}", path.display(), e),
    }

    watcher.abort();
    let _ = sink.sender.close().await;
}
