use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

use eko_studio::agent::{AgentEngine, AgentError};
use eko_studio::config::StudioConfig;
use eko_studio::eventlog::EventLogWriter;
use eko_studio::models::TaskRequest;
use eko_studio::runtime::StudioRuntime;
use eko_studio::server;
use eko_studio::sink::EventSink;

struct ScriptedEngine {
    warmup: Duration,
    events: Vec<Value>,
}

#[async_trait]
impl AgentEngine for ScriptedEngine {
    async fn run(&self, _request: &TaskRequest, sink: &mut dyn EventSink) -> Result<(), AgentError> {
        tokio::time::sleep(self.warmup).await;
        for event in &self.events {
            sink.on_message(event.clone())
                .await
                .map_err(|e| AgentError::Sink(e.to_string()))?;
        }
        Ok(())
    }
}

fn script() -> Vec<Value> {
    vec![
        json!({"type": "start", "task": "news"}),
        json!({"type": "thinking", "text": "step 1\nstep 2"}),
        json!({"type": "tool_use", "name": "web_search", "input": {"q": "rust"}}),
        json!({"type": "finish"}),
    ]
}

async fn serve(log_dir: &Path, warmup: Duration) -> SocketAddr {
    let config = StudioConfig {
        log_dir: log_dir.to_path_buf(),
        ..StudioConfig::default()
    };
    let engine = Arc::new(ScriptedEngine { warmup, events: script() });
    let runtime = Arc::new(StudioRuntime::new(config, engine));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::router(runtime)).await.unwrap();
    });
    addr
}

async fn collect_frames(url: &str) -> Vec<Value> {
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    let mut frames = Vec::new();
    loop {
        let next = tokio::time::timeout(Duration::from_secs(10), socket.next())
            .await
            .expect("stream stalled");
        match next {
            Some(Ok(Message::Text(text))) => frames.push(serde_json::from_str(&text).unwrap()),
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
            Some(Ok(_)) => {}
        }
    }
    frames
}

async fn record(dir: &Path, events: &[Value]) -> String {
    let mut writer = EventLogWriter::open(dir, "scripted", true).await.unwrap();
    for event in events {
        writer.append(event).await.unwrap();
    }
    writer.close().await.unwrap();
    writer.path().unwrap().file_name().unwrap().to_string_lossy().to_string()
}

#[tokio::test]
async fn replay_streams_recorded_log() {
    let dir = tempfile::tempdir().unwrap();
    record(dir.path(), &script()).await;
    let addr = serve(dir.path(), Duration::ZERO).await;

    let frames = collect_frames(&format!("ws://{}/ws/replay?mode=fixed&interval_ms=0", addr)).await;

    assert_eq!(frames.len(), 6, "{:?}", frames);
    assert_eq!(frames[0]["type"], "replay_start");
    assert_eq!(frames[0]["totalEntries"], 4);
    for (i, frame) in frames[1..5].iter().enumerate() {
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["data"], script()[i]);
        assert_eq!(frame["replay"]["index"], i);
        assert_eq!(frame["replay"]["total"], 4);
        assert_eq!(frame["replay"]["sequence"], i + 1);
    }
    assert_eq!(frames[5], json!({"type": "complete"}));
}

#[tokio::test]
async fn replay_reports_empty_log() {
    let dir = tempfile::tempdir().unwrap();
    let name = "eko-log-1700000000000-2023_11_14_22_13_20-empty.log";
    tokio::fs::write(dir.path().join(name), "\n\n").await.unwrap();
    let addr = serve(dir.path(), Duration::ZERO).await;

    let frames = collect_frames(&format!("ws://{}/ws/replay?log_file={}", addr, name)).await;

    assert_eq!(frames.len(), 1, "{:?}", frames);
    assert_eq!(frames[0]["type"], "error");
    assert_eq!(frames[0]["kind"], "EmptyLog");
}

#[tokio::test]
async fn replay_rejects_bad_requests() {
    let dir = tempfile::tempdir().unwrap();
    let addr = serve(&dir.path().join("none-yet"), Duration::ZERO).await;

    let frames = collect_frames(&format!("ws://{}/ws/replay", addr)).await;
    assert_eq!(frames[0]["kind"], "NotFound");

    let frames = collect_frames(&format!("ws://{}/ws/replay?speed=1000", addr)).await;
    assert_eq!(frames[0]["kind"], "InvalidOptions");
}

#[tokio::test]
async fn live_run_and_replay_share_frame_shape() {
    let dir = tempfile::tempdir().unwrap();
    let addr = serve(dir.path(), Duration::from_millis(300)).await;

    let http = reqwest::Client::new();
    let started: Value = http
        .post(format!("http://{}/tasks/start", addr))
        .json(&json!({"prompt": "latest rust news", "model": "scripted"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = started["task_id"].as_str().unwrap().to_string();

    let live = collect_frames(&format!("ws://{}/ws/tasks/{}", addr, task_id)).await;
    assert_eq!(live.first().unwrap()["type"], "task_state");
    assert_eq!(live.last().unwrap()["type"], "task_finished");
    assert_eq!(live.last().unwrap()["status"], "completed");
    let live_data: Vec<Value> = live
        .iter()
        .filter(|f| f["type"] == "message")
        .map(|f| f["data"].clone())
        .collect();
    assert_eq!(live_data, script());

    let listing: Value = http
        .get(format!("http://{}/logs", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing["files"].as_array().unwrap().len(), 1);
    let latest = listing["latest"].as_str().unwrap().to_string();

    let summary: Value = http
        .get(format!("http://{}/logs/{}/summary", addr, latest))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["summary"]["totalEntries"], 4);

    let replayed = collect_frames(&format!(
        "ws://{}/ws/replay?mode=realtime&speed=100&log_file={}",
        addr, latest
    ))
    .await;
    let replay_data: Vec<Value> = replayed
        .iter()
        .filter(|f| f["type"] == "message")
        .map(|f| f["data"].clone())
        .collect();
    assert_eq!(replay_data, live_data);
}
