// [[EKO]]/apps/studio-server/src/agent.rs
// Purpose: Bridge to the external agent engine that produces live events.
// Architecture: Integration Layer
// Dependencies: reqwest, futures, async-trait

use async_trait::async_trait;
use futures::stream::StreamExt;
use serde_json::Value;
use thiserror::Error;

use crate::models::TaskRequest;
use crate::sink::EventSink;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("invalid task request: {0}")]
    InvalidRequest(String),
    #[error("agent engine unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("agent engine returned status {0}")]
    Status(u16),
    #[error("event consumer failed: {0}")]
    Sink(String),
    #[error("agent engine aborted: {0}")]
    Aborted(String),
}

/// Runs one task and streams every event it produces into `sink`, in order.
#[async_trait]
pub trait AgentEngine: Send + Sync {
    async fn run(&self, request: &TaskRequest, sink: &mut dyn EventSink) -> Result<(), AgentError>;
}

/// Talks to the agent service over HTTP. The service answers `POST /run` with
/// newline delimited JSON, one event per line.
pub struct HttpAgentEngine {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpAgentEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AgentEngine for HttpAgentEngine {
    async fn run(&self, request: &TaskRequest, sink: &mut dyn EventSink) -> Result<(), AgentError> {
        let url = format!("{}/run", self.base_url.trim_end_matches('/'));
        tracing::debug!("Sending task request to: {}", url);

        let response = self.http_client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(AgentError::Status(response.status().as_u16()));
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
            for line in drain_lines(&mut buffer) {
                forward_line(&line, sink).await?;
            }
        }

        if !buffer.is_empty() {
            forward_line(&buffer, sink).await?;
        }
        Ok(())
    }
}

/// Removes every complete line from `buffer`, leaving a trailing partial line.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let mut line: Vec<u8> = buffer.drain(..=pos).collect();
        line.pop();
        lines.push(line);
    }
    lines
}

async fn forward_line(line: &[u8], sink: &mut dyn EventSink) -> Result<(), AgentError> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }

    match serde_json::from_str::<Value>(text) {
        Ok(event) => sink
            .on_message(event)
            .await
            .map_err(|e| AgentError::Sink(format!("{:#}", e))),
        Err(e) => {
            tracing::warn!("Dropping undecodable agent event: {} ({})", text, e);
            Ok(())
        }
    }
}
