// [[EKO]]/apps/studio-server/src/models.rs
// Purpose: Request, state and query shapes exchanged over HTTP.
// Architecture: API Model Layer
// Dependencies: Serde

use serde::{Deserialize, Serialize};

use crate::eventlog::LogSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub prompt: String,
    /// Model or source identifier; also labels the recorded log file.
    #[serde(default)]
    pub model: Option<String>,
    /// Passed through to the agent engine untouched.
    #[serde(default)]
    pub options: serde_json::Value,
}

impl TaskRequest {
    pub fn source_label(&self) -> &str {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("agent")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: String,
    pub label: String,
    pub status: TaskStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub event_count: u64,
    pub log_file: Option<String>,
    /// Set when the run could not be recorded; the live stream still runs.
    pub recording_error: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayQuery {
    pub mode: Option<String>,
    pub speed: Option<f64>,
    pub interval_ms: Option<u64>,
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogListing {
    pub directory: String,
    pub files: Vec<String>,
    pub latest: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogFileSummary {
    pub file: String,
    pub summary: Option<LogSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_label() {
        let mut request: TaskRequest = serde_json::from_str(r#"{"prompt": "hi"}"#).unwrap();
        assert_eq!(request.source_label(), "agent");
        assert!(request.options.is_null());

        request.model = Some("  ".to_string());
        assert_eq!(request.source_label(), "agent");

        request.model = Some("deepseek-chat".to_string());
        assert_eq!(request.source_label(), "deepseek-chat");
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&TaskStatus::Completed).unwrap(), "\"completed\"");
    }
}
