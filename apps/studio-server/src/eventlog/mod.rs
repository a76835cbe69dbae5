// [[EKO]]/apps/studio-server/src/eventlog/mod.rs
// Purpose: On-disk event log format shared by the writer, reader and locator.
// Architecture: Storage Layer
// Dependencies: Serde, Chrono

pub mod locator;
pub mod reader;
pub mod writer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use reader::{parse, parse_with_report, summary, LogSummary, MalformedRecord, ParseReport};
pub use writer::EventLogWriter;

pub const LOG_FILE_PREFIX: &str = "eko-log";
pub const LOG_FILE_EXT: &str = "log";

/// One recorded event.
///
/// `sequence` is 1-based and assigned by the writer. `time_diff` is the gap in
/// milliseconds to the previous entry of the same file, `0` for the first one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub sequence: u64,
    pub absolute_timestamp: i64,
    pub time_diff: i64,
    pub payload: Value,
}

/// Record header: `<sequence>-<absoluteTimestampMs>-<timeDiffMs>`
pub fn format_header(sequence: u64, absolute_timestamp: i64, time_diff: i64) -> String {
    format!("{}-{}-{}", sequence, absolute_timestamp, time_diff)
}

/// Returns `None` unless the line holds exactly three hyphen separated integers.
pub fn parse_header(line: &str) -> Option<(u64, i64, i64)> {
    let mut parts = line.trim().split('-');
    let sequence = parts.next()?.parse::<u64>().ok()?;
    let absolute_timestamp = parts.next()?.parse::<i64>().ok()?;
    let time_diff = parts.next()?.parse::<i64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((sequence, absolute_timestamp, time_diff))
}

/// Replaces every character outside `[A-Za-z0-9-_.]` with `_`.
pub fn sanitize_label(label: &str) -> String {
    let sanitized: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// `eko-log-<epochMillis>-<YYYY_MM_DD_HH_MM_SS>-<label>.log`, with the
/// human readable part rendered in UTC.
pub fn log_file_name(created_at: DateTime<Utc>, label: &str) -> String {
    format!(
        "{}-{}-{}-{}.{}",
        LOG_FILE_PREFIX,
        created_at.timestamp_millis(),
        created_at.format("%Y_%m_%d_%H_%M_%S"),
        sanitize_label(label),
        LOG_FILE_EXT
    )
}

pub fn is_log_file_name(name: &str) -> bool {
    name.starts_with(&format!("{}-", LOG_FILE_PREFIX))
        && name.ends_with(&format!(".{}", LOG_FILE_EXT))
}
