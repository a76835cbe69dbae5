// [[EKO]]/apps/studio-server/src/eventlog/reader.rs
// Purpose: Parses recorded logs back into ordered entries, skipping damaged records.
// Architecture: Storage Layer
// Dependencies: Tokio fs, serde_json

use std::io;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use super::{parse_header, LogEntry};
use crate::error::EventLogError;

/// A block that could not be turned into an entry. Never fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedRecord {
    /// 0-based position among the non-empty blocks of the file.
    pub block: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ParseReport {
    pub entries: Vec<LogEntry>,
    pub skipped: Vec<MalformedRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSummary {
    pub total_entries: usize,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    pub duration_ms: i64,
}

impl LogSummary {
    pub fn from_entries(entries: &[LogEntry]) -> Option<Self> {
        let first = entries.first()?;
        let last = entries.last()?;
        Some(Self {
            total_entries: entries.len(),
            first_timestamp: first.absolute_timestamp,
            last_timestamp: last.absolute_timestamp,
            duration_ms: last.absolute_timestamp - first.absolute_timestamp,
        })
    }
}

/// Entries in file order. Damaged records are logged and dropped.
pub async fn parse(path: impl AsRef<Path>) -> Result<Vec<LogEntry>, EventLogError> {
    Ok(parse_with_report(path).await?.entries)
}

pub async fn parse_with_report(path: impl AsRef<Path>) -> Result<ParseReport, EventLogError> {
    let path = path.as_ref();
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(EventLogError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(EventLogError::Read(e)),
    };

    // A crashed writer can leave a torn multi-byte sequence at the tail.
    let raw = String::from_utf8_lossy(&bytes);
    let report = parse_str(&raw);

    for skipped in &report.skipped {
        tracing::warn!(
            "Skipping malformed record #{} in {}: {}",
            skipped.block,
            path.display(),
            skipped.reason
        );
    }
    tracing::debug!(
        "Parsed {} entries from {} ({} skipped)",
        report.entries.len(),
        path.display(),
        report.skipped.len()
    );

    Ok(report)
}

pub fn parse_str(raw: &str) -> ParseReport {
    let mut report = ParseReport::default();

    for (block_index, block) in split_blocks(raw).into_iter().enumerate() {
        let (header, body) = match block.split_first() {
            Some((header, body)) => (*header, body.join("\n")),
            None => continue,
        };

        let Some((sequence, absolute_timestamp, time_diff)) = parse_header(header) else {
            report.skipped.push(MalformedRecord {
                block: block_index,
                reason: format!("invalid header '{}'", header.trim()),
            });
            continue;
        };

        match serde_json::from_str::<Value>(&body) {
            Ok(payload) => report.entries.push(LogEntry {
                sequence,
                absolute_timestamp,
                time_diff,
                payload,
            }),
            Err(e) => report.skipped.push(MalformedRecord {
                block: block_index,
                reason: format!("invalid payload for sequence {}: {}", sequence, e),
            }),
        }
    }

    report
}

pub async fn summary(path: impl AsRef<Path>) -> Result<Option<LogSummary>, EventLogError> {
    let entries = parse(path).await?;
    Ok(LogSummary::from_entries(&entries))
}

/// Groups lines into blocks separated by blank (or whitespace-only) lines.
fn split_blocks(raw: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in raw.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}
