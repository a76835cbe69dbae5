// [[EKO]]/apps/studio-server/src/eventlog/writer.rs
// Purpose: Append-only recorder for one live run.
// Architecture: Storage Layer
// Dependencies: Tokio fs, Chrono, serde_json

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use super::{format_header, log_file_name};
use crate::error::EventLogError;

/// Owns exactly one log file for the lifetime of a recording session.
///
/// A writer opened with `enabled == false` (or built with `Default`) accepts
/// every call and records nothing; `count()` then stays at `0`.
#[derive(Default)]
pub struct EventLogWriter {
    file: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    next_sequence: u64,
    count: u64,
    last_timestamp: Option<i64>,
}

impl EventLogWriter {
    pub async fn open(
        directory: impl AsRef<Path>,
        source_label: &str,
        enabled: bool,
    ) -> Result<Self, EventLogError> {
        if !enabled {
            tracing::debug!("Event recording disabled for source '{}'", source_label);
            return Ok(Self::default());
        }

        let directory = directory.as_ref();
        tokio::fs::create_dir_all(directory)
            .await
            .map_err(EventLogError::WriteFailure)?;

        let path = directory.join(log_file_name(Utc::now(), source_label));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(EventLogError::WriteFailure)?;

        tracing::info!("Recording events to {}", path.display());

        Ok(Self {
            file: Some(BufWriter::new(file)),
            path: Some(path),
            next_sequence: 1,
            count: 0,
            last_timestamp: None,
        })
    }

    pub async fn append(&mut self, event: &Value) -> Result<(), EventLogError> {
        self.append_at(event, Utc::now().timestamp_millis()).await
    }

    pub(crate) async fn append_at(
        &mut self,
        event: &Value,
        timestamp_ms: i64,
    ) -> Result<(), EventLogError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };

        let body = serde_json::to_string_pretty(event)?;

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        // Clock regressions are clamped so the header never carries a sign.
        let time_diff = self
            .last_timestamp
            .map(|prev| (timestamp_ms - prev).max(0))
            .unwrap_or(0);

        let record = format!(
            "{}\n{}\n\n",
            format_header(sequence, timestamp_ms, time_diff),
            body
        );

        let written = match file.write_all(record.as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            // A torn record may be on disk; later appends would land behind it.
            self.file = None;
            if let Some(path) = &self.path {
                tracing::error!(
                    "Recording to {} stopped after {} entries: {}",
                    path.display(),
                    self.count,
                    e
                );
            }
            return Err(EventLogError::WriteFailure(e));
        }

        self.count += 1;
        self.last_timestamp = Some(timestamp_ms);
        Ok(())
    }

    /// Flushes and releases the file. Safe to call more than once.
    pub async fn close(&mut self) -> Result<(), EventLogError> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };

        file.flush().await.map_err(EventLogError::WriteFailure)?;
        file.get_mut()
            .sync_all()
            .await
            .map_err(EventLogError::WriteFailure)?;

        if let Some(path) = &self.path {
            tracing::info!("Closed event log {} ({} entries)", path.display(), self.count);
        }
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_recording(&self) -> bool {
        self.file.is_some()
    }
}
