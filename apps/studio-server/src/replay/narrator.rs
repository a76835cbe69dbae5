// [[EKO]]/apps/studio-server/src/replay/narrator.rs
// Purpose: Reads a log and narrates it through lifecycle hooks shaped like a live run.
// Architecture: Replay Layer
// Dependencies: async-trait, serde_json

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{EntryConsumer, ReplayOptions, ReplayOutcome, ReplayScheduler};
use crate::error::EventLogError;
use crate::eventlog::{reader, LogEntry, LogSummary};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStart {
    pub total_entries: usize,
    pub duration_ms: i64,
}

/// Progress attached to every replayed payload.
///
/// `index` is the 0-based delivery position; `sequence` is the recorded id and
/// can have gaps when damaged records were skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayMetadata {
    pub sequence: u64,
    pub absolute_timestamp: i64,
    pub time_diff: i64,
    pub index: usize,
    pub total: usize,
}

/// Lifecycle hooks for one replay session. Only `on_message` is required.
#[async_trait]
pub trait ReplaySink: Send {
    async fn on_start(&mut self, _start: &ReplayStart) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_message(&mut self, payload: &Value, metadata: ReplayMetadata) -> anyhow::Result<()>;

    async fn on_complete(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Without an override the error is handed back to the caller.
    async fn on_error(&mut self, error: EventLogError) -> Result<(), EventLogError> {
        Err(error)
    }
}

struct Narration<'a, S: ?Sized> {
    sink: &'a mut S,
}

#[async_trait]
impl<'a, S> EntryConsumer for Narration<'a, S>
where
    S: ReplaySink + ?Sized,
{
    async fn deliver(&mut self, entry: &LogEntry, index: usize, total: usize) -> anyhow::Result<()> {
        let metadata = ReplayMetadata {
            sequence: entry.sequence,
            absolute_timestamp: entry.absolute_timestamp,
            time_diff: entry.time_diff,
            index,
            total,
        };
        self.sink.on_message(&entry.payload, metadata).await
    }
}

/// Replays `path` into `sink`.
///
/// An empty log fails with `EmptyLog` before `on_start`. Any failure goes to
/// `on_error`; the default hook returns it to the caller.
pub async fn narrate<S>(
    path: impl AsRef<Path>,
    options: ReplayOptions,
    sink: &mut S,
    cancel: CancellationToken,
) -> Result<ReplayOutcome, EventLogError>
where
    S: ReplaySink + ?Sized,
{
    let path = path.as_ref();
    match run_narration(path, options, sink, cancel).await {
        Ok(outcome) => Ok(outcome),
        Err(error) => {
            tracing::warn!("Replay of {} failed: {}", path.display(), error);
            sink.on_error(error).await?;
            Ok(ReplayOutcome::Failed)
        }
    }
}

async fn run_narration<S>(
    path: &Path,
    options: ReplayOptions,
    sink: &mut S,
    cancel: CancellationToken,
) -> Result<ReplayOutcome, EventLogError>
where
    S: ReplaySink + ?Sized,
{
    let entries = reader::parse(path).await?;
    let summary =
        LogSummary::from_entries(&entries).ok_or_else(|| EventLogError::EmptyLog(path.to_path_buf()))?;

    tracing::info!(
        "Replaying {} ({} entries, {}ms recorded, {:?} x{})",
        path.display(),
        summary.total_entries,
        summary.duration_ms,
        options.mode,
        options.speed
    );

    sink.on_start(&ReplayStart {
        total_entries: summary.total_entries,
        duration_ms: summary.duration_ms,
    })
    .await
    .map_err(|e| EventLogError::consumer(format!("{:#}", e)))?;

    let scheduler = ReplayScheduler::new(options, cancel);
    let outcome = scheduler.run(&entries, &mut Narration { sink: &mut *sink }).await?;

    if let ReplayOutcome::Completed { delivered } = outcome {
        sink.on_complete()
            .await
            .map_err(|e| EventLogError::consumer(format!("{:#}", e)))?;
        tracing::info!("Replay of {} completed ({} entries)", path.display(), delivered);
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Transcript {
        calls: Vec<String>,
        metadata: Vec<ReplayMetadata>,
        cancel_after: Option<(usize, CancellationToken)>,
        swallow_errors: bool,
    }

    #[async_trait]
    impl ReplaySink for Transcript {
        async fn on_start(&mut self, start: &ReplayStart) -> anyhow::Result<()> {
            self.calls.push(format!("start:{}:{}", start.total_entries, start.duration_ms));
            Ok(())
        }

        async fn on_message(&mut self, payload: &Value, metadata: ReplayMetadata) -> anyhow::Result<()> {
            self.calls.push(format!("message:{}", payload["type"].as_str().unwrap_or("?")));
            self.metadata.push(metadata);
            if let Some((after, token)) = &self.cancel_after {
                if self.metadata.len() == *after {
                    token.cancel();
                }
            }
            Ok(())
        }

        async fn on_complete(&mut self) -> anyhow::Result<()> {
            self.calls.push("complete".to_string());
            Ok(())
        }

        async fn on_error(&mut self, error: EventLogError) -> Result<(), EventLogError> {
            self.calls.push(format!("error:{}", error.kind()));
            if self.swallow_errors {
                Ok(())
            } else {
                Err(error)
            }
        }
    }

    async fn write_log(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("eko-log-1700000000000-2023_11_14_22_13_20-test.log");
        tokio::fs::write(&path, body).await.unwrap();
        path
    }

    fn record(sequence: u64, ts: i64, diff: i64, kind: &str) -> String {
        format!(
            "{}-{}-{}\n{}\n\n",
            sequence,
            ts,
            diff,
            serde_json::to_string_pretty(&json!({"type": kind})).unwrap()
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_narrates_full_log() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{}{}{}",
            record(1, 1000, 0, "start"),
            record(2, 1300, 300, "thinking"),
            record(3, 2200, 900, "finish")
        );
        let path = write_log(dir.path(), &body).await;

        let mut sink = Transcript::default();
        let outcome = narrate(&path, ReplayOptions::realtime(4.0), &mut sink, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ReplayOutcome::Completed { delivered: 3 });
        assert_eq!(
            sink.calls,
            vec!["start:3:1200", "message:start", "message:thinking", "message:finish", "complete"]
        );
        assert_eq!(
            sink.metadata[1],
            ReplayMetadata {
                sequence: 2,
                absolute_timestamp: 1300,
                time_diff: 300,
                index: 1,
                total: 3,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_differs_from_sequence_after_skips() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{}2-1100-100\n{{ broken\n\n{}",
            record(1, 1000, 0, "start"),
            record(3, 1200, 100, "finish")
        );
        let path = write_log(dir.path(), &body).await;

        let mut sink = Transcript::default();
        narrate(&path, ReplayOptions::fixed(0, 1.0), &mut sink, CancellationToken::new())
            .await
            .unwrap();

        let pairs: Vec<(u64, usize, usize)> =
            sink.metadata.iter().map(|m| (m.sequence, m.index, m.total)).collect();
        assert_eq!(pairs, vec![(1, 0, 2), (3, 1, 2)]);
    }

    #[tokio::test]
    async fn test_empty_log_goes_to_error_hook() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "").await;

        let mut sink = Transcript {
            swallow_errors: true,
            ..Default::default()
        };
        let outcome = narrate(&path, ReplayOptions::realtime(1.0), &mut sink, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ReplayOutcome::Failed);
        assert_eq!(sink.calls, vec!["error:EmptyLog"]);
    }

    #[tokio::test]
    async fn test_default_error_hook_rethrows() {
        struct Bare(usize);

        #[async_trait]
        impl ReplaySink for Bare {
            async fn on_message(&mut self, _: &Value, _: ReplayMetadata) -> anyhow::Result<()> {
                self.0 += 1;
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "garbage\n\n").await;
        let mut sink = Bare(0);

        let err = narrate(&path, ReplayOptions::realtime(1.0), &mut sink, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EventLogError::EmptyLog(_)));
        assert_eq!(sink.0, 0);

        let missing = dir.path().join("eko-log-2-missing.log");
        let err = narrate(&missing, ReplayOptions::realtime(1.0), &mut sink, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EventLogError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_replay() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (1..=5)
            .map(|i| record(i, 1000 + i as i64 * 50, if i == 1 { 0 } else { 50 }, "step"))
            .collect();
        let path = write_log(dir.path(), &body).await;

        let token = CancellationToken::new();
        let mut sink = Transcript {
            cancel_after: Some((2, token.clone())),
            ..Default::default()
        };
        let outcome = narrate(&path, ReplayOptions::realtime(1.0), &mut sink, token)
            .await
            .unwrap();

        assert_eq!(outcome, ReplayOutcome::Cancelled { delivered: 2 });
        assert_eq!(sink.metadata.len(), 2);
        assert!(!sink.calls.contains(&"complete".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_failure_reported_once() {
        struct Flaky(Vec<String>);

        #[async_trait]
        impl ReplaySink for Flaky {
            async fn on_message(&mut self, _: &Value, metadata: ReplayMetadata) -> anyhow::Result<()> {
                if metadata.index == 1 {
                    anyhow::bail!("transport closed");
                }
                self.0.push(format!("message:{}", metadata.index));
                Ok(())
            }

            async fn on_complete(&mut self) -> anyhow::Result<()> {
                self.0.push("complete".to_string());
                Ok(())
            }

            async fn on_error(&mut self, error: EventLogError) -> Result<(), EventLogError> {
                self.0.push(format!("error:{}", error.kind()));
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{}{}{}",
            record(1, 1000, 0, "a"),
            record(2, 1010, 10, "b"),
            record(3, 1020, 10, "c")
        );
        let path = write_log(dir.path(), &body).await;

        let mut sink = Flaky(Vec::new());
        let outcome = narrate(&path, ReplayOptions::realtime(1.0), &mut sink, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ReplayOutcome::Failed);
        assert_eq!(sink.0, vec!["message:0", "error:ConsumerCallbackFailure"]);
    }
}
