// [[EKO]]/apps/studio-server/src/replay/scheduler.rs
// Purpose: Paces delivery of parsed entries to a consumer.
// Architecture: Replay Layer
// Dependencies: Tokio time, tokio-util, async-trait

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::ReplayOptions;
use crate::error::EventLogError;
use crate::eventlog::LogEntry;

/// Receives replayed entries one at a time. The next entry is not delivered
/// until the returned future resolves.
#[async_trait]
pub trait EntryConsumer: Send {
    async fn deliver(&mut self, entry: &LogEntry, index: usize, total: usize) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Completed { delivered: usize },
    /// Stopped on request before the last entry. Not an error.
    Cancelled { delivered: usize },
    /// The failure was handed to the sink's error hook.
    Failed,
}

pub struct ReplayScheduler {
    options: ReplayOptions,
    cancel: CancellationToken,
}

impl ReplayScheduler {
    pub fn new(options: ReplayOptions, cancel: CancellationToken) -> Self {
        Self { options, cancel }
    }

    /// Delivers `entries` strictly in order.
    ///
    /// Cancellation is observed before each delivery and during each wait; a
    /// delivery already in flight is allowed to finish. A consumer error stops
    /// the run and surfaces as `ConsumerCallbackFailure`.
    pub async fn run<C>(&self, entries: &[LogEntry], consumer: &mut C) -> Result<ReplayOutcome, EventLogError>
    where
        C: EntryConsumer + ?Sized,
    {
        let total = entries.len();

        for (index, entry) in entries.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!("Replay cancelled after {} of {} entries", index, total);
                return Ok(ReplayOutcome::Cancelled { delivered: index });
            }

            tracing::debug!("Replaying entry #{} ({}/{})", entry.sequence, index + 1, total);
            consumer
                .deliver(entry, index, total)
                .await
                .map_err(|e| EventLogError::consumer(format!("{:#}", e)))?;

            let Some(delay) = self.options.delay_after(entries, index) else {
                continue;
            };

            if self.cancel.is_cancelled() {
                tracing::info!("Replay cancelled after {} of {} entries", index + 1, total);
                return Ok(ReplayOutcome::Cancelled { delivered: index + 1 });
            }

            if !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        tracing::info!("Replay cancelled after {} of {} entries", index + 1, total);
                        return Ok(ReplayOutcome::Cancelled { delivered: index + 1 });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Ok(ReplayOutcome::Completed { delivered: total })
    }
}
