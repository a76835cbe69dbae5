// [[EKO]]/apps/studio-server/src/replay/mod.rs
// Purpose: Playback of recorded logs with realtime or fixed pacing.
// Architecture: Replay Layer
// Dependencies: Tokio time, tokio-util cancellation

pub mod narrator;
pub mod scheduler;

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ReplayBounds;
use crate::error::EventLogError;
use crate::eventlog::LogEntry;

pub use narrator::{narrate, ReplayMetadata, ReplaySink, ReplayStart};
pub use scheduler::{EntryConsumer, ReplayOutcome, ReplayScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayMode {
    /// Reproduce the recorded gaps, scaled by speed.
    Realtime,
    /// Constant gap, scaled by speed.
    Fixed,
}

impl FromStr for ReplayMode {
    type Err = EventLogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "realtime" => Ok(ReplayMode::Realtime),
            "fixed" => Ok(ReplayMode::Fixed),
            other => Err(EventLogError::InvalidOptions(format!(
                "unknown replay mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayOptions {
    pub mode: ReplayMode,
    pub speed: f64,
    pub fixed_interval_ms: u64,
}

impl ReplayOptions {
    pub fn realtime(speed: f64) -> Self {
        Self {
            mode: ReplayMode::Realtime,
            speed,
            fixed_interval_ms: 0,
        }
    }

    pub fn fixed(fixed_interval_ms: u64, speed: f64) -> Self {
        Self {
            mode: ReplayMode::Fixed,
            speed,
            fixed_interval_ms,
        }
    }

    /// Rejects speeds and intervals outside the deployment bounds.
    pub fn validate(&self, bounds: &ReplayBounds) -> Result<(), EventLogError> {
        if !self.speed.is_finite() || self.speed < bounds.min_speed || self.speed > bounds.max_speed {
            return Err(EventLogError::InvalidOptions(format!(
                "speed {} outside [{}, {}]",
                self.speed, bounds.min_speed, bounds.max_speed
            )));
        }
        if self.mode == ReplayMode::Fixed
            && (self.fixed_interval_ms < bounds.min_interval_ms
                || self.fixed_interval_ms > bounds.max_interval_ms)
        {
            return Err(EventLogError::InvalidOptions(format!(
                "fixed interval {}ms outside [{}, {}]",
                self.fixed_interval_ms, bounds.min_interval_ms, bounds.max_interval_ms
            )));
        }
        Ok(())
    }

    /// Wait between delivering `entries[index]` and `entries[index + 1]`.
    ///
    /// Realtime mode looks one entry ahead: the gap recorded on the next entry
    /// is the one waited out after the current delivery. `None` after the last
    /// entry.
    pub fn delay_after(&self, entries: &[LogEntry], index: usize) -> Option<Duration> {
        let next = entries.get(index + 1)?;
        let base_ms = match self.mode {
            ReplayMode::Realtime => next.time_diff.max(0) as f64,
            ReplayMode::Fixed => self.fixed_interval_ms as f64,
        };
        Some(Duration::from_secs_f64(base_ms / self.speed / 1000.0))
    }
}
