// [[EKO]]/apps/studio-server/src/config.rs
// Purpose: Environment driven configuration for recording, replay and the agent endpoint.
// Architecture: Application Boot
// Dependencies: std::env

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::replay::{ReplayMode, ReplayOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Accepted ranges for replay requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayBounds {
    pub min_speed: f64,
    pub max_speed: f64,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
}

impl ReplayBounds {
    pub fn development() -> Self {
        Self {
            min_speed: 0.1,
            max_speed: 100.0,
            min_interval_ms: 0,
            max_interval_ms: 60_000,
        }
    }

    pub fn production() -> Self {
        Self {
            min_interval_ms: 10,
            ..Self::development()
        }
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self::development(),
            Environment::Production => Self::production(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub port: u16,
    pub environment: Environment,
    pub log_dir: PathBuf,
    pub record_enabled: bool,
    pub default_speed: f64,
    pub default_interval_ms: u64,
    pub agent_host: String,
    pub agent_port: u16,
    /// Finished tasks kept in the task table; older ones are dropped.
    pub task_retention: usize,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl StudioConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = match lookup("EKO_ENV").as_deref().map(str::trim) {
            Some("production") | Some("prod") => Environment::Production,
            _ => Environment::Development,
        };
        let bounds = ReplayBounds::for_environment(environment);
        let interval_default = match environment {
            Environment::Development => 100,
            Environment::Production => 1000,
        };

        let mut default_speed = parse_or(&lookup, "EKO_REPLAY_SPEED", 1.0);
        if !(bounds.min_speed..=bounds.max_speed).contains(&default_speed) {
            tracing::warn!("EKO_REPLAY_SPEED={} out of range. Using 1.0.", default_speed);
            default_speed = 1.0;
        }

        let mut default_interval_ms = parse_or(&lookup, "EKO_REPLAY_INTERVAL_MS", interval_default);
        if !(bounds.min_interval_ms..=bounds.max_interval_ms).contains(&default_interval_ms) {
            tracing::warn!(
                "EKO_REPLAY_INTERVAL_MS={} out of range. Using {}.",
                default_interval_ms,
                interval_default
            );
            default_interval_ms = interval_default;
        }

        StudioConfig {
            port: parse_or(&lookup, "STUDIO_PORT", 3000),
            environment,
            log_dir: lookup("EKO_LOG_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./logs")),
            record_enabled: parse_or(&lookup, "EKO_RECORD", true),
            default_speed,
            default_interval_ms,
            agent_host: lookup("AGENT_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            agent_port: parse_or(&lookup, "AGENT_PORT", 8000),
            task_retention: parse_or(&lookup, "EKO_TASK_RETENTION", 1000),
        }
    }

    pub fn replay_bounds(&self) -> ReplayBounds {
        ReplayBounds::for_environment(self.environment)
    }

    pub fn agent_url(&self) -> String {
        format!("http://{}:{}", self.agent_host, self.agent_port)
    }

    /// Fills unset request fields from the configured defaults.
    pub fn replay_options(
        &self,
        mode: Option<ReplayMode>,
        speed: Option<f64>,
        interval_ms: Option<u64>,
    ) -> ReplayOptions {
        ReplayOptions {
            mode: mode.unwrap_or(ReplayMode::Realtime),
            speed: speed.unwrap_or(self.default_speed),
            fixed_interval_ms: interval_ms.unwrap_or(self.default_interval_ms),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid value for {}: '{}'. Using {}.", key, raw, default);
                default
            }
        },
        None => default,
    }
}
