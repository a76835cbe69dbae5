// [[EKO]]/apps/studio-server/src/error.rs
// Purpose: Error taxonomy for recording and replay.
// Architecture: Domain Error Layer
// Dependencies: thiserror

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventLogError {
    #[error("log file not found: {0}")]
    NotFound(PathBuf),

    #[error("log file has no usable entries: {0}")]
    EmptyLog(PathBuf),

    #[error("failed to write event log: {0}")]
    WriteFailure(#[source] io::Error),

    #[error("failed to read event log: {0}")]
    Read(#[source] io::Error),

    #[error("failed to encode event payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid replay options: {0}")]
    InvalidOptions(String),

    #[error("replay consumer failed: {0}")]
    ConsumerCallbackFailure(String),
}

impl EventLogError {
    /// Stable label carried on the wire in error frames.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::EmptyLog(_) => "EmptyLog",
            Self::WriteFailure(_) => "WriteFailure",
            Self::Read(_) => "ReadFailure",
            Self::Encode(_) => "EncodeFailure",
            Self::InvalidOptions(_) => "InvalidOptions",
            Self::ConsumerCallbackFailure(_) => "ConsumerCallbackFailure",
        }
    }

    pub fn consumer(err: impl std::fmt::Display) -> Self {
        Self::ConsumerCallbackFailure(err.to_string())
    }
}
