// [[EKO]]/apps/studio-server/src/lib.rs
// Purpose: Crate root. Event log recording, replay and the studio kernel around them.
// Architecture: Library
// Dependencies: -

pub mod agent;
pub mod config;
pub mod error;
pub mod eventlog;
pub mod events;
pub mod models;
pub mod replay;
pub mod runtime;
pub mod server;
pub mod sink;

pub use error::EventLogError;
