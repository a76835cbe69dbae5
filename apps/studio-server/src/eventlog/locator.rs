// [[EKO]]/apps/studio-server/src/eventlog/locator.rs
// Purpose: Discovers recorded logs inside the log directory.
// Architecture: Infrastructure Helper Layer
// Dependencies: std::fs, std::path

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::is_log_file_name;
use crate::error::EventLogError;

/// Log file names in `directory`, newest first.
///
/// Names start with the creation epoch millis, so a descending name sort is a
/// newest-first sort. A missing directory yields an empty list.
pub fn list(directory: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let directory = directory.as_ref();
    if !directory.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            if is_log_file_name(&name) {
                names.push(name);
            }
        }
    }

    names.sort_unstable_by(|a, b| b.cmp(a));
    Ok(names)
}

pub fn latest(directory: impl AsRef<Path>) -> io::Result<Option<String>> {
    Ok(list(directory)?.into_iter().next())
}

/// Maps a client supplied name onto a file inside `directory`.
///
/// Only the final path component is honoured, so `../` tricks cannot leave
/// the log directory.
pub fn resolve(directory: impl AsRef<Path>, name: &str) -> Result<PathBuf, EventLogError> {
    let safe_name = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| EventLogError::InvalidOptions(format!("invalid log file name '{}'", name)))?;

    if !is_log_file_name(&safe_name) {
        return Err(EventLogError::InvalidOptions(format!(
            "'{}' is not an event log file",
            safe_name
        )));
    }

    let path = directory.as_ref().join(&safe_name);
    if !path.is_file() {
        return Err(EventLogError::NotFound(path));
    }
    Ok(path)
}

/// The explicitly requested file, or the newest one when none is named.
pub fn select(directory: impl AsRef<Path>, requested: Option<&str>) -> Result<PathBuf, EventLogError> {
    let directory = directory.as_ref();
    match requested.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => resolve(directory, name),
        None => {
            let name = latest(directory)
                .map_err(EventLogError::Read)?
                .ok_or_else(|| EventLogError::NotFound(directory.to_path_buf()))?;
            Ok(directory.join(name))
        }
    }
}
