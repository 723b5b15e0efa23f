//! Append-only operation log
//!
//! Every component reports progress here. Lines are timestamped as
//! `YYYY-MM-DD HH:MM:SS - message`, appended to a file, and mirrored to the
//! `log` facade. Writes go through a mutex so there is exactly one writer at a
//! time even if callers share the log across threads.

use crate::error::{CoreError, CoreResult};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

enum Sink {
    File { path: PathBuf, file: File },
    Memory(Vec<String>),
}

/// Shared, append-only log for one or more operations.
pub struct OperationLog {
    sink: Mutex<Sink>,
}

impl OperationLog {
    /// Open (or create) the log file at `path` in append mode.
    pub fn open(path: &Path) -> CoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::IoWithPath {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CoreError::IoWithPath {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(Self {
            sink: Mutex::new(Sink::File {
                path: path.to_path_buf(),
                file,
            }),
        })
    }

    /// A log that keeps lines in memory, for tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            sink: Mutex::new(Sink::Memory(Vec::new())),
        }
    }

    /// Record an informational line.
    pub fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        log::info!("{}", message);
        self.append(message);
    }

    /// Record a line describing a failure the operation recovered from.
    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        log::warn!("{}", message);
        self.append(message);
    }

    /// Lines recorded so far by an in-memory log (empty for file logs).
    pub fn lines(&self) -> Vec<String> {
        match &*self.lock() {
            Sink::Memory(lines) => lines.clone(),
            Sink::File { .. } => Vec::new(),
        }
    }

    fn append(&self, message: &str) {
        let line = format!("{} - {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
        match &mut *self.lock() {
            Sink::Memory(lines) => lines.push(line),
            Sink::File { path, file } => {
                if let Err(e) = writeln!(file, "{}", line) {
                    log::warn!("Failed to append to {}: {}", path.display(), e);
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sink> {
        // A panic while holding the lock leaves at worst a partial line behind.
        self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for OperationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.lock() {
            Sink::File { path, .. } => write!(f, "OperationLog({})", path.display()),
            Sink::Memory(lines) => write!(f, "OperationLog(memory, {} lines)", lines.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_keeps_order() {
        let log = OperationLog::in_memory();
        log.info("first");
        log.warn("second");
        let lines = log.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - first"));
        assert!(lines[1].ends_with(" - second"));
    }

    #[test]
    fn test_line_has_timestamp_prefix() {
        let log = OperationLog::in_memory();
        log.info("hello");
        let line = &log.lines()[0];
        // "YYYY-MM-DD HH:MM:SS - hello"
        assert_eq!(line.find(" - "), Some(19));
    }

    #[test]
    fn test_file_log_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("pgferry.log");

        OperationLog::open(&path).unwrap().info("one");
        OperationLog::open(&path).unwrap().info("two");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("one"));
        assert!(lines[1].ends_with("two"));
    }
}
