//! Per-process transcript files.
//!
//! Each spawned agent can get an append-only `{log_dir}/{id}.log` with one
//! timestamped line per chunk of stdin/stdout/stderr traffic. Diagnostics
//! for the core itself go through the `log` facade instead.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};

/// Shared handle to a transcript file. `None` inside means logging is off.
pub type LogHandle = Arc<Mutex<Option<File>>>;

/// Which stream a transcript line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Stdin,
    Stdout,
    Stderr,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Stdin => "STDIN",
            Direction::Stdout => "STDOUT",
            Direction::Stderr => "STDERR",
        }
    }
}

/// A handle that writes nowhere.
pub fn disabled() -> LogHandle {
    Arc::new(Mutex::new(None))
}

/// Append one line per line of `data`, each stamped with the current UTC
/// time. Write failures are ignored.
pub fn log_line(handle: &LogHandle, direction: Direction, data: &str) {
    let Ok(mut guard) = handle.lock() else { return };
    let Some(file) = guard.as_mut() else { return };
    let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    for line in data.lines() {
        let _ = writeln!(file, "[{ts}] {}: {line}", direction.as_str());
    }
    let _ = file.flush();
}

/// Open (or create) `{log_dir}/{log_id}.log`. Without a directory, or if the
/// file can't be opened, the returned handle is disabled.
pub fn open_log_file(log_dir: Option<&str>, log_id: &str) -> LogHandle {
    let file = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        let path = Path::new(dir).join(format!("{log_id}.log"));
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                log::warn!("Could not open transcript {}: {e}", path.display());
                None
            }
        }
    });
    Arc::new(Mutex::new(file))
}
