//! Per-channel log files.
//!
//! Every supervised plugin gets one append-only log file under
//! `<workspace>/.agent/message-gateway/<sanitized-id>/<timestamp>.log`,
//! one line per event: `[ISO8601] [system|stdout|stderr] <text>`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};

/// Log line source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    /// Manager-originated events (spawn, health, exit).
    System,
    /// The child's standard output.
    Stdout,
    /// The child's standard error.
    Stderr,
}

impl LogStream {
    fn as_str(&self) -> &'static str {
        match self {
            LogStream::System => "system",
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
        }
    }
}

/// Reduce a channel id to a safe path segment: `[A-Za-z0-9._-]` pass
/// through, everything else becomes `_`; an empty result becomes
/// `unknown`.
pub fn sanitize_path_segment(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// Append-only log file with one writer per channel.
///
/// The handle is released by [`close`](ChannelLogFile::close) once the
/// channel's process is gone; appends arriving after that are dropped.
#[derive(Debug)]
pub struct ChannelLogFile {
    path: PathBuf,
    file: Mutex<Option<std::fs::File>>,
}

impl ChannelLogFile {
    /// Create the per-channel log directory and open a fresh timestamped
    /// log file inside it.
    pub fn create(workspace: &Path, channel_id: &str) -> std::io::Result<Self> {
        let dir = workspace
            .join(".agent")
            .join("message-gateway")
            .join(sanitize_path_segment(channel_id));
        std::fs::create_dir_all(&dir)?;

        let name = format!("{}.log", Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ"));
        let path = dir.join(name);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    /// Where this log lives.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line. Write failures are logged once to
    /// tracing, never propagated -- losing a log line must not take the
    /// pipeline down.
    pub fn append(&self, stream: LogStream, text: &str) {
        let line = format!(
            "[{}] [{}] {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            stream.as_str(),
            text
        );
        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_mut() {
            Some(file) => {
                if let Err(e) = file.write_all(line.as_bytes()) {
                    warn!(path = %self.path.display(), error = %e, "log append failed");
                }
            }
            None => {
                debug!(path = %self.path.display(), "log line dropped after close");
            }
        }
    }

    /// Release the underlying file handle. Later appends are dropped.
    /// Idempotent.
    pub fn close(&self) {
        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
    }
}
