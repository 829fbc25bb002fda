//! JSONL run log: append-only line-delimited JSON, one object per event.
//!
//! Each line is assembled in memory and written with a single `write_all`,
//! so a tailing reader never sees a partial line.
//!
//! Fallback chain:
//! 1. Configured file path
//! 2. stderr with `[SUV-JSONL]` prefix
//! 3. Silent discard (a logging failure never fails a validation run)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SuvError};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Lifecycle events of one validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunStart,
    SessionComplete,
    TranscriptParsed,
    ParseShortfall,
    Evaluation,
    RunFailed,
}

/// A single JSONL log entry. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Program invocation, e.g. `./qtest -v 3`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    /// Shuffle trials requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trials: Option<u64>,
    /// Observations parsed from the transcript.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrees_of_freedom: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// SUV error code if the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            program: None,
            trials: None,
            observations: None,
            expected: None,
            statistic: None,
            degrees_of_freedom: None,
            transcript_bytes: None,
            duration_ms: None,
            config_hash: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    /// Failure entry carrying the error's code and message.
    pub fn failure(error: &SuvError) -> Self {
        let mut entry = Self::new(EventType::RunFailed, Severity::Critical);
        entry.ok = Some(false);
        entry.error_code = Some(error.code().to_string());
        entry.error_message = Some(error.to_string());
        entry.details = Some(error.category().as_str().to_string());
        entry
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    File,
    Stderr,
    Discard,
}

/// Append-only JSONL writer with stderr fallback.
pub struct JsonlWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    lines_written: u64,
}

impl JsonlWriter {
    /// Open (or create) the log file. Falls back to stderr on failure.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match open_append(&path) {
            Ok(file) => Self {
                path,
                writer: Some(BufWriter::with_capacity(16 * 1024, file)),
                state: WriterState::File,
                lines_written: 0,
            },
            Err(e) => {
                let _ = writeln!(io::stderr(), "[SUV-JSONL] {e}; logging to stderr");
                Self {
                    path,
                    writer: None,
                    state: WriterState::Stderr,
                    lines_written: 0,
                }
            }
        }
    }

    /// Writer that drops every entry.
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            writer: None,
            state: WriterState::Discard,
            lines_written: 0,
        }
    }

    /// Write a single log entry as one JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[SUV-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::File => "file",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::File => {
                let ok = self
                    .writer
                    .as_mut()
                    .is_some_and(|w| w.write_all(line.as_bytes()).is_ok());
                if ok {
                    self.lines_written += 1;
                } else {
                    self.writer = None;
                    self.state = WriterState::Stderr;
                    let _ = writeln!(
                        io::stderr(),
                        "[SUV-JSONL] write to {} failed, using stderr",
                        self.path.display()
                    );
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[SUV-JSONL] {line}").is_ok() {
                    self.lines_written += 1;
                } else {
                    self.state = WriterState::Discard;
                }
            }
            WriterState::Discard => {}
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Open or create a file for appending.
fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| SuvError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| SuvError::io(path, source))
}

/// Format current UTC time as ISO 8601.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
