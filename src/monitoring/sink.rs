/*!
 * Log Sinks
 *
 * Destination for diagnostic records emitted by connections and servers
 * (transfer timeouts, hard socket failures). A sink is handed to each object
 * at construction; there is no process-wide fallback sink.
 */

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Who produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOrigin {
    User,
    Kernel,
}

/// Record severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Message,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Message => "MSG",
            Self::Warning => "WRN",
            Self::Error => "ERR",
        })
    }
}

/// One diagnostic record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub origin: LogOrigin,
    pub level: LogLevel,
    pub text: String,
}

impl LogRecord {
    pub fn kernel(level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            origin: LogOrigin::Kernel,
            level,
            text: text.into(),
        }
    }
}

/// Diagnostic write target
pub trait LogSink: Send + Sync {
    fn write(&self, record: LogRecord);
}

/// Shared handle to a sink
pub type SharedSink = Arc<dyn LogSink>;

/// Write through an optional sink
pub(crate) fn emit(sink: Option<&SharedSink>, level: LogLevel, text: impl Into<String>) {
    if let Some(sink) = sink {
        sink.write(LogRecord::kernel(level, text));
    }
}

/// Forwards records to `tracing` at the matching level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, record: LogRecord) {
        match record.level {
            LogLevel::Message => tracing::info!(origin = ?record.origin, "{}", record.text),
            LogLevel::Warning => tracing::warn!(origin = ?record.origin, "{}", record.text),
            LogLevel::Error => tracing::error!(origin = ?record.origin, "{}", record.text),
        }
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records at or above `level`
    pub fn at_least(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level >= level)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for RecordingSink {
    fn write(&self, record: LogRecord) {
        self.records.lock().push(record);
    }
}
