//! Structured logging.
//!
//! A [`Logger`] writes one JSON object per line to a configurable
//! writer (stderr by default). The server uses it for connection-level
//! failures; applications may share it for their own records.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal operational records.
    Info,
    /// Unexpected but recoverable conditions.
    Warn,
    /// Failures.
    Error,
}

impl LogLevel {
    /// The upper-case label used in serialized entries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// One serialized log record.
#[derive(Debug, Serialize)]
pub struct LogEntry<'a> {
    /// Severity label.
    pub level: &'a str,
    /// Subsystem that produced the entry.
    pub component: &'a str,
    /// Human-readable message.
    pub message: &'a str,
}

/// A shared, thread-safe line logger.
#[derive(Clone)]
pub struct Logger {
    min_level: LogLevel,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Logger {
    /// Create a logger writing to stderr at `Info` and above.
    #[must_use]
    pub fn new() -> Self {
        Self::with_writer(io::stderr())
    }

    /// Create a logger with a custom writer.
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            min_level: LogLevel::Info,
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Set the minimum level that gets written.
    #[must_use]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Write an entry if its level clears the minimum.
    ///
    /// Write failures are swallowed: logging must never take down the
    /// request path.
    pub fn log(&self, level: LogLevel, component: &str, message: &str) {
        if level < self.min_level {
            return;
        }
        let entry = LogEntry {
            level: level.as_str(),
            component,
            message,
        };
        let Ok(line) = serde_json::to_string(&entry) else {
            return;
        };
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "{line}");
    }

    /// Log at `Debug`.
    pub fn debug(&self, component: &str, message: &str) {
        self.log(LogLevel::Debug, component, message);
    }

    /// Log at `Info`.
    pub fn info(&self, component: &str, message: &str) {
        self.log(LogLevel::Info, component, message);
    }

    /// Log at `Warn`.
    pub fn warn(&self, component: &str, message: &str) {
        self.log(LogLevel::Warn, component, message);
    }

    /// Log at `Error`.
    pub fn error(&self, component: &str, message: &str) {
        self.log(LogLevel::Error, component, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}
