//! Run log.
//!
//! Stages report progress through [`log_info`], [`log_success`],
//! [`log_warning`] and [`log_error`]. Every entry is echoed to stderr and kept
//! in a global collector so the CLI can print a summary and tests can check
//! what a stage reported.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Optional indentation level (for nested logs)
    #[serde(default)]
    pub indent: u8,
    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    fn with_level(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            indent: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_level(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_level(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_level(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_level(LogLevel::Error, message)
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Global run log
pub static RUN_LOG: Lazy<RunLog> = Lazy::new(RunLog::new);

/// Collects log entries for the current process
pub struct RunLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Record an entry and echo it to stderr
    pub fn log(&self, entry: LogEntry) {
        let prefix = match entry.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let indent = "   ".repeat(entry.indent as usize);
        eprintln!("{}{} {}", indent, prefix, entry.message);

        // a poisoned lock only means another thread panicked mid-push
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.push(entry);
    }

    /// Snapshot of all entries so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Number of entries at a given level
    pub fn count(&self, level: LogLevel) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|e| e.level == level)
            .count()
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    RUN_LOG.log(LogEntry::info(msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_log_collects_entries() {
        let log = RunLog::new();
        log.log(LogEntry::info("Reading raw data"));
        log.log(LogEntry::warning("3 rows dropped").with_indent(1));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].indent, 1);
        assert_eq!(log.count(LogLevel::Warning), 1);
        assert_eq!(log.count(LogLevel::Error), 0);
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let json = serde_json::to_value(LogEntry::success("done")).unwrap();
        assert_eq!(json["level"], "success");
        assert!(json.get("timestamp").is_some());
    }
}
