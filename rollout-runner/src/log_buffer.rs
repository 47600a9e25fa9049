//! Run log buffer
//!
//! Collects [`LogEntry`]s during a run so they can be attached to the final
//! report. Every entry is mirrored to `tracing` at the matching level.

use rollout_core::domain::log::{LogEntry, LogLevel};
use std::sync::Mutex;

/// In-memory log of one pipeline run
#[derive(Debug, Default)]
pub struct RunLog {
    buffer: Mutex<Vec<LogEntry>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a log entry to the buffer
    pub fn add(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Debug => tracing::debug!("{}", entry.message),
            LogLevel::Info => tracing::info!("{}", entry.message),
            LogLevel::Warning => tracing::warn!("{}", entry.message),
            LogLevel::Error => tracing::error!("{}", entry.message),
        }
        let mut buffer = self.buffer.lock().unwrap();
        buffer.push(entry);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.add(LogEntry::now(LogLevel::Debug, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.add(LogEntry::now(LogLevel::Info, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.add(LogEntry::now(LogLevel::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.add(LogEntry::now(LogLevel::Error, message));
    }

    /// Drains all log entries from the buffer
    pub fn drain(&self) -> Vec<LogEntry> {
        let mut buffer = self.buffer.lock().unwrap();
        buffer.drain(..).collect()
    }

    /// Snapshot of the buffered messages
    pub fn messages(&self) -> Vec<String> {
        let buffer = self.buffer.lock().unwrap();
        buffer.iter().map(|entry| entry.message.clone()).collect()
    }
}
