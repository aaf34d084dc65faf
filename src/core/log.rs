//! Purpose: Logging seam shared by the runner, gate, and cleanup dispatcher.
//! Exports: `Logger`, `TracingLogger`, `RecordingLogger`, `LogEntry`, `LogLevel`.
//! Role: Lets hosts route diagnostics (tracing, stderr notices, test capture).
//! Invariants: Logging never changes control flow; callers gate verbose output.

use std::error::Error as StdError;
use std::sync::Mutex;

pub trait Logger {
    fn info(&self, message: &str);
    fn warn(&self, message: &str, cause: Option<&(dyn StdError + 'static)>);
}

/// Emits `tracing` events; the host decides where they go.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str, cause: Option<&(dyn StdError + 'static)>) {
        match cause {
            Some(cause) => tracing::warn!(cause = %cause, "{message}"),
            None => tracing::warn!("{message}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Info,
    Warn,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub cause: Option<String>,
}

/// Captures entries in memory.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    pub fn warnings(&self) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .filter(|entry| entry.level == LogLevel::Warn)
            .cloned()
            .collect()
    }

    pub fn infos(&self) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .filter(|entry| entry.level == LogLevel::Info)
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        // Entries stay readable after a panic poisoned the lock.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, level: LogLevel, message: &str, cause: Option<String>) {
        self.lock().push(LogEntry {
            level,
            message: message.to_string(),
            cause,
        });
    }
}

impl Logger for RecordingLogger {
    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message, None);
    }

    fn warn(&self, message: &str, cause: Option<&(dyn StdError + 'static)>) {
        self.push(LogLevel::Warn, message, cause.map(|c| c.to_string()));
    }
}

impl<L: Logger + ?Sized> Logger for &L {
    fn info(&self, message: &str) {
        (**self).info(message);
    }

    fn warn(&self, message: &str, cause: Option<&(dyn StdError + 'static)>) {
        (**self).warn(message, cause);
    }
}
