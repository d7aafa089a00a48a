//! Diagnostics Sink
//!
//! Severity-tagged logging capability used by the audio layer. Hosts inject a
//! sink; the default one forwards to the `log` facade.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Log target used by [`LogSink`]
pub const LOG_TARGET: &str = "cadenza";

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Logging capability accepting a severity and a formatted message
pub trait AudioLog {
    /// Emit one diagnostic
    fn print(&self, level: Level, message: fmt::Arguments<'_>);
}

/// Sink forwarding to the `log` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AudioLog for LogSink {
    fn print(&self, level: Level, message: fmt::Arguments<'_>) {
        match level {
            Level::Info => log::info!(target: LOG_TARGET, "{}", message),
            Level::Warning => log::warn!(target: LOG_TARGET, "{}", message),
            Level::Error => log::error!(target: LOG_TARGET, "{}", message),
        }
    }
}

/// One recorded diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

/// Sink that keeps every diagnostic in memory.
///
/// Clones share the same buffer, so a host can hand one clone to the audio
/// manager and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl RecordingLog {
    /// Create an empty recording sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded entries
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Number of entries at the given level
    pub fn count(&self, level: Level) -> usize {
        self.entries.lock().iter().filter(|e| e.level == level).count()
    }

    /// Check for an entry at `level` whose message contains `needle`
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }

    /// Drop all recorded entries
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl AudioLog for RecordingLog {
    fn print(&self, level: Level, message: fmt::Arguments<'_>) {
        self.entries.lock().push(LogEntry {
            level,
            message: message.to_string(),
        });
    }
}

impl<T: AudioLog + ?Sized> AudioLog for Box<T> {
    fn print(&self, level: Level, message: fmt::Arguments<'_>) {
        (**self).print(level, message)
    }
}
