//! Append-only event log consumed by the presentation layer.
//!
//! Every entry is also forwarded to `tracing`, so headless runs get the
//! same narrative on stderr that a UI would render.

use serde::{Deserialize, Serialize};

/// Severity tag of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Neutral information.
    Info,
    /// Something went well.
    Success,
    /// Risk was taken on or capacity was reserved.
    Warning,
    /// Damage or loss.
    Error,
}

/// A single human-readable event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEntry {
    /// Sprint during which the event happened.
    pub sprint: u32,
    /// Severity tag.
    pub level: LogLevel,
    /// Message shown verbatim.
    pub message: String,
}

/// Ordered, append-only list of events for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<LogEntry>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry.
    pub fn push(&mut self, sprint: u32, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info | LogLevel::Success => tracing::debug!(sprint, ?level, "{message}"),
            LogLevel::Warning => tracing::info!(sprint, ?level, "{message}"),
            LogLevel::Error => tracing::warn!(sprint, ?level, "{message}"),
        }
        self.entries.push(LogEntry {
            sprint,
            level,
            message,
        });
    }

    /// All entries in order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries appended after the first `offset` entries.
    ///
    /// Lets a caller fetch only what it has not rendered yet.
    #[must_use]
    pub fn since(&self, offset: usize) -> &[LogEntry] {
        self.entries.get(offset..).unwrap_or(&[])
    }

    /// The most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count entries with the given level.
    #[must_use]
    pub fn count(&self, level: LogLevel) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_ordered_and_sliceable() {
        let mut log = EventLog::new();
        log.push(1, LogLevel::Success, "first");
        log.push(1, LogLevel::Error, "second");
        log.push(2, LogLevel::Info, "third");

        assert_eq!(log.len(), 3);
        assert_eq!(log.since(1).len(), 2);
        assert_eq!(log.since(1)[0].message, "second");
        assert!(log.since(10).is_empty());
        assert_eq!(log.last().map(|e| e.sprint), Some(2));
        assert_eq!(log.count(LogLevel::Error), 1);
    }

    #[test]
    fn test_level_serializes_snake_case() {
        let json = serde_json::to_string(&LogLevel::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }
}
