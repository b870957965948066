//! Bounded operator log. Mirrors every entry to `tracing`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::LogLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub minute: u64,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
}

impl EventLog {
    pub fn push(&mut self, capacity: usize, minute: u64, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => tracing::info!(minute, "{message}"),
            LogLevel::Warning => tracing::warn!(minute, "{message}"),
            LogLevel::Danger => tracing::error!(minute, "{message}"),
        }
        self.entries.push_back(LogEntry {
            minute,
            level,
            message,
        });
        while self.entries.len() > capacity.max(1) {
            self.entries.pop_front();
        }
    }

    /// Restore entries verbatim, keeping only the newest `capacity`.
    pub(crate) fn restore(&mut self, capacity: usize, entries: Vec<LogEntry>) {
        let skip = entries.len().saturating_sub(capacity.max(1));
        self.entries = entries.into_iter().skip(skip).collect();
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_drops_oldest() {
        let mut log = EventLog::default();
        for i in 0..5 {
            log.push(3, i, LogLevel::Info, format!("entry {i}"));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "entry 2");
        assert_eq!(log.last().map(|e| e.minute), Some(4));
    }

    #[test]
    fn restore_trims_to_capacity() {
        let mut log = EventLog::default();
        let entries = (0..10)
            .map(|i| LogEntry {
                minute: i,
                level: LogLevel::Warning,
                message: String::new(),
            })
            .collect();
        log.restore(4, entries);
        assert_eq!(log.len(), 4);
        assert_eq!(log.entries()[0].minute, 6);
    }
}
