//! Status history shown by the shell.
//!
//! Every user-visible outcome (a failed connect, a control request issued
//! while disconnected, a missing source file) lands here instead of being
//! raised. The shell prints the newest entry; `status` prints the tail.

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

/// Severity of a status entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLevel::Info => write!(f, "info"),
            StatusLevel::Warning => write!(f, "warn"),
            StatusLevel::Error => write!(f, "error"),
        }
    }
}

/// One line of status history.
#[derive(Debug, Clone)]
pub struct StatusEntry {
    level: StatusLevel,
    text: String,
    at: Instant,
}

impl StatusEntry {
    pub fn new(level: StatusLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            at: Instant::now(),
        }
    }

    pub fn level(&self) -> StatusLevel {
        self.level
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn at(&self) -> Instant {
        self.at
    }
}

impl fmt::Display for StatusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.text)
    }
}

/// Bounded, append-only status history. Oldest entries fall off the front.
#[derive(Debug)]
pub struct StatusLog {
    entries: VecDeque<StatusEntry>,
    capacity: usize,
}

impl StatusLog {
    /// Entries kept by [`StatusLog::new`].
    pub const DEFAULT_CAPACITY: usize = 512;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// A log that keeps at most `capacity` entries (minimum one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(StatusLevel::Info, text);
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.push(StatusLevel::Warning, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(StatusLevel::Error, text);
    }

    pub fn push(&mut self, level: StatusLevel, text: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(StatusEntry::new(level, text));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent entry.
    pub fn latest(&self) -> Option<&StatusEntry> {
        self.entries.back()
    }

    /// Up to `count` newest entries, oldest first.
    pub fn tail(&self, count: usize) -> impl Iterator<Item = &StatusEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip)
    }

    /// Entries at or above `min`.
    pub fn at_least(&self, min: StatusLevel) -> Vec<&StatusEntry> {
        self.entries.iter().filter(|e| e.level >= min).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries.iter()
    }
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::new()
    }
}
