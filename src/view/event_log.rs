//! Append-only, timestamped event log shown to the user.
//!
//! Every entry is mirrored to the `log` facade as well.

use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Connection lifecycle and world resets.
    Status,
    /// `echo` payloads.
    Echo,
    /// Well-formed messages of an unknown `type`.
    Unrecognized,
    /// Frames that could not be decoded at all.
    Malformed,
    /// Commands sent to the server.
    Command,
}

impl EntryKind {
    /// Everything except status and command entries is a diagnostic.
    pub fn is_diagnostic(self) -> bool {
        matches!(
            self,
            EntryKind::Echo | EntryKind::Unrecognized | EntryKind::Malformed
        )
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub kind: EntryKind,
    pub text: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.text)
    }
}

#[derive(Debug, Default, Clone)]
pub struct EventLog {
    entries: Vec<LogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: EntryKind, text: impl Into<String>) {
        let entry = LogEntry {
            at: Local::now(),
            kind,
            text: text.into(),
        };
        if kind.is_diagnostic() {
            log::warn!("[view] {}", entry.text);
        } else {
            log::info!("[view] {}", entry.text);
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: EntryKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.entries.iter().filter(|e| e.kind.is_diagnostic())
    }
}
