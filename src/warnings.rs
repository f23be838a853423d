//! Per-instance warning records.
//!
//! Every expander and router owns a `WarningLog`. Warnings are appended in
//! emission order and also forwarded to the `log` facade, so callers can both
//! see them live and collect them after a run.

use std::fmt;

use log::warn;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A literal value was produced by more than one distinct original.
    AmbiguousReversal,
    /// Input ended inside a heredoc.
    UnterminatedHeredoc,
    /// A path matched more than one routing glob.
    MultipleGlobMatch,
    /// A macro had no mapping and no generator.
    UnmappedMacro,
    /// The translation step did not finish in time.
    RemoteTimeout,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            WarningKind::AmbiguousReversal => "ambiguous-reversal",
            WarningKind::UnterminatedHeredoc => "unterminated-heredoc",
            WarningKind::MultipleGlobMatch => "multiple-glob-match",
            WarningKind::UnmappedMacro => "unmapped-macro",
            WarningKind::RemoteTimeout => "remote-timeout",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct WarningLog {
    entries: Mutex<Vec<Warning>>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&self, kind: WarningKind, message: impl Into<String>) {
        let message = message.into();
        warn!("{kind}: {message}");
        self.entries.lock().push(Warning { kind, message });
    }

    /// Messages in emission order.
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    pub fn entries(&self) -> Vec<Warning> {
        self.entries.lock().clone()
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
