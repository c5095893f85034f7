//! Change notifications for the shared workspace map.
//!
//! The store gathers per-key changes while a transaction runs and publishes a
//! single [`WorkspaceEvent`] after the transaction commits, whether the change
//! was made locally or arrived in a remote update.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::types::Entry;

/// How a single key of the shared map changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The key was inserted or its record replaced.
    Upserted,
    /// The key was removed.
    Removed,
}

/// One changed path in a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PathChange {
    /// Key that changed.
    pub path: String,
    /// Kind of change.
    pub kind: ChangeKind,
}

impl PathChange {
    /// An insert or update of `path`.
    pub fn upserted(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Upserted,
        }
    }

    /// A removal of `path`.
    pub fn removed(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Removed,
        }
    }
}

/// Events published by [`WorkspaceStore`](super::WorkspaceStore).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type")]
pub enum WorkspaceEvent {
    /// One or more entries changed.
    EntriesChanged {
        /// Changed keys, one per path, in first-seen order.
        changes: Vec<PathChange>,
        /// Snapshot of every entry after the change, sorted by path.
        entries: Vec<Entry>,
    },
}

impl WorkspaceEvent {
    /// Create an EntriesChanged event.
    pub fn entries_changed(changes: Vec<PathChange>, entries: Vec<Entry>) -> Self {
        Self::EntriesChanged { changes, entries }
    }

    /// Entry snapshot carried by the event.
    pub fn entries(&self) -> &[Entry] {
        match self {
            Self::EntriesChanged { entries, .. } => entries,
        }
    }

    /// Whether `path` was removed in this change.
    pub fn removed(&self, path: &str) -> bool {
        match self {
            Self::EntriesChanged { changes, .. } => changes
                .iter()
                .any(|c| c.path == path && c.kind == ChangeKind::Removed),
        }
    }
}

/// Collapse raw key changes so each path appears once with its final kind.
pub(crate) fn coalesce(raw: Vec<PathChange>) -> Vec<PathChange> {
    let mut out: Vec<PathChange> = Vec::with_capacity(raw.len());
    for change in raw {
        match out.iter_mut().find(|c| c.path == change.path) {
            Some(existing) => existing.kind = change.kind,
            None => out.push(change),
        }
    }
    out
}
