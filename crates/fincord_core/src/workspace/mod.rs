//! Shared workspace module.
//!
//! This module provides the replicated file tree of a collaborative session:
//! - The path-keyed entry map and per-file shared texts
//! - File operations (create, delete, rename, import)
//! - Change notifications and sync plumbing
//!
//! # Module Structure
//!
//! - `types` - Entry records and the derived [`Entry`] view
//! - `events` - [`WorkspaceEvent`] and per-path changes
//! - `store` - [`WorkspaceStore`], the owner of the Y.Doc

mod events;
mod store;
mod types;

pub use events::{ChangeKind, PathChange, WorkspaceEvent};
pub use store::{README_PATH, TEXT_HANDLE_PREFIX, WorkspaceStore};
pub(crate) use store::{floor_char_boundary, is_valid_move};
pub use types::{CreateFileOptions, Entry, EntryKind, EntryRecord, ImportedFile};
