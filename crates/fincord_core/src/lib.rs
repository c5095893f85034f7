#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Commands between UI triggers and the execution subsystem
pub mod commands;

/// Configuration options
pub mod config;

/// Callback registry with panic isolation
pub mod dispatch;

/// Editor binding (widget model <-> shared text)
pub mod editor;

/// Error (common error types)
pub mod error;

/// Language detection from file extensions
pub mod language;

/// Path utilities for slash-separated workspace paths
pub mod path_utils;

/// Presence (remote peers' identities and cursors)
pub mod presence;

/// Deferred work run on the next host tick
pub mod scheduler;

/// Session (one peer's view of the shared workspace)
pub mod session;

/// Open tabs and the active file
pub mod tabs;

/// Sorted file tree projection
pub mod tree;

/// Workspace (the shared file map and its texts)
pub mod workspace;

#[cfg(test)]
pub mod test_utils;

pub use config::EngineConfig;
pub use error::{FincordError, Result};
pub use session::{SessionSnapshot, WorkspaceSession};
pub use workspace::{CreateFileOptions, Entry, EntryKind, WorkspaceEvent, WorkspaceStore};
