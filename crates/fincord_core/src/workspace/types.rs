//! Core types for the shared workspace map.
//!
//! This module defines the record stored under each path in the shared
//! `files` map ([`EntryRecord`]) and the derived view handed to the UI layer
//! ([`Entry`]).

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::path_utils;

/// Whether an entry is a file or a folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A file with a shared text object
    #[default]
    File,
    /// A folder; carries no content
    Folder,
}

/// Payload stored in the shared map, JSON-encoded, keyed by path.
///
/// `name` is never stored and `parent` is informational only: both are
/// re-derived from the key on read, so a stale stored parent cannot produce
/// a cycle in the projected tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// File or folder. Records written without a type are files.
    #[serde(rename = "type", default)]
    pub kind: EntryKind,

    /// Root-level text name holding the file content (files only)
    #[serde(default, rename = "textName", skip_serializing_if = "Option::is_none")]
    pub text_handle: Option<String>,

    /// Advisory language hint (files only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Parent folder path at the time the record was written
    #[serde(default)]
    pub parent: Option<String>,

    /// Unix timestamp of creation (milliseconds)
    #[serde(default, rename = "createdAt")]
    pub created_at: i64,
}

impl EntryRecord {
    /// Record for a new file at `path`.
    pub fn file(path: &str, text_handle: String, language: String) -> Self {
        Self {
            kind: EntryKind::File,
            text_handle: Some(text_handle),
            language: Some(language),
            parent: path_utils::parent_from_path(path),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Record for a new folder at `path`.
    pub fn folder(path: &str) -> Self {
        Self {
            kind: EntryKind::Folder,
            text_handle: None,
            language: None,
            parent: path_utils::parent_from_path(path),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Same payload, re-homed under `path`.
    pub fn moved_to(mut self, path: &str) -> Self {
        self.parent = path_utils::parent_from_path(path);
        self
    }
}

/// A file or folder as seen by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Unique slash-delimited key, e.g. "src/index.ts"
    pub path: String,
    /// Last path segment, e.g. "index.ts"
    pub name: String,
    /// File or folder
    pub kind: EntryKind,
    /// Parent folder path, `None` at the root
    pub parent_path: Option<String>,
    /// Shared text handle (files only)
    pub text_handle: Option<String>,
    /// Advisory language hint
    pub language: Option<String>,
}

impl Entry {
    /// Build the derived view of a stored record.
    pub fn from_record(path: &str, record: EntryRecord) -> Self {
        let is_file = record.kind == EntryKind::File;
        Self {
            path: path.to_string(),
            name: path_utils::name_from_path(path),
            kind: record.kind,
            parent_path: path_utils::parent_from_path(path),
            text_handle: if is_file { record.text_handle } else { None },
            language: if is_file { record.language } else { None },
        }
    }

    /// Whether this entry is a file.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Whether this entry is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// Options for [`WorkspaceStore::create_file`](super::WorkspaceStore::create_file).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateFileOptions {
    /// Language hint; guessed from the extension when `None`
    pub language: Option<String>,
    /// Initial content; empty when `None`
    pub content: Option<String>,
}

impl CreateFileOptions {
    /// Options with initial content.
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Set the language hint.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// A file brought in by an import action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedFile {
    /// Relative path inside the workspace (may contain `./` or backslashes)
    pub path: String,
    /// File content
    pub content: String,
}

impl ImportedFile {
    /// Create an imported file.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_type_is_file() {
        let record: EntryRecord =
            serde_json::from_str(r#"{"textName":"file:README.md","parent":null}"#).unwrap();
        assert_eq!(record.kind, EntryKind::File);
        assert_eq!(record.text_handle.as_deref(), Some("file:README.md"));
        assert_eq!(record.created_at, 0);
    }

    #[test]
    fn test_record_json_shape() {
        let record = EntryRecord::folder("src/lib");
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "folder");
        assert_eq!(json["parent"], "src");
        assert!(json.get("textName").is_none());
    }

    #[test]
    fn test_entry_derives_name_and_parent_from_key() {
        let mut record = EntryRecord::file("old/a.ts", "file:1".into(), "typescript".into());
        record.parent = Some("somewhere/else".to_string());

        let entry = Entry::from_record("src/b/a.ts", record);
        assert_eq!(entry.name, "a.ts");
        assert_eq!(entry.parent_path.as_deref(), Some("src/b"));
        assert!(entry.is_file());
    }

    #[test]
    fn test_folder_entry_drops_text_fields() {
        let mut record = EntryRecord::folder("src");
        record.text_handle = Some("file:stray".to_string());
        let entry = Entry::from_record("src", record);
        assert!(entry.is_folder());
        assert!(entry.text_handle.is_none());
    }

    #[test]
    fn test_moved_to_rederives_parent() {
        let record = EntryRecord::file("src/a.ts", "file:1".into(), "typescript".into());
        let moved = record.clone().moved_to("lib/x/a.ts");
        assert_eq!(moved.parent.as_deref(), Some("lib/x"));
        assert_eq!(moved.text_handle, record.text_handle);
    }
}
