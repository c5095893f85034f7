//! Editor models and the per-file model registry.
//!
//! Offsets are UTF-8 byte offsets, the same unit the shared text uses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Displayed buffer for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorModel {
    uri: String,
    language: String,
    content: String,
    version: u64,
}

/// A model shared between the registry, the widget and a binding.
pub type SharedModel = Arc<Mutex<EditorModel>>;

/// Lock a shared model, recovering from a poisoned lock.
pub(crate) fn lock_model(model: &SharedModel) -> MutexGuard<'_, EditorModel> {
    model.lock().unwrap_or_else(|e| e.into_inner())
}

/// Why an edit could not be applied to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutOfRange {
    /// Offending byte offset
    pub offset: usize,
    /// Model length in bytes
    pub len: usize,
}

impl EditorModel {
    /// Create a model for the text identified by `uri`.
    pub fn new(uri: impl Into<String>, language: impl Into<String>, content: String) -> Self {
        Self {
            uri: uri.into(),
            language: language.into(),
            content,
            version: 1,
        }
    }

    /// Identifier of the backing shared text.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Language id used for highlighting.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Current buffer content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Incremented on every change.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replace the whole buffer. No-op when the content is unchanged.
    pub fn set_content(&mut self, content: String) {
        if self.content != content {
            self.content = content;
            self.version += 1;
        }
    }

    /// Insert `text` at byte `offset`.
    pub fn insert(&mut self, offset: usize, text: &str) -> Result<(), OutOfRange> {
        self.check(offset)?;
        self.content.insert_str(offset, text);
        self.version += 1;
        Ok(())
    }

    /// Remove `len` bytes starting at `offset`.
    pub fn delete(&mut self, offset: usize, len: usize) -> Result<(), OutOfRange> {
        self.check(offset)?;
        self.check(offset + len)?;
        self.content.replace_range(offset..offset + len, "");
        self.version += 1;
        Ok(())
    }

    /// Apply a [`ModelEdit`].
    pub fn apply(&mut self, edit: &ModelEdit) -> Result<(), OutOfRange> {
        match edit {
            ModelEdit::Insert { offset, text } => self.insert(*offset as usize, text),
            ModelEdit::Delete { offset, len } => self.delete(*offset as usize, *len as usize),
            ModelEdit::Replace { content } => {
                self.set_content(content.clone());
                Ok(())
            }
        }
    }

    fn check(&self, offset: usize) -> Result<(), OutOfRange> {
        if offset <= self.content.len() && self.content.is_char_boundary(offset) {
            Ok(())
        } else {
            Err(OutOfRange {
                offset,
                len: self.content.len(),
            })
        }
    }
}

/// A local edit made in the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ModelEdit {
    /// Insert text at a byte offset.
    Insert {
        /// Byte offset
        offset: u32,
        /// Inserted text
        text: String,
    },
    /// Delete a byte range.
    Delete {
        /// Byte offset
        offset: u32,
        /// Number of bytes
        len: u32,
    },
    /// Replace the whole buffer.
    Replace {
        /// New content
        content: String,
    },
}

/// Editor models keyed by text handle.
///
/// Keying by handle keeps a file's model (and its undo history in the
/// widget) across renames.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: HashMap<String, SharedModel>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the model for `handle`, creating it from `snapshot` on first use.
    pub fn get_or_create<F>(&mut self, handle: &str, language: &str, snapshot: F) -> SharedModel
    where
        F: FnOnce() -> String,
    {
        if let Some(model) = self.models.get(handle) {
            return Arc::clone(model);
        }
        log::debug!("Creating editor model for {}", handle);
        let model = Arc::new(Mutex::new(EditorModel::new(handle, language, snapshot())));
        self.models.insert(handle.to_string(), Arc::clone(&model));
        model
    }

    /// Model for `handle`, if created.
    pub fn get(&self, handle: &str) -> Option<SharedModel> {
        self.models.get(handle).cloned()
    }

    /// Drop models whose handle fails `keep`. Returns how many were evicted.
    pub fn retain<F>(&mut self, keep: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let before = self.models.len();
        self.models.retain(|handle, _| keep(handle));
        before - self.models.len()
    }

    /// Number of live models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no model is live.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Drop every model.
    pub fn clear(&mut self) {
        self.models.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_edits() {
        let mut model = EditorModel::new("file:1", "rust", "fn main() {}".to_string());
        model.insert(11, "x").unwrap();
        assert_eq!(model.content(), "fn main() {x}");
        model.delete(0, 3).unwrap();
        assert_eq!(model.content(), "main() {x}");
        assert_eq!(model.version(), 3);
    }

    #[test]
    fn test_model_rejects_bad_offsets() {
        let mut model = EditorModel::new("file:1", "plaintext", "héllo".to_string());
        assert!(model.insert(99, "x").is_err());
        // Inside the two-byte 'é'
        assert!(model.delete(2, 1).is_err());
        assert_eq!(model.content(), "héllo");
    }

    #[test]
    fn test_set_content_bumps_version_on_change_only() {
        let mut model = EditorModel::new("file:1", "plaintext", "a".to_string());
        model.set_content("a".to_string());
        assert_eq!(model.version(), 1);
        model.apply(&ModelEdit::Replace { content: "b".into() }).unwrap();
        assert_eq!(model.version(), 2);
    }

    #[test]
    fn test_registry_snapshots_once() {
        let mut registry = ModelRegistry::new();
        let first = registry.get_or_create("file:1", "rust", || "one".to_string());
        let second = registry.get_or_create("file:1", "rust", || panic!("snapshot taken twice"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().unwrap().content(), "one");
    }

    #[test]
    fn test_registry_retain() {
        let mut registry = ModelRegistry::new();
        registry.get_or_create("file:1", "rust", String::new);
        registry.get_or_create("file:2", "rust", String::new);
        assert_eq!(registry.retain(|handle| handle == "file:2"), 1);
        assert!(registry.get("file:1").is_none());
        assert_eq!(registry.len(), 1);
    }
}
