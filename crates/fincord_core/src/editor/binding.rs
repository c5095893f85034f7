//! Two-way adapter between one shared text and one editor model.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use yrs::types::Delta;
use yrs::types::text::TextEvent;
use yrs::{Doc, GetString, Observable, Text, TextRef, Transact, TransactionMut};

use super::model::{ModelEdit, SharedModel, lock_model};
use crate::dispatch::panic_message;
use crate::error::{FincordError, Result};
use crate::workspace::floor_char_boundary;

/// Applies one remote text event to a model.
type RemoteHandler = fn(&SharedModel, &TransactionMut, &TextEvent);

/// A live binding. Dropping it stops the synchronization.
pub struct TextBinding {
    path: String,
    handle: String,
    doc: Doc,
    text: TextRef,
    model: SharedModel,
    /// Set while this binding writes its own edits into the shared text
    suppress: Arc<AtomicBool>,
    callback_failures: Arc<AtomicUsize>,
    _subscription: yrs::Subscription,
}

impl TextBinding {
    /// Bind `model` to `text`.
    ///
    /// The model is first brought in line with the shared text; from then on
    /// remote changes are applied to it as deltas.
    pub fn new(
        path: &str,
        handle: &str,
        doc: &Doc,
        text: TextRef,
        model: SharedModel,
    ) -> Result<Self> {
        Self::with_remote_handler(path, handle, doc, text, model, apply_remote)
    }

    fn with_remote_handler(
        path: &str,
        handle: &str,
        doc: &Doc,
        text: TextRef,
        model: SharedModel,
        on_remote: RemoteHandler,
    ) -> Result<Self> {
        {
            let model = lock_model(&model);
            if model.uri() != handle {
                return Err(FincordError::Binding {
                    path: path.to_string(),
                    reason: format!("model belongs to {}, not {}", model.uri(), handle),
                });
            }
        }

        let current = {
            let txn = doc.transact();
            text.get_string(&txn)
        };
        lock_model(&model).set_content(current);

        let suppress = Arc::new(AtomicBool::new(false));
        let callback_failures = Arc::new(AtomicUsize::new(0));

        let subscription = {
            let model = Arc::clone(&model);
            let suppress = Arc::clone(&suppress);
            let failures = Arc::clone(&callback_failures);
            let path = path.to_string();
            text.observe(move |txn, event| {
                if suppress.load(Ordering::SeqCst) {
                    return;
                }
                let outcome = catch_unwind(AssertUnwindSafe(|| on_remote(&model, txn, event)));
                if let Err(payload) = outcome {
                    failures.fetch_add(1, Ordering::SeqCst);
                    log::error!(
                        "Text change callback for '{}' panicked: {}",
                        path,
                        panic_message(payload.as_ref())
                    );
                }
            })
        };

        log::debug!("Bound editor model to '{}' ({})", path, handle);
        Ok(Self {
            path: path.to_string(),
            handle: handle.to_string(),
            doc: doc.clone(),
            text,
            model,
            suppress,
            callback_failures,
            _subscription: subscription,
        })
    }

    /// Path of the bound file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Follow a rename of the bound file; the text handle is unchanged.
    pub(crate) fn set_path(&mut self, path: &str) {
        self.path = path.to_string();
    }

    /// Text handle of the bound file.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// The bound model.
    pub fn model(&self) -> &SharedModel {
        &self.model
    }

    /// Number of text change callbacks that panicked.
    pub fn callback_failures(&self) -> usize {
        self.callback_failures.load(Ordering::SeqCst)
    }

    /// Push a local widget edit into the shared text.
    ///
    /// The edit is validated against (and applied to) the model first, then
    /// written to the shared text without echoing back into the model.
    pub fn apply_local(&self, edit: &ModelEdit) -> Result<()> {
        lock_model(&self.model)
            .apply(edit)
            .map_err(|e| FincordError::Binding {
                path: self.path.clone(),
                reason: format!("edit at byte {} outside buffer of {} bytes", e.offset, e.len),
            })?;

        self.suppress.store(true, Ordering::SeqCst);
        {
            let mut txn = self.doc.transact_mut();
            let len = self.text.len(&txn);
            let current = self.text.get_string(&txn);
            match edit {
                ModelEdit::Insert { offset, text } => {
                    let offset = floor_char_boundary(&current, *offset);
                    self.text.insert(&mut txn, offset, text);
                }
                ModelEdit::Delete { offset, len: count } => {
                    let start = floor_char_boundary(&current, *offset);
                    let end = floor_char_boundary(&current, offset.saturating_add(*count));
                    if end > start {
                        self.text.remove_range(&mut txn, start, end - start);
                    }
                }
                ModelEdit::Replace { content } => {
                    if len > 0 {
                        self.text.remove_range(&mut txn, 0, len);
                    }
                    if !content.is_empty() {
                        self.text.insert(&mut txn, 0, content);
                    }
                }
            }
        }
        self.suppress.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Stop synchronizing.
    pub fn dispose(self) {
        log::debug!("Disposed binding for '{}'", self.path);
    }
}

impl std::fmt::Debug for TextBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextBinding")
            .field("path", &self.path)
            .field("handle", &self.handle)
            .finish()
    }
}

/// Apply a remote text change to the model, falling back to a full resync
/// when the delta does not line up with the buffer.
fn apply_remote(model: &SharedModel, txn: &TransactionMut, event: &TextEvent) {
    let mut model = lock_model(model);
    let mut cursor = 0usize;
    for delta in event.delta(txn) {
        let step = match delta {
            Delta::Retain(len, _) => {
                cursor += *len as usize;
                Ok(())
            }
            Delta::Inserted(value, _) => {
                let inserted = value.to_string();
                let result = model.insert(cursor, &inserted);
                cursor += inserted.len();
                result
            }
            Delta::Deleted(len) => model.delete(cursor, *len as usize),
        };
        if let Err(e) = step {
            log::debug!(
                "Delta does not fit model ({} of {} bytes), resyncing",
                e.offset,
                e.len
            );
            model.set_content(event.target().get_string(txn));
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::model::EditorModel;
    use std::sync::Mutex;

    fn setup(content: &str) -> (Doc, TextRef, SharedModel) {
        let doc = Doc::new();
        let text = doc.get_or_insert_text("file:test");
        {
            let mut txn = doc.transact_mut();
            text.insert(&mut txn, 0, content);
        }
        let model = Arc::new(Mutex::new(EditorModel::new(
            "file:test",
            "plaintext",
            String::new(),
        )));
        (doc, text, model)
    }

    #[test]
    fn test_bind_resyncs_model() {
        let (doc, text, model) = setup("hello");
        let _binding = TextBinding::new("a.txt", "file:test", &doc, text, Arc::clone(&model)).unwrap();
        assert_eq!(model.lock().unwrap().content(), "hello");
    }

    #[test]
    fn test_remote_change_reaches_model() {
        let (doc, text, model) = setup("hello");
        let _binding =
            TextBinding::new("a.txt", "file:test", &doc, text.clone(), Arc::clone(&model)).unwrap();

        {
            let mut txn = doc.transact_mut();
            text.insert(&mut txn, 5, " world");
            text.remove_range(&mut txn, 0, 1);
        }
        assert_eq!(model.lock().unwrap().content(), "ello world");
    }

    #[test]
    fn test_remote_multibyte_deltas() {
        let (doc, text, model) = setup("héllo");
        let _binding =
            TextBinding::new("a.txt", "file:test", &doc, text.clone(), Arc::clone(&model)).unwrap();

        {
            let mut txn = doc.transact_mut();
            text.insert(&mut txn, 0, "日本");
        }
        assert_eq!(model.lock().unwrap().content(), "日本héllo");

        // Retain over the multibyte prefix, then delete 'h'
        {
            let mut txn = doc.transact_mut();
            text.remove_range(&mut txn, 6, 1);
            text.insert(&mut txn, 11, "X");
        }
        let expected = text.get_string(&doc.transact());
        assert_eq!(expected, "日本élloX");
        assert_eq!(model.lock().unwrap().content(), expected);
    }

    #[test]
    fn test_panicking_remote_handler_is_contained() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        fn flaky(model: &SharedModel, txn: &TransactionMut, event: &TextEvent) {
            if CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("renderer exploded");
            }
            apply_remote(model, txn, event);
        }

        let (doc, text, model) = setup("abc");
        let binding = TextBinding::with_remote_handler(
            "a.txt",
            "file:test",
            &doc,
            text.clone(),
            Arc::clone(&model),
            flaky,
        )
        .unwrap();

        {
            let mut txn = doc.transact_mut();
            text.insert(&mut txn, 0, "x");
        }
        assert_eq!(binding.callback_failures(), 1);
        assert_eq!(model.lock().unwrap().content(), "abc");

        // The next change no longer lines up with the stale model and
        // triggers a full resync
        {
            let mut txn = doc.transact_mut();
            text.insert(&mut txn, 4, "y");
        }
        assert_eq!(binding.callback_failures(), 1);
        assert_eq!(model.lock().unwrap().content(), "xabcy");
    }

    #[test]
    fn test_local_edit_inside_char_snaps_to_boundary() {
        let (doc, text, model) = setup("é");
        let binding =
            TextBinding::new("a.txt", "file:test", &doc, text.clone(), Arc::clone(&model)).unwrap();

        // Model and text can drift apart; the text write must not panic
        text.insert(&mut doc.transact_mut(), 0, "ü");
        lock_model(&model).set_content("ab".to_string());
        binding
            .apply_local(&ModelEdit::Insert {
                offset: 1,
                text: "-".into(),
            })
            .unwrap();

        assert_eq!(text.get_string(&doc.transact()), "-üé");
    }

    #[test]
    fn test_local_edit_is_not_echoed() {
        let (doc, text, model) = setup("abc");
        let binding =
            TextBinding::new("a.txt", "file:test", &doc, text.clone(), Arc::clone(&model)).unwrap();

        binding
            .apply_local(&ModelEdit::Insert {
                offset: 3,
                text: "d".into(),
            })
            .unwrap();

        let txn = doc.transact();
        assert_eq!(text.get_string(&txn), "abcd");
        // Applied once, not twice
        assert_eq!(model.lock().unwrap().content(), "abcd");
    }

    #[test]
    fn test_out_of_range_local_edit_fails() {
        let (doc, text, model) = setup("abc");
        let binding = TextBinding::new("a.txt", "file:test", &doc, text, model).unwrap();
        let err = binding
            .apply_local(&ModelEdit::Delete { offset: 2, len: 5 })
            .unwrap_err();
        assert!(matches!(err, FincordError::Binding { .. }));
    }

    #[test]
    fn test_mismatched_model_is_rejected() {
        let (doc, text, model) = setup("abc");
        let result = TextBinding::new("a.txt", "file:other", &doc, text, model);
        assert!(result.is_err());
    }

    #[test]
    fn test_dispose_stops_sync() {
        let (doc, text, model) = setup("abc");
        let binding =
            TextBinding::new("a.txt", "file:test", &doc, text.clone(), Arc::clone(&model)).unwrap();
        binding.dispose();

        {
            let mut txn = doc.transact_mut();
            text.insert(&mut txn, 0, "x");
        }
        assert_eq!(model.lock().unwrap().content(), "abc");
    }
}
