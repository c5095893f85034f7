//! Test utilities for fincord_core
//!
//! This module provides shared testing infrastructure, including a fake
//! editor widget that records which model it is showing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::editor::{EditorWidget, SharedModel};

/// An editor widget that only remembers the model it was given.
#[derive(Default)]
pub struct RecordingWidget {
    ready: AtomicBool,
    model: Mutex<Option<SharedModel>>,
    set_calls: AtomicUsize,
}

impl RecordingWidget {
    /// A widget that accepts models immediately.
    pub fn ready() -> Self {
        let widget = Self::default();
        widget.set_ready(true);
        widget
    }

    /// A widget that is still initializing.
    pub fn not_ready() -> Self {
        Self::default()
    }

    /// Flip the ready flag.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Content of the model currently shown.
    pub fn current_content(&self) -> Option<String> {
        self.current_model()
            .map(|model| model.lock().unwrap().content().to_string())
    }

    /// URI of the model currently shown.
    pub fn current_uri(&self) -> Option<String> {
        self.current_model()
            .map(|model| model.lock().unwrap().uri().to_string())
    }

    /// The model currently shown.
    pub fn current_model(&self) -> Option<SharedModel> {
        self.model.lock().unwrap().clone()
    }

    /// How many times a model was swapped in.
    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }
}

impl EditorWidget for RecordingWidget {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn set_model(&self, model: SharedModel) {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        *self.model.lock().unwrap() = Some(model);
    }

    fn clear_model(&self) {
        *self.model.lock().unwrap() = None;
    }
}

/// Shorthand for a ready widget behind an `Arc`.
pub fn ready_widget() -> Arc<RecordingWidget> {
    Arc::new(RecordingWidget::ready())
}
