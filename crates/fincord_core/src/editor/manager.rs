//! Keeps the editor widget bound to the active file.
//!
//! The manager is a small state machine:
//!
//! ```text
//! Unbound --(active file set, widget ready)--> Binding --(tick)--> Bound
//!    ^                                            |                 |
//!    +------------(switch / failure / teardown)---+-----------------+
//! ```
//!
//! At most one binding is live at a time. A switch always disposes the
//! current binding (or cancels the pending bind) before anything new is
//! created.

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::binding::TextBinding;
use super::model::{ModelEdit, ModelRegistry, SharedModel};
use super::widget::EditorWidget;
use crate::dispatch::panic_message;
use crate::error::{FincordError, Result};
use crate::language;
use crate::scheduler::{DeferredQueue, TaskId};
use crate::workspace::{Entry, WorkspaceStore};

/// Lifetime counters for bindings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct BindingStats {
    /// Bindings successfully constructed
    pub created: u64,
    /// Bindings disposed
    pub disposed: u64,
    /// Binding constructions that failed or panicked
    pub failures: u64,
}

impl BindingStats {
    /// Bindings currently alive.
    pub fn live(&self) -> u64 {
        self.created - self.disposed
    }
}

/// Externally visible state of the binding machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum BindingPhase {
    /// No binding and nothing pending
    Unbound,
    /// Model shown, binding deferred to the next tick
    Binding,
    /// Model live-synced with the shared text
    Bound,
}

enum BindingState {
    Unbound,
    Binding {
        path: String,
        handle: String,
        task: TaskId,
    },
    Bound(TextBinding),
}

/// Binds the mounted widget to whatever file is active.
pub struct EditorBindingManager {
    store: Arc<WorkspaceStore>,
    widget: Option<Arc<dyn EditorWidget>>,
    models: ModelRegistry,
    state: BindingState,
    queue: DeferredQueue<String>,
    target: Option<String>,
    stats: BindingStats,
}

impl EditorBindingManager {
    /// Create a manager over `store` with no widget mounted.
    pub fn new(store: Arc<WorkspaceStore>) -> Self {
        Self {
            store,
            widget: None,
            models: ModelRegistry::new(),
            state: BindingState::Unbound,
            queue: DeferredQueue::new(),
            target: None,
            stats: BindingStats::default(),
        }
    }

    /// Attach the widget and bind the active file to it.
    pub fn mount(&mut self, widget: Arc<dyn EditorWidget>) {
        self.release();
        self.widget = Some(widget);
        self.start_binding();
    }

    /// Detach the widget, disposing any binding.
    pub fn unmount(&mut self) {
        self.release();
        if let Some(widget) = self.widget.take() {
            widget.clear_model();
        }
    }

    /// Whether a widget is attached.
    pub fn is_mounted(&self) -> bool {
        self.widget.is_some()
    }

    /// Follow a change of the active file.
    pub fn set_active_file(&mut self, path: Option<&str>) {
        let path = path.map(str::to_string);
        if path == self.target {
            if matches!(self.state, BindingState::Unbound) {
                self.start_binding();
            }
            return;
        }

        // A rename keeps the text handle; keep the binding too
        if let Some(new_path) = path.as_deref()
            && let Some(handle) = self.store.text_handle(new_path)
        {
            match &mut self.state {
                BindingState::Bound(binding) if binding.handle() == handle => {
                    log::debug!("Binding follows rename to '{}'", new_path);
                    binding.set_path(new_path);
                    self.target = path;
                    return;
                }
                BindingState::Binding {
                    path: pending,
                    handle: pending_handle,
                    ..
                } if *pending_handle == handle => {
                    *pending = new_path.to_string();
                    self.target = path;
                    return;
                }
                _ => {}
            }
        }

        self.release();
        self.target = path;
        self.start_binding();
    }

    /// Run deferred binds that came due. Returns `true` when a binding was
    /// established.
    pub fn tick(&mut self) -> bool {
        let mut bound = false;
        for (id, _) in self.queue.take_due() {
            match std::mem::replace(&mut self.state, BindingState::Unbound) {
                BindingState::Binding { path, handle, task } if task == id => {
                    bound |= self.bind_now(path, handle);
                }
                other => self.state = other,
            }
        }
        bound
    }

    /// Reconcile with a fresh entry snapshot: evict models of deleted files
    /// and drop a binding whose text is gone.
    pub fn refresh(&mut self, entries: &[Entry]) {
        let live: HashSet<&str> = entries
            .iter()
            .filter_map(|entry| entry.text_handle.as_deref())
            .collect();

        let evicted = self.models.retain(|handle| live.contains(handle));
        if evicted > 0 {
            log::debug!("Evicted {} editor models", evicted);
        }

        let stale = match &self.state {
            BindingState::Bound(binding) => !live.contains(binding.handle()),
            BindingState::Binding { handle, .. } => !live.contains(handle.as_str()),
            BindingState::Unbound => false,
        };
        if stale {
            log::debug!("Active text vanished, releasing binding");
            self.release();
        }
    }

    /// Push a local widget edit into the bound file.
    ///
    /// Returns `Ok(false)` when nothing is bound yet.
    pub fn edit(&self, edit: &ModelEdit) -> Result<bool> {
        if self.widget.is_none() {
            return Err(FincordError::EditorNotReady);
        }
        match &self.state {
            BindingState::Bound(binding) => {
                binding.apply_local(edit)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Dispose everything: binding, pending work, models and the widget's
    /// model.
    pub fn teardown(&mut self) {
        self.release();
        let dropped = self.queue.clear();
        if dropped > 0 {
            log::debug!("Dropped {} pending binds on teardown", dropped);
        }
        if let Some(widget) = &self.widget {
            widget.clear_model();
        }
        self.models.clear();
        self.target = None;
    }

    /// Current phase.
    pub fn phase(&self) -> BindingPhase {
        match self.state {
            BindingState::Unbound => BindingPhase::Unbound,
            BindingState::Binding { .. } => BindingPhase::Binding,
            BindingState::Bound(_) => BindingPhase::Bound,
        }
    }

    /// Path of the bound file.
    pub fn bound_path(&self) -> Option<&str> {
        match &self.state {
            BindingState::Bound(binding) => Some(binding.path()),
            _ => None,
        }
    }

    /// Model shown for the bound file.
    pub fn bound_model(&self) -> Option<SharedModel> {
        match &self.state {
            BindingState::Bound(binding) => Some(Arc::clone(binding.model())),
            _ => None,
        }
    }

    /// Binding lifetime counters.
    pub fn stats(&self) -> BindingStats {
        self.stats
    }

    /// Number of models kept in the registry.
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Number of deferred binds waiting for a tick.
    pub fn pending_tasks(&self) -> usize {
        self.queue.pending_len()
    }

    fn start_binding(&mut self) {
        let Some(widget) = self.widget.clone() else {
            return;
        };
        let Some(path) = self.target.clone() else {
            widget.clear_model();
            return;
        };
        if !widget.is_ready() {
            log::debug!("Editor widget not ready, deferring '{}'", path);
            return;
        }

        let Some(entry) = self.store.get_entry(&path).filter(Entry::is_file) else {
            log::debug!("No file at '{}' to bind", path);
            widget.clear_model();
            return;
        };
        let Some(handle) = entry.text_handle else {
            widget.clear_model();
            return;
        };
        let language = entry
            .language
            .unwrap_or_else(|| language::guess_language(&path).to_string());

        let store = Arc::clone(&self.store);
        let model = self
            .models
            .get_or_create(&handle, &language, || store.get_file_content(&path));
        widget.set_model(model);

        let task = self.queue.schedule(handle.clone());
        self.state = BindingState::Binding { path, handle, task };
    }

    fn bind_now(&mut self, path: String, handle: String) -> bool {
        let text = match self.store.text_for(&path) {
            Some((current, text)) if current == handle => text,
            _ => {
                log::debug!("'{}' changed before its binding was ready", path);
                return false;
            }
        };
        let Some(model) = self.models.get(&handle) else {
            log::debug!("Model for '{}' was evicted before binding", path);
            return false;
        };

        let doc = self.store.doc();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            TextBinding::new(&path, &handle, doc, text, model)
        }));
        match outcome {
            Ok(Ok(binding)) => {
                self.stats.created += 1;
                self.state = BindingState::Bound(binding);
                return true;
            }
            Ok(Err(e)) => {
                log::error!("Failed to bind editor to '{}': {}", path, e);
            }
            Err(payload) => {
                log::error!(
                    "Binding editor to '{}' panicked: {}",
                    path,
                    panic_message(payload.as_ref())
                );
            }
        }

        // The next attempt starts from a fresh model
        self.stats.failures += 1;
        self.models.retain(|live| live != handle);
        false
    }

    /// Dispose the live binding or cancel the pending one.
    fn release(&mut self) {
        match std::mem::replace(&mut self.state, BindingState::Unbound) {
            BindingState::Bound(binding) => {
                binding.dispose();
                self.stats.disposed += 1;
            }
            BindingState::Binding { path, task, .. } => {
                self.queue.cancel(task);
                log::debug!("Cancelled pending bind for '{}'", path);
            }
            BindingState::Unbound => {}
        }
    }
}

impl Drop for EditorBindingManager {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for EditorBindingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorBindingManager")
            .field("phase", &self.phase())
            .field("target", &self.target)
            .field("stats", &self.stats)
            .finish()
    }
}
