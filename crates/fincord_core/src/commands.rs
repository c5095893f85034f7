//! Command bus between UI triggers and the execution subsystem.
//!
//! A toolbar button (the trigger) and a terminal panel (the target) share
//! one [`CommandBus`]. The terminal registers a run handler; the trigger
//! dispatches a [`RunRequest`] built from the active file.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::dispatch::{CallbackRegistry, EventCallback, ListenerGuard};
use crate::language;
use crate::path_utils;

/// Everything the execution subsystem needs to run one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Workspace path of the file
    pub path: String,
    /// Lowercased extension, if any
    pub extension: Option<String>,
    /// Language detected from the extension
    pub language: String,
    /// File content at dispatch time
    pub content: String,
}

impl RunRequest {
    /// Build a request for `path`, detecting the language from its extension.
    pub fn for_file(path: &str, content: String) -> Self {
        Self {
            path: path.to_string(),
            extension: path_utils::extension(path),
            language: language::guess_language(path).to_string(),
            content,
        }
    }
}

/// Shared command channel. Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct CommandBus {
    run: Arc<CallbackRegistry<RunRequest>>,
}

impl CommandBus {
    /// Create a bus with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run handler; it stays registered while the guard lives.
    pub fn on_run(&self, handler: EventCallback<RunRequest>) -> ListenerGuard<RunRequest> {
        self.run.subscribe_scoped(handler)
    }

    /// Whether any run handler is registered.
    pub fn has_run_handler(&self) -> bool {
        self.run.has_subscribers()
    }

    /// Send `request` to every run handler. Returns `false` when nobody is
    /// listening.
    pub fn dispatch_run(&self, request: &RunRequest) -> bool {
        if !self.run.has_subscribers() {
            log::debug!("No run handler registered for '{}'", request.path);
            return false;
        }
        log::debug!("Dispatching run of '{}' ({})", request.path, request.language);
        let failures = self.run.emit(request);
        if failures > 0 {
            log::warn!("{} run handlers failed for '{}'", failures, request.path);
        }
        true
    }
}

impl std::fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBus")
            .field("run_handlers", &self.run.subscriber_count())
            .finish()
    }
}
