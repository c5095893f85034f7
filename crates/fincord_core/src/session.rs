//! One peer's view of a shared workspace.
//!
//! [`WorkspaceSession`] wires the shared store to the local UI state: every
//! change notification rebuilds the tree, closes tabs of vanished files and
//! moves the editor binding along with the active file.
//!
//! # Example
//!
//! ```
//! use fincord_core::config::EngineConfig;
//! use fincord_core::session::WorkspaceSession;
//! use fincord_core::workspace::CreateFileOptions;
//!
//! let session = WorkspaceSession::new(EngineConfig::default()).unwrap();
//!
//! // An empty workspace gets a README, which is focused right away.
//! assert_eq!(session.active_file().as_deref(), Some("README.md"));
//!
//! session
//!     .create_file("src/main.py", CreateFileOptions::with_content("print('hi')"))
//!     .unwrap();
//! assert_eq!(session.active_file().as_deref(), Some("src/main.py"));
//! assert_eq!(session.get_file_content("src/main.py"), "print('hi')");
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::commands::{CommandBus, RunRequest};
use crate::config::EngineConfig;
use crate::dispatch::ListenerGuard;
use crate::editor::{BindingPhase, BindingStats, EditorBindingManager, EditorWidget, ModelEdit};
use crate::error::Result;
use crate::path_utils;
use crate::presence::{AwarenessChannel, PeerPresence, PresenceOverlay};
use crate::tabs::{TabController, TabState};
use crate::tree::{TreeNode, TreeProjector, TreeRow};
use crate::workspace::{
    CreateFileOptions, Entry, ImportedFile, WorkspaceEvent, WorkspaceStore, is_valid_move,
};

/// Everything the tree and tab UI renders, in one serializable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// All entries, sorted by path
    pub entries: Vec<Entry>,
    /// Sorted tree
    pub tree: Vec<TreeNode>,
    /// Visible rows honoring expand state
    pub rows: Vec<TreeRow>,
    /// Tab strip
    pub tabs: TabState,
    /// Connected remote peers
    pub peers: Vec<PeerPresence>,
}

/// Local state derived from the shared store.
struct ViewState {
    entries: Vec<Entry>,
    tree: TreeProjector,
    tabs: TabController,
    editor: EditorBindingManager,
}

impl ViewState {
    /// Bring the view in line with a fresh entry snapshot.
    fn apply_entries(&mut self, entries: Vec<Entry>) {
        self.tree.rebuild(&entries);

        let files: HashSet<&str> = entries
            .iter()
            .filter(|entry| entry.is_file())
            .map(|entry| entry.path.as_str())
            .collect();
        self.tabs.reconcile(|path| files.contains(path));

        self.editor.refresh(&entries);
        self.sync_editor();
        self.entries = entries;
    }

    fn sync_editor(&mut self) {
        let active = self.tabs.active_file().map(str::to_string);
        self.editor.set_active_file(active.as_deref());
    }
}

/// A peer's session over one shared workspace.
pub struct WorkspaceSession {
    config: EngineConfig,
    store: Arc<WorkspaceStore>,
    view: Arc<Mutex<ViewState>>,
    commands: CommandBus,
    presence: Option<PresenceOverlay>,
    store_listener: Option<ListenerGuard<WorkspaceEvent>>,
}

impl WorkspaceSession {
    /// Open a session over a fresh, unshared store.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let store = Arc::new(WorkspaceStore::new(&config));
        Self::open(store, config)
    }

    /// Open a session over `store`.
    ///
    /// Seeds a README into an empty workspace and focuses the first file,
    /// as configured.
    pub fn open(store: Arc<WorkspaceStore>, config: EngineConfig) -> Result<Self> {
        let view = Arc::new(Mutex::new(ViewState {
            entries: Vec::new(),
            tree: TreeProjector::new(),
            tabs: TabController::new(),
            editor: EditorBindingManager::new(Arc::clone(&store)),
        }));

        let weak_view: Weak<Mutex<ViewState>> = Arc::downgrade(&view);
        let listener = store.subscribe_scoped(Arc::new(move |event: &WorkspaceEvent| {
            if let Some(view) = weak_view.upgrade() {
                lock(&view).apply_entries(event.entries().to_vec());
            }
        }));

        let session = Self {
            commands: CommandBus::new(),
            presence: None,
            store_listener: Some(listener),
            config,
            store,
            view,
        };

        if session.config.bootstrap_readme {
            session.store.bootstrap_if_empty()?;
        }

        let entries = session.store.list_entries();
        let mut view = session.view();
        if session.config.open_first_file
            && view.tabs.active_file().is_none()
            && let Some(first) = entries.iter().find(|entry| entry.is_file())
        {
            log::debug!("Focusing first file '{}'", first.path);
            view.tabs.open_in_tab(&first.path);
        }
        view.apply_entries(entries);
        drop(view);

        Ok(session)
    }

    /// The shared store.
    pub fn store(&self) -> &Arc<WorkspaceStore> {
        &self.store
    }

    /// The command bus shared with the execution subsystem.
    pub fn commands(&self) -> &CommandBus {
        &self.commands
    }

    /// Engine configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ==================== File operations ====================

    /// Create a file and, when it was created, open it in a tab.
    pub fn create_file(&self, path: &str, options: CreateFileOptions) -> Result<bool> {
        let created = self.store.create_file(path, options)?;
        if created {
            let path = path_utils::normalize(path);
            let mut view = self.view();
            view.tabs.open_in_tab(&path);
            view.sync_editor();
        }
        Ok(created)
    }

    /// Create a folder.
    pub fn create_folder(&self, path: &str) -> Result<bool> {
        self.store.create_folder(path)
    }

    /// Delete a file, or a folder with its subtree. Tabs of deleted files
    /// close.
    pub fn delete_entry(&self, path: &str) -> bool {
        self.store.delete_entry(path)
    }

    /// Rename a file or folder; open tabs follow the move.
    pub fn rename_entry(&self, old_path: &str, new_path: &str) -> Result<bool> {
        let old_path = path_utils::normalize(old_path);
        let new_path = path_utils::normalize(new_path);
        if !is_valid_move(&old_path, &new_path) || !self.store.contains(&old_path) {
            return Ok(false);
        }

        // Tabs move first, so the change notification finds them at their
        // new paths instead of closing them.
        self.view().tabs.remap(&old_path, &new_path);

        let renamed = self.store.rename_entry(&old_path, &new_path);
        if !matches!(renamed, Ok(true)) {
            let mut view = self.view();
            view.tabs.remap(&new_path, &old_path);
            let entries = self.store.list_entries();
            view.apply_entries(entries);
        }
        renamed
    }

    /// Import files, creating intermediate folders.
    pub fn import_files<I>(&self, files: I) -> Result<usize>
    where
        I: IntoIterator<Item = ImportedFile>,
    {
        self.store.import_files(files)
    }

    /// Content of the file at `path`, or `""`.
    pub fn get_file_content(&self, path: &str) -> String {
        self.store.get_file_content(path)
    }

    /// All entries, sorted by path.
    pub fn entries(&self) -> Vec<Entry> {
        self.view().entries.clone()
    }

    // ==================== Tabs ====================

    /// Open the file at `path` in a tab and focus it. Returns `false` when
    /// `path` is not a file.
    pub fn open_in_tab(&self, path: &str) -> bool {
        if !self.store.get_entry(path).is_some_and(|entry| entry.is_file()) {
            return false;
        }
        let path = path_utils::normalize(path);
        let mut view = self.view();
        view.tabs.open_in_tab(&path);
        view.sync_editor();
        true
    }

    /// Close the tab for `path`.
    pub fn close_tab(&self, path: &str) {
        let mut view = self.view();
        if view.tabs.close_tab(path) {
            view.sync_editor();
        }
    }

    /// Focus `path` (opening it if needed), or clear the focus.
    pub fn set_active_file(&self, path: Option<&str>) {
        let path = path.map(path_utils::normalize);
        if let Some(path) = path.as_deref()
            && !self.store.get_entry(path).is_some_and(|entry| entry.is_file())
        {
            log::debug!("Ignoring focus of non-file '{}'", path);
            return;
        }
        let mut view = self.view();
        if view.tabs.set_active_file(path.as_deref()) {
            view.sync_editor();
        }
    }

    /// Focused path.
    pub fn active_file(&self) -> Option<String> {
        self.view().tabs.active_file().map(str::to_string)
    }

    /// Tab strip state.
    pub fn tabs(&self) -> TabState {
        self.view().tabs.state()
    }

    // ==================== Tree ====================

    /// Flip a folder's expand state; returns the new state.
    pub fn toggle_folder(&self, path: &str) -> bool {
        self.view().tree.toggle(path)
    }

    /// Expand or collapse a folder.
    pub fn set_expanded(&self, path: &str, expanded: bool) {
        self.view().tree.set_expanded(path, expanded);
    }

    /// Sorted tree.
    pub fn tree(&self) -> Vec<TreeNode> {
        self.view().tree.roots().to_vec()
    }

    /// Visible rows honoring expand state.
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        self.view().tree.visible_rows()
    }

    /// Box-drawing rendering of the tree.
    pub fn format_tree(&self) -> String {
        self.view().tree.format_tree()
    }

    // ==================== Editor ====================

    /// Attach the editor widget.
    pub fn mount_editor(&self, widget: Arc<dyn EditorWidget>) {
        self.view().editor.mount(widget);
    }

    /// Detach the editor widget.
    pub fn unmount_editor(&self) {
        self.view().editor.unmount();
    }

    /// One turn of the host event loop: runs deferred binds.
    pub fn tick(&self) -> bool {
        self.view().editor.tick()
    }

    /// Push a local edit from the widget into the active file.
    pub fn edit(&self, edit: &ModelEdit) -> Result<bool> {
        self.view().editor.edit(edit)
    }

    /// Editor binding phase.
    pub fn binding_phase(&self) -> BindingPhase {
        self.view().editor.phase()
    }

    /// Binding lifetime counters.
    pub fn binding_stats(&self) -> BindingStats {
        self.view().editor.stats()
    }

    // ==================== Presence ====================

    /// Start tracking peers on `channel`, replacing any previous overlay.
    pub fn attach_presence(&mut self, channel: Arc<dyn AwarenessChannel>) -> &PresenceOverlay {
        self.presence
            .insert(PresenceOverlay::new(channel, self.config.presence.clone()))
    }

    /// The presence overlay, if attached.
    pub fn presence(&self) -> Option<&PresenceOverlay> {
        self.presence.as_ref()
    }

    // ==================== Execution ====================

    /// Send the active file to the run handler.
    ///
    /// Returns `false` when no file is active or nobody handles runs.
    pub fn run_active_file(&self) -> bool {
        let Some(path) = self.active_file() else {
            log::debug!("Run requested with no active file");
            return false;
        };
        if !self.store.get_entry(&path).is_some_and(|entry| entry.is_file()) {
            return false;
        }
        let request = RunRequest::for_file(&path, self.store.get_file_content(&path));
        self.commands.dispatch_run(&request)
    }

    // ==================== Lifecycle ====================

    /// Serializable view for the UI.
    pub fn snapshot(&self) -> SessionSnapshot {
        let peers = self
            .presence
            .as_ref()
            .map(PresenceOverlay::peers)
            .unwrap_or_default();
        let view = self.view();
        SessionSnapshot {
            entries: view.entries.clone(),
            tree: view.tree.roots().to_vec(),
            rows: view.tree.visible_rows(),
            tabs: view.tabs.state(),
            peers,
        }
    }

    /// Release every listener, pending task and binding.
    pub fn teardown(&mut self) {
        self.store_listener.take();
        self.presence.take();
        self.view().editor.teardown();
        log::debug!("Session torn down");
    }

    fn view(&self) -> MutexGuard<'_, ViewState> {
        lock(&self.view)
    }
}

impl Drop for WorkspaceSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for WorkspaceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceSession")
            .field("store", &self.store)
            .field("presence", &self.presence)
            .finish()
    }
}

fn lock(view: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    view.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::MemoryAwarenessHub;
    use crate::test_utils::ready_widget;
    use crate::workspace::README_PATH;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quiet_config() -> EngineConfig {
        EngineConfig {
            bootstrap_readme: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_open_bootstraps_and_focuses_readme() {
        let session = WorkspaceSession::new(EngineConfig::default()).unwrap();
        assert_eq!(session.active_file().as_deref(), Some(README_PATH));
        assert_eq!(session.tabs().open_files, vec![README_PATH.to_string()]);
    }

    #[test]
    fn test_open_without_bootstrap_stays_empty() {
        let session = WorkspaceSession::new(quiet_config()).unwrap();
        assert!(session.entries().is_empty());
        assert!(session.active_file().is_none());
    }

    #[test]
    fn test_create_opens_tab_and_updates_tree() {
        let session = WorkspaceSession::new(quiet_config()).unwrap();
        assert!(
            session
                .create_file("src/a.ts", CreateFileOptions::default())
                .unwrap()
        );
        assert_eq!(session.active_file().as_deref(), Some("src/a.ts"));
        assert_eq!(session.format_tree(), "src/\n└── a.ts\n");

        // Second create is a no-op and does not steal focus
        session.create_file("b.ts", CreateFileOptions::default()).unwrap();
        session.set_active_file(Some("src/a.ts"));
        assert!(!session.create_file("b.ts", CreateFileOptions::default()).unwrap());
        assert_eq!(session.active_file().as_deref(), Some("src/a.ts"));
    }

    #[test]
    fn test_delete_closes_tabs_with_fallback() {
        let session = WorkspaceSession::new(quiet_config()).unwrap();
        for path in ["a.ts", "src/b.ts", "c.ts"] {
            session.create_file(path, CreateFileOptions::default()).unwrap();
        }
        session.set_active_file(Some("src/b.ts"));

        assert!(session.delete_entry("src"));
        assert_eq!(session.tabs().open_files, vec!["a.ts", "c.ts"]);
        assert_eq!(session.active_file().as_deref(), Some("c.ts"));
    }

    #[test]
    fn test_rename_keeps_tabs_open() {
        let session = WorkspaceSession::new(quiet_config()).unwrap();
        session
            .create_file("src/a.ts", CreateFileOptions::with_content("a"))
            .unwrap();
        session.create_file("x.md", CreateFileOptions::default()).unwrap();
        session.set_active_file(Some("src/a.ts"));

        assert!(session.rename_entry("src", "lib").unwrap());
        assert_eq!(session.tabs().open_files, vec!["lib/a.ts", "x.md"]);
        assert_eq!(session.active_file().as_deref(), Some("lib/a.ts"));
        assert_eq!(session.get_file_content("lib/a.ts"), "a");
    }

    #[test]
    fn test_rejected_rename_restores_tabs() {
        let session = WorkspaceSession::new(quiet_config()).unwrap();
        session.create_file("a.ts", CreateFileOptions::default()).unwrap();
        session.create_file("f.txt", CreateFileOptions::default()).unwrap();
        session.set_active_file(Some("a.ts"));

        // Cannot move under a file
        assert!(!session.rename_entry("a.ts", "f.txt/a.ts").unwrap());
        assert!(session.tabs().open_files.contains(&"a.ts".to_string()));
        assert_eq!(session.active_file().as_deref(), Some("a.ts"));
    }

    #[test]
    fn test_open_in_tab_rejects_folders() {
        let session = WorkspaceSession::new(quiet_config()).unwrap();
        session.create_folder("docs").unwrap();
        assert!(!session.open_in_tab("docs"));
        assert!(!session.open_in_tab("missing.ts"));
        session.set_active_file(Some("docs"));
        assert!(session.active_file().is_none());
    }

    #[test]
    fn test_editor_follows_active_file() {
        let session = WorkspaceSession::new(quiet_config()).unwrap();
        session
            .create_file("a.ts", CreateFileOptions::with_content("A"))
            .unwrap();
        session
            .create_file("b.ts", CreateFileOptions::with_content("B"))
            .unwrap();

        let widget = ready_widget();
        session.mount_editor(widget.clone());
        session.tick();
        assert_eq!(session.binding_phase(), BindingPhase::Bound);
        assert_eq!(widget.current_content().as_deref(), Some("B"));

        session.set_active_file(Some("a.ts"));
        session.tick();
        assert_eq!(widget.current_content().as_deref(), Some("A"));

        session.delete_entry("a.ts");
        session.tick();
        assert_eq!(widget.current_content().as_deref(), Some("B"));
        let stats = session.binding_stats();
        assert_eq!(stats.created, stats.disposed + 1);
    }

    #[test]
    fn test_run_active_file() {
        let session = WorkspaceSession::new(quiet_config()).unwrap();
        assert!(!session.run_active_file());

        session
            .create_file("main.py", CreateFileOptions::with_content("print(1)"))
            .unwrap();
        assert!(!session.run_active_file(), "no handler registered");

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let _guard = session.commands().on_run(Arc::new(move |request: &RunRequest| {
            assert_eq!(request.language, "python");
            assert_eq!(request.content, "print(1)");
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(session.run_active_file());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_includes_peers() {
        let hub = MemoryAwarenessHub::new();
        let mut session = WorkspaceSession::new(EngineConfig::default()).unwrap();
        session.attach_presence(Arc::new(hub.connect()));

        let other = PresenceOverlay::new(Arc::new(hub.connect()), Default::default());
        other.publish_identity("Grace", None);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.peers.len(), 1);
        assert_eq!(snapshot.peers[0].label, "Grace");
        assert_eq!(snapshot.tabs.active_file.as_deref(), Some(README_PATH));
        assert_eq!(snapshot.rows.len(), 1);
    }

    #[test]
    fn test_teardown_releases_store_listener() {
        let store = Arc::new(WorkspaceStore::new(&quiet_config()));
        let mut session = WorkspaceSession::open(Arc::clone(&store), quiet_config()).unwrap();
        session.mount_editor(ready_widget());
        session.create_file("a.ts", CreateFileOptions::default()).unwrap();

        session.teardown();
        assert_eq!(session.binding_phase(), BindingPhase::Unbound);

        store.create_file("b.ts", CreateFileOptions::default()).unwrap();
        assert_eq!(session.entries().len(), 1, "view no longer follows the store");
    }
}
