//! The shared workspace store.
//!
//! [`WorkspaceStore`] owns a Y.Doc holding:
//! - A Y.Map (named `files` by default) from path to a JSON-encoded
//!   [`EntryRecord`]
//! - One root-level Y.Text per file, named by the record's text handle
//!
//! Every multi-key mutation (recursive delete, folder rename) runs inside a
//! single transaction, so peers observe it atomically. Change notifications
//! are buffered while the transaction runs and published afterwards through
//! [`WorkspaceStore::subscribe`].

use std::sync::{Arc, Mutex};

use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{
    Doc, GetString, Map, MapRef, Observable, ReadTxn, StateVector, Text, TextRef, Transact,
    TransactionMut, Update,
};

use super::events::{self, ChangeKind, PathChange, WorkspaceEvent};
use super::types::{CreateFileOptions, Entry, EntryKind, EntryRecord, ImportedFile};
use crate::config::EngineConfig;
use crate::dispatch::{CallbackRegistry, EventCallback, ListenerGuard, SubscriptionId};
use crate::error::{FincordError, Result};
use crate::language;
use crate::path_utils;

/// Prefix of every text handle.
pub const TEXT_HANDLE_PREFIX: &str = "file:";

/// Path of the file seeded into an empty workspace.
pub const README_PATH: &str = "README.md";

const WELCOME_CONTENT: &str = "# Welcome to Fincord

Fincord is a collaborative, real-time code editor. Everything in this
workspace is shared with the people you invite.

## Getting started

You currently have no other files, so this `README.md` was created for you.

- Use **+ File** in the Explorer to create a file
- Use **+ Folder** to structure your project
- Use **Import** to load an existing project

## Tips

- Click any file to open it in a new tab
- Rename and delete files straight from the Explorer
- The terminal detects the file language and runs it
";

/// Shared file tree and file contents for one workspace.
pub struct WorkspaceStore {
    doc: Doc,
    files_map: MapRef,
    default_language: String,
    events: CallbackRegistry<WorkspaceEvent>,
    pending: Arc<Mutex<Vec<PathChange>>>,
    _files_subscription: yrs::Subscription,
}

impl WorkspaceStore {
    /// Create a store over a fresh document.
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_doc(Doc::new(), config)
    }

    /// Create a store over an existing document (e.g. one already attached
    /// to a sync provider).
    pub fn with_doc(doc: Doc, config: &EngineConfig) -> Self {
        let files_map = doc.get_or_insert_map(config.files_map_name.as_str());
        let pending: Arc<Mutex<Vec<PathChange>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&pending);
        let subscription = files_map.observe(move |txn, event| {
            let mut sink = sink.lock().unwrap_or_else(|e| e.into_inner());
            for (key, change) in event.keys(txn).iter() {
                let change = match change {
                    yrs::types::EntryChange::Removed(_) => PathChange::removed(key.to_string()),
                    yrs::types::EntryChange::Inserted(_)
                    | yrs::types::EntryChange::Updated(_, _) => {
                        PathChange::upserted(key.to_string())
                    }
                };
                sink.push(change);
            }
        });

        Self {
            doc,
            files_map,
            default_language: config.default_language.clone(),
            events: CallbackRegistry::new(),
            pending,
            _files_subscription: subscription,
        }
    }

    /// Get a reference to the underlying Y.Doc.
    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    // ==================== Queries ====================

    /// Get the entry at `path`, if any.
    pub fn get_entry(&self, path: &str) -> Option<Entry> {
        let path = path_utils::normalize(path);
        let txn = self.doc.transact();
        self.read_record(&txn, &path)
            .map(|record| Entry::from_record(&path, record))
    }

    /// Whether an entry exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        let path = path_utils::normalize(path);
        let txn = self.doc.transact();
        self.files_map.contains_key(&txn, &path)
    }

    /// All entries, sorted by path. Undecodable records are skipped.
    pub fn list_entries(&self) -> Vec<Entry> {
        let txn = self.doc.transact();
        let mut entries: Vec<Entry> = self
            .files_map
            .iter(&txn)
            .filter_map(|(key, value)| {
                let json = value.to_string(&txn);
                match serde_json::from_str::<EntryRecord>(&json) {
                    Ok(record) => Some(Entry::from_record(key, record)),
                    Err(e) => {
                        log::warn!("Skipping undecodable entry '{}': {}", key, e);
                        None
                    }
                }
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// Number of keys in the shared map.
    pub fn entry_count(&self) -> usize {
        let txn = self.doc.transact();
        self.files_map.len(&txn) as usize
    }

    /// Current content of the file at `path`.
    ///
    /// Returns an empty string for folders, missing paths, and files whose
    /// text has never been written.
    pub fn get_file_content(&self, path: &str) -> String {
        match self.text_for(path) {
            Some((_, text)) => {
                let txn = self.doc.transact();
                text.get_string(&txn)
            }
            None => String::new(),
        }
    }

    /// Text handle of the file at `path`.
    pub fn text_handle(&self, path: &str) -> Option<String> {
        self.get_entry(path).and_then(|entry| entry.text_handle)
    }

    /// The text handle and shared text of the file at `path`.
    pub fn text_for(&self, path: &str) -> Option<(String, TextRef)> {
        let entry = self.get_entry(path)?;
        if !entry.is_file() {
            return None;
        }
        let handle = entry.text_handle?;
        let text = self.doc.get_or_insert_text(handle.as_str());
        Some((handle, text))
    }

    // ==================== Mutations ====================

    /// Create a file at `path`.
    ///
    /// Missing ancestor folders are created in the same transaction. Returns
    /// `Ok(false)` without touching anything when `path` is empty, already
    /// exists, or has a file among its ancestors.
    pub fn create_file(&self, path: &str, options: CreateFileOptions) -> Result<bool> {
        let path = path_utils::normalize(path);
        if path.is_empty() || !self.can_place(&path) {
            return Ok(false);
        }

        let language = options
            .language
            .unwrap_or_else(|| self.language_for(&path));
        let handle = new_text_handle();
        // Root types must be created outside of a transaction.
        let text = self.doc.get_or_insert_text(handle.as_str());
        let record_json = serde_json::to_string(&EntryRecord::file(&path, handle, language))?;

        let created = {
            let mut txn = self.doc.transact_mut();
            let exists = self.files_map.contains_key(&txn, &path);
            if exists || !self.ensure_ancestors(&mut txn, &path)? {
                false
            } else {
                let content = options.content.unwrap_or_default();
                let len = text.len(&txn);
                if len > 0 {
                    text.remove_range(&mut txn, 0, len);
                }
                if !content.is_empty() {
                    text.insert(&mut txn, 0, &content);
                }
                self.files_map.insert(&mut txn, path.as_str(), record_json);
                true
            }
        };

        if created {
            log::debug!("Created file '{}'", path);
        }
        self.flush_changes();
        Ok(created)
    }

    /// Create a folder at `path`, plus any missing ancestors.
    ///
    /// Returns `Ok(false)` when `path` is empty or already exists.
    pub fn create_folder(&self, path: &str) -> Result<bool> {
        let path = path_utils::normalize(path);
        if path.is_empty() || self.contains(&path) {
            return Ok(false);
        }

        let record_json = serde_json::to_string(&EntryRecord::folder(&path))?;
        let created = {
            let mut txn = self.doc.transact_mut();
            let exists = self.files_map.contains_key(&txn, &path);
            if exists || !self.ensure_ancestors(&mut txn, &path)? {
                false
            } else {
                self.files_map.insert(&mut txn, path.as_str(), record_json);
                true
            }
        };

        if created {
            log::debug!("Created folder '{}'", path);
        }
        self.flush_changes();
        Ok(created)
    }

    /// Delete the entry at `path`; folders take their whole subtree along.
    ///
    /// Returns `false` when nothing exists at `path`. Text objects are left
    /// in the document as unreachable data.
    pub fn delete_entry(&self, path: &str) -> bool {
        let path = path_utils::normalize(path);
        let removed = {
            let mut txn = self.doc.transact_mut();
            match self.read_record(&txn, &path) {
                None => 0,
                Some(record) => {
                    let mut doomed: Vec<String> = Vec::new();
                    if record.kind == EntryKind::Folder {
                        doomed.extend(
                            self.files_map
                                .keys(&txn)
                                .filter(|key| path_utils::is_descendant(key, &path))
                                .map(String::from),
                        );
                    }
                    doomed.push(path.clone());
                    for key in &doomed {
                        self.files_map.remove(&mut txn, key);
                    }
                    doomed.len()
                }
            }
        };

        if removed > 0 {
            log::debug!("Deleted '{}' ({} entries)", path, removed);
        }
        self.flush_changes();
        removed > 0
    }

    /// Move the entry at `old_path` (and, for folders, its subtree) to
    /// `new_path`.
    ///
    /// No-op returning `Ok(false)` when the paths are equal, the source is
    /// missing, or `new_path` lies inside the source's own subtree. An
    /// existing entry at `new_path` of the same kind is replaced together
    /// with its subtree; one of the other kind, or an ancestor of the
    /// source, is left alone and the rename is refused. Missing ancestors of
    /// `new_path` are created.
    pub fn rename_entry(&self, old_path: &str, new_path: &str) -> Result<bool> {
        let old_path = path_utils::normalize(old_path);
        let new_path = path_utils::normalize(new_path);
        if !is_valid_move(&old_path, &new_path) {
            if path_utils::is_descendant(&new_path, &old_path) {
                log::warn!(
                    "Refusing to move '{}' into its own subtree ('{}')",
                    old_path,
                    new_path
                );
            }
            return Ok(false);
        }

        let moved = {
            let mut txn = self.doc.transact_mut();
            let Some(record) = self.read_record(&txn, &old_path) else {
                return Ok(false);
            };
            let source_kind = record.kind;

            // (old key, new key, payload to write)
            let mut moves: Vec<(String, String, String)> = Vec::new();
            if source_kind == EntryKind::Folder {
                for (key, value) in self.files_map.iter(&txn) {
                    let Some(target) = path_utils::rebase(key, &old_path, &new_path) else {
                        continue;
                    };
                    let json = value.to_string(&txn);
                    let payload = match serde_json::from_str::<EntryRecord>(&json) {
                        Ok(record) => serde_json::to_string(&record.moved_to(&target))?,
                        // Unknown payloads move as-is
                        Err(_) => json,
                    };
                    moves.push((key.to_string(), target, payload));
                }
            } else {
                let payload = serde_json::to_string(&record.moved_to(&new_path))?;
                moves.push((old_path.clone(), new_path.clone(), payload));
            }

            let mut replaced: Vec<String> = Vec::new();
            if let Some(target) = self.read_record(&txn, &new_path) {
                if target.kind != source_kind {
                    log::warn!(
                        "Refusing to replace {:?} '{}' with {:?} '{}'",
                        target.kind,
                        new_path,
                        source_kind,
                        old_path
                    );
                    return Ok(false);
                }
                if path_utils::is_descendant(&old_path, &new_path) {
                    log::warn!(
                        "Refusing to replace '{}' with its own descendant '{}'",
                        new_path,
                        old_path
                    );
                    return Ok(false);
                }
                replaced.extend(
                    self.files_map
                        .keys(&txn)
                        .filter(|key| path_utils::is_same_or_descendant(key, &new_path))
                        .map(String::from),
                );
                log::debug!(
                    "Rename of '{}' replaces '{}' ({} entries)",
                    old_path,
                    new_path,
                    replaced.len()
                );
            }
            if !self.ensure_ancestors(&mut txn, &new_path)? {
                return Ok(false);
            }
            for key in &replaced {
                self.files_map.remove(&mut txn, key);
            }
            for (old_key, _, _) in &moves {
                self.files_map.remove(&mut txn, old_key);
            }
            for (_, new_key, payload) in &moves {
                self.files_map
                    .insert(&mut txn, new_key.as_str(), payload.as_str());
            }
            moves.len()
        };

        log::debug!(
            "Renamed '{}' -> '{}' ({} entries)",
            old_path,
            new_path,
            moved
        );
        self.flush_changes();
        Ok(true)
    }

    /// Insert `text` into the file at `path` at byte `index`.
    ///
    /// The index is clamped to the current length and moved back to the
    /// start of the character it falls in. Returns `false` when `path` is
    /// not a file.
    pub fn insert_text(&self, path: &str, index: u32, text: &str) -> bool {
        let Some((_, shared)) = self.text_for(path) else {
            return false;
        };
        let mut txn = self.doc.transact_mut();
        let index = floor_char_boundary(&shared.get_string(&txn), index);
        shared.insert(&mut txn, index, text);
        true
    }

    /// Delete up to `length` bytes starting at `index` from the file at
    /// `path`. Returns `false` when `path` is not a file.
    ///
    /// Both ends of the range are clamped and moved back to character
    /// boundaries.
    pub fn delete_text(&self, path: &str, index: u32, length: u32) -> bool {
        let Some((_, shared)) = self.text_for(path) else {
            return false;
        };
        let mut txn = self.doc.transact_mut();
        let current = shared.get_string(&txn);
        let start = floor_char_boundary(&current, index);
        let end = floor_char_boundary(&current, index.saturating_add(length));
        if end > start {
            shared.remove_range(&mut txn, start, end - start);
        }
        true
    }

    /// Replace the whole content of the file at `path`.
    pub fn set_file_content(&self, path: &str, content: &str) -> bool {
        let Some((_, shared)) = self.text_for(path) else {
            return false;
        };
        let mut txn = self.doc.transact_mut();
        let len = shared.len(&txn);
        if len > 0 {
            shared.remove_range(&mut txn, 0, len);
        }
        if !content.is_empty() {
            shared.insert(&mut txn, 0, content);
        }
        true
    }

    /// Seed a welcome README when the shared map is empty.
    ///
    /// Returns `Ok(true)` when the README was created.
    pub fn bootstrap_if_empty(&self) -> Result<bool> {
        if self.entry_count() > 0 {
            return Ok(false);
        }
        log::debug!("Workspace is empty, seeding {}", README_PATH);
        self.create_file(
            README_PATH,
            CreateFileOptions::with_content(WELCOME_CONTENT).language("markdown"),
        )
    }

    /// Import a batch of files, creating intermediate folders as needed.
    ///
    /// Paths that already exist are skipped. Returns the number of files
    /// created.
    pub fn import_files<I>(&self, files: I) -> Result<usize>
    where
        I: IntoIterator<Item = ImportedFile>,
    {
        let mut created = 0;
        for file in files {
            let path = path_utils::normalize(&file.path);
            if self.create_file(&path, CreateFileOptions::with_content(file.content))? {
                created += 1;
            } else {
                log::debug!("Import skipped existing path '{}'", path);
            }
        }
        Ok(created)
    }

    // ==================== Change notifications ====================

    /// Subscribe to workspace events.
    pub fn subscribe(&self, callback: EventCallback<WorkspaceEvent>) -> SubscriptionId {
        self.events.subscribe(callback)
    }

    /// Subscribe with a guard that unsubscribes on drop.
    pub fn subscribe_scoped(
        &self,
        callback: EventCallback<WorkspaceEvent>,
    ) -> ListenerGuard<WorkspaceEvent> {
        self.events.subscribe_scoped(callback)
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Publish buffered map changes to subscribers.
    ///
    /// Called after every mutation made through the store. Hosts that apply
    /// updates to [`doc`](Self::doc) directly call it themselves. Returns the
    /// number of changed paths published.
    pub fn flush_changes(&self) -> usize {
        let raw = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *pending)
        };
        if raw.is_empty() {
            return 0;
        }

        let changes = events::coalesce(raw);
        let count = changes.len();
        let removed = changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Removed)
            .count();
        log::debug!("Publishing {} entry changes ({} removed)", count, removed);

        let event = WorkspaceEvent::entries_changed(changes, self.list_entries());
        let failures = self.events.emit(&event);
        if failures > 0 {
            log::warn!("{} workspace listeners failed", failures);
        }
        count
    }

    // ==================== Sync Operations ====================

    /// Encode the current state vector for sync handshake.
    pub fn encode_state_vector(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.state_vector().encode_v1()
    }

    /// Encode the full document state as an update.
    pub fn encode_state_as_update(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Encode only the updates that the remote peer is missing.
    pub fn encode_diff(&self, remote_state_vector: &[u8]) -> Result<Vec<u8>> {
        let sv = StateVector::decode_v1(remote_state_vector)
            .map_err(|e| FincordError::Crdt(format!("Failed to decode state vector: {}", e)))?;

        let txn = self.doc.transact();
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    /// Apply an update from a remote peer and publish the resulting changes.
    pub fn apply_update(&self, update: &[u8]) -> Result<()> {
        let decoded = Update::decode_v1(update)
            .map_err(|e| FincordError::Crdt(format!("Failed to decode update: {}", e)))?;

        {
            let mut txn = self.doc.transact_mut();
            txn.apply_update(decoded)
                .map_err(|e| FincordError::Crdt(format!("Failed to apply update: {}", e)))?;
        }

        self.flush_changes();
        Ok(())
    }

    /// Subscribe to binary document updates, e.g. to forward them to peers.
    pub fn observe_updates<F>(&self, callback: F) -> Result<yrs::Subscription>
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.doc
            .observe_update_v1(move |_txn, event| {
                callback(&event.update);
            })
            .map_err(|e| FincordError::Crdt(format!("Failed to observe document updates: {}", e)))
    }

    // ==================== Helpers ====================

    fn read_record<T: ReadTxn>(&self, txn: &T, path: &str) -> Option<EntryRecord> {
        let value = self.files_map.get(txn, path)?;
        let json = value.to_string(txn);
        match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Undecodable record at '{}': {}", path, e);
                None
            }
        }
    }

    /// Whether a new entry could go at `path`: nothing exists there and no
    /// ancestor is a file.
    fn can_place(&self, path: &str) -> bool {
        let txn = self.doc.transact();
        if self.files_map.contains_key(&txn, path) {
            return false;
        }
        path_utils::ancestors(path).iter().all(|ancestor| {
            self.read_record(&txn, ancestor)
                .is_none_or(|record| record.kind == EntryKind::Folder)
        })
    }

    /// Create missing ancestor folders of `path`. Returns `false`, writing
    /// nothing, when an ancestor exists as a file.
    fn ensure_ancestors(&self, txn: &mut TransactionMut, path: &str) -> Result<bool> {
        let mut missing = Vec::new();
        for ancestor in path_utils::ancestors(path) {
            match self.read_record(&*txn, &ancestor) {
                Some(record) if record.kind == EntryKind::Folder => {}
                Some(_) => {
                    log::warn!("Cannot place '{}' under file '{}'", path, ancestor);
                    return Ok(false);
                }
                None => missing.push(ancestor),
            }
        }
        for ancestor in missing {
            let json = serde_json::to_string(&EntryRecord::folder(&ancestor))?;
            self.files_map.insert(txn, ancestor.as_str(), json);
        }
        Ok(true)
    }

    fn language_for(&self, path: &str) -> String {
        match language::guess_language(path) {
            language::PLAINTEXT => self.default_language.clone(),
            guessed => guessed.to_string(),
        }
    }
}

impl std::fmt::Debug for WorkspaceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceStore")
            .field("entry_count", &self.entry_count())
            .field("subscribers", &self.events.subscriber_count())
            .finish()
    }
}

/// A fresh text handle, unique per created file.
fn new_text_handle() -> String {
    format!("{}{}", TEXT_HANDLE_PREFIX, uuid::Uuid::new_v4())
}

/// Clamp byte `index` to `s` and move it back to a character boundary.
pub(crate) fn floor_char_boundary(s: &str, index: u32) -> u32 {
    let mut index = (index as usize).min(s.len());
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index as u32
}

/// Whether moving `old_path` to `new_path` is a meaningful, cycle-free move.
pub(crate) fn is_valid_move(old_path: &str, new_path: &str) -> bool {
    !old_path.is_empty()
        && !new_path.is_empty()
        && old_path != new_path
        && !path_utils::is_descendant(new_path, old_path)
}
