//! Per-peer open tabs and active file.
//!
//! Tabs are local UI state and are never replicated. Every mutating method
//! returns whether the active file changed, so the caller knows when the
//! editor binding has to follow.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::path_utils;

/// Snapshot of the tab strip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct TabState {
    /// Open paths in display order
    pub open_files: Vec<String>,
    /// Focused path, always one of `open_files`
    pub active_file: Option<String>,
}

/// Ordered, duplicate-free list of open paths plus the active one.
#[derive(Debug, Clone, Default)]
pub struct TabController {
    open_files: Vec<String>,
    active: Option<String>,
}

impl TabController {
    /// Create an empty tab strip.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open paths in display order.
    pub fn open_files(&self) -> &[String] {
        &self.open_files
    }

    /// Focused path.
    pub fn active_file(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Whether `path` has a tab.
    pub fn is_open(&self, path: &str) -> bool {
        self.open_files.iter().any(|p| p == path)
    }

    /// Current state as a serializable snapshot.
    pub fn state(&self) -> TabState {
        TabState {
            open_files: self.open_files.clone(),
            active_file: self.active.clone(),
        }
    }

    /// Open `path` (appending if absent) and focus it.
    pub fn open_in_tab(&mut self, path: &str) -> bool {
        if !self.is_open(path) {
            self.open_files.push(path.to_string());
        }
        self.set_active(Some(path.to_string()))
    }

    /// Close the tab for `path`.
    ///
    /// When the active tab closes, focus moves to the tab now at the closed
    /// tab's index, else to the last tab, else to nothing.
    pub fn close_tab(&mut self, path: &str) -> bool {
        let Some(index) = self.open_files.iter().position(|p| p == path) else {
            return false;
        };
        self.open_files.remove(index);

        if self.active.as_deref() != Some(path) {
            return false;
        }
        let next = self
            .open_files
            .get(index)
            .or_else(|| self.open_files.last())
            .cloned();
        self.set_active(next)
    }

    /// Focus `path`, opening it first if needed; `None` clears the focus.
    pub fn set_active_file(&mut self, path: Option<&str>) -> bool {
        match path {
            Some(path) => self.open_in_tab(path),
            None => self.set_active(None),
        }
    }

    /// Close every tab whose path is no longer a file.
    pub fn reconcile<F>(&mut self, is_file: F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        let stale: Vec<String> = self
            .open_files
            .iter()
            .filter(|path| !is_file(path))
            .cloned()
            .collect();

        let mut changed = false;
        for path in stale {
            log::debug!("Closing tab for vanished file '{}'", path);
            changed |= self.close_tab(&path);
        }
        changed
    }

    /// Rewrite tab paths after `old_path` moved to `new_path`, including
    /// tabs below a renamed folder.
    pub fn remap(&mut self, old_path: &str, new_path: &str) -> bool {
        let rebase = |path: &str| {
            path_utils::rebase(path, old_path, new_path).unwrap_or_else(|| path.to_string())
        };

        let mut remapped: Vec<String> = Vec::with_capacity(self.open_files.len());
        for path in self.open_files.iter().map(|p| rebase(p)) {
            if !remapped.contains(&path) {
                remapped.push(path);
            }
        }
        self.open_files = remapped;

        let active = self.active.as_deref().map(rebase);
        self.set_active(active)
    }

    fn set_active(&mut self, path: Option<String>) -> bool {
        if self.active == path {
            return false;
        }
        self.active = path;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tabs(paths: &[&str], active: &str) -> TabController {
        let mut controller = TabController::new();
        for path in paths {
            controller.open_in_tab(path);
        }
        controller.set_active_file(Some(active));
        controller
    }

    #[test]
    fn test_open_is_idempotent() {
        let mut controller = TabController::new();
        assert!(controller.open_in_tab("a"));
        assert!(controller.open_in_tab("b"));
        assert!(controller.open_in_tab("a"));
        assert!(!controller.open_in_tab("a"));
        assert_eq!(controller.open_files(), ["a", "b"]);
        assert_eq!(controller.active_file(), Some("a"));
    }

    #[test]
    fn test_close_active_prefers_right_neighbor() {
        let mut controller = tabs(&["a", "b", "c"], "b");
        assert!(controller.close_tab("b"));
        assert_eq!(controller.active_file(), Some("c"));
    }

    #[test]
    fn test_close_active_last_falls_back_left() {
        let mut controller = tabs(&["a", "b"], "b");
        assert!(controller.close_tab("b"));
        assert_eq!(controller.active_file(), Some("a"));

        assert!(controller.close_tab("a"));
        assert_eq!(controller.active_file(), None);
        assert!(controller.open_files().is_empty());
    }

    #[test]
    fn test_close_inactive_keeps_focus() {
        let mut controller = tabs(&["a", "b", "c"], "c");
        assert!(!controller.close_tab("a"));
        assert!(!controller.close_tab("zzz"));
        assert_eq!(controller.active_file(), Some("c"));
        assert_eq!(controller.open_files(), ["b", "c"]);
    }

    #[test]
    fn test_set_active_opens_implicitly() {
        let mut controller = tabs(&["a"], "a");
        assert!(controller.set_active_file(Some("z")));
        assert_eq!(controller.open_files(), ["a", "z"]);
        assert!(controller.set_active_file(None));
        assert_eq!(controller.active_file(), None);
        assert_eq!(controller.open_files().len(), 2);
    }

    #[test]
    fn test_reconcile_closes_vanished_files() {
        let mut controller = tabs(&["src/a.ts", "src/b.ts", "x.md"], "src/b.ts");
        let changed = controller.reconcile(|path| !path.starts_with("src/"));
        assert!(changed);
        assert_eq!(controller.open_files(), ["x.md"]);
        assert_eq!(controller.active_file(), Some("x.md"));
    }

    #[test]
    fn test_remap_folder_rename() {
        let mut controller = tabs(&["src/a.ts", "srcx/b.ts", "src/c/d.ts"], "src/c/d.ts");
        assert!(controller.remap("src", "lib"));
        assert_eq!(controller.open_files(), ["lib/a.ts", "srcx/b.ts", "lib/c/d.ts"]);
        assert_eq!(controller.active_file(), Some("lib/c/d.ts"));
    }

    #[test]
    fn test_remap_onto_open_tab_dedupes() {
        let mut controller = tabs(&["a.ts", "b.ts"], "b.ts");
        controller.remap("a.ts", "b.ts");
        assert_eq!(controller.open_files(), ["b.ts"]);
        assert_eq!(controller.state().active_file.as_deref(), Some("b.ts"));
    }
}
