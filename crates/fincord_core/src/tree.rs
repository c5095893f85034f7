//! Hierarchical view of the flat workspace map.
//!
//! The tree is a materialized view: [`TreeProjector::rebuild`] recomputes it
//! from a full entry list on every change notification. Expand/collapse
//! state is local to this peer and never replicated.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::workspace::{Entry, EntryKind};

/// A node in the workspace tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Full workspace path
    pub path: String,
    /// Display name (last path segment)
    pub name: String,
    /// File or folder
    pub kind: EntryKind,
    /// Language hint for files
    pub language: Option<String>,
    /// Sorted children (always empty for files)
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn leaf(entry: &Entry) -> Self {
        Self {
            path: entry.path.clone(),
            name: entry.name.clone(),
            kind: entry.kind,
            language: entry.language.clone(),
            children: Vec::new(),
        }
    }

    /// Whether this node is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// One line of the flattened, expand-aware tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct TreeRow {
    /// Full workspace path
    pub path: String,
    /// Display name
    pub name: String,
    /// File or folder
    pub kind: EntryKind,
    /// Nesting depth, 0 for roots
    pub depth: usize,
    /// Expand state (always false for files)
    pub expanded: bool,
}

/// Sibling order: folders before files, then names case-insensitively with
/// lowercase first on ties.
pub fn compare_nodes(a: &TreeNode, b: &TreeNode) -> Ordering {
    match (a.kind, b.kind) {
        (EntryKind::Folder, EntryKind::File) => Ordering::Less,
        (EntryKind::File, EntryKind::Folder) => Ordering::Greater,
        _ => compare_names(&a.name, &b.name),
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        // Byte order puts uppercase first; invert it
        .then_with(|| b.cmp(a))
}

/// Builds the tree and tracks which folders are expanded.
#[derive(Debug, Default)]
pub struct TreeProjector {
    roots: Vec<TreeNode>,
    /// Folders seen at least once, so defaults apply only on first sight
    known_folders: HashSet<String>,
    expanded: HashSet<String>,
}

impl TreeProjector {
    /// Create an empty projector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the tree from a full entry list.
    ///
    /// Entries whose parent is missing or is not a folder are attached at
    /// the root, so every entry stays reachable.
    pub fn rebuild(&mut self, entries: &[Entry]) {
        let folders: HashSet<&str> = entries
            .iter()
            .filter(|e| e.is_folder())
            .map(|e| e.path.as_str())
            .collect();

        let mut children_of: BTreeMap<Option<&str>, Vec<&Entry>> = BTreeMap::new();
        for entry in entries {
            let parent = entry
                .parent_path
                .as_deref()
                .filter(|parent| folders.contains(parent));
            children_of.entry(parent).or_default().push(entry);
        }

        // Forget expand memory for vanished folders; new root folders open
        self.known_folders.retain(|path| folders.contains(path.as_str()));
        self.expanded.retain(|path| folders.contains(path.as_str()));
        if let Some(roots) = children_of.get(&None) {
            for entry in roots.iter().filter(|e| e.is_folder()) {
                if !self.known_folders.contains(&entry.path) {
                    self.expanded.insert(entry.path.clone());
                }
            }
        }
        self.known_folders
            .extend(folders.iter().map(|path| path.to_string()));

        self.roots = build_level(&children_of, None);
        log::debug!(
            "Rebuilt tree: {} entries, {} roots",
            entries.len(),
            self.roots.len()
        );
    }

    /// Top-level nodes, sorted.
    pub fn roots(&self) -> &[TreeNode] {
        &self.roots
    }

    /// Find the node at `path`.
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        fn walk<'a>(nodes: &'a [TreeNode], path: &str) -> Option<&'a TreeNode> {
            nodes.iter().find_map(|node| {
                if node.path == path {
                    Some(node)
                } else {
                    walk(&node.children, path)
                }
            })
        }
        walk(&self.roots, path)
    }

    /// Whether the folder at `path` is expanded.
    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    /// Expand or collapse the folder at `path`. Ignored for non-folders.
    pub fn set_expanded(&mut self, path: &str, expanded: bool) {
        if !self.known_folders.contains(path) {
            return;
        }
        if expanded {
            self.expanded.insert(path.to_string());
        } else {
            self.expanded.remove(path);
        }
    }

    /// Flip the expand state of the folder at `path`; returns the new state.
    pub fn toggle(&mut self, path: &str) -> bool {
        let next = !self.is_expanded(path);
        self.set_expanded(path, next);
        self.is_expanded(path)
    }

    /// Depth-first rows, descending only into expanded folders.
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        self.push_rows(&self.roots, 0, &mut rows);
        rows
    }

    fn push_rows(&self, nodes: &[TreeNode], depth: usize, rows: &mut Vec<TreeRow>) {
        for node in nodes {
            let expanded = node.is_folder() && self.is_expanded(&node.path);
            rows.push(TreeRow {
                path: node.path.clone(),
                name: node.name.clone(),
                kind: node.kind,
                depth,
                expanded,
            });
            if expanded {
                self.push_rows(&node.children, depth + 1, rows);
            }
        }
    }

    /// Render the whole tree with box-drawing connectors.
    pub fn format_tree(&self) -> String {
        self.roots
            .iter()
            .map(|root| format_tree_node(root, ""))
            .collect()
    }
}

fn build_level(
    children_of: &BTreeMap<Option<&str>, Vec<&Entry>>,
    parent: Option<&str>,
) -> Vec<TreeNode> {
    let Some(entries) = children_of.get(&parent) else {
        return Vec::new();
    };
    let mut nodes: Vec<TreeNode> = entries
        .iter()
        .map(|entry| {
            let mut node = TreeNode::leaf(entry);
            if entry.is_folder() {
                node.children = build_level(children_of, Some(entry.path.as_str()));
            }
            node
        })
        .collect();
    nodes.sort_by(compare_nodes);
    nodes
}

/// Format a node and its descendants for display.
pub fn format_tree_node(node: &TreeNode, prefix: &str) -> String {
    let mut result = String::new();

    result.push_str(&node.name);
    if node.is_folder() {
        result.push('/');
    }
    result.push('\n');

    let child_count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let is_last_child = i == child_count - 1;
        let connector = if is_last_child {
            "└── "
        } else {
            "├── "
        };
        let child_prefix = if is_last_child { "    " } else { "│   " };

        result.push_str(prefix);
        result.push_str(connector);
        result.push_str(&format_tree_node(
            child,
            &format!("{}{}", prefix, child_prefix),
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::EntryRecord;

    fn file(path: &str) -> Entry {
        Entry::from_record(
            path,
            EntryRecord::file(path, format!("file:{}", path), "plaintext".into()),
        )
    }

    fn folder(path: &str) -> Entry {
        Entry::from_record(path, EntryRecord::folder(path))
    }

    fn names(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_folders_first_then_names() {
        let mut tree = TreeProjector::new();
        tree.rebuild(&[
            file("b.ts"),
            folder("zeta"),
            file("A.ts"),
            file("a.ts"),
            folder("alpha"),
        ]);
        assert_eq!(names(tree.roots()), vec!["alpha", "zeta", "a.ts", "A.ts", "b.ts"]);
    }

    #[test]
    fn test_nesting_and_orphans() {
        let mut tree = TreeProjector::new();
        tree.rebuild(&[
            folder("src"),
            file("src/main.rs"),
            folder("src/util"),
            file("src/util/io.rs"),
            // parent never created
            file("ghost/x.rs"),
            // parent is a file
            file("src/main.rs/odd.rs"),
        ]);

        assert_eq!(names(tree.roots()), vec!["src", "odd.rs", "x.rs"]);
        let src = tree.find("src").unwrap();
        assert_eq!(names(&src.children), vec!["util", "main.rs"]);
        assert_eq!(tree.find("src/util/io.rs").unwrap().name, "io.rs");
    }

    #[test]
    fn test_expand_defaults_and_memory() {
        let mut tree = TreeProjector::new();
        tree.rebuild(&[folder("src"), folder("src/inner"), file("src/inner/a.ts")]);
        assert!(tree.is_expanded("src"));
        assert!(!tree.is_expanded("src/inner"));

        tree.set_expanded("src", false);
        tree.rebuild(&[folder("src"), folder("src/inner"), file("src/inner/a.ts")]);
        assert!(!tree.is_expanded("src"), "collapse survives rebuild");

        assert!(tree.toggle("src/inner"));
        // Rename drops the memory of the old path
        tree.rebuild(&[folder("lib"), folder("lib/inner"), file("lib/inner/a.ts")]);
        assert!(tree.is_expanded("lib"));
        assert!(!tree.is_expanded("lib/inner"));
        assert!(!tree.is_expanded("src/inner"));
    }

    #[test]
    fn test_set_expanded_ignores_files() {
        let mut tree = TreeProjector::new();
        tree.rebuild(&[file("a.ts")]);
        assert!(!tree.toggle("a.ts"));
        assert!(!tree.is_expanded("a.ts"));
    }

    #[test]
    fn test_visible_rows_follow_expand_state() {
        let mut tree = TreeProjector::new();
        tree.rebuild(&[
            folder("src"),
            folder("src/b"),
            file("src/b/c.ts"),
            file("src/a.ts"),
            file("README.md"),
        ]);

        let rows: Vec<(String, usize)> = tree
            .visible_rows()
            .into_iter()
            .map(|r| (r.path, r.depth))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("src".to_string(), 0),
                ("src/b".to_string(), 1),
                ("src/a.ts".to_string(), 1),
                ("README.md".to_string(), 0),
            ]
        );

        tree.toggle("src/b");
        assert_eq!(tree.visible_rows().len(), 5);
    }

    #[test]
    fn test_format_tree() {
        let mut tree = TreeProjector::new();
        tree.rebuild(&[folder("src"), file("src/a.ts"), file("src/b.ts"), file("x.md")]);
        let expected = "src/\n├── a.ts\n└── b.ts\nx.md\n";
        assert_eq!(tree.format_tree(), expected);
    }
}
