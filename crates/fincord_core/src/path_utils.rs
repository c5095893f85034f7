//! Path utilities for slash-delimited workspace keys.
//!
//! Workspace paths are plain strings such as `"src/lib/a.ts"`. They are never
//! resolved against a real filesystem, so these helpers work on `str` rather
//! than `std::path::Path`.

/// Normalize a user-supplied path into a workspace key.
///
/// Backslashes become slashes, empty and `.` segments are dropped, and
/// leading/trailing slashes are removed.
///
/// # Example
/// ```
/// use fincord_core::path_utils::normalize;
///
/// assert_eq!(normalize("./src//lib/"), "src/lib");
/// assert_eq!(normalize("\\docs\\a.md"), "docs/a.md");
/// ```
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Last segment of a path, e.g. `"a.ts"` for `"src/a.ts"`.
pub fn name_from_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .next_back()
        .unwrap_or(path)
        .to_string()
}

/// Parent folder of a path, or `None` for root-level entries.
pub fn parent_from_path(path: &str) -> Option<String> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if parts.len() <= 1 {
        return None;
    }
    Some(parts[..parts.len() - 1].join("/"))
}

/// Whether `path` is `root` itself or lies somewhere below it.
pub fn is_same_or_descendant(path: &str, root: &str) -> bool {
    path == root || is_descendant(path, root)
}

/// Whether `path` lies strictly below `root` (`root + "/"` prefix).
pub fn is_descendant(path: &str, root: &str) -> bool {
    path.len() > root.len() + 1
        && path.starts_with(root)
        && path.as_bytes()[root.len()] == b'/'
}

/// Re-key `path` from under `old_root` to under `new_root`.
///
/// Returns `None` when `path` is not `old_root` or one of its descendants.
pub fn rebase(path: &str, old_root: &str, new_root: &str) -> Option<String> {
    if !is_same_or_descendant(path, old_root) {
        return None;
    }
    let suffix = &path[old_root.len()..];
    Some(format!("{}{}", new_root, suffix))
}

/// Every proper ancestor folder of `path`, outermost first.
///
/// `"a/b/c.ts"` yields `["a", "a/b"]`.
pub fn ancestors(path: &str) -> Vec<String> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    (1..parts.len()).map(|n| parts[..n].join("/")).collect()
}

/// Lowercased extension of the last path segment, without the dot.
pub fn extension(path: &str) -> Option<String> {
    let name = name_from_path(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}
