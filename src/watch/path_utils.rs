// src/watch/path_utils.rs

//! Project-relative path strings, the form every glob is matched against.

use std::path::Path;

/// `path` relative to `root` with forward slashes, by prefix only.
pub fn relative_slash(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

/// Like [`relative_slash`], but retries with both paths canonicalized.
///
/// Watcher events may report the same directory under a different absolute
/// prefix (symlinks, `/private/var` on macOS). Returns `None` if the path
/// still cannot be related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Some(rel) = relative_slash(root, path) {
        return Some(rel);
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = path.canonicalize().ok()?;
    relative_slash(&root_canon, &path_canon)
}
