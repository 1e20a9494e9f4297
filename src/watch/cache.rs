// src/watch/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::fs::FileSystem;
use crate::watch::hash::compute_file_hash;

/// In-memory cache of file digests.
///
/// Used in two places:
/// - the watcher remembers the last digest of each source file it saw, so a
///   save that leaves content unchanged does not trigger a rebuild;
/// - the pipeline re-reads each output before writing it, so an identical
///   rebuild skips the write.
#[derive(Debug, Default)]
pub struct FileCache {
    hashes: HashMap<PathBuf, String>,
}

impl FileCache {
    pub fn new() -> Self {
        Self {
            hashes: HashMap::new(),
        }
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.hashes.get(path).map(|s| s.as_str())
    }

    /// Record a digest computed elsewhere (e.g. of bytes just written).
    pub fn insert(&mut self, path: &Path, hash: String) {
        self.hashes.insert(path.to_path_buf(), hash);
    }

    /// Invalidate the cached hash for a file (e.g. on change).
    pub fn invalidate(&mut self, path: &Path) {
        if self.hashes.remove(path).is_some() {
            debug!("invalidated cache for {:?}", path);
        }
    }

    /// Recompute the digest of `path` and report whether it differs from the
    /// cached one. A file seen for the first time counts as changed; a file
    /// that no longer exists is dropped from the cache and counts as changed.
    pub fn refresh(&mut self, fs: &dyn FileSystem, path: &Path) -> bool {
        if !fs.is_file(path) {
            self.invalidate(path);
            return true;
        }

        match compute_file_hash(fs, path) {
            Ok(hash) => {
                let changed = self.get(path) != Some(hash.as_str());
                self.hashes.insert(path.to_path_buf(), hash);
                changed
            }
            Err(err) => {
                debug!(?path, error = %err, "could not hash file; treating as changed");
                self.invalidate(path);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn refresh_detects_content_changes_only() {
        let fs = MockFileSystem::new();
        let path = Path::new("/p/a.js");
        fs.add_file(path, b"one".to_vec());

        let mut cache = FileCache::new();
        assert!(cache.refresh(&fs, path), "first sighting counts as change");
        assert!(!cache.refresh(&fs, path), "same content is not a change");

        fs.add_file(path, b"two".to_vec());
        assert!(cache.refresh(&fs, path));
    }

    #[test]
    fn refresh_of_missing_file_invalidates() {
        let fs = MockFileSystem::new();
        let mut cache = FileCache::new();
        cache.insert(Path::new("/p/gone"), "abc".into());

        assert!(cache.refresh(&fs, Path::new("/p/gone")));
        assert!(cache.get(Path::new("/p/gone")).is_none());
    }
}
