// src/watch/event_handler.rs

//! Turning a batch of changed paths into task triggers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::TaskName;
use crate::fs::FileSystem;
use crate::watch::cache::FileCache;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::{tasks_for_path, WatchBinding};

/// Maps changed paths to the tasks bound to them.
///
/// Owns the digest cache used when `use_hash` is on, so it lives as long as
/// the watcher.
#[derive(Debug)]
pub struct WatchDispatcher {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    output_root: PathBuf,
    bindings: Vec<WatchBinding>,
    use_hash: bool,
    cache: FileCache,
}

impl WatchDispatcher {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        bindings: Vec<WatchBinding>,
        use_hash: bool,
    ) -> Self {
        Self {
            fs,
            root: root.into(),
            output_root: output_root.into(),
            bindings,
            use_hash,
            cache: FileCache::new(),
        }
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    /// Record the current digest of `path` without triggering anything, so
    /// the first save that leaves it unchanged is recognised as such.
    pub fn prime(&mut self, path: &Path) {
        if self.use_hash {
            self.cache.refresh(self.fs.as_ref(), path);
        }
    }

    /// Tasks to trigger for one debounced batch of changed paths: each task
    /// at most once, in order of first match.
    pub fn dispatch(&mut self, paths: &[PathBuf]) -> Vec<TaskName> {
        let mut triggered: Vec<TaskName> = Vec::new();

        for path in paths {
            if path.starts_with(&self.output_root) {
                continue;
            }

            let Some(rel) = relative_str(&self.root, path) else {
                warn!(
                    "could not relativize path {:?} against root {:?}",
                    path, self.root
                );
                continue;
            };

            let tasks = tasks_for_path(&self.bindings, &rel);
            if tasks.is_empty() {
                continue;
            }

            if self.use_hash && !self.cache.refresh(self.fs.as_ref(), path) {
                info!(path = %rel, "content unchanged; skipping trigger");
                continue;
            }

            debug!(path = %rel, ?tasks, "watch match");
            for task in tasks {
                if !triggered.iter().any(|t| t == task) {
                    triggered.push(task.to_string());
                }
            }
        }

        triggered
    }
}
