// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::watch::event_handler::WatchDispatcher;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping it stops
/// watching, which also ends the dispatch task.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    dirs: Vec<PathBuf>,
}

impl WatcherHandle {
    /// Directories being watched recursively.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("dirs", &self.dirs)
            .finish_non_exhaustive()
    }
}

/// Spawn a watcher over the literal base directories of every binding.
///
/// Events are coalesced over `debounce`: once an event arrives, further
/// events are collected until the channel has been quiet for that long,
/// then the whole batch goes through the dispatcher and each resulting task
/// is sent to the runtime once.
pub fn spawn_watcher(
    mut dispatcher: WatchDispatcher,
    root: &Path,
    debounce: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let dirs = watch_dirs(root, &dispatcher);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Only fails once the dispatch task is gone.
                let _ = event_tx.send(event);
            }
            Err(err) => {
                eprintln!("sitepipe: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    for dir in &dirs {
        watcher.watch(dir, RecursiveMode::Recursive)?;
        info!("watching {:?}", dir);
    }

    tokio::spawn(async move {
        while let Some(first) = event_rx.recv().await {
            let mut batch: Vec<PathBuf> = Vec::new();
            collect_paths(first, &mut batch);

            // Keep collecting until the channel goes quiet.
            while let Ok(Some(event)) = tokio::time::timeout(debounce, event_rx.recv()).await {
                collect_paths(event, &mut batch);
            }

            if batch.is_empty() {
                continue;
            }
            debug!(paths = batch.len(), "debounced change batch");

            for task in dispatcher.dispatch(&batch) {
                info!(task = %task, "change detected; triggering");
                if runtime_tx
                    .send(RuntimeEvent::TaskTriggered { task })
                    .await
                    .is_err()
                {
                    debug!("runtime channel closed; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        dirs,
    })
}

fn collect_paths(event: Event, batch: &mut Vec<PathBuf>) {
    if matches!(event.kind, EventKind::Access(_)) {
        return;
    }
    for path in event.paths {
        if !batch.contains(&path) {
            batch.push(path);
        }
    }
}

/// Existing base directories of all bindings, without directories nested in
/// another watched one.
fn watch_dirs(root: &Path, dispatcher: &WatchDispatcher) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for binding in dispatcher.bindings() {
        for base in binding.pattern_set().bases() {
            let dir = root.join(base);
            if !dir.is_dir() {
                warn!("watch base {:?} does not exist; not watched", dir);
                continue;
            }
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
    }

    dirs.sort();
    let mut out: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        if !out.iter().any(|kept| dir.starts_with(kept)) {
            out.push(dir);
        }
    }
    out
}
