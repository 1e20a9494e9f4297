// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - compiling watch bindings (patterns + excludes -> task names);
//! - wiring up a cross-platform filesystem watcher (`notify`) with a
//!   debounce window;
//! - optional content hashing so a save that leaves a file unchanged does
//!   not trigger a rebuild.
//!
//! It does **not** know about the task graph; it only turns filesystem
//! changes into task-level triggers.

pub mod cache;
pub mod event_handler;
pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use cache::FileCache;
pub use event_handler::WatchDispatcher;
pub use patterns::{build_watch_bindings, tasks_for_path, PatternSet, WatchBinding};
pub use watcher::{spawn_watcher, WatcherHandle};
