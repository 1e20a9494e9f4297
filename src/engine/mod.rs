// src/engine/mod.rs

//! Rebuild engine.
//!
//! After the initial build, every rebuild goes through this loop:
//! - the watcher sends `TaskTriggered` events;
//! - the executor sends `TaskCompleted` events;
//! - Ctrl-C sends `ShutdownRequested`.
//!
//! The pure state machine lives in [`core`]; the async shell that reads the
//! event channel and talks to the executor is [`runtime`].

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Outcome of one task run, as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// The run failed as a whole (not a per-file failure).
    Failed(String),
}

/// Events flowing into the runtime from the watcher, the executor and the
/// signal handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// A file bound to `task` changed.
    TaskTriggered { task: TaskName },
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// Stop accepting triggers; exit once in-flight runs finish.
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::CoreStep;
pub use queue::TriggerQueue;
pub use runtime::Runtime;
