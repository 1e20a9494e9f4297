// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::engine::queue::TriggerQueue;
use crate::engine::{TaskName, TaskOutcome};

/// What the IO shell must do after one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreStep {
    /// Tasks to start one run of, now.
    pub dispatch: Vec<TaskName>,
    /// False once shutdown has drained every in-flight run.
    pub keep_running: bool,
}

impl CoreStep {
    fn idle() -> Self {
        Self {
            dispatch: Vec::new(),
            keep_running: true,
        }
    }

    fn start(task: TaskName) -> Self {
        Self {
            dispatch: vec![task],
            keep_running: true,
        }
    }

    fn stop() -> Self {
        Self::default()
    }
}

/// State the handlers operate on.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub known: HashSet<TaskName>,
    pub running: HashSet<TaskName>,
    pub queue: TriggerQueue,
    pub draining: bool,
}

/// A trigger either starts the task now or, if it is already running,
/// leaves exactly one follow-up run pending.
pub(crate) fn handle_task_trigger(state: &mut RunState, task: TaskName) -> CoreStep {
    if state.draining {
        debug!(task = %task, "shutting down; ignoring trigger");
        return CoreStep::idle();
    }
    if !state.known.contains(&task) {
        warn!(task = %task, "trigger for unknown task ignored");
        return CoreStep::idle();
    }

    if state.running.contains(&task) {
        state.queue.record_trigger(&task);
        return CoreStep::idle();
    }

    debug!(task = %task, "dispatching task");
    state.running.insert(task.clone());
    CoreStep::start(task)
}

/// A completion frees the task; a pending follow-up starts immediately.
pub(crate) fn handle_task_completion(
    state: &mut RunState,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    if !state.running.remove(&task) {
        warn!(task = %task, "completion for a task that was not running");
    }
    if let TaskOutcome::Failed(reason) = &outcome {
        warn!(task = %task, %reason, "task run failed");
    }

    if state.draining {
        return if state.running.is_empty() {
            CoreStep::stop()
        } else {
            CoreStep::idle()
        };
    }

    if state.queue.take(&task) {
        debug!(task = %task, "starting queued follow-up run");
        state.running.insert(task.clone());
        return CoreStep::start(task);
    }
    CoreStep::idle()
}

/// Stop dispatching; keep running until in-flight tasks report back.
pub(crate) fn handle_shutdown(state: &mut RunState) -> CoreStep {
    state.draining = true;
    state.queue.clear();

    if state.running.is_empty() {
        return CoreStep::stop();
    }

    debug!(in_flight = state.running.len(), "waiting for in-flight runs");
    CoreStep::idle()
}
