// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! Consumes [`RuntimeEvent`]s and says which tasks the IO shell
//! (`engine::runtime::Runtime`) should start. No Tokio types, channels,
//! filesystem or processes, so every rule below is unit tested directly:
//!
//! - at most one run per task is in flight;
//! - triggers for a running task coalesce into one follow-up run;
//! - different tasks run concurrently;
//! - after a shutdown request nothing new starts, and the loop ends once
//!   the in-flight runs have completed.

use crate::engine::event_handlers::{
    handle_shutdown, handle_task_completion, handle_task_trigger, CoreStep, RunState,
};
use crate::engine::{RuntimeEvent, TaskName};

#[derive(Debug)]
pub struct CoreRuntime {
    state: RunState,
}

impl CoreRuntime {
    /// `tasks` are the names that may be triggered; anything else is ignored.
    pub fn new<I>(tasks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TaskName>,
    {
        Self {
            state: RunState {
                known: tasks.into_iter().map(Into::into).collect(),
                ..RunState::default()
            },
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state.running.is_empty()
    }

    pub fn is_running(&self, task: &str) -> bool {
        self.state.running.contains(task)
    }

    pub fn queue_is_empty(&self) -> bool {
        self.state.queue.is_empty()
    }

    pub fn is_draining(&self) -> bool {
        self.state.draining
    }

    /// Handle a single runtime event, updating state and returning what the
    /// IO shell must do next.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskTriggered { task } => handle_task_trigger(&mut self.state, task),
            RuntimeEvent::TaskCompleted { task, outcome } => {
                handle_task_completion(&mut self.state, task, outcome)
            }
            RuntimeEvent::ShutdownRequested => handle_shutdown(&mut self.state),
        }
    }
}
