// src/engine/runtime.rs

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::RuntimeEvent;

/// The rebuild loop: feeds every event from the watcher, the executor and
/// the signal handler through [`CoreRuntime`] and starts whatever it says.
pub struct Runtime<E> {
    core: CoreRuntime,
    events: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E> std::fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, events: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            events,
            executor,
        }
    }

    /// Returns once shutdown has drained the in-flight runs, or when every
    /// event sender has been dropped.
    pub async fn run(mut self) -> Result<()> {
        info!("rebuild loop started");
        let mut started = 0usize;

        while let Some(event) = self.events.recv().await {
            debug!(?event, "rebuild loop event");
            let step = self.core.step(event);

            if !step.dispatch.is_empty() {
                started += step.dispatch.len();
                self.executor.spawn_ready_tasks(step.dispatch).await?;
            }
            if !step.keep_running {
                info!(runs = started, "in-flight rebuilds drained; stopping");
                return Ok(());
            }
        }

        info!(runs = started, "no event senders left; stopping");
        Ok(())
    }
}
