// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of running pipelines
//! itself, so tests can swap in a fake that records dispatches and emits
//! completions on demand.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::engine::{RuntimeEvent, TaskName, TaskOutcome};
use crate::errors::Result;
use crate::pipeline::{Pipeline, PipelineTask};

/// Trait abstracting how dispatched tasks are executed.
///
/// Implementations must eventually send exactly one
/// `RuntimeEvent::TaskCompleted` per dispatched task.
pub trait ExecutorBackend: Send {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<TaskName>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production executor: runs each task's pipeline on the blocking pool.
///
/// Tasks without a pipeline (pure aggregates) complete immediately.
pub struct PipelineExecutor {
    pipeline: Arc<Pipeline>,
    tasks: HashMap<TaskName, Arc<PipelineTask>>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl PipelineExecutor {
    pub fn new(
        pipeline: Arc<Pipeline>,
        tasks: HashMap<TaskName, Arc<PipelineTask>>,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            pipeline,
            tasks,
            runtime_tx,
        }
    }
}

impl ExecutorBackend for PipelineExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<TaskName>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for name in tasks {
                let pipeline = Arc::clone(&self.pipeline);
                let task = self.tasks.get(&name).cloned();
                let runtime_tx = self.runtime_tx.clone();

                tokio::spawn(async move {
                    let outcome = run_pipeline(pipeline, &name, task).await;
                    if runtime_tx
                        .send(RuntimeEvent::TaskCompleted {
                            task: name.clone(),
                            outcome,
                        })
                        .await
                        .is_err()
                    {
                        debug!(task = %name, "runtime gone; completion dropped");
                    }
                });
            }
            Ok(())
        })
    }
}

async fn run_pipeline(
    pipeline: Arc<Pipeline>,
    name: &str,
    task: Option<Arc<PipelineTask>>,
) -> TaskOutcome {
    let Some(task) = task else {
        debug!(task = %name, "no pipeline for task; nothing to rebuild");
        return TaskOutcome::Success;
    };

    info!(task = %name, "rebuilding");
    let joined = tokio::task::spawn_blocking(move || pipeline.build(&task)).await;

    match joined {
        Ok(Ok(report)) => {
            debug!(
                task = %name,
                written = report.written.len(),
                failed = report.failures.len(),
                "rebuild finished"
            );
            TaskOutcome::Success
        }
        Ok(Err(err)) => {
            error!(task = %name, error = %err, "rebuild failed");
            TaskOutcome::Failed(err.to_string())
        }
        Err(join_err) => {
            error!(task = %name, error = %join_err, "rebuild panicked");
            TaskOutcome::Failed(join_err.to_string())
        }
    }
}
