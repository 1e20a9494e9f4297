use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use sitepipe::engine::{RuntimeEvent, TaskOutcome};
use sitepipe::exec::ExecutorBackend;
use sitepipe::errors::Result;

/// A fake executor that records which tasks were dispatched.
///
/// - `FakeExecutor::new` immediately reports `TaskCompleted(Success)` for
///   each dispatched task.
/// - `FakeExecutor::manual` never completes anything; the test sends the
///   completions itself, which lets it trigger tasks "while running".
pub struct FakeExecutor {
    runtime_tx: Option<mpsc::Sender<RuntimeEvent>>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx: Some(runtime_tx),
            executed,
        }
    }

    pub fn manual(executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx: None,
            executed,
        }
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<String>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);

        Box::pin(async move {
            for task in tasks {
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push(task.clone());
                }

                if let Some(tx) = &tx {
                    tx.send(RuntimeEvent::TaskCompleted {
                        task,
                        outcome: TaskOutcome::Success,
                    })
                    .await
                    .map_err(anyhow::Error::from)?;
                }
            }
            Ok(())
        })
    }
}
