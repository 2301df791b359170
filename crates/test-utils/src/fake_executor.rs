use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use assetdag::dag::ScheduledTask;
use assetdag::engine::{RuntimeEvent, TaskOutcome};
use assetdag::exec::ExecutorBackend;
use assetdag::errors::Result;

/// Wraps a real backend and records every dispatched task name, in order.
pub struct RecordingExecutor<B> {
    inner: B,
    executed: Arc<Mutex<Vec<String>>>,
}

impl<B: ExecutorBackend> RecordingExecutor<B> {
    pub fn new(inner: B, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self { inner, executed }
    }
}

impl<B: ExecutorBackend> ExecutorBackend for RecordingExecutor<B> {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.executed
            .lock()
            .unwrap()
            .extend(tasks.iter().map(|t| t.name.clone()));
        self.inner.spawn_ready_tasks(tasks)
    }
}

/// A fake executor that:
/// - records which tasks were dispatched, in order
/// - reports `TaskProgressed` for long-lived tasks
/// - reports `TaskCompleted` for everything else, failing the tasks it was
///   told to fail.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: HashSet::new(),
        }
    }

    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failing = self.failing.clone();

        Box::pin(async move {
            for t in tasks {
                executed.lock().unwrap().push(t.name.clone());

                let event = if t.long_lived {
                    RuntimeEvent::TaskProgressed { task: t.name }
                } else if failing.contains(&t.name) {
                    RuntimeEvent::TaskCompleted {
                        outcome: TaskOutcome::Failed(format!("{} failed", t.name)),
                        task: t.name,
                    }
                } else {
                    RuntimeEvent::TaskCompleted {
                        task: t.name,
                        outcome: TaskOutcome::Success,
                    }
                };

                tx.send(event).await?;
            }
            Ok(())
        })
    }
}
