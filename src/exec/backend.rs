// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender, so
//! tests can swap in a fake that records dispatches and replies with
//! `TaskCompleted` events directly.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::errors::Result;
use crate::stage::{StageContext, StageRegistry};

use super::executor_loop::spawn_executor;

/// Trait abstracting how scheduled tasks are executed.
pub trait ExecutorBackend: Send {
    /// Dispatch the given tasks for execution.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend: forwards scheduled tasks to the executor loop, which
/// runs the matching stage.
pub struct StageExecutorBackend {
    tx: mpsc::Sender<ScheduledTask>,
}

impl StageExecutorBackend {
    /// Spawns the background executor loop immediately.
    pub fn new(stages: StageRegistry, ctx: StageContext) -> Self {
        let tx = spawn_executor(Arc::new(stages), Arc::new(ctx));
        Self { tx }
    }
}

impl ExecutorBackend for StageExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.tx.clone();

        Box::pin(async move {
            for task in tasks {
                tx.send(task).await?;
            }
            Ok(())
        })
    }
}
