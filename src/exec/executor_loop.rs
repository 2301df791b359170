// src/exec/executor_loop.rs

//! Executor loop: one Tokio task per dispatched stage.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskName};
use crate::exec::task_runner::run_task;
use crate::stage::{StageContext, StageRegistry};

/// Spawn the background executor loop.
///
/// Stages run concurrently. A long-lived stage that is still running when
/// it is scheduled again is not restarted; its being up already satisfies
/// the new run, so a progress event is synthesized instead.
pub fn spawn_executor(stages: Arc<StageRegistry>, ctx: Arc<StageContext>) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        let mut long_lived: HashMap<TaskName, JoinHandle<()>> = HashMap::new();

        while let Some(task) = rx.recv().await {
            handle_scheduled_task(task, &stages, &ctx, &mut long_lived).await;
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

async fn handle_scheduled_task(
    task: ScheduledTask,
    stages: &Arc<StageRegistry>,
    ctx: &Arc<StageContext>,
    long_lived: &mut HashMap<TaskName, JoinHandle<()>>,
) {
    let name = task.name.clone();

    if task.long_lived {
        if let Some(handle) = long_lived.get(&name) {
            if !handle.is_finished() {
                debug!(
                    task = %name,
                    run_id = task.run_id,
                    "long-lived stage already running; synthesizing progress"
                );
                if ctx
                    .runtime_tx
                    .send(RuntimeEvent::TaskProgressed { task: name })
                    .await
                    .is_err()
                {
                    warn!("runtime channel closed while synthesizing progress");
                }
                return;
            }
        }
    }

    let is_long_lived = task.long_lived;
    let stage = stages.get(&name).cloned();
    let ctx = Arc::clone(ctx);
    let handle = tokio::spawn(async move {
        run_task(task, stage, ctx).await;
    });

    if is_long_lived {
        long_lived.insert(name, handle);
    }
}
