// src/exec/task_runner.rs

//! Runs a single stage and reports its outcome.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::stage::{Stage, StageContext};

/// Run the stage behind `task` and send `TaskCompleted` when it returns.
///
/// A stage error becomes `TaskOutcome::Failed`; per-file failures inside a
/// successful report do not fail the task.
pub async fn run_task(task: ScheduledTask, stage: Option<Arc<dyn Stage>>, ctx: Arc<StageContext>) {
    let outcome = match stage {
        None => {
            error!(task = %task.name, "no stage registered for task");
            TaskOutcome::Failed(format!("no stage registered for '{}'", task.name))
        }
        Some(stage) => {
            info!(task = %task.name, run_id = task.run_id, "starting stage");
            let started = Instant::now();

            match stage.run(&ctx).await {
                Ok(report) => {
                    info!(
                        task = %task.name,
                        run_id = task.run_id,
                        written = report.written_count(),
                        skipped = report.skipped_count(),
                        failed_files = report.failed_count(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "stage finished"
                    );
                    TaskOutcome::Success
                }
                Err(err) => {
                    error!(
                        task = %task.name,
                        run_id = task.run_id,
                        error = %err,
                        "stage failed"
                    );
                    TaskOutcome::Failed(err.to_string())
                }
            }
        }
    };

    if ctx
        .runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.name.clone(),
            outcome,
        })
        .await
        .is_err()
    {
        warn!(task = %task.name, "runtime channel closed before completion could be reported");
    }
}
