// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep, TaskRunState, TriggerScope};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RuntimeOptions, TaskName, TaskOutcome, TriggerReason};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Request that the process exits (used for `--once` when idle).
    RequestExit,
    /// The first run finished with these stages failed; stop with an error.
    Abort(Vec<TaskName>),
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Whether the first (bootstrap) run has finished yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bootstrap {
    pub done: bool,
}

impl Bootstrap {
    /// Only the initial build cascades through `after` edges; later runs
    /// re-run exactly the stages that were triggered.
    pub fn scope_for(&self, reason: TriggerReason) -> TriggerScope {
        if self.done || reason == TriggerReason::FileWatch {
            TriggerScope::Alone
        } else {
            TriggerScope::WithDependents
        }
    }
}

/// Handle a task trigger event.
///
/// - If the scheduler is idle, start a new run seeded with this trigger plus
///   anything already queued.
/// - If a run is active and `task` is not part of it, merge it into the
///   active run immediately.
/// - If `task` already participates in the active run, record it in the
///   queue for a future run.
pub fn handle_task_trigger(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    bootstrap: &Bootstrap,
    task: TaskName,
    reason: TriggerReason,
) -> CoreStep {
    let mut commands = Vec::new();
    let scope = bootstrap.scope_for(reason);

    if scheduler.is_idle() {
        let mut triggers: BTreeSet<TaskName> = queue.drain_pending().into_iter().collect();
        triggers.insert(task);

        let mut step = start_new_run_from_triggers(scheduler, triggers.into_iter().collect(), scope);
        commands.append(&mut step.commands);
        return CoreStep::continue_with(commands);
    }

    match scheduler.run_state_of(&task) {
        None => {
            warn!(task = %task, ?reason, "trigger for unknown stage; ignoring");
        }
        Some(TaskRunState::NotInRun) => {
            let newly_ready = scheduler.handle_trigger_scoped(&task, scope);
            if !newly_ready.is_empty() {
                commands.push(CoreCommand::DispatchTasks(newly_ready));
            }
        }
        Some(_already_in_run) => {
            queue.record_trigger(&task);
        }
    }

    CoreStep::continue_with(commands)
}

/// Handle a progress report from a long-lived task.
pub fn handle_task_progress(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    options: &RuntimeOptions,
    bootstrap: &mut Bootstrap,
    task: TaskName,
) -> CoreStep {
    let step = scheduler.step_progress(&task);
    after_scheduler_step(scheduler, queue, options, bootstrap, step)
}

/// Handle a stage completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    options: &RuntimeOptions,
    bootstrap: &mut Bootstrap,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let step = scheduler.step_completion(&task, outcome);
    after_scheduler_step(scheduler, queue, options, bootstrap, step)
}

/// Shared tail of progress/completion handling: dispatch newly ready tasks,
/// settle the bootstrap run, start queued runs and decide whether to exit.
fn after_scheduler_step(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    options: &RuntimeOptions,
    bootstrap: &mut Bootstrap,
    step: SchedulerStep,
) -> CoreStep {
    let mut commands = Vec::new();

    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }

    if step.run_just_finished {
        let failed = scheduler.failed_tasks();
        let first_run = !bootstrap.done;
        bootstrap.done = true;

        if failed.is_empty() {
            info!(first_run, "build run finished");
        } else if first_run && options.fail_fast {
            warn!(?failed, "initial build failed; aborting");
            commands.push(CoreCommand::Abort(failed));
            return CoreStep {
                commands,
                keep_running: false,
            };
        } else {
            warn!(?failed, "build run finished with failed stages");
        }
    }

    commands.extend(maybe_start_queued_run(scheduler, queue, bootstrap));

    if options.exit_when_idle && scheduler.is_idle() && queue.is_empty() {
        commands.push(CoreCommand::RequestExit);
        return CoreStep {
            commands,
            keep_running: false,
        };
    }

    CoreStep::continue_with(commands)
}

/// Seed a new run from a set of triggers.
pub fn start_new_run_from_triggers(
    scheduler: &mut Scheduler,
    triggers: Vec<TaskName>,
    scope: TriggerScope,
) -> CoreStep {
    let mut commands = Vec::new();

    if triggers.is_empty() {
        return CoreStep::continue_with(commands);
    }

    scheduler.start_new_run();

    let mut all_ready = Vec::new();
    for task in triggers {
        all_ready.extend(scheduler.handle_trigger_scoped(&task, scope));
    }

    if !all_ready.is_empty() {
        commands.push(CoreCommand::DispatchTasks(all_ready));
    }

    CoreStep::continue_with(commands)
}

/// If the scheduler is idle and there are queued triggers, start a new run.
fn maybe_start_queued_run(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    bootstrap: &Bootstrap,
) -> Vec<CoreCommand> {
    if !scheduler.is_idle() {
        return Vec::new();
    }

    let triggers = queue.drain_pending();
    if triggers.is_empty() {
        return Vec::new();
    }

    start_new_run_from_triggers(scheduler, triggers, bootstrap.scope_for(TriggerReason::Manual)).commands
}
