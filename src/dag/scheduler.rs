// src/dag/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::pipeline::Pipeline;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo, TaskRunState};
use crate::engine::{TaskName, TaskOutcome};

/// How far a trigger reaches into the DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerScope {
    /// The task plus its transitive dependents (the initial build).
    WithDependents,
    /// Only the task itself; `after` edges still gate when it may start.
    Alone,
}

/// Scheduler holds the immutable DAG plus mutable per-run state.
///
/// It is responsible for:
/// - remembering which tasks are part of the current run
/// - deciding when a triggered task is "ready" to run (deps satisfied)
/// - marking tasks as succeeded/failed/progressed
/// - scheduling dependents when appropriate
/// - failing dependents when a task fails
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    tasks: HashMap<TaskName, TaskInfo>,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    /// Construct a scheduler from a validated [`Pipeline`].
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        let graph = DagGraph::from_pipeline(pipeline);

        let tasks = pipeline
            .nodes()
            .map(|node| {
                let deps = graph.dependencies_of(&node.name).to_vec();
                (node.name.clone(), TaskInfo::from_node(node, deps))
            })
            .collect();

        Self {
            graph,
            tasks,
            run_counter: 0,
            current_run_id: None,
        }
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Current run ID, if any.
    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    /// Read-only view of the given task's run state.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.into())
    }

    /// Names of tasks that are currently participating in the *active* run.
    pub fn tasks_in_current_run(&self) -> Vec<TaskName> {
        if self.current_run_id.is_none() {
            return Vec::new();
        }

        self.tasks
            .values()
            .filter(|info| info.run_state.is_some())
            .map(|info| info.name.clone())
            .collect()
    }

    /// Tasks whose state in the current (or most recently finished) run is
    /// `DoneFailed`, sorted by name.
    pub fn failed_tasks(&self) -> Vec<TaskName> {
        let mut failed: Vec<TaskName> = self
            .tasks
            .values()
            .filter(|info| matches!(info.run_state, Some(RunState::DoneFailed)))
            .map(|info| info.name.clone())
            .collect();
        failed.sort();
        failed
    }

    /// Whether the dependencies of `task` are satisfied for the *current run*.
    ///
    /// Returns `None` if the task is unknown.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        let info = self.tasks.get(task)?;
        let mgr = ReadOnlyStateManager::new(&self.tasks);
        Some(mgr.deps_satisfied_for_info(info))
    }

    /// Start a new run, resetting per-run state but keeping historical success
    /// information (for dependency satisfaction on later runs).
    pub fn start_new_run(&mut self) {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);

        for info in self.tasks.values_mut() {
            info.run_state = None;
        }

        debug!(run_id = self.run_counter, "scheduler: starting new DAG run");
    }

    /// Handle a trigger for a task name, pulling in its dependents.
    pub fn handle_trigger(&mut self, task: &str) -> Vec<ScheduledTask> {
        self.handle_trigger_scoped(task, TriggerScope::WithDependents)
    }

    /// Handle a trigger whose reach into the DAG is given by `scope`.
    pub fn handle_trigger_scoped(&mut self, task: &str, scope: TriggerScope) -> Vec<ScheduledTask> {
        self.trigger_step_internal(task, scope).newly_scheduled
    }

    /// Handle "progress" from a long-lived task (production API).
    pub fn handle_progress(&mut self, task: &str) -> Vec<ScheduledTask> {
        self.progress_step_internal(task).newly_scheduled
    }

    /// Handle completion of a stage with a concrete outcome (production API).
    pub fn handle_completion(&mut self, task: &str, outcome: TaskOutcome) -> Vec<ScheduledTask> {
        self.completion_step_internal(task, outcome).newly_scheduled
    }

    /// Manual-step variant of `handle_progress` that returns a rich [`SchedulerStep`].
    pub fn step_progress(&mut self, task: &str) -> SchedulerStep {
        self.progress_step_internal(task)
    }

    /// Manual-step variant of `handle_completion` that returns a rich [`SchedulerStep`].
    pub fn step_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        self.completion_step_internal(task, outcome)
    }

    /// Task names, for diagnostics and dry-run output.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.graph.tasks()
    }

    /// Clear `current_run_id` once every participating task is terminal.
    ///
    /// Returns `true` if this call transitioned the scheduler from running
    /// to idle.
    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }

        let manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);

        if manager.all_tasks_terminal() {
            info!(
                run_id = self.current_run_id,
                "scheduler: all tasks terminal; marking run as finished"
            );
            self.current_run_id = None;
            true
        } else {
            false
        }
    }

    fn trigger_step_internal(&mut self, task: &str, scope: TriggerScope) -> SchedulerStep {
        if self.current_run_id.is_none() {
            warn!(
                task = %task,
                "handle_trigger called with no active run; implicitly starting a new run"
            );
            self.start_new_run();
        }

        if self.tasks.contains_key(task) {
            let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
            match scope {
                TriggerScope::WithDependents => manager.mark_task_and_dependents_pending(task),
                TriggerScope::Alone => manager.mark_task_pending(task),
            }
        } else {
            warn!(task = %task, "trigger for unknown task; ignoring");
        }

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed: Vec::new(),
            run_just_finished,
        }
    }

    fn progress_step_internal(&mut self, task: &str) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            debug!(
                task = %task,
                "progress reported with no active run; ignoring"
            );
            return SchedulerStep::default();
        };

        match self.tasks.get_mut(task) {
            Some(info) => {
                debug!(
                    task = %info.name,
                    run_id,
                    "task reported progress; marking DoneSuccess for this run"
                );
                info.run_state = Some(RunState::DoneSuccess);
                info.last_successful_run = Some(run_id);
            }
            None => {
                warn!(task = %task, "progress from unknown task; ignoring");
                return SchedulerStep::default();
            }
        }

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed: Vec::new(),
            run_just_finished,
        }
    }

    fn completion_step_internal(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            warn!(
                task = %task,
                "completion reported with no active run; ignoring"
            );
            return SchedulerStep::default();
        };

        let mut newly_scheduled = Vec::new();
        let mut newly_failed = Vec::new();

        match self.tasks.get_mut(task) {
            Some(info) => match outcome {
                TaskOutcome::Success => {
                    info.run_state = Some(RunState::DoneSuccess);
                    info.last_successful_run = Some(run_id);
                    debug!(task = %info.name, run_id, "stage completed successfully");
                    let mut manager =
                        StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                    newly_scheduled.extend(manager.collect_new_ready_tasks());
                }
                TaskOutcome::Failed(reason) => {
                    info.run_state = Some(RunState::DoneFailed);
                    info.last_failed_run = Some(run_id);
                    warn!(
                        task = %info.name,
                        run_id,
                        %reason,
                        "stage failed; failing dependents in this run"
                    );
                    newly_failed.push(info.name.clone());
                    let mut manager =
                        StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                    newly_failed.append(&mut manager.mark_dependents_failed(task));
                }
            },
            None => {
                warn!(task = %task, "completion for unknown task; ignoring");
            }
        }

        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed,
            run_just_finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::names;

    fn names_of(tasks: &[ScheduledTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn standard_pipeline_walks_in_order() {
        let mut s = Scheduler::from_pipeline(&Pipeline::standard(true).unwrap());
        s.start_new_run();

        let ready = s.handle_trigger(names::CLEAN);
        assert_eq!(names_of(&ready), vec![names::CLEAN]);
        // watch is only part of the run when triggered directly.
        assert_eq!(s.run_state_of(names::WATCH), Some(TaskRunState::NotInRun));
        assert!(s.handle_trigger(names::WATCH).is_empty());

        let ready = s.handle_completion(names::CLEAN, TaskOutcome::Success);
        assert_eq!(names_of(&ready), vec![names::HTML]);

        let ready = s.handle_completion(names::HTML, TaskOutcome::Success);
        assert_eq!(
            names_of(&ready),
            vec![names::ASSETS, names::SCRIPTS, names::STYLES]
        );

        assert!(s.handle_completion(names::STYLES, TaskOutcome::Success).is_empty());
        assert!(s.handle_completion(names::ASSETS, TaskOutcome::Success).is_empty());
        let ready = s.handle_completion(names::SCRIPTS, TaskOutcome::Success);
        assert_eq!(names_of(&ready), vec![names::WATCH]);

        let step = s.step_progress(names::WATCH);
        assert!(step.run_just_finished);
        assert!(s.is_idle());
        assert!(s.failed_tasks().is_empty());
    }

    #[test]
    fn clean_failure_fails_everything_downstream() {
        let mut s = Scheduler::from_pipeline(&Pipeline::standard(true).unwrap());
        s.start_new_run();
        s.handle_trigger(names::CLEAN);
        s.handle_trigger(names::WATCH);

        let step = s.step_completion(names::CLEAN, TaskOutcome::Failed("denied".into()));
        assert!(step.newly_scheduled.is_empty());
        assert!(step.run_just_finished);
        assert_eq!(s.failed_tasks().len(), 6);
    }

    #[test]
    fn rerun_of_styles_does_not_pull_in_watch() {
        let mut s = Scheduler::from_pipeline(&Pipeline::standard(true).unwrap());
        s.start_new_run();
        for t in [names::CLEAN, names::WATCH] {
            s.handle_trigger(t);
        }
        for t in [names::CLEAN, names::HTML, names::STYLES, names::SCRIPTS, names::ASSETS] {
            s.handle_completion(t, TaskOutcome::Success);
        }
        s.handle_progress(names::WATCH);
        assert!(s.is_idle());

        s.start_new_run();
        let ready = s.handle_trigger(names::STYLES);
        assert_eq!(names_of(&ready), vec![names::STYLES]);
        let mut in_run = s.tasks_in_current_run();
        in_run.sort();
        assert_eq!(in_run, vec![names::STYLES.to_string()]);

        let step = s.step_completion(names::STYLES, TaskOutcome::Success);
        assert!(step.newly_scheduled.is_empty());
        assert!(step.run_just_finished);
    }

    #[test]
    fn lone_trigger_leaves_dependents_out_of_the_run() {
        let mut s = Scheduler::from_pipeline(&Pipeline::standard(true).unwrap());
        s.start_new_run();
        s.handle_trigger(names::CLEAN);
        for t in [names::CLEAN, names::HTML, names::STYLES, names::SCRIPTS, names::ASSETS] {
            s.handle_completion(t, TaskOutcome::Success);
        }
        assert!(s.is_idle());

        s.start_new_run();
        let ready = s.handle_trigger_scoped(names::HTML, TriggerScope::Alone);
        assert_eq!(names_of(&ready), vec![names::HTML]);
        assert_eq!(s.tasks_in_current_run(), vec![names::HTML.to_string()]);

        let step = s.step_completion(names::HTML, TaskOutcome::Success);
        assert!(step.newly_scheduled.is_empty());
        assert!(step.run_just_finished);
    }
}
