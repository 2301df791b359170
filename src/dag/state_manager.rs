// src/dag/state_manager.rs

//! Per-run state management for tasks in the scheduler.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::dag::DagGraph;
use crate::engine::TaskName;

/// Manages per-run state transitions for tasks.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        current_run_id: Option<u64>,
    ) -> Self {
        Self {
            graph,
            tasks,
            current_run_id,
        }
    }

    /// Include a triggered task and its downstream dependents in this run.
    ///
    /// - Tasks that were not yet part of the run (`run_state == None`) are
    ///   marked `Pending`.
    /// - Tasks already participating in this run keep their current state.
    /// - Dependents flagged `own_triggers_only` are not pulled in; they join
    ///   a run only when they are the triggered root themselves.
    pub fn mark_task_and_dependents_pending(&mut self, root: &str) {
        let mut stack: Vec<TaskName> = vec![root.to_string()];
        let mut visited: HashSet<TaskName> = HashSet::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }

            let Some(info) = self.tasks.get_mut(&name) else {
                warn!(task = %name, "node in DAG not present in tasks map");
                continue;
            };

            if info.own_triggers_only && name != root {
                debug!(task = %info.name, "own_triggers_only; not joining run via upstream trigger");
                continue;
            }

            if info.run_state.is_none() {
                info.run_state = Some(RunState::Pending);
                debug!(task = %info.name, "marked Pending for this run");
            }

            for dep_name in self.graph.dependents_of(&name).iter().cloned() {
                stack.push(dep_name);
            }
        }
    }

    /// Include only `task` in this run; its dependents keep their state.
    pub fn mark_task_pending(&mut self, task: &str) {
        let Some(info) = self.tasks.get_mut(task) else {
            warn!(task = %task, "node in DAG not present in tasks map");
            return;
        };

        if info.run_state.is_none() {
            info.run_state = Some(RunState::Pending);
            debug!(task = %info.name, "marked Pending for this run (dependents left out)");
        }
    }

    /// Determine whether all dependencies of the given task are satisfied for
    /// the *current run*.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        let ro = ReadOnlyStateManager::new(self.tasks);
        ro.deps_satisfied_for_info(info)
    }

    /// Mark all participating dependents (transitively) of a failed task as
    /// `DoneFailed` for this run.
    ///
    /// Returns the list of tasks that were newly marked as failed (excluding
    /// the root task; the caller adds that separately).
    pub fn mark_dependents_failed(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<TaskName> = self
            .graph
            .dependents_of(failed_task)
            .iter()
            .cloned()
            .collect();

        let mut newly_failed = Vec::new();

        while let Some(name) = stack.pop() {
            if let Some(info) = self.tasks.get_mut(&name) {
                match info.run_state {
                    Some(RunState::Pending) | Some(RunState::Running) => {
                        info.run_state = Some(RunState::DoneFailed);
                        debug!(
                            task = %info.name,
                            "marking dependent as DoneFailed due to upstream failure"
                        );
                        newly_failed.push(info.name.clone());
                        stack.extend(self.graph.dependents_of(&name).iter().cloned());
                    }
                    Some(RunState::DoneSuccess) | Some(RunState::DoneFailed) | None => {
                        // Either already terminal or not participating in this run.
                    }
                }
            }
        }

        newly_failed
    }

    /// Collect tasks that are `Pending` and whose dependencies are satisfied,
    /// mark them as `Running`, and return them as `ScheduledTask`s.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let mut ready = Vec::new();

        // Decide first, then mutate. Sorted so dispatch order is stable.
        let mut candidates: Vec<TaskName> = self
            .tasks
            .values()
            .filter(|info| {
                matches!(info.run_state, Some(RunState::Pending))
                    && self.deps_satisfied_for_info(info)
            })
            .map(|info| info.name.clone())
            .collect();
        candidates.sort();

        for name in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                let is_rerun = info.last_successful_run.is_some() || info.last_failed_run.is_some();

                if is_rerun {
                    info!(
                        task = %info.name,
                        run_id = self.current_run_id,
                        "scheduling stage for re-run"
                    );
                } else {
                    info!(
                        task = %info.name,
                        run_id = self.current_run_id,
                        "scheduling stage for first run"
                    );
                }

                info.run_state = Some(RunState::Running);
                ready.push(ScheduledTask::from_task_info(
                    info,
                    self.current_run_id.unwrap_or(0),
                ));
            }
        }

        ready
    }

    /// Check if all tasks are in a terminal state.
    pub fn all_tasks_terminal(&self) -> bool {
        !self.tasks.values().any(|info| {
            matches!(
                info.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            )
        })
    }
}

/// A read-only view for checking dependency satisfaction.
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a HashMap<TaskName, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a HashMap<TaskName, TaskInfo>) -> Self {
        Self { tasks }
    }

    /// A dependency participating in this run must have succeeded in it; a
    /// dependency outside the run counts if it ever succeeded.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        for dep_name in &info.deps {
            let Some(dep) = self.tasks.get(dep_name) else {
                warn!(
                    task = %info.name,
                    dep = %dep_name,
                    "dependency missing from tasks map"
                );
                return false;
            };

            match dep.run_state {
                Some(RunState::DoneSuccess) => {}
                Some(RunState::DoneFailed)
                | Some(RunState::Pending)
                | Some(RunState::Running) => return false,
                None => {
                    if dep.last_successful_run.is_none() {
                        return false;
                    }
                }
            }
        }

        true
    }
}
