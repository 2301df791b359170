// src/engine/queue.rs

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, warn};

use crate::engine::TaskName;
use crate::types::TriggerWhileRunningBehaviour;

/// Stage triggers that arrive while a build run is active.
///
/// Each entry is a *batch* of stage names that will seed one future run.
/// `max_runs` bounds how many batches are kept; when the engine goes idle it
/// calls [`TriggerQueue::drain_pending`], which merges every queued batch
/// into the trigger set of the next run.
#[derive(Debug)]
pub struct TriggerQueue {
    behaviour: TriggerWhileRunningBehaviour,
    max_runs: usize,
    runs: VecDeque<BTreeSet<TaskName>>,
}

impl TriggerQueue {
    /// `max_runs` is clamped to at least 1.
    pub fn new(behaviour: TriggerWhileRunningBehaviour, max_runs: usize) -> Self {
        Self {
            behaviour,
            max_runs: max_runs.max(1),
            runs: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Record a trigger for a stage that is already part of the active run.
    ///
    /// - `Queue` merges the stage into the last batch (creating one if
    ///   needed) and drops the oldest batches beyond `max_runs`.
    /// - `Cancel` replaces every queued batch with one holding only this
    ///   stage. Running stages are never interrupted.
    pub fn record_trigger(&mut self, task: &str) {
        let name = task.to_string();

        match self.behaviour {
            TriggerWhileRunningBehaviour::Queue => {
                if let Some(last_batch) = self.runs.back_mut() {
                    let inserted = last_batch.insert(name.clone());
                    debug!(task = %name, inserted, "merged trigger into queued batch");
                } else {
                    self.runs.push_back(BTreeSet::from([name.clone()]));
                    debug!(task = %name, "queued first batch");
                }

                if self.runs.len() > self.max_runs {
                    warn!(
                        current_batches = self.runs.len(),
                        max_runs = self.max_runs,
                        "exceeded queue_length; dropping oldest queued batches"
                    );
                    while self.runs.len() > self.max_runs {
                        self.runs.pop_front();
                    }
                }
            }
            TriggerWhileRunningBehaviour::Cancel => {
                debug!(task = %name, "replacing queued batches (cancel mode)");
                self.runs.clear();
                self.runs.push_back(BTreeSet::from([name]));
            }
        }
    }

    /// Merge and remove every queued batch. The result is sorted.
    pub fn drain_pending(&mut self) -> Vec<TaskName> {
        let mut merged: BTreeSet<TaskName> = BTreeSet::new();
        while let Some(batch) = self.runs.pop_front() {
            merged.extend(batch);
        }
        debug!(drained = merged.len(), "drained queued triggers into new run");
        merged.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_mode_coalesces_into_one_batch() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Queue, 1);
        q.record_trigger("styles");
        q.record_trigger("scripts");
        q.record_trigger("styles");
        assert_eq!(q.drain_pending(), vec!["scripts", "styles"]);
        assert!(q.is_empty());
    }

    #[test]
    fn cancel_mode_keeps_only_latest() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Cancel, 3);
        q.record_trigger("styles");
        q.record_trigger("assets");
        assert_eq!(q.drain_pending(), vec!["assets"]);
    }

    #[test]
    fn zero_length_is_clamped() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Queue, 0);
        q.record_trigger("html");
        assert!(!q.is_empty());
    }
}
