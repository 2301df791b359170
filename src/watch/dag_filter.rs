// src/watch/dag_filter.rs

//! When one changed path belongs to several stages, only the upstream-most
//! ones are re-run; their dependents follow through the DAG anyway.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::dag::Pipeline;
use crate::engine::TaskName;

/// Direct dependencies per task.
pub type DepMap = HashMap<TaskName, Vec<TaskName>>;

pub fn dep_map(pipeline: &Pipeline) -> DepMap {
    pipeline
        .nodes()
        .map(|n| (n.name.clone(), n.after.clone()))
        .collect()
}

/// Whether `task` has a (transitive) dependency in `matching`.
pub fn has_ancestor_in_matching(task: &str, matching: &BTreeSet<TaskName>, deps: &DepMap) -> bool {
    let mut stack: Vec<&TaskName> = deps.get(task).map(|d| d.iter().collect()).unwrap_or_default();
    let mut visited: HashSet<&TaskName> = HashSet::new();

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        if matching.contains(current) {
            return true;
        }
        if let Some(parents) = deps.get(current) {
            stack.extend(parents.iter());
        }
    }

    false
}

/// Drop every task that has an ancestor in the same set.
pub fn roots_only(matching: BTreeSet<TaskName>, deps: &DepMap) -> BTreeSet<TaskName> {
    matching
        .iter()
        .filter(|t| !has_ancestor_in_matching(t, &matching, deps))
        .cloned()
        .collect()
}
