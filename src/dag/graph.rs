// src/dag/graph.rs

use std::collections::HashMap;

use crate::dag::pipeline::Pipeline;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct dependencies: tasks that must succeed before this one can run.
    deps: Vec<String>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<String>,
}

/// In-memory adjacency view keyed by task name.
///
/// Acyclicity is validated when the [`Pipeline`] is built; here we just keep
/// adjacency information for scheduling and diagnostics.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
}

impl DagGraph {
    /// Build a DAG from a validated [`Pipeline`].
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        let mut nodes: HashMap<String, DagNode> = HashMap::new();

        for task in pipeline.nodes() {
            nodes.insert(
                task.name.clone(),
                DagNode {
                    deps: task.after.clone(),
                    dependents: Vec::new(),
                },
            );
        }

        // Dependents are derived from deps. Iterating the pipeline (ordered
        // by name) keeps the dependents lists deterministic.
        for task in pipeline.nodes() {
            for dep in task.after.iter() {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(task.name.clone());
                }
            }
        }

        Self { nodes }
    }

    /// Return all task names.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// Immediate dependencies of a task (the tasks listed in its `after`).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one in their `after`).
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}
