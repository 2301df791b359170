// src/dag/pipeline.rs

//! Declarative pipeline: named task nodes plus `after` edges.
//!
//! The standard composition is
//!
//! ```text
//! clean -> html -> { styles, scripts, assets } -> watch
//! ```
//!
//! `watch` is long-lived and only joins a run when triggered directly, so
//! re-running a stage during the dev session never restarts it.

use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::engine::TaskName;
use crate::errors::{AssetdagError, Result};
use crate::stage::names;

/// A single named node in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    pub name: TaskName,
    /// Direct dependencies: this task waits for all of them.
    pub after: Vec<TaskName>,
    /// The task keeps running after reporting progress (the dev session).
    pub long_lived: bool,
    /// Only part of a run when triggered directly, never because an
    /// upstream task re-ran.
    pub own_triggers_only: bool,
}

impl TaskNode {
    pub fn new(name: impl Into<TaskName>) -> Self {
        Self {
            name: name.into(),
            after: Vec::new(),
            long_lived: false,
            own_triggers_only: false,
        }
    }

    pub fn after<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        self.after.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn long_lived(mut self, val: bool) -> Self {
        self.long_lived = val;
        self
    }

    pub fn own_triggers_only(mut self, val: bool) -> Self {
        self.own_triggers_only = val;
        self
    }
}

/// Validated set of task nodes.
#[derive(Debug, Clone)]
pub struct Pipeline {
    nodes: BTreeMap<TaskName, TaskNode>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// The fixed build composition.
    ///
    /// With `include_watch = false` (used by `--once`) the terminal `watch`
    /// node is left out.
    pub fn standard(include_watch: bool) -> Result<Self> {
        let mut builder = Pipeline::builder()
            .task(TaskNode::new(names::CLEAN))
            .task(TaskNode::new(names::HTML).after([names::CLEAN]))
            .task(TaskNode::new(names::STYLES).after([names::HTML]))
            .task(TaskNode::new(names::SCRIPTS).after([names::HTML]))
            .task(TaskNode::new(names::ASSETS).after([names::HTML]));

        if include_watch {
            builder = builder.task(
                TaskNode::new(names::WATCH)
                    .after([names::STYLES, names::SCRIPTS, names::ASSETS])
                    .long_lived(true)
                    .own_triggers_only(true),
            );
        }

        builder.build()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    pub fn get(&self, name: &str) -> Option<&TaskNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Tasks to trigger when the process starts: every node without
    /// dependencies, plus the nodes that never join a run implicitly.
    pub fn initial_triggers(&self) -> Vec<TaskName> {
        self.nodes
            .values()
            .filter(|n| n.after.is_empty() || n.own_triggers_only)
            .map(|n| n.name.clone())
            .collect()
    }
}

/// Collects nodes and validates them into a [`Pipeline`].
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    nodes: BTreeMap<TaskName, TaskNode>,
}

impl PipelineBuilder {
    pub fn task(mut self, node: TaskNode) -> Self {
        self.nodes.insert(node.name.clone(), node);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        ensure_has_tasks(&self.nodes)?;
        validate_dependencies(&self.nodes)?;
        validate_acyclic(&self.nodes)?;
        validate_long_lived_terminal(&self.nodes)?;
        Ok(Pipeline { nodes: self.nodes })
    }
}

fn ensure_has_tasks(nodes: &BTreeMap<TaskName, TaskNode>) -> Result<()> {
    if nodes.is_empty() {
        return Err(AssetdagError::ConfigError(
            "pipeline must contain at least one task".to_string(),
        ));
    }
    Ok(())
}

fn validate_dependencies(nodes: &BTreeMap<TaskName, TaskNode>) -> Result<()> {
    for (name, node) in nodes.iter() {
        for dep in node.after.iter() {
            if dep == name {
                return Err(AssetdagError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !nodes.contains_key(dep) {
                return Err(AssetdagError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_acyclic(nodes: &BTreeMap<TaskName, TaskNode>) -> Result<()> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in nodes.keys() {
        graph.add_node(name.as_str());
    }

    for (name, node) in nodes.iter() {
        for dep in node.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(AssetdagError::DagCycle(format!(
                "cycle detected in task DAG involving task '{}'",
                node
            )))
        }
    }
}

fn validate_long_lived_terminal(nodes: &BTreeMap<TaskName, TaskNode>) -> Result<()> {
    for node in nodes.values() {
        for dep in node.after.iter() {
            if nodes.get(dep).is_some_and(|d| d.long_lived) {
                return Err(AssetdagError::ConfigError(format!(
                    "long-lived task '{}' must be terminal, but '{}' depends on it",
                    dep, node.name
                )));
            }
        }
    }
    Ok(())
}
