// src/watch/patterns.rs

//! Watch bindings: which root-relative paths lead to which action.

use std::fmt;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::{ConfigFile, PathSetConfig};
use crate::engine::TaskName;
use crate::errors::Result;
use crate::stage::names;

/// What a change to a bound path causes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum WatchAction {
    /// Re-run the stage that owns the path.
    RunTask(TaskName),
    /// Only tell connected browsers to reload.
    ReloadOnly,
}

/// Compiled globs bound to one action.
#[derive(Clone)]
pub struct WatchBinding {
    patterns: Vec<String>,
    set: GlobSet,
    action: WatchAction,
}

impl fmt::Debug for WatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBinding")
            .field("patterns", &self.patterns)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

impl WatchBinding {
    pub fn new(patterns: &[String], action: WatchAction) -> Result<Self> {
        Ok(Self {
            patterns: patterns.to_vec(),
            set: build_globset(patterns)?,
            action,
        })
    }

    pub fn run_task(task: &str, paths: &PathSetConfig) -> Result<Self> {
        Self::new(&paths.src, WatchAction::RunTask(task.to_string()))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn action(&self) -> &WatchAction {
        &self.action
    }

    /// `rel_path` is relative to the project root, with forward slashes.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.set.is_match(rel_path)
    }
}

/// Default bindings: every source path set re-runs its stage, and
/// `watch.reload_on` globs only reload.
pub fn bindings_from_config(cfg: &ConfigFile) -> Result<Vec<WatchBinding>> {
    let paths = cfg.paths();
    Ok(vec![
        WatchBinding::run_task(names::STYLES, &paths.styles)?,
        WatchBinding::run_task(names::SCRIPTS, &paths.scripts)?,
        WatchBinding::run_task(names::HTML, &paths.html)?,
        WatchBinding::run_task(names::ASSETS, &paths.assets)?,
        WatchBinding::new(&cfg.watch().reload_on, WatchAction::ReloadOnly)?,
    ])
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(Glob::new(pat)?);
    }
    Ok(builder.build()?)
}

/// `path` relative to `root` with forward slashes.
///
/// Falls back to comparing canonical forms, since watchers may report
/// paths through a different prefix (symlinked temp dirs on macOS).
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let to_str = |rel: &Path| rel.to_string_lossy().replace('\\', "/");

    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_str(rel));
    }

    let root = root.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    path.strip_prefix(&root).ok().map(to_str)
}
