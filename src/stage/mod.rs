// src/stage/mod.rs

//! Build stages.
//!
//! Each stage reads one [`PathSet`], hands every file to a library for the
//! actual transformation and records a [`FileResult`] per file. Per-file
//! failures are collected into the [`StageReport`]; only setup problems
//! (missing source directory, unwritable destination) fail the stage itself.
//!
//! - [`clean`] empties the build output root.
//! - [`html`], [`styles`], [`scripts`], [`assets`] are the transform stages.
//! - [`watch`] is the long-lived dev session (server, reload hub, watcher).

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::ConfigFile;
use crate::engine::{RuntimeEvent, TaskName};
use crate::errors::Result;
use crate::serve::ReloadHub;

pub mod assets;
pub mod clean;
pub mod html;
pub mod paths;
pub mod scripts;
pub mod styles;
pub mod watch;

pub use paths::{PathSet, SourceFile};

/// Stage names as they appear in the pipeline.
pub mod names {
    pub const CLEAN: &str = "clean";
    pub const HTML: &str = "html";
    pub const STYLES: &str = "styles";
    pub const SCRIPTS: &str = "scripts";
    pub const ASSETS: &str = "assets";
    pub const WATCH: &str = "watch";
}

/// Future returned by [`Stage::run`].
pub type StageFuture<'a> = Pin<Box<dyn Future<Output = Result<StageReport>> + Send + 'a>>;

/// A named, side-effecting build step.
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    fn run<'a>(&'a self, ctx: &'a StageContext) -> StageFuture<'a>;
}

/// Everything a stage needs from the outside world.
#[derive(Clone)]
pub struct StageContext {
    /// Project root; every configured path is relative to it.
    pub root: PathBuf,
    /// Channel into the engine, used by the watch stage.
    pub runtime_tx: mpsc::Sender<RuntimeEvent>,
    /// Browser notifications.
    pub reload: ReloadHub,
}

impl fmt::Debug for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl StageContext {
    pub fn new(root: impl Into<PathBuf>, runtime_tx: mpsc::Sender<RuntimeEvent>, reload: ReloadHub) -> Self {
        Self {
            root: root.into(),
            runtime_tx,
            reload,
        }
    }

    /// Resolve a configured (root-relative) path.
    pub fn resolve(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }
}

/// Result of processing one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileResult {
    Written { src: PathBuf, dest: PathBuf },
    /// Destination already up to date.
    Skipped { src: PathBuf },
    Failed { src: PathBuf, cause: String },
}

/// Per-file results of one stage run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub results: Vec<FileResult>,
}

impl StageReport {
    pub fn push(&mut self, result: FileResult) {
        self.results.push(result);
    }

    pub fn written(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.results.iter().filter_map(|r| match r {
            FileResult::Written { src, dest } => Some((src.as_path(), dest.as_path())),
            _ => None,
        })
    }

    pub fn written_count(&self) -> usize {
        self.written().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, FileResult::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, FileResult::Failed { .. }))
            .count()
    }
}

/// Stage implementations keyed by task name.
pub type StageRegistry = HashMap<TaskName, Arc<dyn Stage>>;

/// Build every stage from the validated configuration.
pub fn registry_from_config(cfg: &ConfigFile) -> Result<StageRegistry> {
    let stages: Vec<Arc<dyn Stage>> = vec![
        Arc::new(clean::CleanStage::from_config(cfg)?),
        Arc::new(html::HtmlStage::from_config(cfg)?),
        Arc::new(styles::StylesStage::from_config(cfg)?),
        Arc::new(scripts::ScriptsStage::from_config(cfg)?),
        Arc::new(assets::AssetsStage::from_config(cfg)?),
        Arc::new(watch::WatchStage::from_config(cfg)?),
    ];

    Ok(stages
        .into_iter()
        .map(|s| (s.name().to_string(), s))
        .collect())
}

/// Path of `dest` relative to `root` with forward slashes, for logs and
/// reload messages.
pub(crate) fn display_rel(root: &Path, dest: &Path) -> String {
    dest.strip_prefix(root)
        .unwrap_or(dest)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Create the parent directory of `dest` if needed.
pub(crate) async fn ensure_parent(dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}
