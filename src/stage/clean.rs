// src/stage/clean.rs

use std::path::PathBuf;

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info};

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::stage::{FileResult, Stage, StageContext, StageFuture, StageReport, names};

/// Empties the build output root, keeping the preserved top-level entries.
#[derive(Debug, Clone)]
pub struct CleanStage {
    root: PathBuf,
    preserve: GlobSet,
}

impl CleanStage {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &cfg.clean().preserve {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            root: PathBuf::from(&cfg.clean().root),
            preserve: builder.build()?,
        })
    }

    async fn clean(&self, ctx: &StageContext) -> Result<StageReport> {
        let root = ctx.resolve(&self.root);
        let mut report = StageReport::default();

        if !root.exists() {
            debug!(root = %root.display(), "output root missing; nothing to clean");
            return Ok(report);
        }

        let mut entries = tokio::fs::read_dir(&root)
            .await
            .with_context(|| format!("listing {}", root.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();

            if self.preserve.is_match(&name) {
                debug!(entry = %name, "preserved");
                report.push(FileResult::Skipped { src: path });
                continue;
            }

            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path)
                    .await
                    .with_context(|| format!("removing {}", path.display()))?;
            } else {
                tokio::fs::remove_file(&path)
                    .await
                    .with_context(|| format!("removing {}", path.display()))?;
            }
            report.push(FileResult::Written {
                src: path.clone(),
                dest: path,
            });
        }

        info!(
            root = %root.display(),
            removed = report.written_count(),
            preserved = report.skipped_count(),
            "cleaned output root"
        );
        Ok(report)
    }
}

impl Stage for CleanStage {
    fn name(&self) -> &str {
        names::CLEAN
    }

    fn run<'a>(&'a self, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(self.clean(ctx))
    }
}
