// src/stage/html.rs

use anyhow::Context;
use minify_html::Cfg;
use tracing::{debug, info};

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::stage::paths::{PathSet, SourceFile};
use crate::stage::{
    FileResult, Stage, StageContext, StageFuture, StageReport, display_rel, ensure_parent, names,
};

/// Mirrors `src/**/*.html` into the output root with whitespace collapsed.
#[derive(Debug, Clone)]
pub struct HtmlStage {
    paths: PathSet,
}

impl HtmlStage {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Ok(Self {
            paths: PathSet::from_config(names::HTML, &cfg.paths().html)?,
        })
    }

    async fn build(&self, ctx: &StageContext) -> Result<StageReport> {
        let dest_root = ctx.resolve(self.paths.dest());
        let mut report = StageReport::default();

        for file in self.paths.expand(&ctx.root)? {
            let dest = dest_root.join(&file.rel);
            match minify_file(&file, &dest).await {
                Ok(()) => {
                    debug!(file = %display_rel(&ctx.root, &dest), "wrote html");
                    ctx.reload.reload();
                    report.push(FileResult::Written {
                        src: file.path,
                        dest,
                    });
                }
                Err(err) => {
                    tracing::error!(file = %file.path.display(), error = %err, "html minification failed");
                    report.push(FileResult::Failed {
                        src: file.path,
                        cause: format!("{err:#}"),
                    });
                }
            }
        }

        info!(
            written = report.written_count(),
            failed = report.failed_count(),
            "html stage finished"
        );
        Ok(report)
    }
}

async fn minify_file(file: &SourceFile, dest: &std::path::Path) -> anyhow::Result<()> {
    let source = tokio::fs::read(&file.path)
        .await
        .with_context(|| format!("reading {}", file.path.display()))?;

    let minified = collapse_html(&source);

    ensure_parent(dest).await?;
    tokio::fs::write(dest, minified)
        .await
        .with_context(|| format!("writing {}", dest.display()))?;
    Ok(())
}

fn html_cfg() -> Cfg {
    let mut cfg = Cfg::default();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg
}

/// Collapse insignificant whitespace in an HTML document.
pub fn collapse_html(source: &[u8]) -> Vec<u8> {
    minify_html::minify(source, &html_cfg())
}

impl Stage for HtmlStage {
    fn name(&self) -> &str {
        names::HTML
    }

    fn run<'a>(&'a self, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(self.build(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_but_keeps_closing_tags() {
        let out = collapse_html(b"<html>\n  <head></head>\n  <body>\n    <p>hi</p>\n  </body>\n</html>\n");
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("<p>hi</p>"));
        assert!(out.contains("</body>"));
        assert!(!out.contains("\n  "));
    }
}
