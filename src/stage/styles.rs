// src/stage/styles.rs

//! SCSS → minified, prefixed CSS with an external source map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::stage::paths::{PathSet, SourceFile};
use crate::stage::{
    FileResult, Stage, StageContext, StageFuture, StageReport, display_rel, ensure_parent, names,
};

/// CSS produced from one SCSS entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStyle {
    pub css: String,
    pub map: String,
}

#[derive(Debug, Clone)]
pub struct StylesStage {
    paths: PathSet,
    basename: String,
    /// Directory the dev server serves; inject paths are relative to it.
    serve_root: PathBuf,
}

impl StylesStage {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Ok(Self {
            paths: PathSet::from_config(names::STYLES, &cfg.paths().styles)?,
            basename: cfg.styles().basename.clone(),
            serve_root: PathBuf::from(&cfg.clean().root),
        })
    }

    /// Output path for an entry point: same relative directory, renamed.
    fn output_for(&self, dest_root: &Path, file: &SourceFile) -> PathBuf {
        let rel_dir = file.rel.parent().unwrap_or(Path::new(""));
        dest_root.join(rel_dir).join(format!("{}.css", self.basename))
    }

    async fn build(&self, ctx: &StageContext) -> Result<StageReport> {
        let dest_root = ctx.resolve(self.paths.dest());
        let serve_root = ctx.resolve(&self.serve_root);
        let bases: Vec<PathBuf> = self.paths.bases().iter().map(|b| ctx.resolve(b)).collect();

        let mut planned: BTreeMap<PathBuf, SourceFile> = BTreeMap::new();
        for file in self.paths.expand(&ctx.root)? {
            if is_partial(&file.path) {
                debug!(file = %file.path.display(), "skipping partial");
                continue;
            }
            let dest = self.output_for(&dest_root, &file);
            if let Some(previous) = planned.insert(dest.clone(), file) {
                warn!(
                    dest = %dest.display(),
                    dropped = %previous.path.display(),
                    "several stylesheets rename to the same output; the later one wins"
                );
            }
        }

        let mut report = StageReport::default();
        for (dest, file) in planned {
            let mut load_paths = bases.clone();
            if let Some(dir) = file.path.parent() {
                load_paths.insert(0, dir.to_path_buf());
            }

            match build_one(&file.path, &dest, load_paths).await {
                Ok(()) => {
                    let served = display_rel(&serve_root, &dest);
                    debug!(file = %served, "wrote stylesheet");
                    ctx.reload.inject(served);
                    report.push(FileResult::Written {
                        src: file.path,
                        dest,
                    });
                }
                Err(err) => {
                    error!(file = %file.path.display(), error = %format!("{err:#}"), "style compilation failed");
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
            "styles stage finished"
        );
        Ok(report)
    }
}

async fn build_one(src: &Path, dest: &Path, load_paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let map_name = format!(
        "{}.map",
        dest.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );

    let src_owned = src.to_path_buf();
    let compiled = tokio::task::spawn_blocking(move || {
        let css = compile_scss(&src_owned, &load_paths)?;
        let filename = src_owned.to_string_lossy().into_owned();
        minify_css(&css, &filename)
    })
    .await
    .context("style worker panicked")??;

    ensure_parent(dest).await?;
    let css = format!("{}\n/*# sourceMappingURL={} */\n", compiled.css, map_name);
    tokio::fs::write(dest, css)
        .await
        .with_context(|| format!("writing {}", dest.display()))?;
    tokio::fs::write(dest.with_file_name(&map_name), compiled.map)
        .await
        .with_context(|| format!("writing source map for {}", dest.display()))?;
    Ok(())
}

/// `_name.scss` files are only meant to be imported.
fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

/// Compile one SCSS file to plain CSS.
pub fn compile_scss(path: &Path, load_paths: &[PathBuf]) -> anyhow::Result<String> {
    let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
    for dir in load_paths {
        options = options.load_path(dir);
    }
    grass::from_path(path, &options).map_err(|e| anyhow!("{e}"))
}

fn browser_targets() -> Targets {
    let version = |major: u32| Some(major << 16);
    Targets::from(Browsers {
        chrome: version(87),
        edge: version(88),
        firefox: version(78),
        safari: version(14),
        ios_saf: version(14),
        ..Browsers::default()
    })
}

/// Add vendor prefixes, merge rules and print minified CSS plus a JSON
/// source map.
pub fn minify_css(css: &str, filename: &str) -> anyhow::Result<CompiledStyle> {
    let targets = browser_targets();

    let mut stylesheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| anyhow!("parsing css: {e}"))?;

    stylesheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| anyhow!("minifying css: {e}"))?;

    let mut source_map = SourceMap::new("/");
    let printed = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            source_map: Some(&mut source_map),
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| anyhow!("printing css: {e}"))?;

    let map = source_map
        .to_json(None)
        .map_err(|e| anyhow!("serializing source map: {e:?}"))?;

    Ok(CompiledStyle {
        css: printed.code,
        map,
    })
}

impl Stage for StylesStage {
    fn name(&self) -> &str {
        names::STYLES
    }

    fn run<'a>(&'a self, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(self.build(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partials_are_recognised() {
        assert!(is_partial(Path::new("src/styles/_vars.scss")));
        assert!(!is_partial(Path::new("src/styles/main.scss")));
    }

    #[test]
    fn scss_compiles_and_minifies() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("_vars.scss"), "$accent: #ff0000;\n").unwrap();
        let entry = tmp.path().join("main.scss");
        std::fs::write(
            &entry,
            "@import 'vars';\n.button {\n  color: $accent;\n  .icon { margin: 0px; }\n}\n",
        )
        .unwrap();

        let css = compile_scss(&entry, &[tmp.path().to_path_buf()]).unwrap();
        assert!(css.contains(".button .icon"));

        let out = minify_css(&css, "main.scss").unwrap();
        assert!(!out.css.contains('\n'));
        assert!(out.css.contains(".button .icon{margin:0}"));
        assert!(out.map.contains("\"mappings\""));
    }

    #[test]
    fn broken_scss_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = tmp.path().join("broken.scss");
        std::fs::write(&entry, ".a { color: $missing; }").unwrap();
        assert!(compile_scss(&entry, &[]).is_err());
    }
}
