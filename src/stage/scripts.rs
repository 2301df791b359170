// src/stage/scripts.rs

//! TypeScript/JavaScript → one minified bundle with a concatenated source map.

use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use oxc::allocator::Allocator;
use oxc::ast::AstBuilder;
use oxc::ast::ast::{ExportDefaultDeclarationKind, Program, Statement};
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::diagnostics::OxcDiagnostic;
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc_sourcemap::{ConcatSourceMapBuilder, SourceMap};
use oxc::span::{SPAN, SourceType};
use oxc::transformer::{EngineTargets, TransformOptions, Transformer};
use tracing::{debug, error, info};

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::stage::paths::PathSet;
use crate::stage::{FileResult, Stage, StageContext, StageFuture, StageReport, ensure_parent, names};

/// Minified output of one source file.
#[derive(Debug)]
pub struct ScriptChunk {
    pub code: String,
    pub map: Option<SourceMap>,
}

/// The concatenated bundle and which inputs made it in.
#[derive(Debug)]
pub struct Bundle {
    pub code: String,
    pub map: String,
    pub results: Vec<FileResult>,
}

#[derive(Debug, Clone)]
pub struct ScriptsStage {
    paths: PathSet,
    bundle: String,
    target: String,
}

impl ScriptsStage {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Ok(Self {
            paths: PathSet::from_config(names::SCRIPTS, &cfg.paths().scripts)?,
            bundle: cfg.scripts().bundle.clone(),
            target: cfg.scripts().target.clone(),
        })
    }

    async fn build(&self, ctx: &StageContext) -> Result<StageReport> {
        let dest = ctx.resolve(self.paths.dest()).join(&self.bundle);

        let mut sources = Vec::new();
        for file in self.paths.expand(&ctx.root)? {
            let text = tokio::fs::read_to_string(&file.path)
                .await
                .with_context(|| format!("reading {}", file.path.display()))?;
            sources.push((file.path, text));
        }

        let target = self.target.clone();
        let bundle_dest = dest.clone();
        let bundle = tokio::task::spawn_blocking(move || bundle_sources(&sources, &target, &bundle_dest))
            .await
            .context("script worker panicked")?;

        let map_name = format!("{}.map", self.bundle);
        let code = if bundle.code.is_empty() {
            format!("//# sourceMappingURL={map_name}\n")
        } else {
            format!("{}\n//# sourceMappingURL={map_name}\n", bundle.code)
        };

        ensure_parent(&dest).await?;
        tokio::fs::write(&dest, code)
            .await
            .with_context(|| format!("writing {}", dest.display()))?;
        tokio::fs::write(dest.with_file_name(&map_name), bundle.map)
            .await
            .with_context(|| format!("writing {}", map_name))?;

        ctx.reload.reload();

        let report = StageReport {
            results: bundle.results,
        };
        info!(
            bundle = %dest.display(),
            included = report.written_count(),
            failed = report.failed_count(),
            "scripts stage finished"
        );
        Ok(report)
    }
}

/// Compile every source and join the survivors with `\n`.
///
/// Files that fail are logged and left out of the bundle.
pub fn bundle_sources(sources: &[(PathBuf, String)], target: &str, dest: &Path) -> Bundle {
    let mut chunks: Vec<ScriptChunk> = Vec::new();
    let mut results = Vec::new();

    for (path, text) in sources {
        match compile_script(path, text, target) {
            Ok(chunk) => {
                debug!(file = %path.display(), bytes = chunk.code.len(), "compiled script");
                chunks.push(chunk);
                results.push(FileResult::Written {
                    src: path.clone(),
                    dest: dest.to_path_buf(),
                });
            }
            Err(err) => {
                error!(file = %path.display(), error = %format!("{err:#}"), "script compilation failed");
                results.push(FileResult::Failed {
                    src: path.clone(),
                    cause: format!("{err:#}"),
                });
            }
        }
    }

    let mut line_offset = 0u32;
    let mut maps: Vec<(&SourceMap, u32)> = Vec::new();
    for chunk in &chunks {
        if let Some(map) = &chunk.map {
            maps.push((map, line_offset));
        }
        line_offset += chunk.code.matches('\n').count() as u32 + 1;
    }
    let map = ConcatSourceMapBuilder::from_sourcemaps(&maps)
        .into_sourcemap()
        .to_json_string();

    let code = chunks
        .iter()
        .map(|c| c.code.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    Bundle { code, map, results }
}

fn diagnostics_error(stage: &str, errors: &[OxcDiagnostic]) -> anyhow::Error {
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    anyhow!("{stage}: {}", messages.join("; "))
}

/// Package the transformer imports downlevel helpers from.
const HELPER_MODULE: &str = "@oxc-project/runtime";

/// Parse, check, downlevel, minify and print one file.
///
/// Any diagnostic from the parser, the semantic checker or the transformer
/// rejects the file. So does anything that cannot run once concatenated into
/// a classic script: imports, re-exports and syntax that needs a runtime
/// helper at the configured target.
pub fn compile_script(path: &Path, source: &str, target: &str) -> anyhow::Result<ScriptChunk> {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).map_err(|e| anyhow!("{e}"))?;

    let parsed = Parser::new(&allocator, source, source_type).parse();
    if !parsed.errors.is_empty() {
        return Err(diagnostics_error("syntax error", &parsed.errors));
    }
    let mut program = parsed.program;

    let semantic = SemanticBuilder::new()
        .with_check_syntax_error(true)
        .build(&program);
    if !semantic.errors.is_empty() {
        return Err(diagnostics_error("semantic error", &semantic.errors));
    }
    let scoping = semantic.semantic.into_scoping();

    let options = TransformOptions::from_target(target).map_err(|e| anyhow!("invalid target '{target}': {e}"))?;
    let engines = EngineTargets::from_target(target).map_err(|e| anyhow!("invalid target '{target}': {e}"))?;
    let transformed = Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
    if !transformed.errors.is_empty() {
        return Err(diagnostics_error("transform error", &transformed.errors));
    }

    strip_module_syntax(&allocator, &mut program)?;

    // The compressor must not re-sugar what the transformer just lowered.
    let minified = Minifier::new(MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions {
            target: engines,
            ..CompressOptions::smallest()
        }),
    })
    .minify(&allocator, &mut program);

    let printed = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            source_map_path: Some(path.to_path_buf()),
            ..CodegenOptions::default()
        })
        .with_scoping(minified.scoping)
        .build(&program);

    Ok(ScriptChunk {
        code: printed.code.trim_end_matches('\n').to_string(),
        map: printed.map,
    })
}

/// Rewrite a module into a classic script.
///
/// Exported declarations become plain top-level declarations and the program
/// is re-tagged as a script, so top-level names stay global and unmangled.
fn strip_module_syntax<'a>(allocator: &'a Allocator, program: &mut Program<'a>) -> anyhow::Result<()> {
    let ast = AstBuilder::new(allocator);
    let body = std::mem::replace(&mut program.body, ast.vec());

    for stmt in body {
        match stmt {
            Statement::ImportDeclaration(import) => {
                let source = import.source.value.as_str();
                if source.starts_with(HELPER_MODULE) {
                    bail!("needs runtime helper '{source}', which a script bundle cannot load; raise the scripts target");
                }
                bail!("imports cannot be bundled into a script: '{source}'");
            }
            Statement::ExportAllDeclaration(export) => {
                bail!("re-exports cannot be bundled into a script: '{}'", export.source.value);
            }
            Statement::ExportNamedDeclaration(export) => {
                let export = export.unbox();
                if let Some(source) = export.source {
                    bail!("re-exports cannot be bundled into a script: '{}'", source.value);
                }
                if let Some(decl) = export.declaration {
                    program.body.push(Statement::from(decl));
                }
            }
            Statement::ExportDefaultDeclaration(export) => match export.unbox().declaration {
                ExportDefaultDeclarationKind::FunctionDeclaration(func) if func.id.is_some() => {
                    program.body.push(Statement::FunctionDeclaration(func));
                }
                ExportDefaultDeclarationKind::ClassDeclaration(class) if class.id.is_some() => {
                    program.body.push(Statement::ClassDeclaration(class));
                }
                kind if kind.is_expression() => {
                    program.body.push(ast.statement_expression(SPAN, kind.into_expression()));
                }
                // Anonymous declarations are unreachable without an importer.
                _ => {}
            },
            Statement::TSExportAssignment(_) | Statement::TSNamespaceExportDeclaration(_) => {}
            other => program.body.push(other),
        }
    }

    program.source_type = program.source_type.with_script(true);
    Ok(())
}

impl Stage for ScriptsStage {
    fn name(&self) -> &str {
        names::SCRIPTS
    }

    fn run<'a>(&'a self, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(self.build(ctx))
    }
}
