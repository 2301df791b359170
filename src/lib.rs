// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod serve;
pub mod stage;
pub mod types;
pub mod watch;

use std::path::Path;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, resolve_config};
use crate::dag::{Pipeline, Scheduler};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason};
use crate::exec::StageExecutorBackend;
use crate::serve::ReloadHub;
use crate::stage::{StageContext, registry_from_config};
use crate::watch::bindings_from_config;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config resolution
/// - the pipeline, scheduler and runtime
/// - the stage executor
/// - Ctrl-C handling
///
/// The dev server and watcher are started by the `watch` stage itself once
/// the initial build succeeded.
pub async fn run(args: CliArgs) -> Result<()> {
    let explicit = args.config.as_deref().map(Path::new);
    let (cfg, root) = resolve_config(explicit)?;

    let pipeline = Pipeline::standard(!args.once)?;

    if args.dry_run {
        print_dry_run(&cfg, &pipeline, &root)?;
        return Ok(());
    }

    let scheduler = Scheduler::from_pipeline(&pipeline);
    let behaviour = cfg.config().triggered_while_running_behaviour;
    let queue_length = cfg.config().queue_length;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let hub = ReloadHub::new();
    let ctx = StageContext::new(root.clone(), rt_tx.clone(), hub);
    let executor = StageExecutorBackend::new(registry_from_config(&cfg)?, ctx);

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let triggers = pipeline.initial_triggers();
    info!(?triggers, root = %root.display(), "starting build");

    for task in triggers {
        rt_tx
            .send(RuntimeEvent::TaskTriggered {
                task,
                reason: TriggerReason::Manual,
            })
            .await?;
    }

    let options = RuntimeOptions {
        exit_when_idle: args.once,
        fail_fast: true,
    };

    let core = CoreRuntime::new(scheduler, behaviour, queue_length, options);
    let runtime = Runtime::new(core, rt_rx, executor);
    runtime.run().await?;
    Ok(())
}

/// Print the pipeline, path sets and watch bindings without running anything.
fn print_dry_run(cfg: &ConfigFile, pipeline: &Pipeline, root: &Path) -> Result<()> {
    println!("assetdag dry-run");
    println!("  root = {}", root.display());
    println!(
        "  config.triggered_while_running_behaviour = {:?}",
        cfg.config().triggered_while_running_behaviour
    );
    println!("  config.queue_length = {}", cfg.config().queue_length);
    println!();

    println!("tasks ({}):", pipeline.len());
    for node in pipeline.nodes() {
        println!("  - {}", node.name);
        if !node.after.is_empty() {
            println!("      after: {:?}", node.after);
        }
        if node.long_lived {
            println!("      long_lived: true");
        }
    }
    println!();

    let paths = cfg.paths();
    println!("paths:");
    for (name, set) in [
        ("styles", &paths.styles),
        ("scripts", &paths.scripts),
        ("assets", &paths.assets),
        ("html", &paths.html),
    ] {
        println!("  {name}: {:?} -> {}", set.src, set.dest);
    }
    println!(
        "  clean: {} (preserve {:?})",
        cfg.clean().root,
        cfg.clean().preserve
    );
    println!();

    if pipeline.contains(stage::names::WATCH) {
        println!("watch bindings:");
        for binding in bindings_from_config(cfg)? {
            println!("  {:?} -> {:?}", binding.patterns(), binding.action());
        }
        println!(
            "serve: http://{}:{}/ (reload socket {})",
            cfg.serve().host,
            cfg.serve().port,
            cfg.serve().reload_port
        );
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
