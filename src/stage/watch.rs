// src/stage/watch.rs

//! The long-lived `watch` stage: starts the dev server and the watcher,
//! reports progress once both are up, then holds the session until the
//! process exits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::{ConfigFile, ServeSection};
use crate::dag::Pipeline;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::serve::DevServer;
use crate::stage::{Stage, StageContext, StageFuture, StageReport, names};
use crate::watch::dag_filter::{DepMap, dep_map};
use crate::watch::{
    SessionState, WatchBinding, WatchSession, WatcherSpec, bindings_from_config, spawn_watcher,
};

#[derive(Debug, Clone)]
pub struct WatchStage {
    serve: ServeSection,
    serve_root: PathBuf,
    bindings: Vec<WatchBinding>,
    deps: DepMap,
    debounce: Duration,
    state: Arc<watch::Sender<SessionState>>,
}

impl WatchStage {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Ok(Self {
            serve: cfg.serve().clone(),
            serve_root: PathBuf::from(&cfg.clean().root),
            bindings: bindings_from_config(cfg)?,
            deps: dep_map(&Pipeline::standard(true)?),
            debounce: Duration::from_millis(cfg.watch().debounce_ms),
            state: Arc::new(watch::channel(SessionState::Idle).0),
        })
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    /// Follow the session lifecycle, including the ports actually bound.
    pub fn session_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    async fn hold(&self, ctx: &StageContext) -> Result<StageReport> {
        let mut session = WatchSession::new(Arc::clone(&self.state));

        let server = DevServer::start(&self.serve, ctx.resolve(&self.serve_root), ctx.reload.clone())?;
        let watcher = spawn_watcher(
            WatcherSpec {
                root: ctx.root.clone(),
                bindings: self.bindings.clone(),
                deps: self.deps.clone(),
                debounce: self.debounce,
            },
            ctx.runtime_tx.clone(),
            ctx.reload.clone(),
        )?;

        info!(url = %server.url(), reload_port = server.reload_port, "watching for changes");
        session.start(server, watcher);
        debug!(state = ?session.state(), "dev session started");

        ctx.runtime_tx
            .send(RuntimeEvent::TaskProgressed {
                task: names::WATCH.to_string(),
            })
            .await?;

        // The session lives as long as this future.
        let _session = session;
        std::future::pending::<Result<StageReport>>().await
    }
}

impl Stage for WatchStage {
    fn name(&self) -> &str {
        names::WATCH
    }

    fn run<'a>(&'a self, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(self.hold(ctx))
    }
}
