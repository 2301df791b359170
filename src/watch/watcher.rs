// src/watch/watcher.rs

use std::path::PathBuf;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::serve::ReloadHub;
use crate::watch::cache::ContentCache;
use crate::watch::dag_filter::DepMap;
use crate::watch::debounce::Debouncer;
use crate::watch::event_handler::{dispatch_logged, plan_actions};
use crate::watch::patterns::WatchBinding;

/// Keeps the underlying `notify` watcher alive; dropping it stops watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Everything the watcher loop needs.
#[derive(Debug)]
pub struct WatcherSpec {
    pub root: PathBuf,
    pub bindings: Vec<WatchBinding>,
    pub deps: DepMap,
    pub debounce: Duration,
}

/// Watch `spec.root` recursively; every debounced batch is mapped through
/// the bindings and sent to the engine (re-runs) or the hub (reloads).
pub fn spawn_watcher(
    spec: WatcherSpec,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    hub: ReloadHub,
) -> Result<WatcherHandle> {
    let root = spec.root.canonicalize().unwrap_or_else(|_| spec.root.clone());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event_tx.send(event).is_err() {
                    debug!("watch event loop gone; dropping notify event");
                }
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )
    .map_err(anyhow::Error::from)?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(anyhow::Error::from)?;

    info!(root = %root.display(), debounce_ms = spec.debounce.as_millis() as u64, "file watcher started");

    let WatcherSpec {
        bindings,
        deps,
        debounce,
        ..
    } = spec;

    tokio::spawn(async move {
        let mut cache = ContentCache::new();
        let mut debouncer = Debouncer::new();

        while let Some(event) = event_rx.recv().await {
            debouncer.add_event(&event);

            // Keep collecting until the tree has been quiet for one window.
            let mut closed = false;
            loop {
                match tokio::time::timeout(debounce, event_rx.recv()).await {
                    Ok(Some(event)) => {
                        debouncer.add_event(&event);
                    }
                    Ok(None) => {
                        closed = true;
                        break;
                    }
                    Err(_quiet) => break,
                }
            }

            if !debouncer.is_empty() {
                let batch = debouncer.take();
                debug!(paths = batch.len(), "debounced batch ready");
                let actions = plan_actions(&root, &batch, &bindings, &deps, &mut cache);
                if !dispatch_logged(actions, &runtime_tx, &hub).await {
                    break;
                }
            }

            if closed {
                break;
            }
        }

        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
