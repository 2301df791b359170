// src/watch/event_handler.rs

//! Turns a debounced batch of changed paths into engine triggers and
//! reload notifications.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, TaskName, TriggerReason};
use crate::errors::Result;
use crate::serve::ReloadHub;
use crate::watch::cache::ContentCache;
use crate::watch::dag_filter::{DepMap, roots_only};
use crate::watch::debounce::ChangeKind;
use crate::watch::patterns::{WatchAction, WatchBinding, relative_str};

/// Decide what one debounced batch causes.
///
/// Each stage appears at most once; a reload-only notification is emitted at
/// most once. Modify events whose content hash did not change are dropped.
pub fn plan_actions(
    root: &Path,
    batch: &[(PathBuf, ChangeKind)],
    bindings: &[WatchBinding],
    deps: &DepMap,
    cache: &mut ContentCache,
) -> Vec<WatchAction> {
    let mut tasks: BTreeSet<TaskName> = BTreeSet::new();
    let mut reload = false;

    for (path, kind) in batch {
        let Some(rel) = relative_str(root, path) else {
            debug!(path = %path.display(), "change outside project root");
            continue;
        };

        let matched: Vec<&WatchBinding> = bindings.iter().filter(|b| b.matches(&rel)).collect();
        if matched.is_empty() {
            continue;
        }

        let changed = match kind {
            ChangeKind::Removed => {
                cache.invalidate(path);
                true
            }
            ChangeKind::Created | ChangeKind::Modified => cache.refresh(path),
        };
        if !changed {
            debug!(path = %rel, "content hash unchanged; ignoring");
            continue;
        }

        let mut path_tasks = BTreeSet::new();
        for binding in matched {
            match binding.action() {
                WatchAction::RunTask(task) => {
                    path_tasks.insert(task.clone());
                }
                WatchAction::ReloadOnly => reload = true,
            }
        }
        let path_tasks = roots_only(path_tasks, deps);
        debug!(path = %rel, ?kind, tasks = ?path_tasks, "change mapped");
        tasks.extend(path_tasks);
    }

    let mut actions: Vec<WatchAction> = tasks.into_iter().map(WatchAction::RunTask).collect();
    if reload {
        actions.push(WatchAction::ReloadOnly);
    }
    actions
}

/// Send planned actions to the engine and the reload hub.
pub async fn dispatch(
    actions: Vec<WatchAction>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    hub: &ReloadHub,
) -> Result<()> {
    for action in actions {
        match action {
            WatchAction::RunTask(task) => {
                info!(task = %task, "source changed; re-running stage");
                runtime_tx
                    .send(RuntimeEvent::TaskTriggered {
                        task,
                        reason: TriggerReason::FileWatch,
                    })
                    .await?;
            }
            WatchAction::ReloadOnly => {
                debug!("output changed; reloading browsers");
                hub.reload();
            }
        }
    }
    Ok(())
}

/// Like [`dispatch`], but a closed engine channel is only logged.
pub async fn dispatch_logged(
    actions: Vec<WatchAction>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    hub: &ReloadHub,
) -> bool {
    match dispatch(actions, runtime_tx, hub).await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "engine channel closed; stopping watcher");
            false
        }
    }
}
