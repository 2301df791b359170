// src/watch/mod.rs

//! Dev session: file watching and change routing.
//!
//! - [`patterns`] compiles the watch bindings (globs → action).
//! - [`debounce`] filters notify events and collapses bursts.
//! - [`cache`] drops modify events whose content hash is unchanged.
//! - [`dag_filter`] keeps only upstream-most stages when a path belongs to
//!   several.
//! - [`event_handler`] turns a batch into triggers and reloads.
//! - [`watcher`] wires `notify` to all of the above.

pub mod cache;
pub mod dag_filter;
pub mod debounce;
pub mod event_handler;
pub mod patterns;
pub mod watcher;

use std::sync::Arc;

use tokio::sync::watch;

use crate::serve::DevServer;

pub use event_handler::plan_actions;
pub use patterns::{WatchAction, WatchBinding, bindings_from_config};
pub use watcher::{WatcherHandle, WatcherSpec, spawn_watcher};

/// Lifecycle of the dev session, published on a [`watch`] channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Both servers are bound and the watcher is running.
    Watching { port: u16, reload_port: u16 },
}

/// The running dev server plus the active watcher.
///
/// Owned by the `watch` stage's future; dropping it stops watching and
/// publishes [`SessionState::Idle`] again.
#[derive(Debug)]
pub struct WatchSession {
    state: Arc<watch::Sender<SessionState>>,
    server: Option<DevServer>,
    watcher: Option<WatcherHandle>,
}

impl WatchSession {
    pub fn new(state: Arc<watch::Sender<SessionState>>) -> Self {
        state.send_replace(SessionState::Idle);
        Self {
            state,
            server: None,
            watcher: None,
        }
    }

    /// Idle → Watching.
    pub fn start(&mut self, server: DevServer, watcher: WatcherHandle) {
        self.state.send_replace(SessionState::Watching {
            port: server.port,
            reload_port: server.reload_port,
        });
        self.server = Some(server);
        self.watcher = Some(watcher);
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.state.send_replace(SessionState::Idle);
    }
}
