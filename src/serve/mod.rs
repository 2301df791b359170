// src/serve/mod.rs

//! Development server.
//!
//! - [`http`] serves the build output root with `tiny_http`, injecting the
//!   reload client into HTML responses.
//! - [`reload`] owns the [`ReloadHub`] the stages publish to and the
//!   `tungstenite` socket that forwards its messages to browsers.
//! - [`mime`] maps extensions to content types.
//!
//! Both servers are blocking and run on their own threads.

pub mod http;
pub mod mime;
pub mod reload;

use std::path::PathBuf;

use tracing::info;

use crate::config::ServeSection;
use crate::errors::Result;

pub use reload::{ReloadHub, ReloadMessage};

/// Addresses of a running dev server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevServer {
    pub host: String,
    pub port: u16,
    pub reload_port: u16,
}

impl DevServer {
    /// Bind both sockets. A port already in use is a
    /// [`ServeError`](crate::errors::AssetdagError::ServeError).
    pub fn start(cfg: &ServeSection, root: PathBuf, hub: ReloadHub) -> Result<Self> {
        let reload_port = reload::spawn_reload_server(&cfg.host, cfg.reload_port, hub)?;
        let port = http::spawn_http_server(&cfg.host, cfg.port, root, reload_port)?;

        info!(
            url = %format!("http://{}:{}/", cfg.host, port),
            reload_port,
            "dev server ready"
        );

        Ok(Self {
            host: cfg.host.clone(),
            port,
            reload_port,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}
