// src/serve/reload.rs

//! Live-reload notifications: a broadcast hub fed by the stages and a
//! WebSocket listener that forwards every message to connected browsers.

use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};
use tungstenite::Message;

use crate::errors::{AssetdagError, Result};

/// Message pushed to browsers.
///
/// Serialized as `{"type":"reload"}`, `{"type":"inject","path":"..."}` or
/// `{"type":"connected"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadMessage {
    Connected,
    Reload,
    /// Re-fetch the stylesheet whose URL contains `path`.
    Inject { path: String },
}

impl ReloadMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}

/// Cloneable publisher shared by every stage.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadMessage>,
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.tx.subscribe()
    }

    /// Live subscribers, one per connected browser plus any in-process ones.
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish(&self, msg: ReloadMessage) {
        match self.tx.send(msg) {
            Ok(receivers) => debug!(receivers, "published reload message"),
            // Nobody listening yet (no browser, or before the dev session).
            Err(broadcast::error::SendError(msg)) => debug!(?msg, "no reload listeners"),
        }
    }

    pub fn reload(&self) {
        self.publish(ReloadMessage::Reload);
    }

    pub fn inject(&self, path: impl Into<String>) {
        self.publish(ReloadMessage::Inject { path: path.into() });
    }
}

/// Bind the reload socket and serve clients on background threads.
///
/// Returns the bound port.
pub fn spawn_reload_server(host: &str, port: u16, hub: ReloadHub) -> Result<u16> {
    let listener = TcpListener::bind((host, port)).map_err(|e| {
        AssetdagError::ServeError(format!("cannot bind reload socket {host}:{port}: {e}"))
    })?;
    let bound = listener.local_addr()?.port();
    info!(port = bound, "live-reload socket listening");

    thread::Builder::new()
        .name("assetdag-reload".into())
        .spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        let rx = hub.subscribe();
                        debug!(listeners = hub.listeners(), "reload client accepted");
                        let spawned = thread::Builder::new()
                            .name("assetdag-reload-client".into())
                            .spawn(move || serve_client(stream, rx));
                        if let Err(err) = spawned {
                            warn!(error = %err, "failed to spawn reload client thread");
                        }
                    }
                    Err(err) => warn!(error = %err, "reload accept failed"),
                }
            }
        })?;

    Ok(bound)
}

/// How long a client thread blocks on the socket before checking the hub.
const CLIENT_POLL: Duration = Duration::from_millis(100);

fn serve_client(stream: TcpStream, mut rx: broadcast::Receiver<ReloadMessage>) {
    let peer = stream.peer_addr().ok();
    let mut ws = match tungstenite::accept(stream) {
        Ok(ws) => ws,
        Err(err) => {
            debug!(error = %err, "reload handshake failed");
            return;
        }
    };

    if ws.send(Message::Text(ReloadMessage::Connected.to_json().into())).is_err() {
        return;
    }
    if let Err(err) = ws.get_ref().set_read_timeout(Some(CLIENT_POLL)) {
        debug!(?peer, error = %err, "cannot poll reload client");
        return;
    }
    debug!(?peer, "reload client connected");

    // Reading notices a closed tab without waiting for the next broadcast.
    loop {
        match ws.read() {
            Ok(Message::Close(_)) => {
                debug!(?peer, "reload client closed");
                return;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(err) => {
                debug!(?peer, error = %err, "reload client gone");
                return;
            }
        }

        loop {
            match rx.try_recv() {
                Ok(msg) => {
                    if let Err(err) = ws.send(Message::Text(msg.to_json().into())) {
                        debug!(?peer, error = %err, "reload client gone");
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(?peer, skipped, "reload client lagged");
                }
                Err(TryRecvError::Closed) => return,
            }
        }
    }
}
