// src/serve/http.rs

//! Static file server for the build output root.

use std::path::{Component, Path, PathBuf};
use std::thread;

use anyhow::Context;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info, warn};

use crate::errors::{AssetdagError, Result};
use crate::serve::mime;

/// Outcome of mapping a request path onto the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    File(PathBuf),
    NotFound,
    Forbidden,
}

/// Map a URL path (`/styles/main.min.css?v=1`) to a file under `root`.
///
/// Directories resolve to their `index.html`. Any attempt to leave `root`
/// is forbidden.
pub fn resolve_request_path(root: &Path, url: &str) -> Resolved {
    let path = url.split(['?', '#']).next().unwrap_or("");
    let rel = Path::new(path.trim_start_matches('/'));

    if rel
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Resolved::Forbidden;
    }

    let mut candidate = root.join(rel);
    if candidate.is_dir() {
        candidate = candidate.join("index.html");
    }
    if !candidate.is_file() {
        return Resolved::NotFound;
    }

    // Symlinks pointing outside the root.
    match (candidate.canonicalize(), root.canonicalize()) {
        (Ok(file), Ok(root)) if file.starts_with(&root) => Resolved::File(candidate),
        (Ok(_), Ok(_)) => Resolved::Forbidden,
        _ => Resolved::NotFound,
    }
}

/// Client script connecting to the reload socket.
pub fn reload_script(reload_port: u16) -> String {
    format!(
        r#"<script>(function(){{var ws=new WebSocket("ws://"+location.hostname+":{reload_port}/");ws.onmessage=function(e){{var m=JSON.parse(e.data);if(m.type==="reload"){{location.reload();}}else if(m.type==="inject"){{var links=document.querySelectorAll('link[rel="stylesheet"]');for(var i=0;i<links.length;i++){{var l=links[i];if(l.href.indexOf(m.path)!==-1){{var u=new URL(l.href);u.searchParams.set("assetdag",Date.now());l.href=u.toString();}}}}}}}};}})();</script>"#
    )
}

/// Insert the reload script before the last `</body>`, or append it.
pub fn inject_reload_script(body: &[u8], reload_port: u16) -> Vec<u8> {
    const CLOSE_BODY: &[u8] = b"</body>";
    let script = reload_script(reload_port);

    let mut out = Vec::with_capacity(body.len() + script.len());
    match body
        .windows(CLOSE_BODY.len())
        .rposition(|w| w.eq_ignore_ascii_case(CLOSE_BODY))
    {
        Some(pos) => {
            out.extend_from_slice(&body[..pos]);
            out.extend_from_slice(script.as_bytes());
            out.extend_from_slice(&body[pos..]);
        }
        None => {
            out.extend_from_slice(body);
            out.extend_from_slice(script.as_bytes());
        }
    }
    out
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn respond(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> anyhow::Result<()> {
    let mut response = Response::from_data(body).with_status_code(status);
    if let Some(h) = header("Content-Type", content_type) {
        response = response.with_header(h);
    }
    if let Some(h) = header("Cache-Control", "no-cache") {
        response = response.with_header(h);
    }
    request.respond(response).context("writing response")
}

fn handle_request(request: Request, root: &Path, reload_port: u16) -> anyhow::Result<()> {
    if !matches!(request.method(), Method::Get | Method::Head) {
        return respond(request, 405, mime::PLAIN, b"405 Method Not Allowed".to_vec());
    }

    let url = request.url().to_string();
    match resolve_request_path(root, &url) {
        Resolved::File(path) => {
            let content_type = mime::from_path(&path);
            let body = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let body = if content_type == mime::HTML {
                inject_reload_script(&body, reload_port)
            } else {
                body
            };
            debug!(url = %url, file = %path.display(), "200");
            respond(request, 200, content_type, body)
        }
        Resolved::NotFound => {
            debug!(url = %url, "404");
            respond(request, 404, mime::PLAIN, b"404 Not Found".to_vec())
        }
        Resolved::Forbidden => {
            warn!(url = %url, "rejected path outside output root");
            respond(request, 403, mime::PLAIN, b"403 Forbidden".to_vec())
        }
    }
}

/// Bind the HTTP server and serve `root` on a background thread.
///
/// Returns the bound port.
pub fn spawn_http_server(host: &str, port: u16, root: PathBuf, reload_port: u16) -> Result<u16> {
    let server = Server::http((host, port))
        .map_err(|e| AssetdagError::ServeError(format!("cannot bind http server {host}:{port}: {e}")))?;
    let bound = server
        .server_addr()
        .to_ip()
        .map(|addr| addr.port())
        .unwrap_or(port);

    info!(url = %format!("http://{host}:{bound}/"), root = %root.display(), "dev server listening");

    thread::Builder::new()
        .name("assetdag-http".into())
        .spawn(move || {
            for request in server.incoming_requests() {
                if let Err(err) = handle_request(request, &root, reload_port) {
                    warn!(error = %format!("{err:#}"), "request failed");
                }
            }
        })?;

    Ok(bound)
}
