// tests/dev_server.rs

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use assetdag::config::ServeSection;
use assetdag::serve::{DevServer, ReloadHub, ReloadMessage};
use assetdag_test_utils::builders::ProjectFixture;
use assetdag_test_utils::init_tracing;

fn ephemeral() -> ServeSection {
    ServeSection {
        host: "127.0.0.1".to_string(),
        port: 0,
        reload_port: 0,
    }
}

fn get(port: u16, path: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    write!(
        stream,
        "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
    )
    .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

fn next_message(
    ws: &mut tungstenite::WebSocket<tungstenite::stream::MaybeTlsStream<TcpStream>>,
) -> ReloadMessage {
    loop {
        if let tungstenite::Message::Text(text) = ws.read().unwrap() {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[test]
fn html_is_served_with_reload_script() {
    init_tracing();
    let fx = ProjectFixture::new();
    fx.write("dist/index.html", "<html><body><h1>Hi</h1></body></html>");
    fx.write("dist/styles/main.min.css", "a{}");

    let server = DevServer::start(&ephemeral(), fx.path("dist"), ReloadHub::new()).unwrap();

    let page = get(server.port, "/");
    assert!(page.starts_with("HTTP/1.1 200"));
    assert!(page.contains(&format!(":{}/", server.reload_port)));
    assert!(page.find("<script>").unwrap() < page.find("</body>").unwrap());

    let css = get(server.port, "/styles/main.min.css");
    assert!(css.to_ascii_lowercase().contains("content-type: text/css"));
    assert!(!css.contains("<script>"));

    assert!(get(server.port, "/missing.html").starts_with("HTTP/1.1 404"));
}

#[test]
fn reload_clients_receive_hub_messages() {
    init_tracing();
    let fx = ProjectFixture::new();
    let hub = ReloadHub::new();
    let server = DevServer::start(&ephemeral(), fx.path("dist"), hub.clone()).unwrap();

    let (mut ws, _) =
        tungstenite::connect(format!("ws://127.0.0.1:{}/", server.reload_port)).unwrap();
    assert_eq!(next_message(&mut ws), ReloadMessage::Connected);

    hub.inject("styles/main.min.css");
    assert_eq!(
        next_message(&mut ws),
        ReloadMessage::Inject {
            path: "styles/main.min.css".to_string()
        }
    );

    hub.reload();
    assert_eq!(next_message(&mut ws), ReloadMessage::Reload);
}

/// Poll `cond` for up to five seconds.
fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn closed_tab_releases_its_client_without_a_broadcast() {
    init_tracing();
    let fx = ProjectFixture::new();
    let hub = ReloadHub::new();
    let server = DevServer::start(&ephemeral(), fx.path("dist"), hub.clone()).unwrap();

    let (mut ws, _) =
        tungstenite::connect(format!("ws://127.0.0.1:{}/", server.reload_port)).unwrap();
    assert_eq!(next_message(&mut ws), ReloadMessage::Connected);
    assert_eq!(hub.listeners(), 1);

    ws.close(None).unwrap();
    let _ = ws.flush();
    drop(ws);

    assert!(eventually(|| hub.listeners() == 0), "client thread outlived the tab");
}

#[test]
fn occupied_port_is_a_serve_error() {
    init_tracing();
    let fx = ProjectFixture::new();
    let first = DevServer::start(&ephemeral(), fx.path("dist"), ReloadHub::new()).unwrap();

    let clash = ServeSection {
        port: first.port,
        ..ephemeral()
    };
    let err = DevServer::start(&clash, fx.path("dist"), ReloadHub::new()).unwrap_err();
    assert!(matches!(err, assetdag::errors::AssetdagError::ServeError(_)));
}
