// tests/watch_session.rs

use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use assetdag::config::ConfigFile;
use assetdag::dag::{Pipeline, Scheduler};
use assetdag::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason};
use assetdag::errors::{AssetdagError, Result};
use assetdag::exec::StageExecutorBackend;
use assetdag::serve::ReloadMessage;
use assetdag::stage::watch::WatchStage;
use assetdag::stage::{names, registry_from_config};
use assetdag::watch::SessionState;
use assetdag_test_utils::builders::ProjectFixture;
use assetdag_test_utils::fake_executor::RecordingExecutor;
use assetdag_test_utils::{init_tracing, with_timeout};

const EPHEMERAL: &str = "[serve]\nport = 0\nreload_port = 0\n\n[watch]\ndebounce_ms = 50\n";

/// A full dev session on real stages, observed from the outside.
struct Session {
    runtime: JoinHandle<Result<()>>,
    tx: mpsc::Sender<RuntimeEvent>,
    state: watch::Receiver<SessionState>,
    reloads: broadcast::Receiver<ReloadMessage>,
    executed: Arc<Mutex<Vec<String>>>,
}

fn start(fx: &ProjectFixture, cfg: &ConfigFile) -> Session {
    let pipeline = Pipeline::standard(true).unwrap();
    let (ctx, rx, hub) = fx.context();
    let tx = ctx.runtime_tx.clone();

    let watch_stage = Arc::new(WatchStage::from_config(cfg).unwrap());
    let state = watch_stage.session_state();
    let mut stages = registry_from_config(cfg).unwrap();
    stages.insert(names::WATCH.to_string(), watch_stage);

    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = RecordingExecutor::new(StageExecutorBackend::new(stages, ctx), executed.clone());
    let core = CoreRuntime::new(
        Scheduler::from_pipeline(&pipeline),
        cfg.config().triggered_while_running_behaviour,
        cfg.config().queue_length,
        RuntimeOptions {
            exit_when_idle: false,
            fail_fast: true,
        },
    );

    for task in pipeline.initial_triggers() {
        tx.try_send(RuntimeEvent::TaskTriggered {
            task,
            reason: TriggerReason::Manual,
        })
        .unwrap();
    }

    let reloads = hub.subscribe();
    let runtime = tokio::spawn(Runtime::new(core, rx, executor).run());

    Session {
        runtime,
        tx,
        state,
        reloads,
        executed,
    }
}

#[tokio::test]
async fn stylesheet_edit_while_watching_reruns_styles_and_injects_once() {
    init_tracing();
    let fx = ProjectFixture::new();
    fx.write("src/styles/main.scss", ".a { color: red; }");
    fx.write("src/scripts/app.ts", "console.log('app');");
    let cfg = fx.config(EPHEMERAL);

    let mut s = start(&fx, &cfg);

    let watching = *with_timeout(s.state.wait_for(|st| matches!(st, SessionState::Watching { .. })))
        .await
        .unwrap();
    let SessionState::Watching { port, reload_port } = watching else {
        unreachable!("wait_for returned {watching:?}");
    };
    assert_ne!(port, 0);
    assert_ne!(reload_port, 0);
    TcpStream::connect(("127.0.0.1", port)).unwrap();

    // The session only starts after every build stage has run once.
    assert_eq!(s.executed.lock().unwrap().len(), 6);
    while s.reloads.try_recv().is_ok() {}

    // Give the backend a moment to register the watch.
    tokio::time::sleep(Duration::from_millis(200)).await;
    fx.write("src/styles/main.scss", ".a { color: blue; }");

    let message = with_timeout(async {
        loop {
            match s.reloads.recv().await.unwrap() {
                msg @ ReloadMessage::Inject { .. } => return msg,
                _ => continue,
            }
        }
    })
    .await;
    assert_eq!(
        message,
        ReloadMessage::Inject {
            path: "styles/main.min.css".to_string()
        }
    );
    assert!(fx.read("dist/styles/main.min.css").contains("blue"));

    // Outlast the debounce window before checking nothing else ran.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(&s.executed.lock().unwrap()[6..], &[names::STYLES.to_string()]);
    assert!(s.reloads.try_recv().is_err());

    s.tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();
    with_timeout(s.runtime).await.unwrap().unwrap();
}

#[tokio::test]
async fn occupied_port_aborts_the_first_run() {
    init_tracing();
    let fx = ProjectFixture::new();
    let busy = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = busy.local_addr().unwrap().port();
    let cfg = fx.config(&format!("[serve]\nport = {port}\nreload_port = 0\n"));

    let s = start(&fx, &cfg);
    let result = with_timeout(s.runtime).await.unwrap();

    match result {
        Err(AssetdagError::StageFailed(failed)) => {
            assert_eq!(failed, vec![names::WATCH.to_string()]);
        }
        other => panic!("expected StageFailed, got {other:?}"),
    }
    assert_eq!(*s.state.borrow(), SessionState::Idle);
}
