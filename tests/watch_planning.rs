// tests/watch_planning.rs

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use assetdag::config::ConfigFile;
use assetdag::dag::Pipeline;
use assetdag::engine::{RuntimeEvent, TriggerReason};
use assetdag::serve::{ReloadHub, ReloadMessage};
use assetdag::stage::names;
use assetdag::watch::cache::ContentCache;
use assetdag::watch::dag_filter::{DepMap, dep_map};
use assetdag::watch::debounce::ChangeKind;
use assetdag::watch::event_handler::dispatch;
use assetdag::watch::{WatchAction, WatchBinding, WatcherSpec, bindings_from_config, plan_actions, spawn_watcher};
use assetdag_test_utils::builders::ProjectFixture;
use assetdag_test_utils::{init_tracing, with_timeout};

fn defaults() -> (Vec<WatchBinding>, DepMap) {
    let cfg = ConfigFile::default();
    let bindings = bindings_from_config(&cfg).unwrap();
    let deps = dep_map(&Pipeline::standard(true).unwrap());
    (bindings, deps)
}

fn run(task: &str) -> WatchAction {
    WatchAction::RunTask(task.to_string())
}

#[test]
fn several_scss_edits_in_one_batch_trigger_styles_once() {
    init_tracing();
    let fx = ProjectFixture::new();
    let a = fx.write("src/styles/a.scss", ".a{}");
    let b = fx.write("src/styles/_b.scss", ".b{}");
    let (bindings, deps) = defaults();
    let mut cache = ContentCache::new();

    let batch = vec![(a, ChangeKind::Modified), (b, ChangeKind::Modified)];
    let actions = plan_actions(fx.root(), &batch, &bindings, &deps, &mut cache);
    assert_eq!(actions, vec![run(names::STYLES)]);
}

#[test]
fn unchanged_content_is_ignored_on_the_next_batch() {
    init_tracing();
    let fx = ProjectFixture::new();
    let script = fx.write("src/scripts/app.ts", "export const x = 1;");
    let (bindings, deps) = defaults();
    let mut cache = ContentCache::new();

    let batch = vec![(script.clone(), ChangeKind::Modified)];
    assert_eq!(
        plan_actions(fx.root(), &batch, &bindings, &deps, &mut cache),
        vec![run(names::SCRIPTS)]
    );
    // Same bytes saved again (editor touch).
    assert!(plan_actions(fx.root(), &batch, &bindings, &deps, &mut cache).is_empty());

    fx.write("src/scripts/app.ts", "export const x = 2;");
    assert_eq!(
        plan_actions(fx.root(), &batch, &bindings, &deps, &mut cache),
        vec![run(names::SCRIPTS)]
    );
}

#[test]
fn removed_file_always_triggers() {
    init_tracing();
    let fx = ProjectFixture::new();
    let (bindings, deps) = defaults();
    let mut cache = ContentCache::new();

    let batch = vec![(fx.path("src/assets/logo.png"), ChangeKind::Removed)];
    assert_eq!(
        plan_actions(fx.root(), &batch, &bindings, &deps, &mut cache),
        vec![run(names::ASSETS)]
    );
}

#[test]
fn built_html_only_reloads() {
    init_tracing();
    let fx = ProjectFixture::new();
    let out = fx.write("dist/index.html", "<p>hi</p>");
    let other = fx.write("dist/blog/post.html", "<p>post</p>");
    let (bindings, deps) = defaults();
    let mut cache = ContentCache::new();

    let batch = vec![(out, ChangeKind::Created), (other, ChangeKind::Created)];
    assert_eq!(
        plan_actions(fx.root(), &batch, &bindings, &deps, &mut cache),
        vec![WatchAction::ReloadOnly]
    );
}

#[test]
fn html_inside_assets_runs_html_only() {
    init_tracing();
    let fx = ProjectFixture::new();
    let page = fx.write("src/assets/embed.html", "<p>embed</p>");
    let (bindings, deps) = defaults();
    let mut cache = ContentCache::new();

    let batch = vec![(page, ChangeKind::Modified)];
    assert_eq!(
        plan_actions(fx.root(), &batch, &bindings, &deps, &mut cache),
        vec![run(names::HTML)]
    );
}

#[test]
fn unbound_and_outside_paths_do_nothing() {
    init_tracing();
    let fx = ProjectFixture::new();
    let readme = fx.write("README.md", "# site");
    let (bindings, deps) = defaults();
    let mut cache = ContentCache::new();

    let batch = vec![
        (readme, ChangeKind::Modified),
        (PathBuf::from("/definitely/elsewhere/a.scss"), ChangeKind::Modified),
    ];
    assert!(plan_actions(fx.root(), &batch, &bindings, &deps, &mut cache).is_empty());
}

#[tokio::test]
async fn dispatch_routes_tasks_to_engine_and_reloads_to_hub() {
    init_tracing();
    let (tx, mut rx) = mpsc::channel(8);
    let hub = ReloadHub::new();
    let mut reloads = hub.subscribe();

    dispatch(vec![run(names::STYLES), WatchAction::ReloadOnly], &tx, &hub)
        .await
        .unwrap();

    match rx.try_recv().unwrap() {
        RuntimeEvent::TaskTriggered { task, reason } => {
            assert_eq!(task, names::STYLES);
            assert_eq!(reason, TriggerReason::FileWatch);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(reloads.try_recv().unwrap(), ReloadMessage::Reload);
}

#[tokio::test]
async fn watcher_turns_a_saved_stylesheet_into_a_styles_trigger() {
    init_tracing();
    let fx = ProjectFixture::new();
    let (bindings, deps) = defaults();
    let (tx, mut rx) = mpsc::channel(8);

    let _handle = spawn_watcher(
        WatcherSpec {
            root: fx.root().to_path_buf(),
            bindings,
            deps,
            debounce: Duration::from_millis(30),
        },
        tx,
        ReloadHub::new(),
    )
    .unwrap();

    // Give the backend a moment to register the watch.
    tokio::time::sleep(Duration::from_millis(100)).await;
    fx.write("src/styles/main.scss", "body { margin: 0; }");

    let event = with_timeout(rx.recv()).await.unwrap();
    match event {
        RuntimeEvent::TaskTriggered { task, .. } => assert_eq!(task, names::STYLES),
        other => panic!("unexpected event {other:?}"),
    }
}
