// tests/runtime_fake_executor.rs

use assetdag_test_utils::fake_executor::FakeExecutor;
use assetdag_test_utils::{init_tracing, with_timeout};

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use assetdag::dag::{Pipeline, Scheduler};
use assetdag::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason};
use assetdag::errors::AssetdagError;
use assetdag::stage::names;
use assetdag::types::TriggerWhileRunningBehaviour;

type TestResult = Result<(), Box<dyn Error>>;

fn core_for(pipeline: &Pipeline, exit_when_idle: bool) -> CoreRuntime {
    CoreRuntime::new(
        Scheduler::from_pipeline(pipeline),
        TriggerWhileRunningBehaviour::Queue,
        1,
        RuntimeOptions {
            exit_when_idle,
            fail_fast: true,
        },
    )
}

async fn seed(tx: &mpsc::Sender<RuntimeEvent>, pipeline: &Pipeline) -> TestResult {
    for task in pipeline.initial_triggers() {
        tx.send(RuntimeEvent::TaskTriggered {
            task,
            reason: TriggerReason::Manual,
        })
        .await?;
    }
    Ok(())
}

/// Poll `executed` until it holds `len` entries.
async fn wait_for_dispatches(executed: &Arc<Mutex<Vec<String>>>, len: usize) {
    with_timeout(async {
        loop {
            if executed.lock().unwrap().len() >= len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

#[tokio::test]
async fn once_mode_runs_every_stage_in_dependency_order() -> TestResult {
    init_tracing();

    let pipeline = Pipeline::standard(false)?;
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone());

    seed(&rt_tx, &pipeline).await?;

    let runtime = Runtime::new(core_for(&pipeline, true), rt_rx, executor);
    with_timeout(runtime.run()).await?;

    let ran = executed.lock().unwrap().clone();
    assert_eq!(ran.len(), 5);
    assert_eq!(&ran[..2], &[names::CLEAN.to_string(), names::HTML.to_string()]);

    let mut tail = ran[2..].to_vec();
    tail.sort();
    assert_eq!(tail, vec![names::ASSETS, names::SCRIPTS, names::STYLES]);
    Ok(())
}

#[tokio::test]
async fn failed_clean_stops_before_any_other_stage() -> TestResult {
    init_tracing();

    let pipeline = Pipeline::standard(true)?;
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone()).failing(names::CLEAN);

    seed(&rt_tx, &pipeline).await?;

    let runtime = Runtime::new(core_for(&pipeline, false), rt_rx, executor);
    let result = with_timeout(runtime.run()).await;

    match result {
        Err(AssetdagError::StageFailed(failed)) => {
            assert!(failed.contains(&names::CLEAN.to_string()));
            assert!(failed.contains(&names::WATCH.to_string()));
        }
        other => panic!("expected StageFailed, got {other:?}"),
    }

    assert_eq!(*executed.lock().unwrap(), vec![names::CLEAN.to_string()]);
    Ok(())
}

#[tokio::test]
async fn failed_leaf_stage_aborts_the_first_run() -> TestResult {
    init_tracing();

    let pipeline = Pipeline::standard(true)?;
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone()).failing(names::SCRIPTS);

    seed(&rt_tx, &pipeline).await?;

    let runtime = Runtime::new(core_for(&pipeline, false), rt_rx, executor);
    let result = with_timeout(runtime.run()).await;

    assert!(matches!(result, Err(AssetdagError::StageFailed(_))));
    // The dev session never starts when the initial build is broken.
    assert!(!executed.lock().unwrap().contains(&names::WATCH.to_string()));
    Ok(())
}

#[tokio::test]
async fn file_watch_trigger_after_bootstrap_reruns_only_that_stage() -> TestResult {
    init_tracing();

    let pipeline = Pipeline::standard(true)?;
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone());

    seed(&rt_tx, &pipeline).await?;

    let runtime = Runtime::new(core_for(&pipeline, false), rt_rx, executor);
    let handle = tokio::spawn(runtime.run());

    // clean, html, styles, scripts, assets, watch
    wait_for_dispatches(&executed, 6).await;
    assert_eq!(executed.lock().unwrap().last().map(String::as_str), Some(names::WATCH));

    rt_tx
        .send(RuntimeEvent::TaskTriggered {
            task: names::STYLES.to_string(),
            reason: TriggerReason::FileWatch,
        })
        .await?;
    wait_for_dispatches(&executed, 7).await;

    rt_tx.send(RuntimeEvent::ShutdownRequested).await?;
    with_timeout(handle).await??;

    let ran = executed.lock().unwrap().clone();
    assert_eq!(ran.len(), 7);
    assert_eq!(ran[6], names::STYLES);
    Ok(())
}

#[tokio::test]
async fn html_change_after_bootstrap_reruns_only_html() -> TestResult {
    init_tracing();

    let pipeline = Pipeline::standard(true)?;
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone());

    seed(&rt_tx, &pipeline).await?;

    let runtime = Runtime::new(core_for(&pipeline, false), rt_rx, executor);
    let handle = tokio::spawn(runtime.run());
    wait_for_dispatches(&executed, 6).await;

    rt_tx
        .send(RuntimeEvent::TaskTriggered {
            task: names::HTML.to_string(),
            reason: TriggerReason::FileWatch,
        })
        .await?;
    wait_for_dispatches(&executed, 7).await;

    // A follow-up trigger proves the html run settled without dependents.
    rt_tx
        .send(RuntimeEvent::TaskTriggered {
            task: names::SCRIPTS.to_string(),
            reason: TriggerReason::FileWatch,
        })
        .await?;
    wait_for_dispatches(&executed, 8).await;

    rt_tx.send(RuntimeEvent::ShutdownRequested).await?;
    with_timeout(handle).await??;

    let ran = executed.lock().unwrap().clone();
    assert_eq!(&ran[6..], &[names::HTML.to_string(), names::SCRIPTS.to_string()]);
    Ok(())
}
