//! Async facade tests

mod common;

use std::sync::Arc;

use chatshot::async_api::Screenshotter;
use chatshot::pipeline::Pipeline;
use chatshot::{Error, RenderConfig};
use common::{config, fixed_now, opener, transcript, Probe, Script};

#[tokio::test]
async fn capture_runs_on_the_worker() {
    let root = tempfile::tempdir().unwrap();
    let probe = Arc::new(Probe::default());
    let pipeline = Pipeline::new(config(root.path())).with_clock(fixed_now);

    let shooter = Screenshotter::new(pipeline, opener(Script::new(2000, 96), probe.clone()))
        .await
        .unwrap();

    let first = shooter.capture(transcript()).await.unwrap();
    let second = shooter.clone().capture(transcript()).await.unwrap();
    assert_eq!(first.chunk_count, 3);
    assert_ne!(first.location, second.location);
    assert_eq!(probe.opened(), 2);
    assert_eq!(probe.closed(), 2);

    shooter.close().await.unwrap();
}

#[tokio::test]
async fn invalid_config_fails_at_startup() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(RenderConfig {
        ready_timeout_ms: 0,
        ..config(root.path())
    });

    let result = Screenshotter::new(pipeline, opener(Script::new(2000, 96), Arc::new(Probe::default()))).await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn pipeline_errors_reach_the_caller() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(root.path()));
    let script = Script {
        ready: false,
        ..Script::new(2000, 96)
    };

    let shooter = Screenshotter::new(pipeline, opener(script, Arc::new(Probe::default())))
        .await
        .unwrap();
    let err = shooter.capture(transcript()).await.unwrap_err();
    assert!(matches!(err, Error::Render(_)));
    shooter.close().await.unwrap();
}
