// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use arbor_app_core::options::AppOptions;
use arbor_core::{
    assemble_app, App, DispatchError, LayoutNode, RemoteInvocationError, Services, Stage,
    UpdateTransaction,
};
use arbor_dry_tests::{
    DependencyBuilder, ManualFramePort, PayloadBuilder, RecordingRemote, ScriptedModuleSource,
    StaticValue,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    app: App,
    frames: ManualFramePort,
    remote: RecordingRemote,
}

async fn harness(payload: PayloadBuilder) -> Harness {
    let frames = ManualFramePort::new();
    let remote = RecordingRemote::new();
    let app = App::new(
        payload.build(),
        Services {
            root_url: "mem://".into(),
            modules: Arc::new(ScriptedModuleSource::new()),
            remote: Arc::new(remote.clone()),
            frames: Arc::new(frames.clone()),
        },
        AppOptions::default(),
    );
    app.assemble().await.unwrap();
    Harness { app, frames, remote }
}

fn two_boxes() -> PayloadBuilder {
    PayloadBuilder::new()
        .component(1, "textbox", json!({"value": ""}))
        .component(2, "textbox", json!({"value": ""}))
        .layout(LayoutNode::branch(
            0,
            vec![LayoutNode::leaf(1), LayoutNode::leaf(2)],
        ))
}

#[tokio::test]
async fn batches_before_a_flush_coalesce_and_last_write_wins() {
    let h = harness(two_boxes()).await;

    h.app
        .submit_update(vec![UpdateTransaction::new(1, "value", json!("a"))]);
    h.app
        .submit_update(vec![UpdateTransaction::new(1, "value", json!("b"))]);
    assert!(h.app.flush_pending().get());
    assert_eq!(h.frames.requested(), 1);
    assert_eq!(h.app.read_value(1).await, Some(json!("")));

    assert_eq!(h.frames.run_frame(), 1);
    assert_eq!(h.app.read_value(1).await, Some(json!("b")));
    assert!(!h.app.flush_pending().get());
    assert_eq!(h.app.scheduler().revision().get(), 1);
}

#[tokio::test]
async fn stored_containers_do_not_alias_the_callers_value() {
    let h = harness(two_boxes()).await;

    let mut rows = json!([[1, 2], [3, 4]]);
    let mut meta = json!({"label": "x"});
    h.app.submit_update(vec![
        UpdateTransaction::new(1, "value", rows.clone()),
        UpdateTransaction::new(2, "meta", meta.clone()),
    ]);
    rows.as_array_mut().unwrap().push(json!([5, 6]));
    meta["label"] = json!("changed");
    h.frames.run_frame();

    assert_eq!(h.app.read_value(1).await, Some(json!([[1, 2], [3, 4]])));
    assert_eq!(h.app.props(2).unwrap()["meta"], json!({"label": "x"}));
}

#[tokio::test]
async fn observers_never_see_half_a_flush() {
    let h = harness(two_boxes()).await;
    h.app.submit_update(vec![
        UpdateTransaction::new(1, "value", json!("left")),
        UpdateTransaction::new(2, "value", json!("right")),
    ]);
    let before = (h.app.props(1).unwrap(), h.app.props(2).unwrap());
    assert_eq!(before.0["value"], json!(""));
    assert_eq!(before.1["value"], json!(""));
    h.frames.run_frame();
    assert_eq!(h.app.props(1).unwrap()["value"], json!("left"));
    assert_eq!(h.app.props(2).unwrap()["value"], json!("right"));
}

#[tokio::test]
async fn read_value_prefers_a_live_instance() {
    let h = harness(two_boxes()).await;
    h.app.attach_instance(2, Arc::new(StaticValue(json!("typed"))));
    assert_eq!(h.app.read_value(2).await, Some(json!("typed")));
    assert_eq!(h.app.read_value(1).await, Some(json!("")));
}

#[tokio::test]
async fn dispatch_runs_frontend_then_backend_and_writes_outputs() {
    let payload = two_boxes().dependency(
        DependencyBuilder::new()
            .inputs(&[1])
            .outputs(&[2])
            .trigger(1, "submit")
            .js("(text) => text.trim()")
            .backend()
            .build(),
    );
    let h = harness(payload).await;
    h.remote.outputs(0, Ok(vec![json!("hello from backend")]));
    h.app.attach_instance(1, Arc::new(StaticValue(json!("  hello  "))));

    assert_eq!(h.app.dispatch(1, "submit").await, Ok(1));
    assert_eq!(h.remote.predictions(), vec![(0, vec![json!("hello")])]);
    assert_eq!(
        h.app.loading_status().component(2).map(|s| s.stage),
        Some(Stage::Complete)
    );

    h.frames.run_frame();
    assert_eq!(h.app.read_value(2).await, Some(json!("hello from backend")));
}

#[tokio::test]
async fn backend_failure_is_reported_and_writes_nothing() {
    let payload = two_boxes().dependency(
        DependencyBuilder::new()
            .inputs(&[1])
            .outputs(&[2])
            .trigger(1, "submit")
            .backend()
            .build(),
    );
    let h = harness(payload).await;
    let failure = RemoteInvocationError::Application("queue full".into());
    h.remote.outputs(0, Err(failure.clone()));

    let err = h.app.dispatch(1, "submit").await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::Remote {
            fn_index: 0,
            source: failure
        }
    );
    let status = h.app.loading_status().component(2).unwrap();
    assert_eq!(status.stage, Stage::Error);
    assert_eq!(h.frames.pending(), 0);
}

#[tokio::test]
async fn frontend_only_dependency_fans_out_to_outputs() {
    let payload = PayloadBuilder::new()
        .component(1, "number", json!({"value": 3}))
        .component(2, "number", json!({"value": 0}))
        .component(3, "textbox", json!({"value": ""}))
        .layout(LayoutNode::branch(
            0,
            (1..=3).map(LayoutNode::leaf).collect(),
        ))
        .dependency(
            DependencyBuilder::new()
                .inputs(&[1])
                .outputs(&[2, 3])
                .trigger(1, "change")
                .js("(n) => [n * n, `${n}`]")
                .build(),
        )
        .dependency(
            DependencyBuilder::new()
                .inputs(&[1])
                .outputs(&[2, 3])
                .trigger(1, "change")
                .js("(n) => [n * n, 'n=' + n]")
                .build(),
        );
    let h = harness(payload).await;

    // The first source uses template literals, which do not compile.
    assert!(h.app.frontend_fn(0).is_none());
    assert!(h.app.frontend_fn(1).is_some());

    assert_eq!(h.app.dispatch(1, "change").await, Ok(2));
    assert!(h.remote.predictions().is_empty());
    h.frames.run_frame();
    assert_eq!(h.app.read_value(2).await, Some(json!(9)));
    assert_eq!(h.app.read_value(3).await, Some(json!("n=3")));
}

#[tokio::test]
async fn unknown_triggers_dispatch_nothing() {
    let h = harness(two_boxes()).await;
    assert_eq!(h.app.dispatch(1, "click").await, Ok(0));
    assert_eq!(h.app.dispatch(42, "change").await, Ok(0));
}

#[tokio::test]
async fn assemble_app_uses_the_tokio_frame_port() {
    let options = AppOptions {
        frame_interval_ms: 1,
        ..AppOptions::default()
    };
    let app = assemble_app(
        two_boxes().build(),
        "mem://",
        Arc::new(ScriptedModuleSource::new()),
        Arc::new(RecordingRemote::new()),
        options,
    )
    .await
    .unwrap();
    assert!(app.tree().get().is_some());

    app.submit_update(vec![UpdateTransaction::new(1, "value", json!("later"))]);
    assert_eq!(app.read_value(1).await, Some(json!("")));
    let mut pending = app.flush_pending().subscribe();
    tokio::time::timeout(Duration::from_secs(1), pending.wait_for(|p| !*p))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(app.read_value(1).await, Some(Value::from("later")));
}
