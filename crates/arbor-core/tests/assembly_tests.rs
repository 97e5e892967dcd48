// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use arbor_app_core::options::AppOptions;
use arbor_core::{
    App, LayoutNode, Services, Stage, UpdateTransaction, Variant, ATTACHED_EVENTS_PROP,
};
use arbor_dry_tests::{
    DependencyBuilder, FakeImplementation, ManualFramePort, PayloadBuilder, RecordingRemote,
    ScriptedModuleSource,
};
use serde_json::json;
use std::sync::Arc;

struct Harness {
    app: App,
    source: ScriptedModuleSource,
    remote: RecordingRemote,
}

fn harness(payload: PayloadBuilder, source: ScriptedModuleSource) -> Harness {
    let remote = RecordingRemote::new();
    let app = App::new(
        payload.build(),
        Services {
            root_url: "mem://modules".into(),
            modules: Arc::new(source.clone()),
            remote: Arc::new(remote.clone()),
            frames: Arc::new(ManualFramePort::new()),
        },
        AppOptions::default(),
    );
    Harness {
        app,
        source,
        remote,
    }
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn tree_is_published_once_after_the_deepest_load_resolves() {
    let payload = PayloadBuilder::new()
        .component(1, "row", json!({}))
        .component_with_class(2, "textbox", "textbox-slow", json!({"value": ""}))
        .layout(LayoutNode::branch(
            0,
            vec![LayoutNode::branch(1, vec![LayoutNode::leaf(2)])],
        ))
        .dependency(
            DependencyBuilder::new()
                .inputs(&[2])
                .trigger(2, "change")
                .build(),
        );
    let source = ScriptedModuleSource::new();
    source.gate("textbox-slow");
    let h = harness(payload, source);

    let mut rx = h.app.tree().subscribe();
    let task = {
        let app = h.app.clone();
        tokio::spawn(async move { app.assemble().await })
    };

    settle().await;
    assert_eq!(h.source.loads("textbox-slow"), 1);
    assert_eq!(h.source.completed("textbox-slow"), 0);
    assert!(!rx.has_changed().unwrap());
    assert!(h.app.tree().get().is_none());

    h.source.release("textbox-slow");
    let published = task.await.unwrap().unwrap();

    assert!(rx.has_changed().unwrap());
    let seen = rx.borrow_and_update().clone().unwrap();
    assert!(Arc::ptr_eq(&seen, &published));
    assert!(!rx.has_changed().unwrap());

    let a1 = seen.find(2).unwrap();
    assert_eq!(a1.attached_events, vec!["change"]);
    assert!(a1.interactive);
    let implementation = a1.component.as_ref().unwrap();
    assert_eq!(
        implementation.downcast::<FakeImplementation>().map(String::as_str),
        Some("textbox-slow:component")
    );
    assert_eq!(
        h.app.props(2).unwrap()[ATTACHED_EVENTS_PROP],
        json!(["change"])
    );
}

#[tokio::test]
async fn concurrent_assemble_calls_share_one_walk() {
    let payload = PayloadBuilder::new()
        .component_with_class(1, "textbox", "slow", json!({"value": ""}))
        .layout(LayoutNode::branch(0, vec![LayoutNode::leaf(1)]));
    let source = ScriptedModuleSource::new();
    source.gate("slow");
    let h = harness(payload, source);

    let mut rx = h.app.tree().subscribe();
    let first = {
        let app = h.app.clone();
        tokio::spawn(async move { app.assemble().await })
    };
    let second = {
        let app = h.app.clone();
        tokio::spawn(async move { app.assemble().await })
    };
    settle().await;
    assert_eq!(h.source.loads("slow"), 1);
    assert!(!rx.has_changed().unwrap());

    h.source.release("slow");
    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(h.source.total_loads(), 2);

    assert!(rx.has_changed().unwrap());
    drop(rx.borrow_and_update());
    assert!(!rx.has_changed().unwrap());

    h.app
        .submit_update(vec![UpdateTransaction::new(1, "value", json!("typed"))]);
    h.app.scheduler().flush();
    let again = h.app.assemble().await.unwrap();
    assert!(Arc::ptr_eq(&a, &again));
    assert!(!rx.has_changed().unwrap());
    assert_eq!(h.app.props(1).unwrap()["value"], json!("typed"));
}

#[tokio::test]
async fn each_class_loads_exactly_once() {
    let mut payload = PayloadBuilder::new();
    let mut children = Vec::new();
    for id in 1..=6 {
        payload = payload.component_with_class(id, "textbox", "tb", json!({}));
        children.push(LayoutNode::leaf(id));
    }
    payload = payload
        .component_with_class(7, "image", "img", json!({}))
        .layout(LayoutNode::branch(
            0,
            vec![
                LayoutNode::branch(8, children),
                LayoutNode::leaf(7),
            ],
        ))
        .component(8, "column", json!({}));
    let h = harness(payload, ScriptedModuleSource::new());

    let tree = h.app.assemble().await.unwrap();
    assert_eq!(tree.len(), 9);
    assert_eq!(h.source.loads("tb"), 1);
    assert_eq!(h.source.loads("img"), 1);
    assert_eq!(h.source.loads("column"), 1);
    assert_eq!(h.source.total_loads(), 3);
    assert!(h
        .source
        .root_urls()
        .iter()
        .all(|url| url == "mem://modules"));
}

#[tokio::test]
async fn load_failures_degrade_only_the_failing_component() {
    let payload = PayloadBuilder::new()
        .component_with_class(1, "plot", "broken", json!({}))
        .component(2, "textbox", json!({}))
        .layout(LayoutNode::branch(
            0,
            vec![LayoutNode::leaf(1), LayoutNode::leaf(2)],
        ));
    let source = ScriptedModuleSource::new();
    source.fail("broken");
    let h = harness(payload, source);

    let tree = h.app.assemble().await.unwrap();
    assert!(tree.find(1).unwrap().component.is_none());
    assert!(tree.find(2).unwrap().component.is_some());
    let status = h.app.loading_status().component(1).unwrap();
    assert_eq!(status.stage, Stage::Error);
    assert!(h.app.loading_status().component(2).is_none());
}

#[tokio::test]
async fn composite_components_resolve_example_variants() {
    let payload = PayloadBuilder::new()
        .component(1, "dataset", json!({"components": ["image", "audio", "image"]}))
        .component_with_class(2, "image", "img", json!({}))
        .component_with_class(3, "image", "img-alt", json!({}))
        .layout(LayoutNode::branch(
            0,
            vec![LayoutNode::leaf(1), LayoutNode::leaf(2), LayoutNode::leaf(3)],
        ));
    let h = harness(payload, ScriptedModuleSource::new());

    let tree = h.app.assemble().await.unwrap();
    let map = tree.find(1).unwrap().component_map.clone().unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(map["image"].class_id, "img");
    assert_eq!(map["image"].variant, Variant::Example);
    assert_eq!(h.source.loads_of("img", Variant::Example), 1);
    assert_eq!(h.source.loads_of("img-alt", Variant::Example), 0);
}

#[tokio::test]
async fn bound_server_functions_reach_the_remote() {
    let payload = PayloadBuilder::new()
        .component(1, "file_explorer", json!({"server_fns": ["ls"]}))
        .layout(LayoutNode::branch(0, vec![LayoutNode::leaf(1)]));
    let h = harness(payload, ScriptedModuleSource::new());
    h.remote.reply("ls", Ok(json!(["a.txt"])));

    let tree = h.app.assemble().await.unwrap();
    let ls = &tree.find(1).unwrap().server["ls"];
    assert_eq!(ls.call(vec![json!("/tmp")]).await, Ok(json!(["a.txt"])));

    let calls = h.remote.invocations();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].component_id, 1);
    assert_eq!(calls[0].args, json!("/tmp"));
}

#[tokio::test]
async fn interactivity_follows_the_dependency_graph() {
    let payload = PayloadBuilder::new()
        .component(1, "number", json!({"value": 0}))
        .component(2, "number", json!({"value": 0}))
        .component(3, "textbox", json!({"value": "preset"}))
        .component(4, "textbox", json!({"value": "", "interactive": false}))
        .layout(LayoutNode::branch(
            0,
            (1..=4).map(LayoutNode::leaf).collect(),
        ))
        .dependency(
            DependencyBuilder::new()
                .inputs(&[1])
                .outputs(&[2])
                .trigger(1, "change")
                .build(),
        );
    let h = harness(payload, ScriptedModuleSource::new());

    let tree = h.app.assemble().await.unwrap();
    let interactive: Vec<bool> = (0..=4)
        .map(|id| tree.find(id).unwrap().interactive)
        .collect();
    assert_eq!(interactive, vec![false, true, false, false, false]);
}
