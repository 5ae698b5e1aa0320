//! Integration tests for the session command surface
//!
//! These tests drive a complete session the way a frontend would:
//! - Handshake and initial operations
//! - Profiling start/stop/export
//! - Console error aggregation and clearing
//! - Overrides, owners and trace updates
//! - Failure isolation

mod common;

use common::builders::{app, TimedTreeBuilder};
use common::flaky_host::FlakyHost;
use common::{operations, with_event, Harness, HOST_VERSION};
use serde_json::{json, Value};
use treelens::host::{ArenaHost, Element, HostCapabilities};
use treelens::profiling::ProfilingData;
use treelens::protocol::current_bridge_protocol;
use treelens::session::events;
use treelens::{ConsoleKind, InspectorConfig, TreeOperation};

#[test]
fn test_handshake_and_queued_operations() {
    let mut harness = Harness::new();
    // Commits before the frontend asks for the tree are queued, in order
    assert!(harness.commit(Some(app(0))).is_empty());
    assert!(harness.commit(Some(app(1))).is_empty());
    assert!(harness.commit(Some(Element::function("Other"))).is_empty());

    let messages = harness.send("getBridgeProtocol", Value::Null);
    assert_eq!(messages[0].event, events::BRIDGE_PROTOCOL);
    assert_eq!(messages[0].payload["version"], current_bridge_protocol().version);

    let messages = harness.send("flushInitialOperations", Value::Null);
    let ops = operations(&messages);
    assert_eq!(ops.len(), 2);
    assert!(matches!(ops[0].operations[0], TreeOperation::AddRoot { .. }));
    assert!(ops[1].strings.contains(&"Other".to_string()));

    // Later commits stream straight through
    let ops = harness.commit_ops(Some(Element::function("Third")));
    assert_eq!(ops.len(), 1);
}

#[test]
fn test_flush_without_queue_sends_full_tree() {
    let mut host = ArenaHost::new(HOST_VERSION);
    let root = host.create_root();
    host.render(root, Some(app(0))).unwrap();

    // Attached after the first render: the live tree is snapshotted
    let mut harness = Harness::attach(host, root, InspectorConfig::default());
    let ops = operations(&harness.connect());
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].added_ids().len(), 4);
}

#[test]
fn test_profiling_session_export() {
    let mut harness = Harness::connected();
    let tree = |props| {
        TimedTreeBuilder::new("App")
            .duration(2.0)
            .child(TimedTreeBuilder::new("Leaf").duration(3.0).props(props).build())
            .build()
    };
    harness.commit(Some(tree(0)));

    let messages = harness.send("startProfiling", json!(true));
    assert_eq!(with_event(&messages, events::PROFILING_STATUS)[0].payload, json!(true));

    harness.clock.advance(std::time::Duration::from_millis(10));
    harness.commit(Some(tree(1)));
    harness.commit(Some(tree(2)));

    let messages = harness.send("getProfilingStatus", Value::Null);
    assert_eq!(messages[0].payload, json!(true));

    // Filters cannot change mid-session
    let messages = harness.send("updateComponentFilters", json!([]));
    assert_eq!(messages[0].event, events::INSPECTOR_ERROR);

    harness.send("stopProfiling", Value::Null);
    let messages = harness.send("getProfilingData", json!({ "rendererID": 1 }));
    let data: ProfilingData = messages[0].payload_as().unwrap();
    assert_eq!(data.renderer_id, 1);
    assert_eq!(data.commit_count(), 2);

    let root = &data.data_for_roots[0];
    assert_eq!(root.display_name, "App");
    let leaf = harness.id("Leaf").raw();
    assert!(root.initial_tree_base_durations.iter().any(|(id, _)| *id == leaf));

    let commit = &root.commit_data[0];
    let (_, leaf_self) = commit
        .fiber_self_durations
        .iter()
        .find(|(id, _)| *id == leaf)
        .copied()
        .unwrap();
    common::assert_float_eq(leaf_self, 3.0, 1e-9);
    assert!(commit.change_descriptions.is_some());
    assert!(data.timeline.is_some());
}

#[test]
fn test_console_counts_and_clearing() {
    let mut harness = Harness::connected();
    harness.commit(Some(app(0)));
    let body = harness.node("Body");
    let body_id = harness.id("Body").raw();

    harness.session.on_error_or_warning(body, ConsoleKind::Error, "bad");
    harness.session.on_error_or_warning(body, ConsoleKind::Error, "bad");
    harness.session.on_error_or_warning(body, ConsoleKind::Warning, "meh");
    assert!(harness.advance(999).is_empty());

    let ops = operations(&harness.advance(1));
    assert_eq!(
        ops[0].operations,
        vec![TreeOperation::UpdateErrorsOrWarnings {
            id: body_id,
            errors: 2,
            warnings: 1,
        }]
    );
    assert_eq!(harness.session.renderer().error_and_warning_counts(harness.id("Body")), (2, 1));

    let ops = operations(&harness.send("clearErrorsForElementId", json!({ "id": body_id })));
    assert_eq!(
        ops[0].operations,
        vec![TreeOperation::UpdateErrorsOrWarnings {
            id: body_id,
            errors: 0,
            warnings: 1,
        }]
    );

    harness.send("clearErrorsAndWarnings", Value::Null);
    assert_eq!(harness.session.renderer().error_and_warning_counts(harness.id("Body")), (0, 0));
}

#[test]
fn test_pending_console_counts_ride_along_with_commit() {
    let mut harness = Harness::connected();
    harness.commit(Some(app(0)));
    let header = harness.node("Header");
    harness.session.on_error_or_warning(header, ConsoleKind::Warning, "soon");

    let ops = harness.commit_ops(Some(app(1)));
    assert_eq!(ops.len(), 1);
    assert!(ops[0]
        .operations
        .iter()
        .any(|op| matches!(op, TreeOperation::UpdateErrorsOrWarnings { warnings: 1, .. })));
    // Nothing left for the debounce to send
    assert!(harness.advance(1000).is_empty());
}

#[test]
fn test_override_commands() {
    let mut harness = Harness::connected();
    harness.commit(Some(
        Element::function("App").child(
            Element::suspense()
                .child(Element::function("Content"))
                .fallback([Element::function("Spinner")]),
        ),
    ));
    let app_id = harness.id("App").raw();
    let app_node = harness.node("App");

    assert!(harness
        .send("overrideError", json!({ "id": app_id, "rendererID": 1, "forceError": true }))
        .is_empty());
    assert_eq!(harness.session.host().scheduled_updates().len(), 1);
    assert_eq!(harness.session.should_error(app_node), Some(true));

    let suspense = harness.session.host().find_by_name(harness.root, "Suspense");
    if let Some(node) = suspense {
        let id = harness.session.renderer().id_of(harness.session.host(), node).unwrap();
        harness.send("overrideSuspense", json!({ "id": id, "forceFallback": true }));
        assert!(harness.session.should_suspend(node));
    }

    let messages = harness.send("overrideError", json!({ "id": 999, "forceError": true }));
    assert_eq!(messages[0].event, events::INSPECTOR_ERROR);
}

#[test]
fn test_overrides_need_host_support() {
    let host = ArenaHost::new(HOST_VERSION).with_capabilities(HostCapabilities::default());
    let mut harness = Harness::with_config(host, InspectorConfig::default());
    harness.connect();
    harness.commit(Some(app(0)));

    let messages = harness.send("overrideError", json!({ "id": harness.id("App"), "forceError": true }));
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].event, events::INSPECTOR_ERROR);
    assert!(messages[0].payload["message"]
        .as_str()
        .unwrap()
        .contains("Unsupported"));
}

#[test]
fn test_trace_updates_toggle() {
    let mut harness = Harness::connected();
    harness.commit(Some(app(0)));
    harness.send("setTraceUpdatesEnabled", json!(true));

    let messages = harness.commit(Some(app(1)));
    let traces = with_event(&messages, events::TRACE_UPDATES);
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].payload, json!([harness.id("div").raw()]));

    harness.send("setTraceUpdatesEnabled", json!(false));
    let messages = harness.commit(Some(app(2)));
    assert!(with_event(&messages, events::TRACE_UPDATES).is_empty());
}

#[test]
fn test_unmount_outside_commit_released_after_delay() {
    let mut harness = Harness::connected();
    harness.commit(Some(app(0)));
    let count = |h: &Harness| h.session.renderer().registry().id_count();
    let before = count(&harness);

    let body = harness.node("Body");
    harness.session.on_commit_unmount(body);
    harness.advance(999);
    assert_eq!(count(&harness), before);

    harness.advance(1);
    assert_eq!(count(&harness), before - 1);
}

#[test]
fn test_host_panic_is_contained() {
    let mut inner = ArenaHost::new(HOST_VERSION);
    let root = inner.create_root();
    let mut harness = Harness::attach(FlakyHost::new(inner), root, InspectorConfig::default());
    harness.connect();

    harness.session.host_mut().inner.render(root, Some(app(0))).unwrap();
    harness.session.host().arm(true);
    harness.session.on_commit_root(root, None);
    harness.session.tick();
    assert!(operations(&harness.frontend.messages()).is_empty());

    assert_eq!(harness.session.renderer().desynced_root_count(), 1);

    // The next commit mounts the whole tree the frontend never saw
    harness.session.host().arm(false);
    harness.session.host_mut().inner.render(root, Some(app(1))).unwrap();
    harness.session.on_commit_root(root, None);
    harness.session.tick();
    let ops = operations(&harness.frontend.messages());
    assert_eq!(ops.len(), 1);
    assert!(matches!(ops[0].operations[0], TreeOperation::AddRoot { .. }));
    assert_eq!(ops[0].added_ids().len(), 4);
    assert!(!ops[0].operations.contains(&TreeOperation::RemoveRoot));
    assert_eq!(harness.session.renderer().desynced_root_count(), 0);

    assert!(!harness.session.is_shut_down());
    let messages = harness.send("getBackendVersion", Value::Null);
    assert_eq!(messages[0].event, events::BACKEND_VERSION);
}

#[test]
fn test_root_remounted_after_panic_during_update() {
    let mut inner = ArenaHost::new(HOST_VERSION);
    let root = inner.create_root();
    let mut harness = Harness::attach(FlakyHost::new(inner), root, InspectorConfig::default());
    harness.connect();

    harness.session.host_mut().inner.render(root, Some(app(0))).unwrap();
    harness.session.on_commit_root(root, None);
    harness.session.tick();
    let mounted = operations(&harness.frontend.messages());
    assert_eq!(mounted.len(), 1);
    let first_ids = mounted[0].added_ids();

    harness.session.host().arm(true);
    harness.session.host_mut().inner.render(root, Some(app(1))).unwrap();
    harness.session.on_commit_root(root, None);
    harness.session.tick();
    assert!(operations(&harness.frontend.messages()).is_empty());

    // Known root: removed first, then sent again with the same ids
    harness.session.host().arm(false);
    harness.session.host_mut().inner.render(root, Some(app(2))).unwrap();
    harness.session.on_commit_root(root, None);
    harness.session.tick();
    let ops = operations(&harness.frontend.messages());
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].operations, vec![TreeOperation::RemoveRoot]);
    assert_eq!(ops[1].added_ids(), first_ids);

    // Back on the update path afterwards
    harness.session.host_mut().inner.render(root, Some(app(3))).unwrap();
    harness.session.on_commit_root(root, None);
    harness.session.tick();
    let ops = operations(&harness.frontend.messages());
    assert!(ops.iter().all(|m| m.added_ids().is_empty()));
    assert!(ops
        .iter()
        .all(|m| !m.operations.contains(&TreeOperation::RemoveRoot)));
}

#[test]
fn test_shutdown_from_frontend() {
    let mut harness = Harness::connected();
    harness.commit(Some(app(0)));

    let messages = harness.send("shutdown", Value::Null);
    assert_eq!(messages.last().unwrap().event, events::SHUTDOWN);
    assert!(harness.frontend.is_closed());
    assert!(harness.session.is_shut_down());
}
