//! Integration tests for the bridge over the channel transport
//!
//! These tests validate:
//! - Batching and the batch delay
//! - Inbound dispatch to listeners
//! - Malformed input handling
//! - Shutdown and backpressure

mod common;

use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use treelens::bridge::{Bridge, ChannelWall, PROTOCOL_ERROR_EVENT, SHUTDOWN_EVENT};
use treelens::config::BridgeConfig;
use treelens::scheduler::ManualClock;
use treelens::InspectorError;

fn bridge(config: BridgeConfig) -> (Bridge<ChannelWall>, treelens::bridge::FrontendEndpoint, ManualClock) {
    let (wall, frontend) = ChannelWall::pair(&config);
    let clock = ManualClock::new();
    let bridge = Bridge::new(wall, &config, Rc::new(clock.clone()));
    (bridge, frontend, clock)
}

#[test]
fn test_sends_before_tick_form_one_batch() {
    let (mut bridge, mut frontend, _clock) = bridge(BridgeConfig::default());
    let handle = bridge.handle();
    for i in 0..3 {
        handle.send("operations", json!([i]));
    }
    bridge.send("traceUpdates", json!([]));
    assert!(frontend.recv_batches().is_empty());

    bridge.tick();
    let batches = frontend.recv_batches();
    assert_eq!(batches.len(), 1);
    let events: Vec<&str> = batches[0].iter().map(|m| m.event.as_str()).collect();
    assert_eq!(events, vec!["operations", "operations", "operations", "traceUpdates"]);
    assert_eq!(batches[0][2].payload, json!([2]));
}

#[test]
fn test_batch_delay_holds_messages() {
    let config = BridgeConfig {
        batch_delay_ms: 50,
        ..BridgeConfig::default()
    };
    let (mut bridge, mut frontend, clock) = bridge(config);
    bridge.send("a", Value::Null);
    assert_eq!(bridge.next_deadline(), Some(Duration::from_millis(50)));

    clock.advance(Duration::from_millis(49));
    bridge.tick();
    assert!(frontend.messages().is_empty());

    // Later sends join the pending batch without moving the deadline
    bridge.send("b", Value::Null);
    clock.advance(Duration::from_millis(1));
    bridge.tick();
    assert_eq!(frontend.recv_batches().len(), 1);
    assert_eq!(bridge.next_deadline(), None);
}

#[test]
fn test_listeners_see_inbound_messages() {
    let (mut bridge, frontend, _clock) = bridge(BridgeConfig::default());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    bridge.add_listener(move |message| sink.borrow_mut().push(message.event.clone()));

    frontend.send("getBackendVersion", Value::Null).unwrap();
    frontend.send("stopProfiling", Value::Null).unwrap();
    let received = bridge.poll_inbound();

    assert_eq!(received.len(), 2);
    assert_eq!(*seen.borrow(), vec!["getBackendVersion", "stopProfiling"]);
}

#[test]
fn test_malformed_inbound_answered_with_protocol_error() {
    let (mut bridge, mut frontend, _clock) = bridge(BridgeConfig::default());
    frontend.send_raw("{not json").unwrap();
    frontend.send_raw(r#"{"payload": 1}"#).unwrap();
    frontend.send("ok", Value::Null).unwrap();

    let received = bridge.poll_inbound();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].event, "ok");

    bridge.tick();
    let messages = frontend.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.event == PROTOCOL_ERROR_EVENT));
    assert!(messages[0].payload["message"].is_string());
}

#[test]
fn test_shutdown_flushes_then_closes() {
    let (mut bridge, mut frontend, _clock) = bridge(BridgeConfig::default());
    let handle = bridge.handle();
    handle.send("last words", Value::Null);

    bridge.shutdown();
    assert!(bridge.is_shut_down());
    let err = handle.try_send("too late", Value::Null).unwrap_err();
    assert!(matches!(err, InspectorError::TransportClosed(_)));

    let messages = frontend.messages();
    let events: Vec<&str> = messages.iter().map(|m| m.event.as_str()).collect();
    assert_eq!(events, vec!["last words", SHUTDOWN_EVENT]);
    assert!(frontend.is_closed());

    // Inbound traffic is ignored after shutdown
    assert!(bridge.poll_inbound().is_empty());
}

#[test]
fn test_slow_frontend_gets_every_batch_in_order() {
    let config = BridgeConfig {
        outbound_capacity: 2,
        ..BridgeConfig::default()
    };
    let (mut bridge, mut frontend, clock) = bridge(config);
    for i in 0..5 {
        bridge.send("operations", json!([i]));
        bridge.flush();
    }
    assert_eq!(bridge.wall().busy_rejections(), 3);
    assert_eq!(bridge.handle().pending(), 3);

    let mut payloads: Vec<Value> = frontend.messages().into_iter().map(|m| m.payload).collect();
    assert_eq!(payloads, vec![json!([0]), json!([1])]);

    // Held messages go out together once the retry delay passes
    clock.advance(Duration::from_millis(100));
    bridge.tick();
    assert_eq!(bridge.handle().pending(), 0);
    let batches = frontend.recv_batches();
    assert_eq!(batches.len(), 1);
    payloads.extend(batches.into_iter().flatten().map(|m| m.payload));
    assert_eq!(payloads, (0..5).map(|i| json!([i])).collect::<Vec<_>>());
}

#[test]
fn test_shutdown_on_full_channel_loses_nothing() {
    let config = BridgeConfig {
        outbound_capacity: 1,
        shutdown_timeout_ms: 0,
        ..BridgeConfig::default()
    };
    let (mut bridge, mut frontend, clock) = bridge(config);
    bridge.send("operations", json!([0]));
    bridge.flush();
    for i in 1..=3 {
        bridge.send("operations", json!([i]));
    }

    bridge.shutdown();
    assert!(bridge.is_shut_down());
    assert!(!bridge.is_closed());
    assert_eq!(bridge.handle().pending(), 4);

    let mut messages = frontend.messages();
    assert_eq!(messages.len(), 1);
    assert!(!frontend.is_closed());

    clock.advance(Duration::from_millis(100));
    bridge.tick();
    assert!(bridge.is_closed());
    messages.extend(frontend.messages());
    assert!(frontend.is_closed());

    let events: Vec<&str> = messages.iter().map(|m| m.event.as_str()).collect();
    assert_eq!(events, vec!["operations", "operations", "operations", "operations", SHUTDOWN_EVENT]);
    let payloads: Vec<&Value> = messages[..4].iter().map(|m| &m.payload).collect();
    assert_eq!(payloads, vec![&json!([0]), &json!([1]), &json!([2]), &json!([3])]);
}

#[test]
fn test_shutdown_waits_for_reader_thread() {
    let config = BridgeConfig {
        outbound_capacity: 1,
        ..BridgeConfig::default()
    };
    let (mut bridge, mut frontend, _clock) = bridge(config);
    bridge.send("operations", json!([0]));
    bridge.flush();
    bridge.send("operations", json!([1]));

    let reader = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        let mut events = Vec::new();
        while !frontend.is_closed() {
            events.extend(frontend.messages().into_iter().map(|m| m.event));
            std::thread::yield_now();
        }
        events
    });

    // Blocks on the full channel until the reader makes room
    bridge.shutdown();
    assert!(bridge.is_closed());
    assert_eq!(
        reader.join().unwrap(),
        vec!["operations".to_string(), "operations".to_string(), SHUTDOWN_EVENT.to_string()]
    );
}
