//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod flaky_host;

use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;
use treelens::bridge::{ChannelWall, FrontendEndpoint};
use treelens::host::{ArenaHost, Element};
use treelens::scheduler::ManualClock;
use treelens::session::events;
use treelens::{
    decode_operations, BridgeMessage, DecodedOperations, HostRuntime, InspectorConfig, NodeHandle,
    RootHandle, Session, ShadowId,
};

/// Host release used unless a test needs another one
pub const HOST_VERSION: &str = "18.2.0";

/// A session wired to an in-memory host, a manual clock and a channel transport
pub struct Harness<H: HostRuntime = ArenaHost> {
    pub session: Session<H, ChannelWall>,
    pub frontend: FrontendEndpoint,
    pub clock: ManualClock,
    pub root: RootHandle,
}

impl Harness<ArenaHost> {
    /// Default config, frontend not yet connected
    pub fn new() -> Self {
        Self::with_config(ArenaHost::new(HOST_VERSION), InspectorConfig::default())
    }

    pub fn with_config(mut host: ArenaHost, config: InspectorConfig) -> Self {
        let root = host.create_root();
        Self::attach(host, root, config)
    }

    /// Default config with the initial flush already done
    pub fn connected() -> Self {
        let mut harness = Self::new();
        harness.connect();
        harness
    }

    /// Render `element` into the root and run the host's commit hooks
    pub fn commit(&mut self, element: Option<Element>) -> Vec<BridgeMessage> {
        let root = self.root;
        let report = self
            .session
            .host_mut()
            .render(root, element)
            .expect("render failed");
        for node in report.deletions {
            self.session.on_commit_unmount(node);
        }
        self.session.on_commit_root(root, Some(report.priority));
        self.session.on_post_commit_root(root);
        self.session.tick();
        self.frontend.messages()
    }

    /// Like [`commit`](Self::commit), keeping only decoded operations
    pub fn commit_ops(&mut self, element: Option<Element>) -> Vec<DecodedOperations> {
        operations(&self.commit(element))
    }

    pub fn node(&self, name: &str) -> NodeHandle {
        self.session
            .host()
            .find_by_name(self.root, name)
            .unwrap_or_else(|| panic!("no node named {}", name))
    }

    pub fn node_by_key(&self, key: &str) -> NodeHandle {
        self.session
            .host()
            .find_by_key(self.root, key)
            .unwrap_or_else(|| panic!("no node keyed {}", key))
    }

    /// Shadow id of the first node named `name`
    pub fn id(&self, name: &str) -> ShadowId {
        let node = self.node(name);
        self.session
            .renderer()
            .id_of(self.session.host(), node)
            .unwrap_or_else(|| panic!("{} is not tracked", name))
    }
}

impl<H: HostRuntime> Harness<H> {
    pub fn attach(host: H, root: RootHandle, config: InspectorConfig) -> Self {
        let (wall, frontend) = ChannelWall::pair(&config.bridge);
        let clock = ManualClock::new();
        let session = Session::attach(host, wall, &config, Rc::new(clock.clone()));
        Self {
            session,
            frontend,
            clock,
            root,
        }
    }

    /// Perform the initial flush and discard what it produced
    pub fn connect(&mut self) -> Vec<BridgeMessage> {
        self.session.connect();
        self.session.tick();
        self.frontend.messages()
    }

    /// Send one command and return everything delivered in response
    pub fn send(&mut self, event: &str, payload: Value) -> Vec<BridgeMessage> {
        self.frontend.send(event, payload).expect("inbound channel full");
        self.session.tick();
        self.frontend.messages()
    }

    /// Advance the clock and run whatever became due
    pub fn advance(&mut self, ms: u64) -> Vec<BridgeMessage> {
        self.clock.advance(Duration::from_millis(ms));
        self.session.tick();
        self.frontend.messages()
    }
}

/// Decode every `operations` message
pub fn operations(messages: &[BridgeMessage]) -> Vec<DecodedOperations> {
    messages
        .iter()
        .filter(|m| m.event == events::OPERATIONS)
        .map(|m| {
            let words: Vec<u32> = m.payload_as().expect("operations payload");
            decode_operations(&words).expect("well-formed operations")
        })
        .collect()
}

/// Messages with the given event name
pub fn with_event<'a>(messages: &'a [BridgeMessage], event: &str) -> Vec<&'a BridgeMessage> {
    messages.iter().filter(|m| m.event == event).collect()
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
