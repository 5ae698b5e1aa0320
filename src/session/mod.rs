//! Session: one attached host runtime, its tracker and its bridge
//!
//! The [`Session`] is the only object an embedding application talks to.
//! The host calls the `on_*` hooks from inside its commit phase; the
//! application's event loop calls [`Session::tick`] whenever
//! [`Session::next_deadline`] passes or inbound data arrives.
//!
//! # Threading
//!
//! Everything here runs on the host's thread. The bridge hands batches to a
//! [`Wall`], which is where a cross-thread or cross-process transport plugs in.
//!
//! # Failure isolation
//!
//! Hooks run under `catch_unwind`. A panic inside a walk (usually a host
//! callback misbehaving) is logged and the partial batch is discarded; the
//! host never sees the unwind. Command failures are reported to the frontend
//! as one `inspectorError` event.

pub mod commands;

pub use commands::{Command, ElementRef, OverrideErrorArgs, OverrideSuspenseArgs};

use crate::bridge::{Bridge, BridgeHandle, Wall};
use crate::config::InspectorConfig;
use crate::error::{InspectorError, Result};
use crate::host::{HostRuntime, NodeHandle, RootHandle};
use crate::profiling::{ComponentMeasureType, TimelineRecorder};
use crate::protocol::{current_bridge_protocol, BridgeProtocol, BACKEND_VERSION};
use crate::scheduler::SharedClock;
use crate::tracker::{Renderer, RendererEvent};
use crate::types::ConsoleKind;
use serde_json::{json, Value};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// Outbound event names
pub mod events {
    pub const OPERATIONS: &str = "operations";
    pub const TRACE_UPDATES: &str = "traceUpdates";
    pub const BRIDGE_PROTOCOL: &str = "bridgeProtocol";
    pub const BACKEND_VERSION: &str = "backendVersion";
    pub const PROFILING_STATUS: &str = "profilingStatus";
    pub const PROFILING_DATA: &str = "profilingData";
    pub const OWNERS_LIST: &str = "ownersList";
    pub const UNSUPPORTED_BRIDGE_PROTOCOL: &str = "unsupportedBridgeProtocol";
    pub const INSPECTOR_ERROR: &str = "inspectorError";
    pub use crate::bridge::{PROTOCOL_ERROR_EVENT as PROTOCOL_ERROR, SHUTDOWN_EVENT as SHUTDOWN};
}

/// One attached host runtime
pub struct Session<H: HostRuntime, W: Wall> {
    host: H,
    renderer: Renderer,
    bridge: Bridge<W>,
    peer_protocol: Option<BridgeProtocol>,
}

impl<H: HostRuntime, W: Wall> std::fmt::Debug for Session<H, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host.version())
            .field("renderer", &self.renderer)
            .field("peer_protocol", &self.peer_protocol)
            .field("shut_down", &self.bridge.is_shut_down())
            .finish()
    }
}

impl<H: HostRuntime, W: Wall> Session<H, W> {
    /// Attach to `host` and talk to the frontend through `wall`
    ///
    /// Roots that already have content are snapshotted now and replayed when
    /// the frontend asks for the initial operations.
    pub fn attach(host: H, wall: W, config: &InspectorConfig, clock: SharedClock) -> Self {
        let renderer = Renderer::attach(&host, config, clock.clone());
        let bridge = Bridge::new(wall, &config.bridge, clock);
        Self {
            host,
            renderer,
            bridge,
            peer_protocol: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host access, for driving renders between hooks
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn bridge(&self) -> &Bridge<W> {
        &self.bridge
    }

    /// A handle for sending application-defined events
    pub fn bridge_handle(&self) -> BridgeHandle {
        self.bridge.handle()
    }

    /// Protocol the frontend announced, if it did
    pub fn peer_protocol(&self) -> Option<&BridgeProtocol> {
        self.peer_protocol.as_ref()
    }

    pub fn is_shut_down(&self) -> bool {
        self.bridge.is_shut_down()
    }

    /// Earliest time [`tick`](Self::tick) has timed work to do
    pub fn next_deadline(&self) -> Option<Duration> {
        match (self.renderer.next_deadline(), self.bridge.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // ==================== Host Hooks ====================

    /// The host finished committing `root`
    pub fn on_commit_root(&mut self, root: RootHandle, priority: Option<u32>) {
        self.guarded("commit", |renderer, host| {
            renderer.handle_commit_root(host, root, priority)
        });
        self.forward_events();
    }

    /// The host deleted a committed node
    pub fn on_commit_unmount(&mut self, node: NodeHandle) {
        self.guarded("unmount", |renderer, host| {
            renderer.handle_commit_unmount(host, node)
        });
    }

    /// Effects of the last commit of `root` finished
    pub fn on_post_commit_root(&mut self, root: RootHandle) {
        self.guarded("post-commit", |renderer, host| {
            renderer.handle_post_commit_root(host, root)
        });
    }

    /// The host attributed a console error or warning to `node`
    pub fn on_error_or_warning(&mut self, node: NodeHandle, kind: ConsoleKind, message: &str) {
        self.guarded("console", |renderer, host| {
            renderer.on_error_or_warning(host, node, kind, message)
        });
    }

    /// Forced error state of `node` (`None` = no override)
    pub fn should_error(&mut self, node: NodeHandle) -> Option<bool> {
        self.guarded("should-error", |renderer, host| renderer.should_error(host, node))
            .flatten()
    }

    /// True if `node` is forced into its suspense fallback
    pub fn should_suspend(&mut self, node: NodeHandle) -> bool {
        self.guarded("should-suspend", |renderer, host| {
            renderer.should_suspend(host, node)
        })
        .unwrap_or(false)
    }

    // ==================== Timeline Marks ====================

    /// The timeline recorder, for marks without a delegate below
    pub fn timeline_mut(&mut self) -> &mut TimelineRecorder {
        self.renderer.profiler_mut().timeline_mut()
    }

    pub fn mark_render_started(&mut self, lanes: u32) {
        self.timeline_mut().mark_render_started(lanes);
    }

    pub fn mark_render_yielded(&mut self) {
        self.timeline_mut().mark_render_yielded();
    }

    pub fn mark_render_stopped(&mut self) {
        self.timeline_mut().mark_render_stopped();
    }

    pub fn mark_commit_started(&mut self, lanes: u32) {
        self.timeline_mut().mark_commit_started(lanes);
    }

    pub fn mark_commit_stopped(&mut self) {
        self.timeline_mut().mark_commit_stopped();
    }

    pub fn mark_layout_effects_started(&mut self, lanes: u32) {
        self.timeline_mut().mark_layout_effects_started(lanes);
    }

    pub fn mark_layout_effects_stopped(&mut self) {
        self.timeline_mut().mark_layout_effects_stopped();
    }

    pub fn mark_passive_effects_started(&mut self, lanes: u32) {
        self.timeline_mut().mark_passive_effects_started(lanes);
    }

    pub fn mark_passive_effects_stopped(&mut self) {
        self.timeline_mut().mark_passive_effects_stopped();
    }

    pub fn mark_component_render_started(&mut self, component_name: impl Into<String>) {
        self.timeline_mut()
            .mark_component_started(ComponentMeasureType::Render, component_name.into());
    }

    pub fn mark_component_render_stopped(&mut self) {
        self.timeline_mut().mark_component_stopped();
    }

    pub fn mark_state_update_scheduled(&mut self, component_name: impl Into<String>, lanes: u32) {
        self.timeline_mut()
            .mark_state_update_scheduled(component_name.into(), lanes);
    }

    // ==================== Control ====================

    /// Send the current tree (or everything queued so far) to the frontend
    pub fn connect(&mut self) {
        tracing::info!("Frontend connected to renderer {}", self.renderer.renderer_id());
        self.guarded("initial flush", |renderer, host| {
            renderer.flush_initial_operations(host)
        });
        self.forward_events();
    }

    /// Handle inbound commands, due timers and pending flushes
    pub fn tick(&mut self) {
        if self.bridge.is_shut_down() {
            // Only whatever a busy wall held back during shutdown
            self.bridge.tick();
            return;
        }

        for message in self.bridge.poll_inbound() {
            match Command::from_message(&message) {
                Ok(Some(command)) => self.dispatch(&message.event, command),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Rejected {:?}: {}", message.event, e);
                    self.report_error(&message.event, &e);
                }
            }
            if self.bridge.is_shut_down() {
                return;
            }
        }

        self.guarded("timers", |renderer, host| renderer.run_due_timers(host));
        self.forward_events();
        self.bridge.tick();
    }

    /// Flush everything and close the bridge
    pub fn shutdown(&mut self) {
        if self.bridge.is_shut_down() {
            return;
        }
        self.forward_events();
        self.bridge.shutdown();
        tracing::info!("Session for renderer {} shut down", self.renderer.renderer_id());
    }

    /// Run one decoded command
    pub fn execute(&mut self, command: Command) -> Result<()> {
        if let Some(renderer_id) = command.renderer_id() {
            if renderer_id != self.renderer.renderer_id() {
                return Err(InspectorError::NotFound(format!(
                    "no renderer with id {}",
                    renderer_id
                )));
            }
        }

        let handle = self.bridge.handle();
        match command {
            Command::GetBridgeProtocol => {
                handle.send_serialized(events::BRIDGE_PROTOCOL, &current_bridge_protocol());
            }
            Command::BridgeProtocol(peer) => self.handle_peer_protocol(peer),
            Command::GetBackendVersion => {
                handle.send(events::BACKEND_VERSION, json!(BACKEND_VERSION));
            }
            Command::FlushInitialOperations => self.connect(),
            Command::StartProfiling {
                record_change_descriptions,
            } => {
                let started = self
                    .renderer
                    .start_profiling(&self.host, record_change_descriptions);
                if !started {
                    tracing::debug!("startProfiling while already profiling");
                }
                handle.send(events::PROFILING_STATUS, json!(true));
            }
            Command::StopProfiling => {
                self.renderer.stop_profiling();
                handle.send(events::PROFILING_STATUS, json!(false));
            }
            Command::GetProfilingStatus => {
                handle.send(events::PROFILING_STATUS, json!(self.renderer.is_profiling()));
            }
            Command::GetProfilingData { .. } => {
                let data = self.renderer.profiling_data()?;
                handle.send_serialized(events::PROFILING_DATA, &data);
            }
            Command::UpdateComponentFilters(rules) => {
                self.renderer.update_component_filters(&self.host, rules)?;
            }
            Command::ClearErrorsAndWarnings => {
                self.renderer.clear_errors_and_warnings(&self.host);
            }
            Command::ClearErrorsForElementId(element) => {
                self.renderer.clear_errors_for_id(&self.host, element.id);
            }
            Command::ClearWarningsForElementId(element) => {
                self.renderer.clear_warnings_for_id(&self.host, element.id);
            }
            Command::OverrideError(args) => {
                self.renderer
                    .override_error(&mut self.host, args.id, args.force_error)?;
            }
            Command::OverrideSuspense(args) => {
                self.renderer
                    .override_suspense(&mut self.host, args.id, args.force_fallback)?;
            }
            Command::SetTraceUpdatesEnabled(enabled) => {
                self.renderer.set_trace_updates_enabled(enabled);
            }
            Command::GetOwnersList(element) => {
                let owners = self.renderer.owners_list(&self.host, element.id)?;
                handle.send(
                    events::OWNERS_LIST,
                    json!({ "id": element.id, "owners": owners }),
                );
            }
            Command::Shutdown => self.shutdown(),
        }

        self.forward_events();
        Ok(())
    }

    // ==================== Internals ====================

    fn dispatch(&mut self, event: &str, command: Command) {
        tracing::debug!("Command {:?}", command);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(command)));
        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(payload) => {
                self.renderer.discard_pending();
                InspectorError::InvalidState(format!("panicked: {}", panic_message(payload.as_ref())))
            }
        };
        if error.is_not_found() {
            tracing::debug!("Command {:?} missed: {}", event, error);
        } else {
            tracing::warn!("Command {:?} failed: {}", event, error);
        }
        self.report_error(event, &error);
    }

    fn report_error(&self, event: &str, error: &InspectorError) {
        self.bridge
            .send(events::INSPECTOR_ERROR, commands::error_payload(event, error));
    }

    fn handle_peer_protocol(&mut self, peer: BridgeProtocol) {
        let current = current_bridge_protocol();
        if peer.version != current.version {
            tracing::warn!(
                "Frontend speaks bridge protocol {}, backend speaks {}",
                peer.version,
                current.version
            );
            self.bridge.handle().send(
                events::UNSUPPORTED_BRIDGE_PROTOCOL,
                json!({ "expected": current, "received": peer }),
            );
        }
        self.peer_protocol = Some(peer);
    }

    /// Move renderer output onto the bridge
    fn forward_events(&mut self) {
        let pending = self.renderer.drain_events();
        if pending.is_empty() {
            return;
        }
        if self.bridge.is_shut_down() {
            tracing::debug!("Dropping {} renderer events after shutdown", pending.len());
            return;
        }

        let handle = self.bridge.handle();
        for event in pending {
            match event {
                RendererEvent::Operations(operations) => {
                    handle.send(events::OPERATIONS, Value::from(operations));
                }
                RendererEvent::TraceUpdates(ids) => {
                    handle.send_serialized(events::TRACE_UPDATES, &ids);
                }
            }
        }
    }

    /// Run `f` against the renderer, turning a panic into a log line
    fn guarded<T>(&mut self, hook: &str, f: impl FnOnce(&mut Renderer, &H) -> T) -> Option<T> {
        let renderer = &mut self.renderer;
        let host = &self.host;
        match panic::catch_unwind(AssertUnwindSafe(|| f(renderer, host))) {
            Ok(value) => Some(value),
            Err(payload) => {
                tracing::error!(
                    "Panic in {} hook, pending operations discarded: {}",
                    hook,
                    panic_message(payload.as_ref())
                );
                self.renderer.discard_pending();
                None
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
