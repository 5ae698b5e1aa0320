//! Transport bridge
//!
//! Batches outbound event messages and delivers them through a [`Wall`], the
//! transport the embedding application provides. Inbound messages are polled
//! from the same wall and dispatched to listeners.
//!
//! # Batching
//!
//! ```text
//! send() ──► queue ──(batch timer)──► flush ──► Wall::send(&[msg...])
//!               ▲                        │
//!               └── re-entrant send ─────┘   (flushed after the coalesce delay)
//! ```
//!
//! [`BridgeHandle`] is a cheap clone of the sending side. Components that
//! emit events (the session, wall callbacks) hold handles; only the
//! [`Bridge`] itself touches the wall. A handle may be used while the bridge
//! is flushing; those messages land in the next batch.
//!
//! # Shutdown
//!
//! [`Bridge::shutdown`] sends a final `shutdown` event and rejects every
//! later send. The queue is then drained, blocking on a full wall for up to
//! the configured shutdown timeout. Whatever is still queued after that is
//! retried on [`Bridge::tick`]. The wall is closed once the queue is empty.
//!
//! # Backpressure
//!
//! A wall that reports [`InspectorError::Busy`] keeps its batch: the messages
//! go back to the head of the queue and are retried after the coalesce delay,
//! so delivery stays complete and in order.

pub mod channel;

pub use channel::{ChannelWall, FrontendEndpoint};

use crate::config::BridgeConfig;
use crate::error::{InspectorError, Result};
use crate::scheduler::{SharedClock, TimerQueue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Event name sent as the last message before the wall closes
pub const SHUTDOWN_EVENT: &str = "shutdown";

/// Event name sent back when an inbound message cannot be parsed
pub const PROTOCOL_ERROR_EVENT: &str = "protocolError";

// ==================== Messages ====================

/// One event on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl BridgeMessage {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    /// Decode the payload into `T`
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            InspectorError::Protocol(format!("invalid payload for {:?}: {}", self.event, e))
        })
    }
}

/// Transport supplied by the embedding application
#[cfg_attr(test, mockall::automock)]
pub trait Wall {
    /// Deliver one batch, in order
    ///
    /// [`InspectorError::Busy`] means nothing was delivered and the same
    /// batch may be offered again later.
    fn send(&mut self, batch: &[BridgeMessage]) -> Result<()>;

    /// Like [`send`](Self::send), waiting up to `timeout` for room
    fn send_timeout(&mut self, batch: &[BridgeMessage], _timeout: Duration) -> Result<()> {
        self.send(batch)
    }

    /// Next raw inbound message, if one is waiting
    fn try_recv(&mut self) -> Option<String>;

    /// Release the transport; no further calls follow
    fn close(&mut self);
}

// ==================== Sending Side ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgeTimer {
    Flush,
}

#[derive(Debug, Default)]
struct Shared {
    queue: Vec<BridgeMessage>,
    timers: TimerQueue<BridgeTimer>,
    shut_down: bool,
}

/// Sending half of a [`Bridge`]
#[derive(Clone)]
pub struct BridgeHandle {
    shared: Rc<RefCell<Shared>>,
    clock: SharedClock,
    batch_delay: Duration,
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("pending", &self.pending())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl BridgeHandle {
    /// Queue an event; dropped with a warning after shutdown
    pub fn send(&self, event: &str, payload: Value) {
        if let Err(e) = self.try_send(event, payload) {
            tracing::warn!("Dropping {:?}: {}", event, e);
        }
    }

    /// Queue an event, failing after shutdown
    pub fn try_send(&self, event: &str, payload: Value) -> Result<()> {
        let mut shared = self.shared.borrow_mut();
        if shared.shut_down {
            return Err(InspectorError::TransportClosed(format!(
                "cannot send {:?} after shutdown",
                event
            )));
        }
        shared.queue.push(BridgeMessage::new(event, payload));
        let deadline = self.clock.now() + self.batch_delay;
        shared.timers.schedule_if_idle(BridgeTimer::Flush, deadline);
        Ok(())
    }

    /// Serialize `payload` and queue it
    pub fn send_serialized<T: Serialize>(&self, event: &str, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.send(event, value),
            Err(e) => tracing::error!("Failed to serialize {:?} payload: {}", event, e),
        }
    }

    /// Messages waiting for the next flush
    pub fn pending(&self) -> usize {
        self.shared.borrow().queue.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.borrow().shut_down
    }
}

// ==================== Bridge ====================

/// Callback invoked for every parsed inbound message
pub type Listener = Box<dyn FnMut(&BridgeMessage)>;

/// Batching transport over a [`Wall`]
pub struct Bridge<W: Wall> {
    wall: W,
    handle: BridgeHandle,
    coalesce_delay: Duration,
    shutdown_timeout: Duration,
    listeners: Vec<Listener>,
    listening: bool,
    closed: bool,
}

impl<W: Wall> Bridge<W> {
    pub fn new(wall: W, config: &BridgeConfig, clock: SharedClock) -> Self {
        Self {
            wall,
            handle: BridgeHandle {
                shared: Rc::new(RefCell::new(Shared::default())),
                clock,
                batch_delay: config.batch_delay(),
            },
            coalesce_delay: config.coalesce_delay(),
            shutdown_timeout: config.shutdown_timeout(),
            listeners: Vec::new(),
            listening: true,
            closed: false,
        }
    }

    /// A new sending handle
    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    pub fn send(&self, event: &str, payload: Value) {
        self.handle.send(event, payload);
    }

    pub fn add_listener(&mut self, listener: impl FnMut(&BridgeMessage) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn wall(&self) -> &W {
        &self.wall
    }

    pub fn is_shut_down(&self) -> bool {
        self.handle.is_shut_down()
    }

    /// True once shutdown delivered everything and released the wall
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Earliest time [`tick`](Self::tick) has work to do
    pub fn next_deadline(&self) -> Option<Duration> {
        self.handle.shared.borrow().timers.next_deadline()
    }

    /// Flush if the batch timer is due
    ///
    /// After shutdown this keeps draining what a busy wall held back.
    pub fn tick(&mut self) {
        let now = self.handle.clock.now();
        let due = self.handle.shared.borrow_mut().timers.take_due(now);
        if !due.contains(&BridgeTimer::Flush) {
            return;
        }
        if self.is_shut_down() {
            self.drain_and_close(Duration::ZERO);
        } else {
            self.flush();
        }
    }

    /// Deliver everything queued now as one batch
    ///
    /// Messages queued while the wall is sending go out after the coalesce
    /// delay, as does a batch the wall was too busy to take.
    pub fn flush(&mut self) {
        if self.closed {
            return;
        }
        let batch = self.take_queue();
        if !batch.is_empty() {
            tracing::trace!("Flushing {} bridge messages", batch.len());
            let result = self.wall.send(&batch);
            self.settle(batch, result);
        }
        self.schedule_retry();
    }

    fn take_queue(&mut self) -> Vec<BridgeMessage> {
        let mut shared = self.handle.shared.borrow_mut();
        shared.timers.cancel(BridgeTimer::Flush);
        std::mem::take(&mut shared.queue)
    }

    /// Requeue a batch the wall was too busy for; drop it on any other error.
    /// Returns true if the batch left the queue for good.
    fn settle(&mut self, batch: Vec<BridgeMessage>, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(InspectorError::Busy(reason)) => {
                tracing::debug!("Wall busy ({}), holding {} messages", reason, batch.len());
                let mut shared = self.handle.shared.borrow_mut();
                let queued_meanwhile = std::mem::replace(&mut shared.queue, batch);
                shared.queue.extend(queued_meanwhile);
                false
            }
            Err(e) => {
                tracing::warn!("Wall rejected a batch of {} messages: {}", batch.len(), e);
                true
            }
        }
    }

    fn schedule_retry(&mut self) {
        let mut shared = self.handle.shared.borrow_mut();
        if !shared.queue.is_empty() {
            let deadline = self.handle.clock.now() + self.coalesce_delay;
            shared.timers.schedule(BridgeTimer::Flush, deadline);
        }
    }

    /// Read and dispatch every waiting inbound message
    ///
    /// Malformed input is answered with a `protocolError` event and skipped.
    pub fn poll_inbound(&mut self) -> Vec<BridgeMessage> {
        let mut received = Vec::new();
        if !self.listening {
            return received;
        }

        while let Some(raw) = self.wall.try_recv() {
            match serde_json::from_str::<BridgeMessage>(&raw) {
                Ok(message) => {
                    for listener in self.listeners.iter_mut() {
                        listener(&message);
                    }
                    received.push(message);
                }
                Err(e) => {
                    tracing::warn!("Malformed inbound message: {}", e);
                    self.handle.send(
                        PROTOCOL_ERROR_EVENT,
                        serde_json::json!({ "message": e.to_string() }),
                    );
                }
            }
        }
        received
    }

    /// Send `shutdown`, drain the queue and close the wall
    ///
    /// If the wall stays busy past the shutdown timeout, the rest of the
    /// queue is delivered by later [`tick`](Self::tick)s before the wall
    /// closes.
    pub fn shutdown(&mut self) {
        if self.handle.is_shut_down() {
            tracing::warn!("Bridge is already shut down");
            return;
        }

        self.handle.send(SHUTDOWN_EVENT, Value::Null);
        self.handle.shared.borrow_mut().shut_down = true;
        self.listeners.clear();
        self.listening = false;

        self.drain_and_close(self.shutdown_timeout);
    }

    fn drain_and_close(&mut self, timeout: Duration) {
        if self.closed {
            return;
        }
        loop {
            let batch = self.take_queue();
            if batch.is_empty() {
                break;
            }
            let result = self.wall.send_timeout(&batch, timeout);
            if !self.settle(batch, result) {
                tracing::warn!(
                    "Wall still busy during shutdown, {} messages left to deliver",
                    self.handle.pending()
                );
                self.schedule_retry();
                return;
            }
        }

        self.wall.close();
        self.closed = true;
        self.handle.shared.borrow_mut().timers.clear();
        tracing::info!("Bridge shut down");
    }
}
