//! In-process wall over crossbeam channels
//!
//! [`ChannelWall::pair`] returns the backend's wall and the matching
//! [`FrontendEndpoint`]. Outbound batches travel as parsed messages; inbound
//! messages travel as raw JSON text, like they would over a socket.
//!
//! A full outbound channel is reported as [`InspectorError::Busy`]; the
//! bridge keeps the batch and offers it again, so nothing is dropped while
//! the frontend catches up.

use super::{BridgeMessage, Wall};
use crate::config::BridgeConfig;
use crate::error::{InspectorError, Result};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TryRecvError, TrySendError};
use serde_json::Value;
use std::time::Duration;

/// Backend side of an in-process transport
#[derive(Debug)]
pub struct ChannelWall {
    outbound: Option<Sender<Vec<BridgeMessage>>>,
    inbound: Receiver<String>,
    busy_rejections: u64,
}

impl ChannelWall {
    /// Create a connected wall/endpoint pair
    pub fn pair(config: &BridgeConfig) -> (ChannelWall, FrontendEndpoint) {
        let (out_tx, out_rx) = bounded(config.outbound_capacity);
        let (in_tx, in_rx) = bounded(config.inbound_capacity);
        (
            ChannelWall {
                outbound: Some(out_tx),
                inbound: in_rx,
                busy_rejections: 0,
            },
            FrontendEndpoint {
                batches: out_rx,
                commands: in_tx,
                closed: false,
            },
        )
    }

    /// Sends turned away because the frontend fell behind
    pub fn busy_rejections(&self) -> u64 {
        self.busy_rejections
    }

    fn outbound(&self) -> Result<&Sender<Vec<BridgeMessage>>> {
        self.outbound.as_ref().ok_or_else(|| {
            InspectorError::TransportClosed("channel wall is closed".to_string())
        })
    }

    fn busy(&mut self) -> InspectorError {
        self.busy_rejections += 1;
        InspectorError::Busy(format!(
            "outbound channel full ({} rejections so far)",
            self.busy_rejections
        ))
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_none()
    }
}

impl Wall for ChannelWall {
    fn send(&mut self, batch: &[BridgeMessage]) -> Result<()> {
        let sent = self.outbound()?.try_send(batch.to_vec());
        match sent {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(self.busy()),
            Err(TrySendError::Disconnected(_)) => Err(InspectorError::TransportClosed(
                "frontend endpoint dropped".to_string(),
            )),
        }
    }

    fn send_timeout(&mut self, batch: &[BridgeMessage], timeout: Duration) -> Result<()> {
        let sent = self.outbound()?.send_timeout(batch.to_vec(), timeout);
        match sent {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(self.busy()),
            Err(SendTimeoutError::Disconnected(_)) => Err(InspectorError::TransportClosed(
                "frontend endpoint dropped".to_string(),
            )),
        }
    }

    fn try_recv(&mut self) -> Option<String> {
        self.inbound.try_recv().ok()
    }

    fn close(&mut self) {
        self.outbound = None;
    }
}

/// Frontend side of an in-process transport
#[derive(Debug)]
pub struct FrontendEndpoint {
    batches: Receiver<Vec<BridgeMessage>>,
    commands: Sender<String>,
    closed: bool,
}

impl FrontendEndpoint {
    /// Next delivered batch, if any
    pub fn try_recv_batch(&mut self) -> Option<Vec<BridgeMessage>> {
        match self.batches.try_recv() {
            Ok(batch) => Some(batch),
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
            Err(TryRecvError::Empty) => None,
        }
    }

    /// Every delivered batch, in order
    pub fn recv_batches(&mut self) -> Vec<Vec<BridgeMessage>> {
        let mut batches = Vec::new();
        while let Some(batch) = self.try_recv_batch() {
            batches.push(batch);
        }
        batches
    }

    /// Every delivered message, batches flattened
    pub fn messages(&mut self) -> Vec<BridgeMessage> {
        self.recv_batches().into_iter().flatten().collect()
    }

    /// Send a command to the backend
    pub fn send(&self, event: &str, payload: Value) -> Result<()> {
        let text = serde_json::to_string(&BridgeMessage::new(event, payload))?;
        self.send_raw(text)
    }

    /// Send raw text, bypassing serialization
    pub fn send_raw(&self, text: impl Into<String>) -> Result<()> {
        self.commands.try_send(text.into()).map_err(|e| match e {
            TrySendError::Full(_) => {
                InspectorError::InvalidState("inbound channel full".to_string())
            }
            TrySendError::Disconnected(_) => {
                InspectorError::TransportClosed("backend wall dropped".to_string())
            }
        })
    }

    /// True once the backend closed the wall and every batch was received
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn small() -> BridgeConfig {
        BridgeConfig {
            outbound_capacity: 1,
            inbound_capacity: 4,
            ..BridgeConfig::default()
        }
    }

    #[test]
    fn test_round_trip_both_directions() {
        let (mut wall, mut frontend) = ChannelWall::pair(&BridgeConfig::default());

        wall.send(&[BridgeMessage::new("a", json!(1)), BridgeMessage::new("b", Value::Null)])
            .unwrap();
        let messages = frontend.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].payload, json!(1));

        frontend.send("getBackendVersion", Value::Null).unwrap();
        let raw = wall.try_recv().unwrap();
        let parsed: BridgeMessage = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.event, "getBackendVersion");
        assert!(wall.try_recv().is_none());
    }

    #[test]
    fn test_full_channel_reports_busy() {
        let (mut wall, mut frontend) = ChannelWall::pair(&small());
        wall.send(&[BridgeMessage::new("first", Value::Null)]).unwrap();
        let second = [BridgeMessage::new("second", Value::Null)];
        let err = wall.send(&second).unwrap_err();
        assert!(matches!(err, InspectorError::Busy(_)));
        let err = wall.send_timeout(&second, Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, InspectorError::Busy(_)));
        assert_eq!(wall.busy_rejections(), 2);

        // Once the frontend catches up the same batch goes through
        assert_eq!(frontend.recv_batches().len(), 1);
        wall.send(&second).unwrap();
        assert_eq!(frontend.messages()[0].event, "second");
    }

    #[test]
    fn test_send_timeout_waits_for_reader() {
        let (mut wall, mut frontend) = ChannelWall::pair(&small());
        wall.send(&[BridgeMessage::new("first", Value::Null)]).unwrap();

        let reader = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            let mut events = Vec::new();
            while !frontend.is_closed() {
                events.extend(frontend.messages().into_iter().map(|m| m.event));
                std::thread::yield_now();
            }
            events
        });

        wall.send_timeout(&[BridgeMessage::new("second", Value::Null)], Duration::from_secs(5))
            .unwrap();
        wall.close();
        assert_eq!(reader.join().unwrap(), ["first", "second"]);
    }

    #[test]
    fn test_close_disconnects_frontend() {
        let (mut wall, mut frontend) = ChannelWall::pair(&small());
        wall.send(&[BridgeMessage::new("last", Value::Null)]).unwrap();
        wall.close();
        assert!(wall.is_closed());
        assert!(wall.send(&[]).is_err());

        assert!(!frontend.is_closed());
        assert_eq!(frontend.messages().len(), 1);
        assert!(frontend.is_closed());
    }

    #[test]
    fn test_send_after_backend_dropped() {
        let (wall, frontend) = ChannelWall::pair(&small());
        drop(wall);
        let err = frontend.send_raw("{}").unwrap_err();
        assert!(matches!(err, InspectorError::TransportClosed(_)));
    }
}
