//! Inbound command decoding
//!
//! Every event the frontend may send maps to one [`Command`]. Unknown events
//! decode to `None` so newer frontends can talk to older backends; a known
//! event with a malformed payload is a [`InspectorError::Protocol`].

use crate::bridge::BridgeMessage;
use crate::config::ComponentFilter;
use crate::error::{InspectorError, Result};
use crate::protocol::BridgeProtocol;
use crate::tracker::ShadowId;
use serde::Deserialize;
use serde_json::Value;

/// Reference to one element, optionally qualified by renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRef {
    pub id: ShadowId,
    #[serde(default, alias = "rendererID")]
    pub renderer_id: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideErrorArgs {
    pub id: ShadowId,
    #[serde(default, alias = "rendererID")]
    pub renderer_id: Option<u32>,
    pub force_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideSuspenseArgs {
    pub id: ShadowId,
    #[serde(default, alias = "rendererID")]
    pub renderer_id: Option<u32>,
    pub force_fallback: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RendererArgs {
    #[serde(default, alias = "rendererID")]
    renderer_id: Option<u32>,
}

/// A decoded inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GetBridgeProtocol,
    /// The frontend announcing the protocol it speaks
    BridgeProtocol(BridgeProtocol),
    GetBackendVersion,
    FlushInitialOperations,
    StartProfiling { record_change_descriptions: bool },
    StopProfiling,
    GetProfilingStatus,
    GetProfilingData { renderer_id: Option<u32> },
    UpdateComponentFilters(Vec<ComponentFilter>),
    ClearErrorsAndWarnings,
    ClearErrorsForElementId(ElementRef),
    ClearWarningsForElementId(ElementRef),
    OverrideError(OverrideErrorArgs),
    OverrideSuspense(OverrideSuspenseArgs),
    SetTraceUpdatesEnabled(bool),
    GetOwnersList(ElementRef),
    Shutdown,
}

impl Command {
    /// Decode `message`, `Ok(None)` for events this backend does not know
    pub fn from_message(message: &BridgeMessage) -> Result<Option<Command>> {
        let command = match message.event.as_str() {
            "getBridgeProtocol" => Command::GetBridgeProtocol,
            "bridgeProtocol" => Command::BridgeProtocol(payload(message)?),
            "getBackendVersion" => Command::GetBackendVersion,
            "flushInitialOperations" => Command::FlushInitialOperations,
            "startProfiling" => Command::StartProfiling {
                record_change_descriptions: payload::<Option<bool>>(message)?.unwrap_or(false),
            },
            "stopProfiling" => Command::StopProfiling,
            "getProfilingStatus" => Command::GetProfilingStatus,
            "getProfilingData" => {
                let args = if message.payload.is_null() {
                    RendererArgs::default()
                } else {
                    payload::<RendererArgs>(message)?
                };
                Command::GetProfilingData {
                    renderer_id: args.renderer_id,
                }
            }
            "updateComponentFilters" => Command::UpdateComponentFilters(payload(message)?),
            "clearErrorsAndWarnings" => Command::ClearErrorsAndWarnings,
            "clearErrorsForElementId" => Command::ClearErrorsForElementId(payload(message)?),
            "clearWarningsForElementId" => Command::ClearWarningsForElementId(payload(message)?),
            "overrideError" => Command::OverrideError(payload(message)?),
            "overrideSuspense" => Command::OverrideSuspense(payload(message)?),
            "setTraceUpdatesEnabled" => Command::SetTraceUpdatesEnabled(payload(message)?),
            "getOwnersList" => Command::GetOwnersList(payload(message)?),
            "shutdown" => Command::Shutdown,
            other => {
                tracing::debug!("Ignoring unknown event {:?}", other);
                return Ok(None);
            }
        };
        Ok(Some(command))
    }

    /// Renderer the command is addressed to, if it names one
    pub fn renderer_id(&self) -> Option<u32> {
        match self {
            Command::GetProfilingData { renderer_id } => *renderer_id,
            Command::ClearErrorsForElementId(r)
            | Command::ClearWarningsForElementId(r)
            | Command::GetOwnersList(r) => r.renderer_id,
            Command::OverrideError(args) => args.renderer_id,
            Command::OverrideSuspense(args) => args.renderer_id,
            _ => None,
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(message: &BridgeMessage) -> Result<T> {
    message.payload_as::<T>()
}

/// Payload of an `inspectorError` event
pub(crate) fn error_payload(event: &str, error: &InspectorError) -> Value {
    serde_json::json!({
        "event": event,
        "message": error.to_string(),
    })
}
