//! Configuration for an inspector attachment
//!
//! This module holds the settings an embedding application can tune:
//! - Bridge batching delays and channel capacities
//! - Tracker behavior (renderer id, debounce windows, trace updates)
//! - Profiling options
//! - The initial component filter rules
//!
//! # Files
//!
//! Configs are plain TOML (`.toml`) or JSON (any other extension). Every
//! section is optional; missing fields take their defaults.
//!
//! # Example
//!
//! ```ignore
//! use treelens::config::InspectorConfig;
//!
//! let config = InspectorConfig::load_or_default("treelens.toml");
//! config.save("backup/treelens.json")?;
//! ```

pub mod filters;

pub use filters::{default_component_filters, ComponentFilter};

use crate::error::{InspectorError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default renderer id announced in every operations message
pub const DEFAULT_RENDERER_ID: u32 = 1;

/// Default debounce before an unmounted node's id is forgotten
pub const DEFAULT_UNTRACK_DELAY_MS: u64 = 1000;

/// Default debounce for error/warning count updates
pub const DEFAULT_ERRORS_FLUSH_DELAY_MS: u64 = 1000;

/// Default delay before a re-entrant burst is flushed
pub const DEFAULT_COALESCE_DELAY_MS: u64 = 100;

/// Default capacity of the outbound channel (batches)
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1024;

/// Default capacity of the inbound channel (messages)
pub const DEFAULT_INBOUND_CAPACITY: usize = 256;

/// Default time shutdown waits for a full transport
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 1000;

// ==================== Bridge ====================

/// Transport bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Delay before the first flush of a batch (0 = next tick)
    pub batch_delay_ms: u64,

    /// Delay before flushing messages queued during a dispatch
    pub coalesce_delay_ms: u64,

    /// Outbound channel capacity, in batches
    pub outbound_capacity: usize,

    /// Inbound channel capacity, in messages
    pub inbound_capacity: usize,

    /// How long shutdown blocks on a full transport before retrying on tick
    pub shutdown_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            batch_delay_ms: 0,
            coalesce_delay_ms: DEFAULT_COALESCE_DELAY_MS,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl BridgeConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn coalesce_delay(&self) -> Duration {
        Duration::from_millis(self.coalesce_delay_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

// ==================== Tracker ====================

/// Tree tracker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Renderer id written at the head of every operations message
    pub renderer_id: u32,

    /// Debounce before unmounted ids are released
    pub untrack_delay_ms: u64,

    /// Debounce for error/warning count flushes
    pub errors_flush_delay_ms: u64,

    /// Collect host nodes touched by each commit for highlighting
    pub trace_updates: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            renderer_id: DEFAULT_RENDERER_ID,
            untrack_delay_ms: DEFAULT_UNTRACK_DELAY_MS,
            errors_flush_delay_ms: DEFAULT_ERRORS_FLUSH_DELAY_MS,
            trace_updates: false,
        }
    }
}

impl TrackerConfig {
    pub fn untrack_delay(&self) -> Duration {
        Duration::from_millis(self.untrack_delay_ms)
    }

    pub fn errors_flush_delay(&self) -> Duration {
        Duration::from_millis(self.errors_flush_delay_ms)
    }
}

// ==================== Profiling ====================

/// Profiling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilingConfig {
    /// Record why each component rendered (props/state/hooks diffs)
    pub record_change_descriptions: bool,

    /// Capture the nested timeline span stack while profiling
    pub record_timeline: bool,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            record_change_descriptions: false,
            record_timeline: true,
        }
    }
}

// ==================== Inspector Config ====================

/// Complete settings for one attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    pub bridge: BridgeConfig,
    pub tracker: TrackerConfig,
    pub profiling: ProfilingConfig,

    /// Filter rules in force when the session attaches
    pub component_filters: Vec<ComponentFilter>,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            tracker: TrackerConfig::default(),
            profiling: ProfilingConfig::default(),
            component_filters: default_component_filters(),
        }
    }
}

impl InspectorConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| InspectorError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Render as a TOML document
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| InspectorError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Load a config file; `.toml` files are parsed as TOML, anything else as JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        if is_toml(path) {
            Self::from_toml_str(&content)
        } else {
            serde_json::from_str(&content).map_err(|e| {
                InspectorError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })
        }
    }

    /// Load a config file, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load inspector config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to disk, format chosen by extension like [`load`](Self::load)
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let content = if is_toml(path) {
            self.to_toml_string()?
        } else {
            serde_json::to_string_pretty(self).map_err(|e| {
                InspectorError::Config(format!("Failed to serialize config: {}", e))
            })?
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {:?}", path))
    }

    /// Builder-style filter override
    pub fn with_component_filters(mut self, filters: Vec<ComponentFilter>) -> Self {
        self.component_filters = filters;
        self
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false)
}
