//! Wire protocol shared with the frontend.
//!
//! Tree mutations travel as one flat `u32` array per flush:
//!
//! ```text
//! [rendererId, rootId, stringTableSize,
//!  (len, codepoint...)...,                       string table, ids 1..n
//!  REMOVE, count, realUnmounts..., simulatedUnmounts..., unmountedRoot?,
//!  op...]                                        discovery order
//! ```
//!
//! The consumer decodes positionally, so field order and the grouping of
//! all removals into one leading REMOVE op are fixed.
//!
//! # Main Types
//!
//! - [`StringInterner`] - per-flush string table
//! - [`PendingBatch`] - mutation records accumulated between flushes
//! - [`decode_operations`] - positional decoder for consumers and tests
//! - [`BridgeProtocol`] - handshake record exchanged once per connection

pub mod decoder;
pub mod encoder;
pub mod interner;

pub use decoder::{decode_operations, DecodedOperations, TreeOperation};
pub use encoder::PendingBatch;
pub use interner::StringInterner;

use serde::{Deserialize, Serialize};

// ==================== Opcodes ====================

pub const TREE_OPERATION_ADD: u32 = 1;
pub const TREE_OPERATION_REMOVE: u32 = 2;
/// Replaces a node's visible children list (RESET_CHILDREN)
pub const TREE_OPERATION_REORDER_CHILDREN: u32 = 3;
pub const TREE_OPERATION_UPDATE_TREE_BASE_DURATION: u32 = 4;
pub const TREE_OPERATION_UPDATE_ERRORS_OR_WARNINGS: u32 = 5;
pub const TREE_OPERATION_REMOVE_ROOT: u32 = 6;
pub const TREE_OPERATION_SET_SUBTREE_MODE: u32 = 7;

/// Root supports per-commit duration data
pub const PROFILING_FLAG_BASIC_SUPPORT: u32 = 0b01;
/// Root supports timeline data
pub const PROFILING_FLAG_TIMELINE_SUPPORT: u32 = 0b10;

/// Subtree mode value for strict mode
pub const STRICT_MODE: u32 = 1;

/// Header length: renderer id, root id, string table size
pub const HEADER_LEN: usize = 3;

// ==================== Handshake ====================

/// Protocol version record exchanged when a frontend connects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeProtocol {
    /// Incremented whenever the message format changes incompatibly
    pub version: u32,
    /// Oldest frontend release that speaks this version
    pub min_compat_version: String,
    /// Newest frontend release that speaks this version (`None` = still current)
    pub max_compat_version: Option<String>,
}

/// Every protocol version this backend has shipped, oldest first
pub fn bridge_protocols() -> Vec<BridgeProtocol> {
    vec![
        BridgeProtocol {
            version: 1,
            min_compat_version: "0.1.0".to_string(),
            max_compat_version: Some("0.1.0".to_string()),
        },
        BridgeProtocol {
            version: 2,
            min_compat_version: "0.1.0".to_string(),
            max_compat_version: None,
        },
    ]
}

/// The version this backend speaks
pub fn current_bridge_protocol() -> BridgeProtocol {
    BridgeProtocol {
        version: 2,
        min_compat_version: "0.1.0".to_string(),
        max_compat_version: None,
    }
}

/// Release of this backend, reported to `getBackendVersion`
pub const BACKEND_VERSION: &str = env!("CARGO_PKG_VERSION");
