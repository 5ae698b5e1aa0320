//! Host runtime contract
//!
//! The inspector never owns the render tree. It sees the host through two
//! traits:
//!
//! - [`HostTree`] - read-only navigation of render nodes (links, payload
//!   identities, timings) addressed by opaque [`NodeHandle`]s
//! - [`HostRuntime`] - per-attachment facts (version, roots, capabilities)
//!   plus the optional hooks debugging commands depend on
//!
//! # Architecture
//!
//! ```text
//! host commit ──► HostRuntime::current(root) ──► Renderer walks HostTree links
//!                                                  │
//!                        TagTable (raw tag ──► WorkTag, resolved at attach)
//! ```
//!
//! Links are never assumed present: every navigation method returns an
//! `Option`. The tracker stores handles only and never mutates host links.
//!
//! [`ArenaHost`] is an in-memory double-buffered implementation used by the
//! test suite and benches.

pub mod arena;
pub mod tags;

pub use arena::{ArenaHost, CommitReport, Element};
pub use tags::{FallbackLayout, PriorityScheme, TagTable};

use crate::error::{InspectorError, Result};
use std::fmt;

// ==================== Handles ====================

/// Opaque reference to one render node in the host's tree
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({})", self.0)
    }
}

/// Opaque reference to one tree root
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootHandle(pub u64);

impl fmt::Debug for RootHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RootHandle({})", self.0)
    }
}

/// Identity of a host-owned payload (props, state, ref)
///
/// Two nodes render the same payload iff their refs are equal. `NONE` stands
/// for an absent payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PayloadRef(pub u64);

impl PayloadRef {
    pub const NONE: PayloadRef = PayloadRef(0);
}

// ==================== Node Data ====================

/// Profiler timings the host attaches to each node, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeTimings {
    /// Time spent rendering this node and its descendants in the last commit
    pub actual_duration: f64,
    /// When the last render of this node started
    pub actual_start_time: f64,
    /// Most recent render time of this node alone
    pub self_base_duration: f64,
    /// Sum of self base durations over the subtree
    pub tree_base_duration: f64,
}

/// Optional host hooks
///
/// A missing capability disables only the feature that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostCapabilities {
    /// Host reports per-node timings and commit lifecycle marks
    pub profiling_hooks: bool,
    /// Host consults the inspector before rethrowing component errors
    pub error_override: bool,
    /// Host consults the inspector before rendering suspense content
    pub suspense_override: bool,
    /// Host can re-render a single node on request
    pub schedule_update: bool,
}

impl HostCapabilities {
    /// Everything supported
    pub fn all() -> Self {
        Self {
            profiling_hooks: true,
            error_override: true,
            suspense_override: true,
            schedule_update: true,
        }
    }
}

// ==================== Traits ====================

/// Read-only navigation of the host's render tree
pub trait HostTree {
    /// Raw, release-specific kind code
    fn tag(&self, node: NodeHandle) -> u32;

    /// The other buffer's representation of the same logical node
    fn alternate(&self, node: NodeHandle) -> Option<NodeHandle>;

    fn child(&self, node: NodeHandle) -> Option<NodeHandle>;

    fn sibling(&self, node: NodeHandle) -> Option<NodeHandle>;

    /// Owning parent (host term: return)
    fn parent(&self, node: NodeHandle) -> Option<NodeHandle>;

    fn key(&self, node: NodeHandle) -> Option<String>;

    /// Name of the node's type: component name, host element tag, or context
    /// name for providers and consumers
    fn type_name(&self, node: NodeHandle) -> Option<String>;

    /// Explicit display name set on a wrapper type (forward-ref, memo)
    fn display_name_override(&self, _node: NodeHandle) -> Option<String> {
        None
    }

    /// Mode bit field (strict mode bits are release-specific, see [`TagTable`])
    fn mode(&self, node: NodeHandle) -> u32;

    /// For suspense boundaries: true while the fallback is shown
    fn is_showing_fallback(&self, node: NodeHandle) -> bool;

    /// For root nodes: true if the root currently renders content
    fn root_has_content(&self, node: NodeHandle) -> bool;

    fn memoized_props(&self, node: NodeHandle) -> PayloadRef;

    fn memoized_state(&self, node: NodeHandle) -> PayloadRef;

    fn ref_payload(&self, node: NodeHandle) -> PayloadRef;

    /// Performed-work flag from the last render pass
    fn performed_work(&self, node: NodeHandle) -> bool;

    /// Profiler timings, if the host records them
    fn timings(&self, _node: NodeHandle) -> Option<NodeTimings> {
        None
    }

    /// Component that created this node, when the host tracks owners
    fn debug_owner(&self, _node: NodeHandle) -> Option<NodeHandle> {
        None
    }

    /// Source file the node's type was defined in
    fn source_path(&self, _node: NodeHandle) -> Option<String> {
        None
    }

    /// Set while a hot reload is about to recreate this node with the same state
    fn needs_remount(&self, _node: NodeHandle) -> bool {
        false
    }

    /// Prop keys whose values differ between two renders of the same node
    fn changed_prop_keys(&self, _prev: NodeHandle, _next: NodeHandle) -> Vec<String> {
        Vec::new()
    }

    /// State keys whose values differ between two renders of the same node
    fn changed_state_keys(&self, _prev: NodeHandle, _next: NodeHandle) -> Vec<String> {
        Vec::new()
    }

    /// Indices of hooks that changed between two renders, if known
    fn changed_hooks(&self, _prev: NodeHandle, _next: NodeHandle) -> Option<Vec<u32>> {
        None
    }
}

/// One attached host runtime instance
pub trait HostRuntime: HostTree {
    /// Release version string, e.g. `18.2.0`
    fn version(&self) -> &str;

    /// Roots currently attached
    fn roots(&self) -> Vec<RootHandle>;

    /// Current (committed) node of a root
    fn current(&self, root: RootHandle) -> Option<NodeHandle>;

    fn is_production(&self) -> bool {
        false
    }

    /// Host records owner links on nodes
    fn has_owner_metadata(&self) -> bool {
        false
    }

    fn capabilities(&self) -> HostCapabilities;

    /// Layout and passive effect durations of the last commit of `root`
    fn effect_durations(&self, _root: RootHandle) -> (Option<f64>, Option<f64>) {
        (None, None)
    }

    /// Human-readable label per lane bit, index = bit position
    fn lane_labels(&self) -> Vec<String> {
        Vec::new()
    }

    /// Ask the host to re-render `node`
    fn schedule_update(&mut self, node: NodeHandle) -> Result<()> {
        Err(InspectorError::Unsupported(format!(
            "host {} cannot schedule an update for {:?}",
            self.version(),
            node
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_default_none() {
        let caps = HostCapabilities::default();
        assert!(!caps.profiling_hooks);
        assert!(!caps.schedule_update);
        assert!(HostCapabilities::all().error_override);
    }

    #[test]
    fn test_handle_debug() {
        assert_eq!(format!("{:?}", NodeHandle(12)), "NodeHandle(12)");
        assert_eq!(format!("{:?}", RootHandle(1)), "RootHandle(1)");
        assert_eq!(PayloadRef::default(), PayloadRef::NONE);
    }
}
