//! Core data types shared by the tracker, the filters and the wire protocol
//!
//! # Main Types
//!
//! - [`ElementType`] - Closed classification of tree nodes, as seen by the frontend
//! - [`WorkTag`] - Semantic kind of a host node, resolved from the host's raw tag
//! - [`ConsoleKind`] - Error or warning, for per-node console message counts
//!
//! Raw host tags differ across host releases, so they never appear here:
//! [`crate::host::TagTable`] resolves them into [`WorkTag`] once per attachment
//! and everything downstream matches on the closed enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Frontend-facing classification of a tree node
///
/// The discriminants are the wire codes carried in ADD operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementType {
    /// Class component
    Class = 1,
    /// Context provider or consumer
    Context = 2,
    /// Function component
    Function = 5,
    /// Forward-ref wrapper
    ForwardRef = 6,
    /// Host primitive (platform element such as `div`)
    HostComponent = 7,
    /// Memo wrapper
    Memo = 8,
    /// Anything else (fragments, portals, modes, lazy wrappers)
    Other = 9,
    /// Profiler boundary
    Profiler = 10,
    /// Tree root
    Root = 11,
    /// Suspense boundary
    Suspense = 12,
    /// Suspense list
    SuspenseList = 13,
    /// Tracing marker
    TracingMarker = 14,
}

impl ElementType {
    /// All element types, in wire-code order
    pub const ALL: [ElementType; 12] = [
        ElementType::Class,
        ElementType::Context,
        ElementType::Function,
        ElementType::ForwardRef,
        ElementType::HostComponent,
        ElementType::Memo,
        ElementType::Other,
        ElementType::Profiler,
        ElementType::Root,
        ElementType::Suspense,
        ElementType::SuspenseList,
        ElementType::TracingMarker,
    ];

    /// Wire code for this element type
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Parse a wire code back into an element type
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }

    /// Whether nodes of this type run user render logic
    pub fn is_component(self) -> bool {
        matches!(
            self,
            ElementType::Class
                | ElementType::Function
                | ElementType::ForwardRef
                | ElementType::Memo
                | ElementType::Context
        )
    }

    /// Display name for UI / log output
    pub fn display_name(&self) -> &'static str {
        match self {
            ElementType::Class => "Class",
            ElementType::Context => "Context",
            ElementType::Function => "Function",
            ElementType::ForwardRef => "ForwardRef",
            ElementType::HostComponent => "Host",
            ElementType::Memo => "Memo",
            ElementType::Other => "Other",
            ElementType::Profiler => "Profiler",
            ElementType::Root => "Root",
            ElementType::Suspense => "Suspense",
            ElementType::SuspenseList => "SuspenseList",
            ElementType::TracingMarker => "TracingMarker",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Semantic kind of a host node
///
/// One variant per node kind any supported host release can produce. A given
/// release only produces a subset; the rest resolve to nothing in its
/// [`crate::host::TagTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkTag {
    FunctionComponent,
    ClassComponent,
    IndeterminateComponent,
    IncompleteClassComponent,
    HostRoot,
    HostPortal,
    HostComponent,
    HostHoistable,
    HostSingleton,
    HostText,
    Fragment,
    Mode,
    ContextConsumer,
    ContextProvider,
    ForwardRef,
    Profiler,
    SuspenseComponent,
    DehydratedSuspenseComponent,
    SuspenseListComponent,
    MemoComponent,
    SimpleMemoComponent,
    LazyComponent,
    ScopeComponent,
    OffscreenComponent,
    LegacyHiddenComponent,
    CacheComponent,
    TracingMarkerComponent,
    CoroutineComponent,
    CoroutineHandlerPhase,
    YieldComponent,
    /// Raw tag the table has no entry for
    Unknown,
}

impl WorkTag {
    /// Kinds whose "did it render" signal is the performed-work flag rather
    /// than payload identity
    pub fn reports_performed_work(self) -> bool {
        matches!(
            self,
            WorkTag::ClassComponent
                | WorkTag::FunctionComponent
                | WorkTag::ContextConsumer
                | WorkTag::MemoComponent
                | WorkTag::SimpleMemoComponent
                | WorkTag::ForwardRef
        )
    }

    /// Host primitives (the nodes the highlight overlay can point at)
    pub fn is_host_primitive(self) -> bool {
        matches!(
            self,
            WorkTag::HostComponent
                | WorkTag::HostHoistable
                | WorkTag::HostSingleton
                | WorkTag::HostText
        )
    }
}

/// Kind of console message attributed to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsoleKind {
    Error,
    Warning,
}
