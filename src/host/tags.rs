//! Release-specific tag tables
//!
//! The host's raw kind codes, strict-mode bits and priority numbering moved
//! around between releases. A [`TagTable`] is resolved once per attachment
//! from the host's version string; everything downstream matches on
//! [`WorkTag`].

use crate::host::{HostTree, NodeHandle};
use crate::types::WorkTag;
use semver::Version;
use std::collections::HashMap;

/// Version assumed when the host reports something unparseable
pub const NEWEST_KNOWN_VERSION: &str = "18.3.0";

// ==================== Release Bands ====================

/// Releases from 17.0.1 on
const TAGS_17_0_1: &[(WorkTag, u32)] = &[
    (WorkTag::FunctionComponent, 0),
    (WorkTag::ClassComponent, 1),
    (WorkTag::IndeterminateComponent, 2),
    (WorkTag::HostRoot, 3),
    (WorkTag::HostPortal, 4),
    (WorkTag::HostComponent, 5),
    (WorkTag::HostText, 6),
    (WorkTag::Fragment, 7),
    (WorkTag::Mode, 8),
    (WorkTag::ContextConsumer, 9),
    (WorkTag::ContextProvider, 10),
    (WorkTag::ForwardRef, 11),
    (WorkTag::Profiler, 12),
    (WorkTag::SuspenseComponent, 13),
    (WorkTag::MemoComponent, 14),
    (WorkTag::SimpleMemoComponent, 15),
    (WorkTag::LazyComponent, 16),
    (WorkTag::IncompleteClassComponent, 17),
    (WorkTag::DehydratedSuspenseComponent, 18),
    (WorkTag::SuspenseListComponent, 19),
    (WorkTag::ScopeComponent, 21),
    (WorkTag::OffscreenComponent, 22),
    (WorkTag::LegacyHiddenComponent, 23),
    (WorkTag::CacheComponent, 24),
    (WorkTag::TracingMarkerComponent, 25),
    (WorkTag::HostHoistable, 26),
    (WorkTag::HostSingleton, 27),
];

/// 17.0.0 pre-releases
const TAGS_17_0_0_ALPHA: &[(WorkTag, u32)] = &[
    (WorkTag::FunctionComponent, 0),
    (WorkTag::ClassComponent, 1),
    (WorkTag::IndeterminateComponent, 2),
    (WorkTag::HostRoot, 3),
    (WorkTag::HostPortal, 4),
    (WorkTag::HostComponent, 5),
    (WorkTag::HostText, 6),
    (WorkTag::Fragment, 7),
    (WorkTag::Mode, 8),
    (WorkTag::ContextConsumer, 9),
    (WorkTag::ContextProvider, 10),
    (WorkTag::ForwardRef, 11),
    (WorkTag::Profiler, 12),
    (WorkTag::SuspenseComponent, 13),
    (WorkTag::MemoComponent, 14),
    (WorkTag::SimpleMemoComponent, 15),
    (WorkTag::LazyComponent, 16),
    (WorkTag::IncompleteClassComponent, 17),
    (WorkTag::DehydratedSuspenseComponent, 18),
    (WorkTag::SuspenseListComponent, 19),
    (WorkTag::ScopeComponent, 21),
    (WorkTag::OffscreenComponent, 23),
    (WorkTag::LegacyHiddenComponent, 24),
];

/// 16.6 up to 17
const TAGS_16_6_0: &[(WorkTag, u32)] = &[
    (WorkTag::FunctionComponent, 0),
    (WorkTag::ClassComponent, 1),
    (WorkTag::IndeterminateComponent, 2),
    (WorkTag::HostRoot, 3),
    (WorkTag::HostPortal, 4),
    (WorkTag::HostComponent, 5),
    (WorkTag::HostText, 6),
    (WorkTag::Fragment, 7),
    (WorkTag::Mode, 8),
    (WorkTag::ContextConsumer, 9),
    (WorkTag::ContextProvider, 10),
    (WorkTag::ForwardRef, 11),
    (WorkTag::Profiler, 12),
    (WorkTag::SuspenseComponent, 13),
    (WorkTag::MemoComponent, 14),
    (WorkTag::SimpleMemoComponent, 15),
    (WorkTag::LazyComponent, 16),
    (WorkTag::IncompleteClassComponent, 17),
    (WorkTag::DehydratedSuspenseComponent, 18),
    (WorkTag::SuspenseListComponent, 19),
];

/// 16.4.3 up to 16.6
const TAGS_16_4_3: &[(WorkTag, u32)] = &[
    (WorkTag::FunctionComponent, 0),
    (WorkTag::ClassComponent, 2),
    (WorkTag::IndeterminateComponent, 4),
    (WorkTag::HostRoot, 5),
    (WorkTag::HostPortal, 6),
    (WorkTag::HostComponent, 7),
    (WorkTag::HostText, 8),
    (WorkTag::Fragment, 9),
    (WorkTag::Mode, 10),
    (WorkTag::ContextConsumer, 11),
    (WorkTag::ContextProvider, 12),
    (WorkTag::ForwardRef, 13),
    (WorkTag::Profiler, 15),
    (WorkTag::SuspenseComponent, 16),
];

/// Anything older
const TAGS_LEGACY: &[(WorkTag, u32)] = &[
    (WorkTag::IndeterminateComponent, 0),
    (WorkTag::FunctionComponent, 1),
    (WorkTag::ClassComponent, 2),
    (WorkTag::HostRoot, 3),
    (WorkTag::HostPortal, 4),
    (WorkTag::HostComponent, 5),
    (WorkTag::HostText, 6),
    (WorkTag::CoroutineComponent, 7),
    (WorkTag::CoroutineHandlerPhase, 8),
    (WorkTag::YieldComponent, 9),
    (WorkTag::Fragment, 10),
    (WorkTag::Mode, 11),
    (WorkTag::ContextConsumer, 12),
    (WorkTag::ContextProvider, 13),
    (WorkTag::ForwardRef, 14),
    (WorkTag::Profiler, 15),
    (WorkTag::SuspenseComponent, 16),
];

// ==================== Capabilities ====================

/// How a suspense boundary arranges its children
///
/// In every supported layout a boundary showing its fallback keeps the hidden
/// primary content at `child` and the fallback fragment at `child.sibling`.
/// The layouts differ in where the primary children live while content shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackLayout {
    /// Primary children always sit under an offscreen wrapper at `child`
    OffscreenWrapped,
    /// Primary children are direct children unless the boundary timed out
    ConditionallyWrapped,
}

impl FallbackLayout {
    /// The fallback fragment of a boundary showing its fallback
    pub fn fallback_fragment<H: HostTree + ?Sized>(
        self,
        host: &H,
        suspense: NodeHandle,
    ) -> Option<NodeHandle> {
        host.child(suspense).and_then(|primary| host.sibling(primary))
    }

    /// First fallback child of a boundary showing its fallback
    pub fn fallback_children<H: HostTree + ?Sized>(
        self,
        host: &H,
        suspense: NodeHandle,
    ) -> Option<NodeHandle> {
        self.fallback_fragment(host, suspense)
            .and_then(|fragment| host.child(fragment))
    }

    /// Wrapper between a boundary showing its content and its primary
    /// children, if the layout has one
    pub fn primary_wrapper<H: HostTree + ?Sized>(
        self,
        host: &H,
        suspense: NodeHandle,
    ) -> Option<NodeHandle> {
        match self {
            FallbackLayout::OffscreenWrapped => host.child(suspense),
            FallbackLayout::ConditionallyWrapped => None,
        }
    }

    /// First primary child of a boundary showing its content
    pub fn primary_children<H: HostTree + ?Sized>(
        self,
        host: &H,
        suspense: NodeHandle,
    ) -> Option<NodeHandle> {
        match self {
            FallbackLayout::OffscreenWrapped => host.child(suspense).and_then(|w| host.child(w)),
            FallbackLayout::ConditionallyWrapped => host.child(suspense),
        }
    }
}

/// Numbering of scheduler priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityScheme {
    pub immediate: u32,
    pub user_blocking: u32,
    pub normal: u32,
    pub low: u32,
    pub idle: u32,
    pub none: u32,
}

impl PriorityScheme {
    /// Numbering used after 17.0.2
    pub const MODERN: PriorityScheme = PriorityScheme {
        immediate: 1,
        user_blocking: 2,
        normal: 3,
        low: 4,
        idle: 5,
        none: 0,
    };

    /// Numbering used up to 17.0.2
    pub const LEGACY: PriorityScheme = PriorityScheme {
        immediate: 99,
        user_blocking: 98,
        normal: 97,
        low: 96,
        idle: 95,
        none: 90,
    };

    /// Label shown in profiling data
    pub fn label(&self, level: u32) -> &'static str {
        match level {
            l if l == self.immediate => "Immediate",
            l if l == self.user_blocking => "User-Blocking",
            l if l == self.normal => "Normal",
            l if l == self.low => "Low",
            l if l == self.idle => "Idle",
            _ => "Unknown",
        }
    }
}

// ==================== Tag Table ====================

/// Per-attachment lookup from raw host tags to [`WorkTag`]
#[derive(Debug, Clone)]
pub struct TagTable {
    version: Version,
    by_raw: HashMap<u32, WorkTag>,
    by_tag: HashMap<WorkTag, u32>,
    strict_mode_bits: u32,
    priorities: PriorityScheme,
    fallback_layout: FallbackLayout,
}

impl Default for TagTable {
    fn default() -> Self {
        Self::for_version(NEWEST_KNOWN_VERSION)
    }
}

impl TagTable {
    /// Resolve the table for a host release
    pub fn for_version(version: &str) -> Self {
        let version = match Version::parse(version.trim()) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    "Unrecognized host version {:?} ({}), assuming {}",
                    version,
                    e,
                    NEWEST_KNOWN_VERSION
                );
                newest_known()
            }
        };

        let band = if version >= release("17.0.1") {
            TAGS_17_0_1
        } else if version >= release("17.0.0-alpha") {
            TAGS_17_0_0_ALPHA
        } else if version >= release("16.6.0-beta.0") {
            TAGS_16_6_0
        } else if version >= release("16.4.3-alpha") {
            TAGS_16_4_3
        } else {
            TAGS_LEGACY
        };

        let strict_mode_bits = if version >= release("18.0.0-alpha") {
            0b011000
        } else if version >= release("16.9.0") {
            0b1
        } else if version >= release("16.3.0") {
            0b10
        } else {
            0
        };

        let priorities = if version > release("17.0.2") {
            PriorityScheme::MODERN
        } else {
            PriorityScheme::LEGACY
        };

        let by_raw: HashMap<u32, WorkTag> = band.iter().map(|&(tag, raw)| (raw, tag)).collect();
        let by_tag: HashMap<WorkTag, u32> = band.iter().copied().collect();

        let fallback_layout = if by_tag.contains_key(&WorkTag::OffscreenComponent) {
            FallbackLayout::OffscreenWrapped
        } else {
            FallbackLayout::ConditionallyWrapped
        };

        tracing::debug!(
            "Resolved tag table for host {} ({} kinds, {:?})",
            version,
            by_raw.len(),
            fallback_layout
        );

        Self {
            version,
            by_raw,
            by_tag,
            strict_mode_bits,
            priorities,
            fallback_layout,
        }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Semantic kind of a raw tag
    #[inline]
    pub fn resolve(&self, raw: u32) -> WorkTag {
        self.by_raw.get(&raw).copied().unwrap_or(WorkTag::Unknown)
    }

    /// Raw tag this release uses for `tag`, if it has one
    #[inline]
    pub fn raw_tag(&self, tag: WorkTag) -> Option<u32> {
        self.by_tag.get(&tag).copied()
    }

    /// Whether this release produces `tag` at all
    pub fn supports(&self, tag: WorkTag) -> bool {
        self.by_tag.contains_key(&tag)
    }

    /// Mode bits that mark a strict subtree (0 if the release has none)
    pub fn strict_mode_bits(&self) -> u32 {
        self.strict_mode_bits
    }

    pub fn priorities(&self) -> PriorityScheme {
        self.priorities
    }

    /// Label for a raw priority level
    pub fn priority_label(&self, level: u32) -> &'static str {
        self.priorities.label(level)
    }

    pub fn fallback_layout(&self) -> FallbackLayout {
        self.fallback_layout
    }
}

fn release(v: &str) -> Version {
    Version::parse(v).unwrap_or_else(|_| Version::new(0, 0, 0))
}

fn newest_known() -> Version {
    release(NEWEST_KNOWN_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_band() {
        let table = TagTable::for_version("18.2.0");
        assert_eq!(table.resolve(0), WorkTag::FunctionComponent);
        assert_eq!(table.resolve(13), WorkTag::SuspenseComponent);
        assert_eq!(table.resolve(22), WorkTag::OffscreenComponent);
        assert_eq!(table.resolve(26), WorkTag::HostHoistable);
        assert_eq!(table.resolve(20), WorkTag::Unknown);
        assert_eq!(table.strict_mode_bits(), 0b011000);
        assert_eq!(table.priorities(), PriorityScheme::MODERN);
        assert_eq!(table.fallback_layout(), FallbackLayout::OffscreenWrapped);
    }

    #[test]
    fn test_17_alpha_band() {
        let table = TagTable::for_version("17.0.0-alpha.1");
        assert_eq!(table.resolve(23), WorkTag::OffscreenComponent);
        assert_eq!(table.resolve(24), WorkTag::LegacyHiddenComponent);
        assert_eq!(table.raw_tag(WorkTag::TracingMarkerComponent), None);
        assert_eq!(table.strict_mode_bits(), 0b1);
        assert_eq!(table.priorities(), PriorityScheme::LEGACY);
    }

    #[test]
    fn test_16_6_band() {
        let table = TagTable::for_version("16.8.6");
        assert_eq!(table.resolve(14), WorkTag::MemoComponent);
        assert!(!table.supports(WorkTag::OffscreenComponent));
        assert_eq!(table.fallback_layout(), FallbackLayout::ConditionallyWrapped);
        assert_eq!(table.strict_mode_bits(), 0b10);
    }

    #[test]
    fn test_16_4_band() {
        let table = TagTable::for_version("16.4.3");
        assert_eq!(table.resolve(2), WorkTag::ClassComponent);
        assert_eq!(table.resolve(16), WorkTag::SuspenseComponent);
        assert_eq!(table.raw_tag(WorkTag::MemoComponent), None);
    }

    #[test]
    fn test_legacy_band() {
        let table = TagTable::for_version("16.0.0");
        assert_eq!(table.resolve(0), WorkTag::IndeterminateComponent);
        assert_eq!(table.resolve(1), WorkTag::FunctionComponent);
        assert_eq!(table.resolve(9), WorkTag::YieldComponent);
        assert_eq!(table.strict_mode_bits(), 0);
    }

    #[test]
    fn test_unparseable_version_uses_newest() {
        let table = TagTable::for_version("next");
        assert_eq!(table.version(), &newest_known());
        assert_eq!(table.resolve(22), WorkTag::OffscreenComponent);
    }

    #[test]
    fn test_priority_labels() {
        let modern = TagTable::for_version("18.0.0");
        assert_eq!(modern.priority_label(1), "Immediate");
        assert_eq!(modern.priority_label(2), "User-Blocking");
        assert_eq!(modern.priority_label(0), "Unknown");

        let legacy = TagTable::for_version("17.0.2");
        assert_eq!(legacy.priority_label(97), "Normal");
        assert_eq!(legacy.priority_label(3), "Unknown");
    }

    #[test]
    fn test_raw_tags_round_trip() {
        let table = TagTable::default();
        for tag in [
            WorkTag::HostRoot,
            WorkTag::FunctionComponent,
            WorkTag::SuspenseComponent,
            WorkTag::Fragment,
        ] {
            let raw = table.raw_tag(tag).unwrap();
            assert_eq!(table.resolve(raw), tag);
        }
    }
}
