//! Console error/warning aggregation
//!
//! Messages arrive keyed by host node, often before the node has a shadow id
//! or while a commit is still in flight. They are parked per node and merged
//! into per-id counters when the debounce fires (or the next commit flushes).
//! Identical messages are counted, not stored twice.

use super::id::ShadowId;
use crate::host::NodeHandle;
use crate::types::ConsoleKind;
use indexmap::{IndexMap, IndexSet};

type MessageCounts = IndexMap<String, u32>;

/// Pending and merged console message counts
#[derive(Debug, Default)]
pub struct ConsoleAggregator {
    pending_errors: IndexMap<NodeHandle, MessageCounts>,
    pending_warnings: IndexMap<NodeHandle, MessageCounts>,
    errors: IndexMap<ShadowId, MessageCounts>,
    warnings: IndexMap<ShadowId, MessageCounts>,
    /// Ids whose totals changed since the last report
    changed: IndexSet<ShadowId>,
}

impl ConsoleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park one message for `node`
    pub fn record(&mut self, node: NodeHandle, kind: ConsoleKind, message: &str) {
        let pending = match kind {
            ConsoleKind::Error => &mut self.pending_errors,
            ConsoleKind::Warning => &mut self.pending_warnings,
        };
        *pending
            .entry(node)
            .or_default()
            .entry(message.to_string())
            .or_insert(0) += 1;
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_errors.is_empty() || !self.pending_warnings.is_empty()
    }

    /// Nodes with parked messages, errors first
    pub fn pending_nodes(&self) -> Vec<NodeHandle> {
        let mut nodes: IndexSet<NodeHandle> = self.pending_errors.keys().copied().collect();
        nodes.extend(self.pending_warnings.keys().copied());
        nodes.into_iter().collect()
    }

    /// Move the parked messages of `node` into the counters of `id`
    pub fn merge_pending(&mut self, node: NodeHandle, id: ShadowId) {
        let mut touched = false;
        if let Some(counts) = self.pending_errors.shift_remove(&node) {
            merge_into(self.errors.entry(id).or_default(), counts);
            touched = true;
        }
        if let Some(counts) = self.pending_warnings.shift_remove(&node) {
            merge_into(self.warnings.entry(id).or_default(), counts);
            touched = true;
        }
        if touched {
            self.changed.insert(id);
        }
    }

    /// Drop parked messages for nodes that never got an id
    pub fn discard_pending(&mut self) {
        self.pending_errors.clear();
        self.pending_warnings.clear();
    }

    /// Total (errors, warnings) for `id`
    pub fn counts(&self, id: ShadowId) -> (u32, u32) {
        let total = |m: Option<&MessageCounts>| -> u32 { m.map_or(0, |m| m.values().sum()) };
        (total(self.errors.get(&id)), total(self.warnings.get(&id)))
    }

    /// Take the ids whose totals changed, with their current totals
    pub fn take_changed(&mut self) -> Vec<(ShadowId, u32, u32)> {
        std::mem::take(&mut self.changed)
            .into_iter()
            .map(|id| {
                let (errors, warnings) = self.counts(id);
                (id, errors, warnings)
            })
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Reset every counter, marking each affected id as changed
    pub fn clear_all(&mut self) {
        let ids: Vec<ShadowId> = self
            .errors
            .keys()
            .chain(self.warnings.keys())
            .copied()
            .collect();
        self.changed.extend(ids);
        self.errors.clear();
        self.warnings.clear();
    }

    /// Reset one kind of counter for `id`. Returns true if it had any.
    pub fn clear(&mut self, id: ShadowId, kind: ConsoleKind) -> bool {
        let map = match kind {
            ConsoleKind::Error => &mut self.errors,
            ConsoleKind::Warning => &mut self.warnings,
        };
        if map.shift_remove(&id).is_some() {
            self.changed.insert(id);
            true
        } else {
            false
        }
    }

    /// Forget `id` entirely without reporting it
    pub fn forget(&mut self, id: ShadowId) {
        self.errors.shift_remove(&id);
        self.warnings.shift_remove(&id);
        self.changed.shift_remove(&id);
    }

    /// Mark every id with a non-zero counter as changed
    pub fn mark_all_changed(&mut self) {
        self.changed.clear();
        let ids: Vec<ShadowId> = self
            .errors
            .keys()
            .chain(self.warnings.keys())
            .copied()
            .collect();
        self.changed.extend(ids);
    }
}

fn merge_into(target: &mut MessageCounts, source: MessageCounts) {
    for (message, count) in source {
        *target.entry(message).or_insert(0) += count;
    }
}
