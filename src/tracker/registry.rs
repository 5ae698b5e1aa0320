//! Identity registry
//!
//! Hosts keep two representations of every logical node (current and
//! alternate) and swap them on each commit. The registry maps both handles
//! to the same [`ShadowId`] so the id survives whichever one is current.
//!
//! Releasing an id is two-phase: [`schedule_untrack`](IdentityRegistry::schedule_untrack)
//! parks the handles in a pending set, and [`untrack_pending`](IdentityRegistry::untrack_pending)
//! drops them once the owner's debounce timer fires. Hosts sometimes recreate a
//! node right after unmounting it (hot reload), and the window lets that
//! recreation land on the old id.

use super::id::ShadowId;
use crate::error::{InspectorError, Result};
use crate::host::{HostTree, NodeHandle};
use indexmap::IndexSet;
use std::collections::HashMap;

/// Node handle to shadow id mapping for one attachment
#[derive(Debug)]
pub struct IdentityRegistry {
    ids: HashMap<NodeHandle, ShadowId>,
    /// One of the (up to two) handles of each id
    nodes: HashMap<ShadowId, NodeHandle>,
    next_id: u32,
    pending_untrack: IndexSet<NodeHandle>,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            nodes: HashMap::new(),
            next_id: 1,
            pending_untrack: IndexSet::new(),
        }
    }

    /// Id of `node`, allocating one on first sight
    ///
    /// The id is installed for the alternate too, so next commit's current
    /// representation resolves without another allocation.
    pub fn get_or_create_id<H: HostTree + ?Sized>(&mut self, host: &H, node: NodeHandle) -> ShadowId {
        let alternate = host.alternate(node);

        let id = match self.ids.get(&node) {
            Some(&id) => id,
            None => match alternate.and_then(|a| self.ids.get(&a).copied()) {
                Some(id) => id,
                None => {
                    let id = ShadowId(self.next_id);
                    self.next_id += 1;
                    tracing::trace!("Assigned {:?} to {:?}", id, node);
                    id
                }
            },
        };

        self.ids.insert(node, id);
        if let Some(alternate) = alternate {
            self.ids.insert(alternate, id);
        }
        self.nodes.insert(id, node);
        id
    }

    /// Id of `node` or its alternate, if either was ever registered
    pub fn get_id_if_known<H: HostTree + ?Sized>(&self, host: &H, node: NodeHandle) -> Option<ShadowId> {
        self.ids.get(&node).copied().or_else(|| {
            host.alternate(node)
                .and_then(|alternate| self.ids.get(&alternate).copied())
        })
    }

    /// Like [`get_id_if_known`](Self::get_id_if_known), but a miss is an error
    pub fn get_id_or_fail<H: HostTree + ?Sized>(&self, host: &H, node: NodeHandle) -> Result<ShadowId> {
        self.get_id_if_known(host, node).ok_or_else(|| {
            InspectorError::NotFound(format!("no shadow id for {:?}", node))
        })
    }

    /// Some handle currently registered for `id`
    pub fn node_for_id(&self, id: ShadowId) -> Option<NodeHandle> {
        self.nodes.get(&id).copied()
    }

    /// Park `node` and its alternate for release at the next
    /// [`untrack_pending`](Self::untrack_pending)
    pub fn schedule_untrack<H: HostTree + ?Sized>(&mut self, host: &H, node: NodeHandle) {
        self.pending_untrack.insert(node);
        if let Some(alternate) = host.alternate(node) {
            self.pending_untrack.insert(alternate);
        }
    }

    pub fn has_pending_untracks(&self) -> bool {
        !self.pending_untrack.is_empty()
    }

    /// True if `node` is parked for release
    pub fn is_untrack_pending(&self, node: NodeHandle) -> bool {
        self.pending_untrack.contains(&node)
    }

    /// Release every parked handle, returning the ids that went away
    pub fn untrack_pending(&mut self) -> Vec<ShadowId> {
        let pending = std::mem::take(&mut self.pending_untrack);
        let mut released = Vec::new();
        for node in pending {
            if let Some(id) = self.ids.remove(&node) {
                if self.nodes.remove(&id).is_some() {
                    released.push(id);
                }
            }
        }
        if !released.is_empty() {
            tracing::trace!("Untracked {} ids", released.len());
        }
        released
    }

    /// Release `node` and its alternate right away
    pub fn untrack_now<H: HostTree + ?Sized>(&mut self, host: &H, node: NodeHandle) -> Option<ShadowId> {
        let alternate = host.alternate(node);
        let id = self.ids.remove(&node);
        let alt_id = alternate.and_then(|a| self.ids.remove(&a));
        let id = id.or(alt_id)?;
        self.pending_untrack.shift_remove(&node);
        if let Some(alternate) = alternate {
            self.pending_untrack.shift_remove(&alternate);
        }
        self.nodes.remove(&id);
        Some(id)
    }

    /// Number of handles registered (two per node once both buffers exist)
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of live ids
    pub fn id_count(&self) -> usize {
        self.nodes.len()
    }
}
