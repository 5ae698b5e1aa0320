//! A host wrapper whose tree navigation can be made to panic

use std::cell::Cell;
use treelens::host::{ArenaHost, HostCapabilities, NodeTimings, PayloadRef};
use treelens::{HostRuntime, HostTree, NodeHandle, Result, RootHandle};

/// Delegates to an [`ArenaHost`]; `child()` panics while armed
pub struct FlakyHost {
    pub inner: ArenaHost,
    armed: Cell<bool>,
}

impl FlakyHost {
    pub fn new(inner: ArenaHost) -> Self {
        Self {
            inner,
            armed: Cell::new(false),
        }
    }

    pub fn arm(&self, armed: bool) {
        self.armed.set(armed);
    }
}

impl HostTree for FlakyHost {
    fn tag(&self, node: NodeHandle) -> u32 {
        self.inner.tag(node)
    }

    fn alternate(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.inner.alternate(node)
    }

    fn child(&self, node: NodeHandle) -> Option<NodeHandle> {
        if self.armed.get() {
            panic!("host tree is corrupt");
        }
        self.inner.child(node)
    }

    fn sibling(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.inner.sibling(node)
    }

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.inner.parent(node)
    }

    fn key(&self, node: NodeHandle) -> Option<String> {
        self.inner.key(node)
    }

    fn type_name(&self, node: NodeHandle) -> Option<String> {
        self.inner.type_name(node)
    }

    fn display_name_override(&self, node: NodeHandle) -> Option<String> {
        self.inner.display_name_override(node)
    }

    fn mode(&self, node: NodeHandle) -> u32 {
        self.inner.mode(node)
    }

    fn is_showing_fallback(&self, node: NodeHandle) -> bool {
        self.inner.is_showing_fallback(node)
    }

    fn root_has_content(&self, node: NodeHandle) -> bool {
        self.inner.root_has_content(node)
    }

    fn memoized_props(&self, node: NodeHandle) -> PayloadRef {
        self.inner.memoized_props(node)
    }

    fn memoized_state(&self, node: NodeHandle) -> PayloadRef {
        self.inner.memoized_state(node)
    }

    fn ref_payload(&self, node: NodeHandle) -> PayloadRef {
        self.inner.ref_payload(node)
    }

    fn performed_work(&self, node: NodeHandle) -> bool {
        self.inner.performed_work(node)
    }

    fn timings(&self, node: NodeHandle) -> Option<NodeTimings> {
        self.inner.timings(node)
    }

    fn debug_owner(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.inner.debug_owner(node)
    }
}

impl HostRuntime for FlakyHost {
    fn version(&self) -> &str {
        self.inner.version()
    }

    fn roots(&self) -> Vec<RootHandle> {
        self.inner.roots()
    }

    fn current(&self, root: RootHandle) -> Option<NodeHandle> {
        self.inner.current(root)
    }

    fn has_owner_metadata(&self) -> bool {
        self.inner.has_owner_metadata()
    }

    fn capabilities(&self) -> HostCapabilities {
        self.inner.capabilities()
    }

    fn schedule_update(&mut self, node: NodeHandle) -> Result<()> {
        self.inner.schedule_update(node)
    }
}
