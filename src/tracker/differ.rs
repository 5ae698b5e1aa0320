//! Mount, update and unmount walks
//!
//! The differ compares a committed node with its previous representation and
//! records the visible consequences into the pending batch. Filtered nodes
//! get ids but no ADD; their visible descendants attach to the nearest
//! visible ancestor instead.
//!
//! Suspense boundaries need special handling: while a boundary shows its
//! fallback, the hidden primary content stays in the host tree but is
//! reported to the frontend as unmounted (a "simulated" unmount).

use super::{Renderer, ShadowId};
use crate::error::{Result, ResultExt};
use crate::host::{HostTree, NodeHandle};
use crate::profiling::ChangeDescription;
use crate::protocol::{PROFILING_FLAG_BASIC_SUPPORT, PROFILING_FLAG_TIMELINE_SUPPORT, STRICT_MODE};
use crate::types::{ElementType, WorkTag};

impl Renderer {
    /// Mount `first` (and its siblings if `traverse_siblings`) recursively
    ///
    /// The layout wrapper of a suspense boundary (offscreen wrapper or
    /// fallback fragment) is stepped over rather than walked, but still gets
    /// an id like every other visited node.
    pub(super) fn mount_children<H: HostTree + ?Sized>(
        &mut self,
        host: &H,
        first: NodeHandle,
        parent: Option<NodeHandle>,
        traverse_siblings: bool,
        mut trace: bool,
    ) {
        let mut next = Some(first);
        while let Some(node) = next {
            let id = self.registry.get_or_create_id(host, node);
            let visible = !self.filters.should_filter(host, node);
            if visible {
                if let Err(e) = self.record_mount(host, id, node, parent) {
                    tracing::warn!("Failed to record mount of {:?}: {}", node, e);
                }
            }

            if trace
                && self.trace_updates
                && self.filters.classify(host, node) == ElementType::HostComponent
            {
                self.traced.insert(id);
                trace = false;
            }

            let child_parent = if visible { Some(node) } else { parent };
            let first_child = if self.is_suspense(host, node) {
                let layout = self.filters.tags().fallback_layout();
                let (wrapper, first) = if host.is_showing_fallback(node) {
                    (
                        layout.fallback_fragment(host, node),
                        layout.fallback_children(host, node),
                    )
                } else {
                    (
                        layout.primary_wrapper(host, node),
                        layout.primary_children(host, node),
                    )
                };
                if let Some(wrapper) = wrapper {
                    self.registry.get_or_create_id(host, wrapper);
                }
                first
            } else {
                host.child(node)
            };
            if let Some(child) = first_child {
                self.mount_children(host, child, child_parent, true, trace);
            }

            next = if traverse_siblings { host.sibling(node) } else { None };
        }
    }

    fn record_mount<H: HostTree + ?Sized>(
        &mut self,
        host: &H,
        id: ShadowId,
        node: NodeHandle,
        parent: Option<NodeHandle>,
    ) -> Result<()> {
        let timings = host.timings(node);
        let strict_bits = self.filters.tags().strict_mode_bits();
        let is_strict = |n: NodeHandle| host.mode(n) & strict_bits != 0;

        if self.filters.work_tag(host, node) == WorkTag::HostRoot {
            let profiling_flags = if timings.is_some() {
                PROFILING_FLAG_BASIC_SUPPORT | PROFILING_FLAG_TIMELINE_SUPPORT
            } else {
                0
            };
            self.announced_roots.insert(id.raw());
            self.batch.push_add_root(
                id.raw(),
                is_strict(node),
                profiling_flags,
                strict_bits != 0,
                self.has_owner_metadata,
            );
            if self.profiler.is_active() {
                let name = self.root_display_name(host, node);
                self.profiler.record_root_display_name(id.raw(), name);
            }
        } else {
            let parent_id = match parent {
                Some(p) => self
                    .registry
                    .get_id_or_fail(host, p)
                    .with_context(|| format!("parent of {:?}", node))?
                    .raw(),
                None => 0,
            };
            let owner_id = host
                .debug_owner(node)
                .map(|owner| self.registry.get_or_create_id(host, owner).raw())
                .unwrap_or(0);
            let name = self.filters.display_name(host, node);
            let key = host.key(node);

            self.batch.push_add(
                id.raw(),
                self.filters.classify(host, node),
                parent_id,
                owner_id,
                name.as_deref(),
                key.as_deref(),
            );

            if is_strict(node) && !parent.map(is_strict).unwrap_or(false) {
                self.batch.push_subtree_mode(id.raw(), STRICT_MODE);
            }
        }

        if timings.is_some() {
            if let Some(root) = self.current_root {
                self.id_to_root.insert(id.raw(), root.raw());
            }
            self.record_profiling_durations(host, id, node);
        }
        Ok(())
    }

    /// Diff `next` against its previous representation `prev`
    ///
    /// Returns true if `next` is filtered and its parent must rebuild its
    /// visible children list.
    pub(super) fn update_node<H: HostTree + ?Sized>(
        &mut self,
        host: &H,
        next: NodeHandle,
        prev: NodeHandle,
        parent: Option<NodeHandle>,
        mut trace: bool,
    ) -> bool {
        let id = self.registry.get_or_create_id(host, next);

        if self.trace_updates {
            let element_type = self.filters.classify(host, next);
            if trace {
                if element_type == ElementType::HostComponent {
                    self.traced.insert(id);
                    trace = false;
                }
            } else if matches!(
                element_type,
                ElementType::Function
                    | ElementType::Class
                    | ElementType::Context
                    | ElementType::Memo
                    | ElementType::ForwardRef
            ) {
                trace = self.did_render(host, prev, next);
            }
        }

        let visible = !self.filters.should_filter(host, next);
        let child_parent = if visible { Some(next) } else { parent };
        let layout = self.filters.tags().fallback_layout();
        let is_suspense = self.is_suspense(host, next);
        let prev_timed_out = is_suspense && host.is_showing_fallback(prev);
        let next_timed_out = is_suspense && host.is_showing_fallback(next);
        let mut reset = false;

        if prev_timed_out && next_timed_out {
            // Fallback to fallback: only the fallback fragment can change
            let prev_fallback = layout.fallback_fragment(host, prev);
            let next_fallback = layout.fallback_fragment(host, next);
            match (prev_fallback, next_fallback) {
                (None, Some(n)) => {
                    self.mount_children(host, n, child_parent, true, trace);
                    reset = true;
                }
                (Some(p), Some(n)) => {
                    if self.update_node(host, n, p, child_parent, trace) {
                        reset = true;
                    }
                }
                _ => {}
            }
        } else if prev_timed_out && !next_timed_out {
            // Fallback to content: the hidden content was reported unmounted
            if let Some(primary) = host.child(next) {
                self.mount_children(host, primary, child_parent, true, trace);
            }
            reset = true;
        } else if !prev_timed_out && next_timed_out {
            // Content to fallback
            self.unmount_children(host, prev);
            if let Some(fallback) = layout.fallback_fragment(host, next) {
                self.mount_children(host, fallback, child_parent, true, trace);
                reset = true;
            }
        } else if host.child(next) != host.child(prev) {
            let mut next_child = host.child(next);
            let mut prev_at_index = host.child(prev);
            while let Some(child) = next_child {
                match host.alternate(child) {
                    Some(prev_child) => {
                        if self.update_node(host, child, prev_child, child_parent, trace) {
                            reset = true;
                        }
                        if prev_at_index != Some(prev_child) {
                            reset = true;
                        }
                    }
                    None => {
                        self.mount_children(host, child, child_parent, false, trace);
                        reset = true;
                    }
                }
                next_child = host.sibling(child);
                if !reset {
                    prev_at_index = prev_at_index.and_then(|p| host.sibling(p));
                }
            }
            if prev_at_index.is_some() {
                reset = true;
            }
        } else if trace && self.trace_updates {
            self.trace_host_descendants(host, next);
        }

        if visible {
            self.record_profiling_durations(host, id, next);
        }

        if !reset {
            return false;
        }
        if !visible {
            return true;
        }

        let child_set = if next_timed_out {
            layout.fallback_fragment(host, next)
        } else {
            host.child(next)
        };
        if let Some(first) = child_set {
            self.record_reset_children(host, id, first);
        }
        false
    }

    /// Report the descendants of `node` as unmounted without untracking the
    /// host nodes' future representations
    fn unmount_children<H: HostTree + ?Sized>(&mut self, host: &H, node: NodeHandle) {
        let (fragment, first) = if self.is_suspense(host, node) && host.is_showing_fallback(node) {
            let layout = self.filters.tags().fallback_layout();
            (
                layout.fallback_fragment(host, node),
                layout.fallback_children(host, node),
            )
        } else {
            (None, host.child(node))
        };

        let mut child = first;
        while let Some(c) = child {
            if host.parent(c).is_some() {
                self.unmount_children(host, c);
                self.record_unmount(host, c, true);
            }
            child = host.sibling(c);
        }
        if let Some(fragment) = fragment {
            self.record_unmount(host, fragment, true);
        }
    }

    /// Record the removal of one node
    pub(super) fn record_unmount<H: HostTree + ?Sized>(
        &mut self,
        host: &H,
        node: NodeHandle,
        simulated: bool,
    ) {
        let Some(id) = self.registry.get_id_if_known(host, node) else {
            return;
        };

        if self.filters.work_tag(host, node) == WorkTag::HostRoot {
            self.batch.set_unmounted_root(id.raw());
            self.announced_roots.remove(&id.raw());
        } else if !self.filters.should_filter(host, node) {
            if simulated {
                self.batch.push_simulated_unmount(id.raw());
            } else {
                self.batch.push_real_unmount(id.raw());
            }
        }

        if host.needs_remount(node) {
            return;
        }

        if simulated {
            if let Some(released) = self.registry.untrack_now(host, node) {
                self.forget_id(released);
            }
        } else {
            self.registry.schedule_untrack(host, node);
            self.schedule_untrack_timer();
        }
        self.tree_base_durations.shift_remove(&id.raw());
        self.id_to_root.shift_remove(&id.raw());
    }

    /// Emit the visible children of `id`, starting from host child `first`
    fn record_reset_children<H: HostTree + ?Sized>(&mut self, host: &H, id: ShadowId, first: NodeHandle) {
        let mut children = Vec::new();
        let mut child = Some(first);
        while let Some(c) = child {
            self.collect_visible_children(host, c, &mut children);
            child = host.sibling(c);
        }
        if !children.is_empty() {
            self.batch.push_reorder_children(id.raw(), &children);
        }
    }

    fn collect_visible_children<H: HostTree + ?Sized>(
        &self,
        host: &H,
        node: NodeHandle,
        out: &mut Vec<u32>,
    ) {
        if !self.filters.should_filter(host, node) {
            match self.registry.get_id_if_known(host, node) {
                Some(id) => out.push(id.raw()),
                None => tracing::warn!("Visible child {:?} has no id", node),
            }
            return;
        }

        let mut child = host.child(node);
        if self.is_suspense(host, node) && host.is_showing_fallback(node) {
            if let Some(fallback) = self
                .filters
                .tags()
                .fallback_layout()
                .fallback_children(host, node)
            {
                child = Some(fallback);
            }
        }
        while let Some(c) = child {
            self.collect_visible_children(host, c, out);
            child = host.sibling(c);
        }
    }

    fn record_profiling_durations<H: HostTree + ?Sized>(&mut self, host: &H, id: ShadowId, node: NodeHandle) {
        let Some(timings) = host.timings(node) else {
            return;
        };
        self.tree_base_durations
            .insert(id.raw(), timings.tree_base_duration);

        if !self.profiler.is_active() {
            return;
        }

        let alternate = host.alternate(node);
        let prev_tree_base = alternate
            .and_then(|a| host.timings(a))
            .map(|t| t.tree_base_duration);
        if prev_tree_base != Some(timings.tree_base_duration) {
            self.batch
                .push_tree_base_duration(id.raw(), timings.tree_base_duration);
        }

        let rendered = match alternate {
            Some(prev) => self.did_render(host, prev, node),
            None => true,
        };
        if !rendered {
            return;
        }

        let mut children_actual = 0.0;
        let mut child = host.child(node);
        while let Some(c) = child {
            children_actual += host.timings(c).map_or(0.0, |t| t.actual_duration);
            child = host.sibling(c);
        }
        self.profiler.record_durations(
            id.raw(),
            timings.actual_duration,
            timings.actual_duration - children_actual,
        );

        if self.profiler.records_change_descriptions() {
            if let Some(description) = self.change_description(host, alternate, node) {
                self.profiler.record_change_description(id.raw(), description);
            }
        }
    }

    /// True if `next` rendered in the last pass rather than bailing out
    fn did_render<H: HostTree + ?Sized>(&self, host: &H, prev: NodeHandle, next: NodeHandle) -> bool {
        if self.filters.work_tag(host, next).reports_performed_work() {
            return host.performed_work(next);
        }
        host.memoized_props(prev) != host.memoized_props(next)
            || host.memoized_state(prev) != host.memoized_state(next)
            || host.ref_payload(prev) != host.ref_payload(next)
    }

    fn change_description<H: HostTree + ?Sized>(
        &self,
        host: &H,
        prev: Option<NodeHandle>,
        next: NodeHandle,
    ) -> Option<ChangeDescription> {
        if !matches!(
            self.filters.classify(host, next),
            ElementType::Class | ElementType::Function | ElementType::Memo | ElementType::ForwardRef
        ) {
            return None;
        }
        let Some(prev) = prev else {
            return Some(ChangeDescription::first_mount());
        };

        let hooks = host.changed_hooks(prev, next);
        Some(ChangeDescription {
            is_first_mount: false,
            props: Some(host.changed_prop_keys(prev, next)),
            state: Some(host.changed_state_keys(prev, next)),
            did_hooks_change: hooks.as_ref().map_or(false, |h| !h.is_empty()),
            hooks,
        })
    }

    /// Trace the nearest host components below a node that re-rendered
    /// without reconciling its children
    fn trace_host_descendants<H: HostTree + ?Sized>(&mut self, host: &H, node: NodeHandle) {
        let mut stack: Vec<NodeHandle> = Vec::new();
        let mut child = host.child(node);
        while let Some(c) = child {
            stack.push(c);
            child = host.sibling(c);
        }

        while let Some(n) = stack.pop() {
            if self.filters.classify(host, n) == ElementType::HostComponent {
                if let Some(id) = self.registry.get_id_if_known(host, n) {
                    self.traced.insert(id);
                }
                continue;
            }
            let mut child = host.child(n);
            while let Some(c) = child {
                stack.push(c);
                child = host.sibling(c);
            }
        }
    }

    #[inline]
    fn is_suspense<H: HostTree + ?Sized>(&self, host: &H, node: NodeHandle) -> bool {
        self.filters.work_tag(host, node) == WorkTag::SuspenseComponent
    }
}
