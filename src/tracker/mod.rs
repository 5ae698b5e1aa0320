//! Shadow tree tracker
//!
//! One [`Renderer`] per attached host. It mirrors the host's committed tree
//! as a tree of stable [`ShadowId`]s and turns every commit into a compact
//! operations message for the frontend.
//!
//! # Architecture
//!
//! ```text
//! host commit
//!     │
//!     ▼
//! Renderer::handle_commit_root ──► differ (mount / update / unmount walk)
//!     │                               │
//!     │                  IdentityRegistry, FilterEngine, ConsoleAggregator
//!     ▼
//! PendingBatch ──flush──► RendererEvent::Operations ──► session outbox
//! ```
//!
//! The walk never blocks and never mutates host links. Deferred work (id
//! release, error count reporting) is parked on a [`TimerQueue`] that the
//! owner drives through [`Renderer::run_due_timers`].
//!
//! Until [`Renderer::flush_initial_operations`] is called, flushed messages
//! are queued instead of emitted, so a frontend that connects late still
//! receives every commit in order.

pub mod differ;
pub mod errors;
pub mod filter;
pub mod id;
pub mod registry;

pub use errors::ConsoleAggregator;
pub use filter::{element_type_for, FilterEngine};
pub use id::ShadowId;
pub use registry::IdentityRegistry;

use crate::config::{ComponentFilter, InspectorConfig, TrackerConfig};
use crate::error::{InspectorError, Result};
use crate::host::{HostRuntime, HostTree, NodeHandle, RootHandle, TagTable};
use crate::profiling::{ProfilingData, ProfilingRecorder};
use crate::protocol::PendingBatch;
use crate::scheduler::{SharedClock, TimerQueue};
use crate::types::{ConsoleKind, ElementType, WorkTag};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Something the renderer wants delivered to the frontend
#[derive(Debug, Clone, PartialEq)]
pub enum RendererEvent {
    /// One flushed operations message
    Operations(Vec<u32>),
    /// Host nodes touched by the last commit
    TraceUpdates(Vec<ShadowId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackerTimer {
    Untrack,
    FlushErrors,
}

/// One entry of an owners list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: ShadowId,
    pub display_name: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
}

/// Tracker state for one attached host
pub struct Renderer {
    config: TrackerConfig,
    clock: SharedClock,
    has_owner_metadata: bool,
    filters: FilterEngine,
    component_filters: Vec<ComponentFilter>,
    registry: IdentityRegistry,
    batch: PendingBatch,
    console: ConsoleAggregator,
    profiler: ProfilingRecorder,
    timers: TimerQueue<TrackerTimer>,
    /// Latest tree base duration per id, snapshotted when profiling starts
    tree_base_durations: IndexMap<u32, f64>,
    id_to_root: IndexMap<u32, u32>,
    /// Root of the commit being walked
    current_root: Option<ShadowId>,
    /// Whether the frontend knew `current_root` before the walk started
    current_root_announced: bool,
    /// Roots whose ADD has been flushed and not yet removed
    announced_roots: HashSet<u32>,
    /// Roots whose last walk was aborted; remounted on their next commit
    desynced_roots: IndexSet<ShadowId>,
    /// `Some` until the frontend asks for the initial tree
    pending_operations: Option<Vec<Vec<u32>>>,
    events: Vec<RendererEvent>,
    trace_updates: bool,
    traced: IndexSet<ShadowId>,
    force_error: HashMap<ShadowId, bool>,
    force_fallback: HashSet<ShadowId>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("renderer_id", &self.config.renderer_id)
            .field("ids", &self.registry.id_count())
            .field("profiler", &self.profiler)
            .field("pending_events", &self.events.len())
            .finish()
    }
}

impl Renderer {
    /// Attach to `host`, snapshotting any roots that already have content
    pub fn attach<H: HostRuntime + ?Sized>(
        host: &H,
        config: &InspectorConfig,
        clock: SharedClock,
    ) -> Self {
        let tags = TagTable::for_version(host.version());
        let mut renderer = Self {
            filters: FilterEngine::new(tags, &config.component_filters),
            component_filters: config.component_filters.clone(),
            config: config.tracker.clone(),
            has_owner_metadata: host.has_owner_metadata(),
            registry: IdentityRegistry::new(),
            batch: PendingBatch::new(),
            console: ConsoleAggregator::new(),
            profiler: ProfilingRecorder::new(&config.profiling, clock.clone()),
            timers: TimerQueue::new(),
            clock,
            tree_base_durations: IndexMap::new(),
            id_to_root: IndexMap::new(),
            current_root: None,
            current_root_announced: false,
            announced_roots: HashSet::new(),
            desynced_roots: IndexSet::new(),
            pending_operations: Some(Vec::new()),
            events: Vec::new(),
            trace_updates: config.tracker.trace_updates,
            traced: IndexSet::new(),
            force_error: HashMap::new(),
            force_fallback: HashSet::new(),
        };

        let roots = host.roots();
        renderer.mount_roots(host, &roots);

        tracing::info!(
            "Attached renderer {} to host {} ({} roots{})",
            renderer.config.renderer_id,
            host.version(),
            roots.len(),
            if host.is_production() { ", production" } else { "" }
        );
        renderer
    }

    pub fn renderer_id(&self) -> u32 {
        self.config.renderer_id
    }

    pub fn filters(&self) -> &FilterEngine {
        &self.filters
    }

    pub fn component_filters(&self) -> &[ComponentFilter] {
        &self.component_filters
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn profiler(&self) -> &ProfilingRecorder {
        &self.profiler
    }

    pub fn profiler_mut(&mut self) -> &mut ProfilingRecorder {
        &mut self.profiler
    }

    /// Id of `node` if it is tracked
    pub fn id_of<H: HostTree + ?Sized>(&self, host: &H, node: NodeHandle) -> Option<ShadowId> {
        self.registry.get_id_if_known(host, node)
    }

    /// Last known tree base duration of `id`
    pub fn tree_base_duration(&self, id: ShadowId) -> Option<f64> {
        self.tree_base_durations.get(&id.raw()).copied()
    }

    /// Current (errors, warnings) totals of `id`
    pub fn error_and_warning_counts(&self, id: ShadowId) -> (u32, u32) {
        self.console.counts(id)
    }

    /// Take every event produced since the last call
    pub fn drain_events(&mut self) -> Vec<RendererEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Earliest pending timer deadline
    pub fn next_deadline(&self) -> Option<std::time::Duration> {
        self.timers.next_deadline()
    }

    // ==================== Commit Handling ====================

    /// Process one commit of `root`
    pub fn handle_commit_root<H: HostRuntime + ?Sized>(
        &mut self,
        host: &H,
        root: RootHandle,
        priority: Option<u32>,
    ) {
        let Some(current) = host.current(root) else {
            tracing::warn!("Commit for unknown root {:?}", root);
            return;
        };
        let alternate = host.alternate(current);

        self.untrack_pending();

        let root_id = self.registry.get_or_create_id(host, current);
        self.begin_walk(root_id);
        self.traced.clear();

        if host.timings(current).is_some() {
            let label = priority.map(|p| self.filters.tags().priority_label(p).to_string());
            self.profiler.begin_commit(label);
        }

        if self.desynced_roots.shift_remove(&root_id) {
            self.remount_desynced_root(host, current, root_id);
        } else {
            match alternate {
                Some(alternate) => {
                    let had_content = host.root_has_content(alternate);
                    let has_content = host.root_has_content(current);
                    match (had_content, has_content) {
                        (false, true) => self.mount_children(host, current, None, false, false),
                        (true, true) => {
                            self.update_node(host, current, alternate, None, false);
                        }
                        (true, false) => self.record_unmount(host, current, false),
                        (false, false) => {}
                    }
                }
                None => self.mount_children(host, current, None, false, false),
            }
        }

        if self.timers.is_scheduled(TrackerTimer::FlushErrors) {
            self.record_pending_errors(host);
        }

        let keep = !self.should_bailout();
        self.flush_pending_events(root_id.raw());
        self.current_root = None;
        self.profiler.finish_commit(root_id.raw(), keep);

        if self.trace_updates && !self.traced.is_empty() {
            let nodes = std::mem::take(&mut self.traced).into_iter().collect();
            self.events.push(RendererEvent::TraceUpdates(nodes));
        }
    }

    /// A committed node was deleted by the host
    pub fn handle_commit_unmount<H: HostTree + ?Sized>(&mut self, host: &H, node: NodeHandle) {
        if self.registry.is_untrack_pending(node) {
            return;
        }
        self.record_unmount(host, node, false);
    }

    /// Effects of the last commit of `root` finished running
    pub fn handle_post_commit_root<H: HostRuntime + ?Sized>(&mut self, host: &H, root: RootHandle) {
        if !self.profiler.is_active() {
            return;
        }
        let Some(current) = host.current(root) else {
            return;
        };
        if host.timings(current).is_none() {
            return;
        }
        if let Some(id) = self.registry.get_id_if_known(host, current) {
            let (effect, passive) = host.effect_durations(root);
            self.profiler.set_effect_durations(id.raw(), effect, passive);
        }
    }

    /// Send the full current tree, or replay everything queued before the
    /// frontend connected. Later flushes are emitted directly.
    pub fn flush_initial_operations<H: HostRuntime + ?Sized>(&mut self, host: &H) {
        match self.pending_operations.take() {
            Some(queued) if !queued.is_empty() => {
                tracing::debug!("Replaying {} queued operations messages", queued.len());
                self.events
                    .extend(queued.into_iter().map(RendererEvent::Operations));
            }
            _ => {
                let roots = host.roots();
                self.mount_roots(host, &roots);
            }
        }
    }

    /// Drop whatever the current walk recorded
    ///
    /// The frontend never sees the aborted walk, so the shadow tree of its
    /// root no longer matches what was sent. That root is removed and
    /// mounted again from scratch on its next commit.
    pub fn discard_pending(&mut self) {
        self.batch.clear();
        self.traced.clear();
        self.profiler.finish_commit(0, false);
        if let Some(root) = self.current_root.take() {
            if self.current_root_announced {
                self.announced_roots.insert(root.raw());
            } else {
                self.announced_roots.remove(&root.raw());
            }
            self.desynced_roots.insert(root);
            tracing::warn!("Walk of root {} aborted, remounting it on its next commit", root);
        }
    }

    /// Roots waiting for a remount after an aborted walk
    pub fn desynced_root_count(&self) -> usize {
        self.desynced_roots.len()
    }

    fn begin_walk(&mut self, root_id: ShadowId) {
        self.current_root = Some(root_id);
        self.current_root_announced = self.announced_roots.contains(&root_id.raw());
    }

    /// Resend `root` in full: REMOVE_ROOT if the frontend knew it, then a
    /// fresh mount of whatever it holds now
    fn remount_desynced_root<H: HostRuntime + ?Sized>(
        &mut self,
        host: &H,
        current: NodeHandle,
        root_id: ShadowId,
    ) {
        if self.announced_roots.remove(&root_id.raw()) {
            self.batch.push_remove_root();
            self.flush_pending_events(root_id.raw());
        }
        if host.root_has_content(current) {
            self.mount_children(host, current, None, false, false);
        }
    }

    fn mount_roots<H: HostRuntime + ?Sized>(&mut self, host: &H, roots: &[RootHandle]) {
        for &root in roots {
            let Some(current) = host.current(root) else {
                continue;
            };
            if !host.root_has_content(current) {
                continue;
            }
            let root_id = self.registry.get_or_create_id(host, current);
            self.begin_walk(root_id);
            self.desynced_roots.shift_remove(&root_id);
            if host.timings(current).is_some() {
                self.profiler.begin_commit(None);
            }
            self.mount_children(host, current, None, false, false);
            let keep = !self.should_bailout();
            self.flush_pending_events(root_id.raw());
            self.current_root = None;
            self.profiler.finish_commit(root_id.raw(), keep);
        }
    }

    /// True if flushing now would send nothing useful
    ///
    /// While profiling, a commit that rendered something is flushed even
    /// without tree changes so commit records line up with messages.
    fn should_bailout(&self) -> bool {
        !(self.profiler.is_active() && self.profiler.has_commit_durations())
            && self.batch.is_empty()
    }

    fn flush_pending_events(&mut self, root_id: u32) {
        if self.should_bailout() {
            return;
        }
        let operations = self.batch.flush(self.config.renderer_id, root_id);
        match self.pending_operations.as_mut() {
            Some(queue) => queue.push(operations),
            None => self.events.push(RendererEvent::Operations(operations)),
        }
    }

    // ==================== Deferred Work ====================

    /// Run every timer due at the clock's current time
    pub fn run_due_timers<H: HostRuntime + ?Sized>(&mut self, host: &H) {
        let now = self.clock.now();
        for timer in self.timers.take_due(now) {
            match timer {
                TrackerTimer::Untrack => self.untrack_pending(),
                TrackerTimer::FlushErrors => {
                    self.record_pending_errors(host);
                    self.flush_pending_events(0);
                }
            }
        }
    }

    fn untrack_pending(&mut self) {
        self.timers.cancel(TrackerTimer::Untrack);
        for id in self.registry.untrack_pending() {
            self.forget_id(id);
        }
    }

    fn schedule_untrack_timer(&mut self) {
        let deadline = self.clock.now() + self.config.untrack_delay();
        self.timers.schedule_if_idle(TrackerTimer::Untrack, deadline);
    }

    /// Drop per-id side tables of a released id
    fn forget_id(&mut self, id: ShadowId) {
        self.console.forget(id);
        self.force_error.remove(&id);
        self.force_fallback.remove(&id);
    }

    // ==================== Filters ====================

    /// Replace the filter rules and resend every root
    ///
    /// Each root is removed and remounted under the new rules. Rejected while
    /// profiling, since recorded commits refer to the old visible tree.
    pub fn update_component_filters<H: HostRuntime + ?Sized>(
        &mut self,
        host: &H,
        rules: Vec<ComponentFilter>,
    ) -> Result<()> {
        if self.profiler.is_active() {
            return Err(InspectorError::InvalidState(
                "cannot change component filters while profiling".to_string(),
            ));
        }

        let roots = host.roots();
        for &root in &roots {
            let Some(current) = host.current(root) else {
                continue;
            };
            if !host.root_has_content(current) {
                continue;
            }
            let root_id = self.registry.get_or_create_id(host, current);
            if self.announced_roots.remove(&root_id.raw()) {
                self.batch.push_remove_root();
                self.flush_pending_events(root_id.raw());
            }
        }

        self.filters.apply(&rules);
        self.component_filters = rules;
        self.mount_roots(host, &roots);

        self.console.mark_all_changed();
        self.record_pending_errors(host);
        self.flush_pending_events(0);

        tracing::info!(
            "Component filters updated ({} rules), {} roots remounted",
            self.component_filters.len(),
            roots.len()
        );
        Ok(())
    }

    // ==================== Errors & Warnings ====================

    /// Record a console message the host attributed to `node`
    ///
    /// Counts are reported after a debounce, or at the next commit if that
    /// comes first. Errors from a node whose error state is being forced are
    /// ignored.
    pub fn on_error_or_warning<H: HostTree + ?Sized>(
        &mut self,
        host: &H,
        node: NodeHandle,
        kind: ConsoleKind,
        message: &str,
    ) {
        if kind == ConsoleKind::Error {
            if let Some(id) = self.registry.get_id_if_known(host, node) {
                if self.force_error.get(&id) == Some(&true) {
                    return;
                }
            }
        }
        self.console.record(node, kind, message);
        let deadline = self.clock.now() + self.config.errors_flush_delay();
        self.timers.schedule(TrackerTimer::FlushErrors, deadline);
    }

    /// Reset every error and warning counter
    pub fn clear_errors_and_warnings<H: HostTree + ?Sized>(&mut self, host: &H) {
        self.console.clear_all();
        self.record_pending_errors(host);
        self.flush_pending_events(0);
    }

    pub fn clear_errors_for_id<H: HostTree + ?Sized>(&mut self, host: &H, id: ShadowId) {
        self.clear_console_kind(host, id, ConsoleKind::Error);
    }

    pub fn clear_warnings_for_id<H: HostTree + ?Sized>(&mut self, host: &H, id: ShadowId) {
        self.clear_console_kind(host, id, ConsoleKind::Warning);
    }

    fn clear_console_kind<H: HostTree + ?Sized>(&mut self, host: &H, id: ShadowId, kind: ConsoleKind) {
        if self.console.clear(id, kind) {
            self.record_pending_errors(host);
            self.flush_pending_events(0);
        }
    }

    /// Merge parked messages and push count updates for visible ids
    fn record_pending_errors<H: HostTree + ?Sized>(&mut self, host: &H) {
        self.timers.cancel(TrackerTimer::FlushErrors);

        for node in self.console.pending_nodes() {
            match self.registry.get_id_if_known(host, node) {
                Some(id) if !self.filters.should_filter(host, node) => {
                    self.console.merge_pending(node, id)
                }
                _ => tracing::trace!("Dropping console messages for untracked {:?}", node),
            }
        }
        self.console.discard_pending();

        for (id, errors, warnings) in self.console.take_changed() {
            let visible = self
                .registry
                .node_for_id(id)
                .map(|node| !self.filters.should_filter(host, node))
                .unwrap_or(false);
            if visible {
                self.batch
                    .push_errors_and_warnings(id.raw(), errors, warnings);
            }
        }
    }

    // ==================== Overrides ====================

    /// Force (or stop forcing) `id` into its error state and re-render it
    pub fn override_error<H: HostRuntime + ?Sized>(
        &mut self,
        host: &mut H,
        id: ShadowId,
        force: bool,
    ) -> Result<()> {
        let caps = host.capabilities();
        if !caps.error_override || !caps.schedule_update {
            return Err(InspectorError::Unsupported(
                "host cannot override error boundaries".to_string(),
            ));
        }
        let node = self.node_or_fail(id)?;
        self.force_error.insert(id, force);
        host.schedule_update(node)
    }

    /// Force (or stop forcing) the suspense boundary `id` into its fallback
    pub fn override_suspense<H: HostRuntime + ?Sized>(
        &mut self,
        host: &mut H,
        id: ShadowId,
        force: bool,
    ) -> Result<()> {
        let caps = host.capabilities();
        if !caps.suspense_override || !caps.schedule_update {
            return Err(InspectorError::Unsupported(
                "host cannot override suspense boundaries".to_string(),
            ));
        }
        let node = self.node_or_fail(id)?;
        if force {
            self.force_fallback.insert(id);
        } else {
            self.force_fallback.remove(&id);
        }
        host.schedule_update(node)
    }

    /// Host query: should `node` render as errored?
    ///
    /// `None` means no override. A `false` override is consumed by the query.
    pub fn should_error<H: HostTree + ?Sized>(&mut self, host: &H, node: NodeHandle) -> Option<bool> {
        let id = self.registry.get_id_if_known(host, node)?;
        let status = *self.force_error.get(&id)?;
        if !status {
            self.force_error.remove(&id);
        }
        Some(status)
    }

    /// Host query: should `node` show its fallback?
    pub fn should_suspend<H: HostTree + ?Sized>(&self, host: &H, node: NodeHandle) -> bool {
        self.registry
            .get_id_if_known(host, node)
            .map(|id| self.force_fallback.contains(&id))
            .unwrap_or(false)
    }

    fn node_or_fail(&self, id: ShadowId) -> Result<NodeHandle> {
        self.registry
            .node_for_id(id)
            .ok_or_else(|| InspectorError::NotFound(format!("no node with id {}", id)))
    }

    // ==================== Owners ====================

    /// Owner chain of `id`, outermost first, ending with `id` itself
    pub fn owners_list<H: HostTree + ?Sized>(&mut self, host: &H, id: ShadowId) -> Result<Vec<Owner>> {
        let node = self.node_or_fail(id)?;
        let mut owners = vec![self.owner_entry(host, id, node)];
        let mut seen = HashSet::from([id]);

        let mut owner = host.debug_owner(node);
        while let Some(node) = owner {
            let owner_id = self.registry.get_or_create_id(host, node);
            if !seen.insert(owner_id) {
                break;
            }
            owners.push(self.owner_entry(host, owner_id, node));
            owner = host.debug_owner(node);
        }

        owners.reverse();
        Ok(owners)
    }

    fn owner_entry<H: HostTree + ?Sized>(&self, host: &H, id: ShadowId, node: NodeHandle) -> Owner {
        Owner {
            id,
            display_name: self
                .filters
                .display_name(host, node)
                .unwrap_or_else(|| "Anonymous".to_string()),
            element_type: self.filters.classify(host, node),
        }
    }

    // ==================== Profiling ====================

    /// Start recording commits. Returns false if already recording.
    pub fn start_profiling<H: HostRuntime + ?Sized>(
        &mut self,
        host: &H,
        record_change_descriptions: bool,
    ) -> bool {
        let mut root_names = IndexMap::new();
        for root in host.roots() {
            if let Some(current) = host.current(root) {
                let id = self.registry.get_or_create_id(host, current);
                root_names.insert(id.raw(), self.root_display_name(host, current));
            }
        }
        self.profiler.start(
            record_change_descriptions,
            &self.tree_base_durations,
            &self.id_to_root,
            root_names,
            host.lane_labels(),
        )
    }

    pub fn stop_profiling(&mut self) {
        self.profiler.stop();
    }

    pub fn is_profiling(&self) -> bool {
        self.profiler.is_active()
    }

    pub fn profiling_data(&self) -> Result<ProfilingData> {
        self.profiler.profiling_data(self.config.renderer_id)
    }

    /// Name shown for a root: the first component found a few levels down
    fn root_display_name<H: HostTree + ?Sized>(&self, host: &H, root: NodeHandle) -> String {
        let mut fallback = None;
        let mut child = host.child(root);

        for _ in 0..3 {
            let Some(node) = child else {
                break;
            };
            if let Some(name) = self.filters.display_name(host, node) {
                let is_component = matches!(
                    self.filters.work_tag(host, node),
                    WorkTag::ClassComponent
                        | WorkTag::IncompleteClassComponent
                        | WorkTag::FunctionComponent
                        | WorkTag::IndeterminateComponent
                );
                if is_component {
                    return name;
                }
                fallback.get_or_insert(name);
            }
            child = host.child(node);
        }

        fallback.unwrap_or_else(|| "Anonymous".to_string())
    }

    // ==================== Trace Updates ====================

    pub fn set_trace_updates_enabled(&mut self, enabled: bool) {
        self.trace_updates = enabled;
        if !enabled {
            self.traced.clear();
        }
    }

    pub fn is_trace_updates_enabled(&self) -> bool {
        self.trace_updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ArenaHost, Element, HostCapabilities};
    use crate::protocol::{decode_operations, DecodedOperations, TreeOperation};
    use crate::scheduler::ManualClock;
    use std::rc::Rc;
    use std::time::Duration;

    struct Fixture {
        host: ArenaHost,
        root: RootHandle,
        clock: ManualClock,
        renderer: Renderer,
    }

    fn fixture_with(host: ArenaHost, config: InspectorConfig) -> Fixture {
        let mut host = host;
        let root = host.create_root();
        let clock = ManualClock::new();
        let mut renderer = Renderer::attach(&host, &config, Rc::new(clock.clone()));
        renderer.flush_initial_operations(&host);
        assert!(renderer.drain_events().is_empty());
        Fixture {
            host,
            root,
            clock,
            renderer,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ArenaHost::new("18.2.0"), InspectorConfig::default())
    }

    fn operations(events: Vec<RendererEvent>) -> Vec<DecodedOperations> {
        events
            .into_iter()
            .filter_map(|e| match e {
                RendererEvent::Operations(ops) => Some(decode_operations(&ops).unwrap()),
                RendererEvent::TraceUpdates(_) => None,
            })
            .collect()
    }

    fn commit(f: &mut Fixture, element: Option<Element>) -> Vec<DecodedOperations> {
        let report = f.host.render(f.root, element).unwrap();
        for node in report.deletions {
            f.renderer.handle_commit_unmount(&f.host, node);
        }
        f.renderer
            .handle_commit_root(&f.host, f.root, Some(report.priority));
        operations(f.renderer.drain_events())
    }

    fn app(body_props: u64) -> Element {
        Element::function("App").child(
            Element::host("div")
                .child(Element::function("Header"))
                .child(Element::function("Body").props(body_props)),
        )
    }

    fn id(f: &Fixture, name: &str) -> ShadowId {
        let node = f.host.find_by_name(f.root, name).unwrap();
        f.renderer.id_of(&f.host, node).unwrap()
    }

    #[test]
    fn test_first_commit_adds_visible_nodes() {
        let mut f = fixture();
        let messages = commit(&mut f, Some(app(0)));
        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg.renderer_id, 1);
        assert_eq!(msg.root_id, 1);

        assert!(matches!(
            msg.operations[0],
            TreeOperation::AddRoot {
                id: 1,
                is_strict: false,
                profiling_flags: 3,
                supports_strict_mode: true,
                has_owner_metadata: true,
            }
        ));
        let app_id = id(&f, "App").raw();
        let header = id(&f, "Header").raw();
        assert_eq!(
            msg.operations[2],
            TreeOperation::Add {
                id: header,
                element_type: ElementType::Function,
                parent_id: app_id,
                owner_id: app_id,
                display_name: Some("Header".to_string()),
                key: None,
            }
        );
        // div is hidden by the default filters
        assert_eq!(msg.added_ids().len(), 4);
    }

    #[test]
    fn test_unchanged_commit_is_silent() {
        let mut f = fixture();
        commit(&mut f, Some(app(0)));
        assert!(commit(&mut f, Some(app(0))).is_empty());
        assert!(commit(&mut f, Some(app(1))).is_empty());
    }

    #[test]
    fn test_removed_child_resets_parent() {
        let mut f = fixture();
        commit(&mut f, Some(app(0)));
        let app_id = id(&f, "App").raw();
        let header = id(&f, "Header").raw();
        let body = id(&f, "Body").raw();

        let messages = commit(
            &mut f,
            Some(Element::function("App").child(Element::host("div").child(Element::function("Header")))),
        );
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].removed_ids(), vec![body]);
        assert!(messages[0].operations.contains(&TreeOperation::ReorderChildren {
            id: app_id,
            children: vec![header],
        }));
    }

    #[test]
    fn test_keyed_reorder() {
        let mut f = fixture();
        let list = |keys: &[&str]| {
            Element::function("List")
                .children(keys.iter().map(|k| Element::function("Item").key(*k)))
        };
        commit(&mut f, Some(list(&["a", "b"])));
        let a = f.renderer.id_of(&f.host, f.host.find_by_key(f.root, "a").unwrap()).unwrap();
        let b = f.renderer.id_of(&f.host, f.host.find_by_key(f.root, "b").unwrap()).unwrap();
        let list_id = id(&f, "List").raw();

        let messages = commit(&mut f, Some(list(&["b", "a"])));
        assert_eq!(
            messages[0].operations,
            vec![TreeOperation::ReorderChildren {
                id: list_id,
                children: vec![b.raw(), a.raw()],
            }]
        );
    }

    #[test]
    fn test_root_unmount() {
        let mut f = fixture();
        commit(&mut f, Some(app(0)));
        let messages = commit(&mut f, None);
        assert_eq!(messages.len(), 1);
        let removed = messages[0].removed_ids();
        // Children first, the root last
        assert_eq!(removed.len(), 4);
        assert_eq!(removed.last(), Some(&1));
    }

    #[test]
    fn test_strict_subtree_mode() {
        let mut f = fixture();
        let messages = commit(
            &mut f,
            Some(Element::strict_mode().child(Element::function("App").child(Element::function("Leaf")))),
        );
        let app_id = id(&f, "App").raw();
        let modes: Vec<_> = messages[0]
            .operations
            .iter()
            .filter(|op| matches!(op, TreeOperation::SetSubtreeMode { .. }))
            .collect();
        assert_eq!(modes, vec![&TreeOperation::SetSubtreeMode { id: app_id, mode: 1 }]);
    }

    #[test]
    fn test_queued_until_initial_flush() {
        let mut host = ArenaHost::new("18.2.0");
        let root = host.create_root();
        let clock = ManualClock::new();
        let mut renderer = Renderer::attach(&host, &InspectorConfig::default(), Rc::new(clock));

        host.render(root, Some(app(0))).unwrap();
        renderer.handle_commit_root(&host, root, None);
        assert!(!renderer.has_events());

        renderer.flush_initial_operations(&host);
        let messages = operations(renderer.drain_events());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].added_ids().len(), 4);
    }

    #[test]
    fn test_attach_snapshots_live_roots() {
        let mut host = ArenaHost::new("18.2.0");
        let root = host.create_root();
        host.render(root, Some(app(0))).unwrap();

        let mut renderer =
            Renderer::attach(&host, &InspectorConfig::default(), Rc::new(ManualClock::new()));
        renderer.flush_initial_operations(&host);
        let messages = operations(renderer.drain_events());
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0].operations[0], TreeOperation::AddRoot { .. }));
    }

    #[test]
    fn test_filter_update_remounts_roots() {
        let mut f = fixture();
        commit(&mut f, Some(app(0)));
        f.renderer.update_component_filters(&f.host, Vec::new()).unwrap();

        let messages = operations(f.renderer.drain_events());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].operations, vec![TreeOperation::RemoveRoot]);
        // div is visible now
        assert_eq!(messages[1].added_ids().len(), 5);
        assert!(f.renderer.component_filters().is_empty());
    }

    #[test]
    fn test_filter_update_rejected_while_profiling() {
        let mut f = fixture();
        commit(&mut f, Some(app(0)));
        assert!(f.renderer.start_profiling(&f.host, false));
        f.renderer.drain_events();
        let filters_before = f.renderer.component_filters().to_vec();
        let commits_before = f.renderer.profiler().commits(1).len();

        let err = f
            .renderer
            .update_component_filters(&f.host, Vec::new())
            .unwrap_err();
        assert!(matches!(err, InspectorError::InvalidState(_)));

        // Nothing was sent and nothing changed
        assert!(!f.renderer.has_events());
        assert_eq!(f.renderer.component_filters(), filters_before.as_slice());
        let div = f.host.find_by_name(f.root, "div").unwrap();
        assert!(f.renderer.filters().should_filter(&f.host, div));
        assert!(f.renderer.profiler().is_active());
        assert_eq!(f.renderer.profiler().commits(1).len(), commits_before);
    }

    #[test]
    fn test_errors_reported_after_debounce() {
        let mut f = fixture();
        commit(&mut f, Some(app(0)));
        let body_node = f.host.find_by_name(f.root, "Body").unwrap();
        let body = id(&f, "Body");

        f.renderer
            .on_error_or_warning(&f.host, body_node, ConsoleKind::Error, "boom");
        f.renderer
            .on_error_or_warning(&f.host, body_node, ConsoleKind::Error, "boom");
        f.renderer
            .on_error_or_warning(&f.host, body_node, ConsoleKind::Warning, "careful");

        f.renderer.run_due_timers(&f.host);
        assert!(!f.renderer.has_events());

        f.clock.advance(Duration::from_secs(1));
        f.renderer.run_due_timers(&f.host);
        let messages = operations(f.renderer.drain_events());
        assert_eq!(messages[0].root_id, 0);
        assert_eq!(
            messages[0].operations,
            vec![TreeOperation::UpdateErrorsOrWarnings {
                id: body.raw(),
                errors: 2,
                warnings: 1,
            }]
        );
        assert_eq!(f.renderer.error_and_warning_counts(body), (2, 1));

        f.renderer.clear_errors_for_id(&f.host, body);
        let messages = operations(f.renderer.drain_events());
        assert_eq!(
            messages[0].operations,
            vec![TreeOperation::UpdateErrorsOrWarnings {
                id: body.raw(),
                errors: 0,
                warnings: 1,
            }]
        );
    }

    #[test]
    fn test_unmount_outside_commit_untracks_after_delay() {
        let mut f = fixture();
        commit(&mut f, Some(app(0)));
        let body_node = f.host.find_by_name(f.root, "Body").unwrap();

        f.renderer.handle_commit_unmount(&f.host, body_node);
        assert!(f.renderer.id_of(&f.host, body_node).is_some());
        assert_eq!(f.renderer.next_deadline(), Some(Duration::from_secs(1)));

        f.clock.advance(Duration::from_secs(1));
        f.renderer.run_due_timers(&f.host);
        assert!(f.renderer.id_of(&f.host, body_node).is_none());
    }

    #[test]
    fn test_suspense_fallback_round_trip() {
        let mut f = fixture();
        let boundary = |suspended| {
            Element::suspense()
                .suspended(suspended)
                .child(Element::function("Content"))
                .fallback([Element::function("Spinner")])
        };
        commit(&mut f, Some(boundary(false)));
        let content = id(&f, "Content");

        let messages = commit(&mut f, Some(boundary(true)));
        assert_eq!(messages[0].removed_ids(), vec![content.raw()]);
        let spinner = id(&f, "Spinner");
        assert!(messages[0].added_ids().contains(&spinner.raw()));

        let messages = commit(&mut f, Some(boundary(false)));
        assert_eq!(messages[0].removed_ids(), vec![spinner.raw()]);
        let content_again = id(&f, "Content");
        assert_ne!(content_again, content);
        assert!(messages[0].added_ids().contains(&content_again.raw()));
    }

    #[test]
    fn test_owners_list() {
        let mut f = fixture();
        commit(&mut f, Some(app(0)));
        let header = id(&f, "Header");
        let owners = f.renderer.owners_list(&f.host, header).unwrap();
        let names: Vec<_> = owners.iter().map(|o| o.display_name.as_str()).collect();
        assert_eq!(names, vec!["App", "Header"]);
        assert_eq!(owners[1].id, header);

        assert!(f.renderer.owners_list(&f.host, ShadowId(999)).is_err());
    }

    #[test]
    fn test_error_override() {
        let mut f = fixture();
        commit(&mut f, Some(app(0)));
        let body_node = f.host.find_by_name(f.root, "Body").unwrap();
        let body = id(&f, "Body");

        f.renderer.override_error(&mut f.host, body, true).unwrap();
        assert_eq!(f.host.scheduled_updates().len(), 1);
        assert_eq!(f.renderer.should_error(&f.host, body_node), Some(true));

        // Forced errors are not counted
        f.renderer
            .on_error_or_warning(&f.host, body_node, ConsoleKind::Error, "boom");
        assert!(f.renderer.next_deadline().is_none());

        f.renderer.override_error(&mut f.host, body, false).unwrap();
        assert_eq!(f.renderer.should_error(&f.host, body_node), Some(false));
        assert_eq!(f.renderer.should_error(&f.host, body_node), None);
    }

    #[test]
    fn test_overrides_need_capabilities() {
        let mut f = fixture_with(
            ArenaHost::new("18.2.0").with_capabilities(HostCapabilities {
                profiling_hooks: true,
                ..HostCapabilities::default()
            }),
            InspectorConfig::default(),
        );
        commit(&mut f, Some(app(0)));
        let body = id(&f, "Body");
        let err = f.renderer.override_suspense(&mut f.host, body, true).unwrap_err();
        assert!(matches!(err, InspectorError::Unsupported(_)));
        let body_node = f.host.find_by_name(f.root, "Body").unwrap();
        assert!(!f.renderer.should_suspend(&f.host, body_node));
    }

    #[test]
    fn test_profiling_records_rendered_nodes() {
        let mut f = fixture();
        commit(&mut f, Some(app(0)));
        assert!(f.renderer.start_profiling(&f.host, true));
        assert!(!f.renderer.start_profiling(&f.host, true));

        f.clock.advance(Duration::from_millis(5));
        let messages = commit(&mut f, Some(app(1)));
        assert_eq!(messages.len(), 1);
        f.renderer.stop_profiling();

        let data = f.renderer.profiling_data().unwrap();
        assert_eq!(data.commit_count(), 1);
        let root = data.root(1).unwrap();
        assert_eq!(root.display_name, "App");
        let commit = &root.commit_data[0];
        assert_eq!(commit.priority_level.as_deref(), Some("Normal"));
        let body = id(&f, "Body").raw();
        assert!(commit.fiber_actual_durations.iter().any(|(i, _)| *i == body));
        let descriptions = commit.change_descriptions.as_ref().unwrap();
        assert!(descriptions.iter().any(|(i, d)| *i == body && !d.is_first_mount));
    }

    #[test]
    fn test_trace_updates() {
        let mut config = InspectorConfig::default();
        config.tracker.trace_updates = true;
        let mut f = fixture_with(ArenaHost::new("18.2.0"), config);
        f.host.render(f.root, Some(app(0))).unwrap();
        f.renderer.handle_commit_root(&f.host, f.root, None);
        f.renderer.drain_events();

        f.host.render(f.root, Some(app(1))).unwrap();
        f.renderer.handle_commit_root(&f.host, f.root, None);
        let div = id(&f, "div");
        let traces: Vec<_> = f
            .renderer
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                RendererEvent::TraceUpdates(nodes) => Some(nodes),
                RendererEvent::Operations(_) => None,
            })
            .collect();
        assert_eq!(traces, vec![vec![div]]);
    }
}
