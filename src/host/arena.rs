//! In-memory double-buffered render tree
//!
//! `ArenaHost` is a small reference host: it reconciles an [`Element`]
//! description against the committed tree the way an incremental renderer
//! does, so the tracker can be exercised without a real UI runtime.
//!
//! Nodes are stored in a flat `Vec` indexed by [`NodeHandle`], with
//! parent/child/sibling links forming an intrusive tree. Every logical node
//! has up to two slots (current and alternate); a render reuses the
//! alternate slot of each matched node, exactly like a double-buffered host.
//!
//! ## Bailouts
//!
//! A node whose element (including its whole subtree) is unchanged since the
//! last render bails out: it gets a fresh slot with the old payloads, and its
//! `child` pointer is shared with the committed node.
//!
//! ## Suspense
//!
//! ```text
//! Suspense (showing content)        Suspense (showing fallback)
//! +-- Offscreen                     +-- Offscreen (hidden, children kept)
//!     +-- primary children          |   +-- primary children
//!                                   +-- Fragment
//!                                       +-- fallback children
//! ```
//!
//! Releases without an offscreen kind wrap primary children in a fragment
//! only while the fallback is shown.

use crate::error::{InspectorError, Result};
use crate::host::tags::{FallbackLayout, TagTable};
use crate::host::{
    HostCapabilities, HostRuntime, HostTree, NodeHandle, NodeTimings, PayloadRef, RootHandle,
};
use crate::types::WorkTag;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

// ==================== Element ====================

/// Description of what a node should render
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: WorkTag,
    /// Component name, host element tag, or context name
    pub name: Option<String>,
    pub key: Option<String>,
    /// Explicit display name on a wrapper type
    pub display_name: Option<String>,
    /// Source file of the component definition
    pub source: Option<String>,
    /// Props revision; changing it forces a re-render
    pub props: u64,
    /// Self render time in milliseconds
    pub duration: f64,
    /// Mode elements only: enables strict mode for the subtree
    pub strict: bool,
    /// Suspense only: show the fallback instead of the children
    pub suspended: bool,
    pub children: Vec<Element>,
    /// Suspense only
    pub fallback: Vec<Element>,
}

impl Element {
    pub fn new(tag: WorkTag) -> Self {
        Self {
            tag,
            name: None,
            key: None,
            display_name: None,
            source: None,
            props: 0,
            duration: 0.0,
            strict: false,
            suspended: false,
            children: Vec::new(),
            fallback: Vec::new(),
        }
    }

    fn named(tag: WorkTag, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(tag)
        }
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self::named(WorkTag::FunctionComponent, name)
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::named(WorkTag::ClassComponent, name)
    }

    /// Host primitive such as `div`
    pub fn host(tag_name: impl Into<String>) -> Self {
        Self::named(WorkTag::HostComponent, tag_name)
    }

    pub fn text() -> Self {
        Self::new(WorkTag::HostText)
    }

    pub fn fragment() -> Self {
        Self::new(WorkTag::Fragment)
    }

    pub fn suspense() -> Self {
        Self::new(WorkTag::SuspenseComponent)
    }

    pub fn suspense_list() -> Self {
        Self::new(WorkTag::SuspenseListComponent)
    }

    /// Memo wrapper around a function component named `inner`
    pub fn memo(inner: impl Into<String>) -> Self {
        Self::named(WorkTag::SimpleMemoComponent, inner)
    }

    pub fn forward_ref(inner: impl Into<String>) -> Self {
        Self::named(WorkTag::ForwardRef, inner)
    }

    pub fn provider(context: impl Into<String>) -> Self {
        Self::named(WorkTag::ContextProvider, context)
    }

    pub fn consumer(context: impl Into<String>) -> Self {
        Self::named(WorkTag::ContextConsumer, context)
    }

    pub fn profiler() -> Self {
        Self::new(WorkTag::Profiler)
    }

    pub fn strict_mode() -> Self {
        Self {
            strict: true,
            ..Self::new(WorkTag::Mode)
        }
    }

    pub fn portal() -> Self {
        Self::new(WorkTag::HostPortal)
    }

    pub fn lazy() -> Self {
        Self::new(WorkTag::LazyComponent)
    }

    pub fn tracing_marker(name: impl Into<String>) -> Self {
        Self::named(WorkTag::TracingMarkerComponent, name)
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn source(mut self, path: impl Into<String>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn props(mut self, revision: u64) -> Self {
        self.props = revision;
        self
    }

    pub fn duration(mut self, ms: f64) -> Self {
        self.duration = ms;
        self
    }

    pub fn suspended(mut self, suspended: bool) -> Self {
        self.suspended = suspended;
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn fallback(mut self, fallback: impl IntoIterator<Item = Element>) -> Self {
        self.fallback.extend(fallback);
        self
    }

    /// Structural hash of the whole subtree
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn hash_into(&self, state: &mut DefaultHasher) {
        self.tag.hash(state);
        self.name.hash(state);
        self.key.hash(state);
        self.display_name.hash(state);
        self.source.hash(state);
        self.props.hash(state);
        self.duration.to_bits().hash(state);
        self.strict.hash(state);
        self.suspended.hash(state);
        self.children.len().hash(state);
        for child in &self.children {
            child.hash_into(state);
        }
        self.fallback.len().hash(state);
        for child in &self.fallback {
            child.hash_into(state);
        }
    }

    fn is_component(&self) -> bool {
        matches!(
            self.tag,
            WorkTag::FunctionComponent
                | WorkTag::ClassComponent
                | WorkTag::ForwardRef
                | WorkTag::MemoComponent
                | WorkTag::SimpleMemoComponent
        )
    }
}

// ==================== Arena ====================

/// One slot in the arena
#[derive(Debug, Clone)]
struct Fiber {
    tag: WorkTag,
    raw_tag: u32,
    type_name: Option<String>,
    key: Option<String>,
    display_name: Option<String>,
    source: Option<String>,
    mode: u32,
    alternate: Option<NodeHandle>,
    parent: Option<NodeHandle>,
    child: Option<NodeHandle>,
    sibling: Option<NodeHandle>,
    owner: Option<NodeHandle>,
    props: PayloadRef,
    state: PayloadRef,
    ref_: PayloadRef,
    performed_work: bool,
    showing_fallback: bool,
    has_content: bool,
    timings: NodeTimings,
    /// Fingerprint of the element this slot last rendered (0 = never bail out)
    fingerprint: u64,
}

#[derive(Debug, Clone, Copy)]
struct RootSlot {
    current: NodeHandle,
    attached: bool,
}

/// Where new children hang and what they inherit
#[derive(Debug, Clone, Copy)]
struct Ctx {
    parent: Option<NodeHandle>,
    mode: u32,
    owner: Option<NodeHandle>,
}

/// Result of one [`ArenaHost::render`] commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    pub root: RootHandle,
    /// Committed nodes removed by this render, parent before child
    pub deletions: Vec<NodeHandle>,
    /// Priority level the commit ran at
    pub priority: u32,
}

/// In-memory host runtime
#[derive(Debug)]
pub struct ArenaHost {
    version: String,
    tags: TagTable,
    nodes: Vec<Fiber>,
    roots: Vec<RootSlot>,
    next_payload: u64,
    deletions: Vec<NodeHandle>,
    capabilities: HostCapabilities,
    production: bool,
    strict_roots: bool,
    lane_labels: Vec<String>,
    effect_durations: HashMap<RootHandle, (Option<f64>, Option<f64>)>,
    scheduled_updates: Vec<NodeHandle>,
}

impl ArenaHost {
    /// Create a host that mimics the given release
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            tags: TagTable::for_version(version),
            nodes: Vec::new(),
            roots: Vec::new(),
            next_payload: 0,
            deletions: Vec::new(),
            capabilities: HostCapabilities::all(),
            production: false,
            strict_roots: false,
            lane_labels: Vec::new(),
            effect_durations: HashMap::new(),
            scheduled_updates: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: HostCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// Render every root in strict mode
    pub fn with_strict_roots(mut self, strict: bool) -> Self {
        self.strict_roots = strict;
        self
    }

    pub fn with_lane_labels(mut self, labels: Vec<String>) -> Self {
        self.lane_labels = labels;
        self
    }

    pub fn tags(&self) -> &TagTable {
        &self.tags
    }

    /// Total number of slots ever allocated
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create an empty root
    pub fn create_root(&mut self) -> RootHandle {
        let raw_tag = self.tags.raw_tag(WorkTag::HostRoot).unwrap_or(u32::MAX);
        let mode = self.root_mode();
        let node = self.alloc(Fiber {
            raw_tag,
            mode,
            ..Fiber::blank(WorkTag::HostRoot)
        });
        let root = RootHandle(self.roots.len() as u64);
        self.roots.push(RootSlot {
            current: node,
            attached: true,
        });
        root
    }

    /// Render `element` into `root` and commit. `None` clears the root.
    pub fn render(&mut self, root: RootHandle, element: Option<Element>) -> Result<CommitReport> {
        let slot = *self
            .roots
            .get(root.0 as usize)
            .ok_or_else(|| InspectorError::NotFound(format!("{:?}", root)))?;
        if let Some(el) = &element {
            self.validate(el)?;
        }

        self.deletions.clear();
        let current = slot.current;
        let ctx = Ctx {
            parent: None,
            mode: self.root_mode(),
            owner: None,
        };
        let wip = self.prepare_wip(Some(current), &Element::new(WorkTag::HostRoot), &ctx);
        let state = self.fresh_payload();
        {
            let f = &mut self.nodes[idx(wip)];
            f.has_content = element.is_some();
            f.state = state;
            f.performed_work = true;
        }

        let child_ctx = Ctx {
            parent: Some(wip),
            mode: self.nodes[idx(wip)].mode,
            owner: None,
        };
        let old = self.nodes[idx(current)].child;
        let elements: Vec<Element> = element.into_iter().collect();
        self.reconcile_children(wip, old, &elements, &child_ctx);
        self.finish_timings(wip, 0.0);

        let has_content = self.nodes[idx(wip)].has_content;
        self.roots[root.0 as usize] = RootSlot {
            current: wip,
            attached: has_content,
        };

        let deletions = std::mem::take(&mut self.deletions);
        for &d in &deletions {
            self.nodes[idx(d)].parent = None;
        }

        tracing::trace!(
            "Committed {:?}: {} slots, {} deletions",
            root,
            self.nodes.len(),
            deletions.len()
        );

        Ok(CommitReport {
            root,
            deletions,
            priority: self.tags.priorities().normal,
        })
    }

    /// Effect durations reported for the next post-commit callback
    pub fn set_effect_durations(&mut self, root: RootHandle, effect: f64, passive: f64) {
        self.effect_durations
            .insert(root, (Some(effect), Some(passive)));
    }

    /// Nodes the inspector asked to re-render
    pub fn scheduled_updates(&self) -> &[NodeHandle] {
        &self.scheduled_updates
    }

    /// First committed node (depth-first) whose type name is `name`
    pub fn find_by_name(&self, root: RootHandle, name: &str) -> Option<NodeHandle> {
        self.find(root, |f| f.type_name.as_deref() == Some(name))
    }

    /// First committed node (depth-first) with key `key`
    pub fn find_by_key(&self, root: RootHandle, key: &str) -> Option<NodeHandle> {
        self.find(root, |f| f.key.as_deref() == Some(key))
    }

    /// Iterate over the children of a node
    pub fn children(&self, node: NodeHandle) -> ChildIter<'_> {
        ChildIter {
            host: self,
            current: self.get(node).and_then(|f| f.child),
        }
    }

    // --- Reconciliation ---

    fn root_mode(&self) -> u32 {
        if self.strict_roots {
            self.tags.strict_mode_bits()
        } else {
            0
        }
    }

    fn alloc(&mut self, fiber: Fiber) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len() as u64);
        self.nodes.push(fiber);
        handle
    }

    fn get(&self, node: NodeHandle) -> Option<&Fiber> {
        self.nodes.get(idx(node))
    }

    fn fresh_payload(&mut self) -> PayloadRef {
        self.next_payload += 1;
        PayloadRef(self.next_payload)
    }

    fn validate(&self, el: &Element) -> Result<()> {
        if !self.tags.supports(el.tag) {
            return Err(InspectorError::Unsupported(format!(
                "host {} has no {:?} nodes",
                self.version, el.tag
            )));
        }
        if el.tag == WorkTag::SuspenseComponent
            && self.tags.fallback_layout() == FallbackLayout::OffscreenWrapped
            && !self.tags.supports(WorkTag::OffscreenComponent)
        {
            return Err(InspectorError::Unsupported(format!(
                "host {} cannot wrap suspense content",
                self.version
            )));
        }
        for child in el.children.iter().chain(el.fallback.iter()) {
            self.validate(child)?;
        }
        Ok(())
    }

    /// Slot for the next version of `current`, reusing its alternate when it has one
    fn prepare_wip(&mut self, current: Option<NodeHandle>, el: &Element, ctx: &Ctx) -> NodeHandle {
        let strict = if el.tag == WorkTag::Mode && el.strict {
            self.tags.strict_mode_bits()
        } else {
            0
        };
        let template = Fiber {
            raw_tag: self.tags.raw_tag(el.tag).unwrap_or(u32::MAX),
            type_name: el.name.clone(),
            key: el.key.clone(),
            display_name: el.display_name.clone(),
            source: el.source.clone(),
            mode: ctx.mode | strict,
            alternate: current,
            parent: ctx.parent,
            owner: ctx.owner,
            ..Fiber::blank(el.tag)
        };

        match current.and_then(|c| self.nodes[idx(c)].alternate) {
            Some(reused) => {
                self.nodes[idx(reused)] = template;
                reused
            }
            None => {
                let handle = self.alloc(template);
                if let Some(c) = current {
                    self.nodes[idx(c)].alternate = Some(handle);
                }
                handle
            }
        }
    }

    fn work_on(&mut self, current: Option<NodeHandle>, el: &Element, ctx: &Ctx) -> NodeHandle {
        let fingerprint = el.fingerprint();
        let wip = self.prepare_wip(current, el, ctx);

        if let Some(c) = current.filter(|&c| self.nodes[idx(c)].fingerprint == fingerprint) {
            let prev = self.nodes[idx(c)].clone();
            let f = &mut self.nodes[idx(wip)];
            f.props = prev.props;
            f.state = prev.state;
            f.ref_ = prev.ref_;
            f.child = prev.child;
            f.showing_fallback = prev.showing_fallback;
            f.fingerprint = fingerprint;
            f.timings = NodeTimings {
                actual_duration: 0.0,
                ..prev.timings
            };
            return wip;
        }

        let props = self.fresh_payload();
        let (state, ref_) = match current {
            Some(c) => (self.nodes[idx(c)].state, self.nodes[idx(c)].ref_),
            None => (self.fresh_payload(), PayloadRef::NONE),
        };
        {
            let f = &mut self.nodes[idx(wip)];
            f.props = props;
            f.state = state;
            f.ref_ = ref_;
            f.performed_work = true;
            f.fingerprint = fingerprint;
        }

        let child_ctx = Ctx {
            parent: Some(wip),
            mode: self.nodes[idx(wip)].mode,
            owner: if el.is_component() { Some(wip) } else { ctx.owner },
        };
        if el.tag == WorkTag::SuspenseComponent {
            self.render_suspense(wip, current, el, &child_ctx);
        } else {
            let old = current.and_then(|c| self.nodes[idx(c)].child);
            self.reconcile_children(wip, old, &el.children, &child_ctx);
        }
        self.finish_timings(wip, el.duration);
        wip
    }

    fn reconcile_children(
        &mut self,
        parent: NodeHandle,
        old_first: Option<NodeHandle>,
        elements: &[Element],
        ctx: &Ctx,
    ) {
        let old: Vec<NodeHandle> = self.sibling_list(old_first);
        let mut used = vec![false; old.len()];
        let mut next = Vec::with_capacity(elements.len());

        for (i, el) in elements.iter().enumerate() {
            let candidate = match &el.key {
                Some(key) => old
                    .iter()
                    .position(|&o| self.nodes[idx(o)].key.as_deref() == Some(key.as_str())),
                None => (i < old.len() && self.nodes[idx(old[i])].key.is_none()).then_some(i),
            };
            let matched = candidate.filter(|&j| !used[j] && self.same_type(old[j], el));
            if let Some(j) = matched {
                used[j] = true;
            }
            next.push(self.work_on(matched.map(|j| old[j]), el, ctx));
        }

        for (j, &o) in old.iter().enumerate() {
            if !used[j] {
                self.delete_subtree(o);
            }
        }
        self.link_children(parent, &next);
    }

    fn render_suspense(
        &mut self,
        wip: NodeHandle,
        current: Option<NodeHandle>,
        el: &Element,
        ctx: &Ctx,
    ) {
        let layout = self.tags.fallback_layout();
        let was_fallback = current
            .map(|c| self.nodes[idx(c)].showing_fallback)
            .unwrap_or(false);
        let cur_first = current.and_then(|c| self.nodes[idx(c)].child);
        let cur_fallback = if was_fallback {
            cur_first.and_then(|p| self.nodes[idx(p)].sibling)
        } else {
            None
        };
        let prev_primary = match (layout, was_fallback) {
            (FallbackLayout::ConditionallyWrapped, false) => cur_first,
            _ => cur_first.and_then(|w| self.nodes[idx(w)].child),
        };
        self.nodes[idx(wip)].showing_fallback = el.suspended;

        if layout == FallbackLayout::ConditionallyWrapped && !el.suspended {
            self.reconcile_children(wip, prev_primary, &el.children, ctx);
            if let Some(wrapper) = cur_first.filter(|_| was_fallback) {
                self.deletions.push(wrapper);
            }
            if let Some(fallback) = cur_fallback {
                self.delete_subtree(fallback);
            }
            return;
        }

        let (wrapper_el, wrapper_current) = match layout {
            FallbackLayout::OffscreenWrapped => {
                (Element::new(WorkTag::OffscreenComponent), cur_first)
            }
            FallbackLayout::ConditionallyWrapped => {
                (Element::fragment(), cur_first.filter(|_| was_fallback))
            }
        };
        let wrapper = self.wrapper(wrapper_current, &wrapper_el, ctx);
        if el.suspended {
            self.adopt_children(wrapper, prev_primary);
        } else {
            let inner = Ctx {
                parent: Some(wrapper),
                ..*ctx
            };
            self.reconcile_children(wrapper, prev_primary, &el.children, &inner);
            self.finish_timings(wrapper, 0.0);
        }

        let mut kids = vec![wrapper];
        if el.suspended {
            let fragment = self.wrapper(cur_fallback, &Element::fragment(), ctx);
            let inner = Ctx {
                parent: Some(fragment),
                ..*ctx
            };
            let old = cur_fallback.and_then(|f| self.nodes[idx(f)].child);
            self.reconcile_children(fragment, old, &el.fallback, &inner);
            self.finish_timings(fragment, 0.0);
            kids.push(fragment);
        } else if let Some(fallback) = cur_fallback {
            self.delete_subtree(fallback);
        }
        self.link_children(wip, &kids);
    }

    /// Internal wrapper node that always re-renders
    fn wrapper(&mut self, current: Option<NodeHandle>, el: &Element, ctx: &Ctx) -> NodeHandle {
        let handle = self.prepare_wip(current, el, ctx);
        let props = self.fresh_payload();
        let f = &mut self.nodes[idx(handle)];
        f.props = props;
        f.performed_work = true;
        handle
    }

    /// Hang already-rendered nodes under `parent` without re-rendering them
    fn adopt_children(&mut self, parent: NodeHandle, first: Option<NodeHandle>) {
        let kids = self.sibling_list(first);
        let tree_base: f64 = kids
            .iter()
            .map(|&k| self.nodes[idx(k)].timings.tree_base_duration)
            .sum();
        for &k in &kids {
            self.nodes[idx(k)].parent = Some(parent);
        }
        let f = &mut self.nodes[idx(parent)];
        f.child = first;
        f.timings = NodeTimings {
            tree_base_duration: tree_base,
            ..NodeTimings::default()
        };
    }

    fn link_children(&mut self, parent: NodeHandle, kids: &[NodeHandle]) {
        self.nodes[idx(parent)].child = kids.first().copied();
        for (i, &k) in kids.iter().enumerate() {
            let f = &mut self.nodes[idx(k)];
            f.parent = Some(parent);
            f.sibling = kids.get(i + 1).copied();
        }
    }

    fn finish_timings(&mut self, node: NodeHandle, self_duration: f64) {
        let kids = self.sibling_list(self.nodes[idx(node)].child);
        let (actual, tree) = kids.iter().fold((0.0, 0.0), |(a, t), &k| {
            let timings = self.nodes[idx(k)].timings;
            (a + timings.actual_duration, t + timings.tree_base_duration)
        });
        self.nodes[idx(node)].timings = NodeTimings {
            actual_duration: self_duration + actual,
            actual_start_time: 0.0,
            self_base_duration: self_duration,
            tree_base_duration: self_duration + tree,
        };
    }

    /// Collect a committed subtree for deletion, parent before child
    fn delete_subtree(&mut self, node: NodeHandle) {
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            self.deletions.push(n);
            let kids = self.sibling_list(self.nodes[idx(n)].child);
            stack.extend(kids.into_iter().rev());
        }
    }

    fn same_type(&self, node: NodeHandle, el: &Element) -> bool {
        let f = &self.nodes[idx(node)];
        f.tag == el.tag && f.type_name == el.name
    }

    fn sibling_list(&self, first: Option<NodeHandle>) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut cur = first;
        while let Some(n) = cur {
            out.push(n);
            cur = self.nodes[idx(n)].sibling;
        }
        out
    }

    fn find(&self, root: RootHandle, pred: impl Fn(&Fiber) -> bool) -> Option<NodeHandle> {
        let start = self.roots.get(root.0 as usize)?.current;
        let mut stack = vec![start];
        while let Some(n) = stack.pop() {
            let f = self.get(n)?;
            if pred(f) {
                return Some(n);
            }
            let kids = self.sibling_list(f.child);
            stack.extend(kids.into_iter().rev());
        }
        None
    }
}

impl Fiber {
    fn blank(tag: WorkTag) -> Self {
        Self {
            tag,
            raw_tag: u32::MAX,
            type_name: None,
            key: None,
            display_name: None,
            source: None,
            mode: 0,
            alternate: None,
            parent: None,
            child: None,
            sibling: None,
            owner: None,
            props: PayloadRef::NONE,
            state: PayloadRef::NONE,
            ref_: PayloadRef::NONE,
            performed_work: false,
            showing_fallback: false,
            has_content: false,
            timings: NodeTimings::default(),
            fingerprint: 0,
        }
    }
}

#[inline]
fn idx(node: NodeHandle) -> usize {
    node.0 as usize
}

/// Iterator over the children of a node
pub struct ChildIter<'a> {
    host: &'a ArenaHost,
    current: Option<NodeHandle>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = NodeHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        self.current = self.host.get(node).and_then(|f| f.sibling);
        Some(node)
    }
}

// ==================== Host Traits ====================

impl HostTree for ArenaHost {
    fn tag(&self, node: NodeHandle) -> u32 {
        self.get(node).map(|f| f.raw_tag).unwrap_or(u32::MAX)
    }

    fn alternate(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.get(node)?.alternate
    }

    fn child(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.get(node)?.child
    }

    fn sibling(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.get(node)?.sibling
    }

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.get(node)?.parent
    }

    fn key(&self, node: NodeHandle) -> Option<String> {
        self.get(node)?.key.clone()
    }

    fn type_name(&self, node: NodeHandle) -> Option<String> {
        self.get(node)?.type_name.clone()
    }

    fn display_name_override(&self, node: NodeHandle) -> Option<String> {
        self.get(node)?.display_name.clone()
    }

    fn mode(&self, node: NodeHandle) -> u32 {
        self.get(node).map(|f| f.mode).unwrap_or(0)
    }

    fn is_showing_fallback(&self, node: NodeHandle) -> bool {
        self.get(node).map(|f| f.showing_fallback).unwrap_or(false)
    }

    fn root_has_content(&self, node: NodeHandle) -> bool {
        self.get(node).map(|f| f.has_content).unwrap_or(false)
    }

    fn memoized_props(&self, node: NodeHandle) -> PayloadRef {
        self.get(node).map(|f| f.props).unwrap_or_default()
    }

    fn memoized_state(&self, node: NodeHandle) -> PayloadRef {
        self.get(node).map(|f| f.state).unwrap_or_default()
    }

    fn ref_payload(&self, node: NodeHandle) -> PayloadRef {
        self.get(node).map(|f| f.ref_).unwrap_or_default()
    }

    fn performed_work(&self, node: NodeHandle) -> bool {
        self.get(node).map(|f| f.performed_work).unwrap_or(false)
    }

    fn timings(&self, node: NodeHandle) -> Option<NodeTimings> {
        if !self.capabilities.profiling_hooks {
            return None;
        }
        self.get(node).map(|f| f.timings)
    }

    fn debug_owner(&self, node: NodeHandle) -> Option<NodeHandle> {
        if self.production {
            return None;
        }
        self.get(node)?.owner
    }

    fn source_path(&self, node: NodeHandle) -> Option<String> {
        self.get(node)?.source.clone()
    }

    fn changed_prop_keys(&self, prev: NodeHandle, next: NodeHandle) -> Vec<String> {
        match (self.get(prev), self.get(next)) {
            (Some(p), Some(n)) if p.props != n.props => vec!["props".to_string()],
            _ => Vec::new(),
        }
    }
}

impl HostRuntime for ArenaHost {
    fn version(&self) -> &str {
        &self.version
    }

    fn roots(&self) -> Vec<RootHandle> {
        self.roots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.attached)
            .map(|(i, _)| RootHandle(i as u64))
            .collect()
    }

    fn current(&self, root: RootHandle) -> Option<NodeHandle> {
        self.roots.get(root.0 as usize).map(|slot| slot.current)
    }

    fn is_production(&self) -> bool {
        self.production
    }

    fn has_owner_metadata(&self) -> bool {
        !self.production
    }

    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    fn effect_durations(&self, root: RootHandle) -> (Option<f64>, Option<f64>) {
        self.effect_durations
            .get(&root)
            .copied()
            .unwrap_or((None, None))
    }

    fn lane_labels(&self) -> Vec<String> {
        self.lane_labels.clone()
    }

    fn schedule_update(&mut self, node: NodeHandle) -> Result<()> {
        if !self.capabilities.schedule_update {
            return Err(InspectorError::Unsupported(format!(
                "host {} cannot schedule updates",
                self.version
            )));
        }
        self.scheduled_updates.push(node);
        Ok(())
    }
}
