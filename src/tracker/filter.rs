//! Filter engine
//!
//! Classifies host nodes into [`ElementType`]s, derives their display names,
//! and decides which nodes the frontend sees. Structural wrappers are always
//! hidden; everything else is subject to the user's [`ComponentFilter`] rules.
//!
//! Rules are compiled once per [`apply`](FilterEngine::apply): element types
//! into a set, display-name and location patterns into regexes. Invalid
//! patterns are logged and skipped rather than failing the whole rule set.

use crate::config::ComponentFilter;
use crate::host::{HostTree, NodeHandle, TagTable};
use crate::types::{ElementType, WorkTag};
use regex::Regex;
use std::collections::HashSet;

/// Compiled visibility rules plus the attachment's tag table
#[derive(Debug, Clone)]
pub struct FilterEngine {
    tags: TagTable,
    hidden_types: HashSet<ElementType>,
    hidden_names: Vec<Regex>,
    hidden_paths: Vec<Regex>,
}

impl FilterEngine {
    pub fn new(tags: TagTable, rules: &[ComponentFilter]) -> Self {
        let mut engine = Self {
            tags,
            hidden_types: HashSet::new(),
            hidden_names: Vec::new(),
            hidden_paths: Vec::new(),
        };
        engine.apply(rules);
        engine
    }

    /// Replace the compiled rule set
    pub fn apply(&mut self, rules: &[ComponentFilter]) {
        self.hidden_types.clear();
        self.hidden_names.clear();
        self.hidden_paths.clear();

        for rule in rules.iter().filter(|r| r.is_enabled()) {
            match rule {
                ComponentFilter::ElementType { value, .. } => {
                    self.hidden_types.insert(*value);
                }
                ComponentFilter::DisplayName { value, .. } => {
                    if let Some(re) = compile(value, "display name") {
                        self.hidden_names.push(re);
                    }
                }
                ComponentFilter::Location { value, .. } => {
                    if let Some(re) = compile(value, "location") {
                        self.hidden_paths.push(re);
                    }
                }
                ComponentFilter::Hoc { .. } => {
                    if let Some(re) = compile(r"\(", "hoc") {
                        self.hidden_names.push(re);
                    }
                }
            }
        }

        tracing::debug!(
            "Applied component filters: {} types, {} name patterns, {} path patterns",
            self.hidden_types.len(),
            self.hidden_names.len(),
            self.hidden_paths.len()
        );
    }

    pub fn tags(&self) -> &TagTable {
        &self.tags
    }

    /// Semantic kind of `node`
    #[inline]
    pub fn work_tag<H: HostTree + ?Sized>(&self, host: &H, node: NodeHandle) -> WorkTag {
        self.tags.resolve(host.tag(node))
    }

    /// Frontend classification of `node`
    pub fn classify<H: HostTree + ?Sized>(&self, host: &H, node: NodeHandle) -> ElementType {
        element_type_for(self.work_tag(host, node))
    }

    /// Name the frontend shows for `node`
    pub fn display_name<H: HostTree + ?Sized>(&self, host: &H, node: NodeHandle) -> Option<String> {
        let name = || host.type_name(node);
        let named_or_anonymous = || name().unwrap_or_else(|| "Anonymous".to_string());

        match self.work_tag(host, node) {
            WorkTag::ClassComponent
            | WorkTag::IncompleteClassComponent
            | WorkTag::FunctionComponent
            | WorkTag::IndeterminateComponent => Some(named_or_anonymous()),
            WorkTag::ForwardRef => Some(
                host.display_name_override(node)
                    .unwrap_or_else(|| format!("ForwardRef({})", named_or_anonymous())),
            ),
            WorkTag::MemoComponent | WorkTag::SimpleMemoComponent => Some(
                host.display_name_override(node)
                    .unwrap_or_else(|| format!("Memo({})", named_or_anonymous())),
            ),
            WorkTag::HostComponent | WorkTag::HostHoistable | WorkTag::HostSingleton => name(),
            WorkTag::HostRoot | WorkTag::HostPortal | WorkTag::HostText | WorkTag::Mode => None,
            WorkTag::Fragment => Some("Fragment".to_string()),
            WorkTag::LazyComponent => Some("Lazy".to_string()),
            WorkTag::SuspenseComponent | WorkTag::DehydratedSuspenseComponent => {
                Some("Suspense".to_string())
            }
            WorkTag::SuspenseListComponent => Some("SuspenseList".to_string()),
            WorkTag::Profiler => Some("Profiler".to_string()),
            WorkTag::TracingMarkerComponent => Some("TracingMarker".to_string()),
            WorkTag::OffscreenComponent => Some("Offscreen".to_string()),
            WorkTag::LegacyHiddenComponent => Some("LegacyHidden".to_string()),
            WorkTag::ScopeComponent => Some("Scope".to_string()),
            WorkTag::CacheComponent => Some("Cache".to_string()),
            WorkTag::ContextProvider => Some(format!(
                "{}.Provider",
                name().unwrap_or_else(|| "Context".to_string())
            )),
            WorkTag::ContextConsumer => Some(format!(
                "{}.Consumer",
                name().unwrap_or_else(|| "Context".to_string())
            )),
            WorkTag::CoroutineComponent
            | WorkTag::CoroutineHandlerPhase
            | WorkTag::YieldComponent
            | WorkTag::Unknown => host.display_name_override(node).or_else(name),
        }
    }

    /// True if `node` is hidden from the frontend
    pub fn should_filter<H: HostTree + ?Sized>(&self, host: &H, node: NodeHandle) -> bool {
        let tag = self.work_tag(host, node);
        match tag {
            WorkTag::HostRoot => return false,
            WorkTag::DehydratedSuspenseComponent
            | WorkTag::HostPortal
            | WorkTag::HostText
            | WorkTag::LegacyHiddenComponent
            | WorkTag::OffscreenComponent
            | WorkTag::Mode => return true,
            WorkTag::Fragment if host.key(node).is_none() => return true,
            _ => {}
        }

        if self.hidden_types.contains(&element_type_for(tag)) {
            return true;
        }

        if !self.hidden_names.is_empty() {
            if let Some(name) = self.display_name(host, node) {
                if self.hidden_names.iter().any(|re| re.is_match(&name)) {
                    return true;
                }
            }
        }

        if !self.hidden_paths.is_empty() {
            if let Some(path) = host.source_path(node) {
                if self.hidden_paths.iter().any(|re| re.is_match(&path)) {
                    return true;
                }
            }
        }

        false
    }
}

/// Frontend classification of a semantic kind
pub fn element_type_for(tag: WorkTag) -> ElementType {
    match tag {
        WorkTag::ClassComponent | WorkTag::IncompleteClassComponent => ElementType::Class,
        WorkTag::FunctionComponent | WorkTag::IndeterminateComponent => ElementType::Function,
        WorkTag::ForwardRef => ElementType::ForwardRef,
        WorkTag::HostRoot => ElementType::Root,
        WorkTag::HostComponent | WorkTag::HostHoistable | WorkTag::HostSingleton => {
            ElementType::HostComponent
        }
        WorkTag::MemoComponent | WorkTag::SimpleMemoComponent => ElementType::Memo,
        WorkTag::SuspenseComponent => ElementType::Suspense,
        WorkTag::SuspenseListComponent => ElementType::SuspenseList,
        WorkTag::TracingMarkerComponent => ElementType::TracingMarker,
        WorkTag::ContextProvider | WorkTag::ContextConsumer => ElementType::Context,
        WorkTag::Profiler => ElementType::Profiler,
        _ => ElementType::Other,
    }
}

fn compile(pattern: &str, kind: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Ignoring invalid {} filter {:?}: {}", kind, pattern, e);
            None
        }
    }
}
