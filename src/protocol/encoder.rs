//! Pending mutation batch and flush serialization

use super::interner::StringInterner;
use super::{
    HEADER_LEN, TREE_OPERATION_ADD, TREE_OPERATION_REMOVE, TREE_OPERATION_REMOVE_ROOT,
    TREE_OPERATION_REORDER_CHILDREN, TREE_OPERATION_SET_SUBTREE_MODE,
    TREE_OPERATION_UPDATE_ERRORS_OR_WARNINGS, TREE_OPERATION_UPDATE_TREE_BASE_DURATION,
};
use crate::types::ElementType;

/// Mutation records accumulated between two flushes
///
/// Removals are kept apart from the other operations because the wire
/// format emits them as one leading REMOVE op. Real unmounts are recorded
/// parent first and emitted reversed; simulated unmounts are recorded child
/// first already.
#[derive(Debug, Default)]
pub struct PendingBatch {
    ops: Vec<u32>,
    real_unmounts: Vec<u32>,
    simulated_unmounts: Vec<u32>,
    unmounted_root: Option<u32>,
    interner: StringInterner,
}

impl PendingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string into this batch's table
    #[inline]
    pub fn intern(&mut self, s: Option<&str>) -> u32 {
        self.interner.intern(s)
    }

    // --- Operations ---

    /// ADD for a root node
    pub fn push_add_root(
        &mut self,
        id: u32,
        is_strict: bool,
        profiling_flags: u32,
        supports_strict_mode: bool,
        has_owner_metadata: bool,
    ) {
        self.ops.extend_from_slice(&[
            TREE_OPERATION_ADD,
            id,
            ElementType::Root.code(),
            is_strict as u32,
            profiling_flags,
            supports_strict_mode as u32,
            has_owner_metadata as u32,
        ]);
    }

    /// ADD for a non-root node; strings are interned here
    pub fn push_add(
        &mut self,
        id: u32,
        element_type: ElementType,
        parent_id: u32,
        owner_id: u32,
        display_name: Option<&str>,
        key: Option<&str>,
    ) {
        let name_id = self.intern(display_name);
        let key_id = self.intern(key);
        self.ops.extend_from_slice(&[
            TREE_OPERATION_ADD,
            id,
            element_type.code(),
            parent_id,
            owner_id,
            name_id,
            key_id,
        ]);
    }

    pub fn push_remove_root(&mut self) {
        self.ops.push(TREE_OPERATION_REMOVE_ROOT);
    }

    /// Replace the visible children of `id`
    pub fn push_reorder_children(&mut self, id: u32, children: &[u32]) {
        self.ops
            .extend_from_slice(&[TREE_OPERATION_REORDER_CHILDREN, id, children.len() as u32]);
        self.ops.extend_from_slice(children);
    }

    /// Tree base duration in whole microseconds
    pub fn push_tree_base_duration(&mut self, id: u32, duration_ms: f64) {
        let micros = (duration_ms.max(0.0) * 1000.0).floor() as u32;
        self.ops
            .extend_from_slice(&[TREE_OPERATION_UPDATE_TREE_BASE_DURATION, id, micros]);
    }

    pub fn push_errors_and_warnings(&mut self, id: u32, errors: u32, warnings: u32) {
        self.ops.extend_from_slice(&[
            TREE_OPERATION_UPDATE_ERRORS_OR_WARNINGS,
            id,
            errors,
            warnings,
        ]);
    }

    pub fn push_subtree_mode(&mut self, id: u32, mode: u32) {
        self.ops
            .extend_from_slice(&[TREE_OPERATION_SET_SUBTREE_MODE, id, mode]);
    }

    // --- Unmounts ---

    pub fn push_real_unmount(&mut self, id: u32) {
        self.real_unmounts.push(id);
    }

    pub fn push_simulated_unmount(&mut self, id: u32) {
        self.simulated_unmounts.push(id);
    }

    /// Root removal, emitted after every other removal
    pub fn set_unmounted_root(&mut self, id: u32) {
        self.unmounted_root = Some(id);
    }

    // --- Flush ---

    /// Total number of removals in the batch
    pub fn unmount_count(&self) -> usize {
        self.real_unmounts.len()
            + self.simulated_unmounts.len()
            + self.unmounted_root.map_or(0, |_| 1)
    }

    /// True when nothing structural is pending
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.unmount_count() == 0
    }

    /// Operation words recorded so far (removals excluded)
    pub fn ops(&self) -> &[u32] {
        &self.ops
    }

    /// Serialize one message and reset the batch
    pub fn flush(&mut self, renderer_id: u32, root_id: u32) -> Vec<u32> {
        let unmounts = self.unmount_count();
        let mut out = Vec::with_capacity(
            HEADER_LEN
                + self.interner.table_size() as usize
                + if unmounts > 0 { 2 + unmounts } else { 0 }
                + self.ops.len(),
        );

        out.push(renderer_id);
        out.push(root_id);
        out.push(self.interner.table_size());
        self.interner.encode_into(&mut out);

        if unmounts > 0 {
            out.push(TREE_OPERATION_REMOVE);
            out.push(unmounts as u32);
            out.extend(self.real_unmounts.iter().rev());
            out.extend_from_slice(&self.simulated_unmounts);
            if let Some(root) = self.unmounted_root {
                out.push(root);
            }
        }

        out.extend_from_slice(&self.ops);
        self.clear();
        out
    }

    /// Drop everything pending
    pub fn clear(&mut self) {
        self.ops.clear();
        self.real_unmounts.clear();
        self.simulated_unmounts.clear();
        self.unmounted_root = None;
        self.interner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_flush_is_header_only() {
        let mut batch = PendingBatch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.flush(1, 7), vec![1, 7, 0]);
    }

    #[test]
    fn test_add_layout() {
        let mut batch = PendingBatch::new();
        batch.push_add_root(1, false, 3, true, true);
        batch.push_add(2, ElementType::Function, 1, 0, Some("App"), None);

        let message = batch.flush(1, 1);
        assert_eq!(
            message,
            vec![
                1, 1, 4, // header
                3, 'A' as u32, 'p' as u32, 'p' as u32, // "App"
                1, 1, 11, 0, 3, 1, 1, // root ADD
                1, 2, 5, 1, 0, 1, 0, // App ADD
            ]
        );
        assert!(batch.is_empty());
    }

    #[test]
    fn test_removals_grouped_and_ordered() {
        let mut batch = PendingBatch::new();
        batch.push_real_unmount(2);
        batch.push_real_unmount(3);
        batch.push_simulated_unmount(5);
        batch.push_simulated_unmount(4);
        batch.set_unmounted_root(1);
        batch.push_reorder_children(9, &[10, 11]);

        let message = batch.flush(1, 1);
        assert_eq!(
            message,
            vec![1, 1, 0, 2, 5, 3, 2, 5, 4, 1, 3, 9, 2, 10, 11]
        );
    }

    #[test]
    fn test_tree_base_duration_floored_micros() {
        let mut batch = PendingBatch::new();
        batch.push_tree_base_duration(4, 1.23456);
        assert_eq!(batch.ops(), &[4, 4, 1234]);
    }

    #[test]
    fn test_strings_shared_across_ops() {
        let mut batch = PendingBatch::new();
        batch.push_add(2, ElementType::HostComponent, 1, 0, Some("li"), Some("a"));
        batch.push_add(3, ElementType::HostComponent, 1, 0, Some("li"), Some("b"));
        let message = batch.flush(1, 1);
        // "li", "a", "b"
        assert_eq!(message[2], 3 + 2 + 2);
        assert_eq!(&message[10..], &[1, 2, 7, 1, 0, 1, 2, 1, 3, 7, 1, 0, 1, 3]);
    }
}
