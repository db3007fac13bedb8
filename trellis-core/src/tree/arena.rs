//! Instance Arena
//!
//! The arena owns every mounted instance record, indexed by stable
//! [`InstanceId`]. Parent/child links are ids, never references, so the
//! scheduler can take a record's hook slots out, run user code, and put them
//! back without holding a borrow across the call.
//!
//! # Orderings
//!
//! Two traversal orders are used by the scheduler:
//!
//! - **Pre-order** (parent before children, siblings left to right): the
//!   order in which a tick's cells are flushed and removed subtrees are torn
//!   down.
//! - **Breadth-first** ([`OrderKey`]: depth, then child-index path): the
//!   order of re-evaluation and effect reconciliation, so a parent's new
//!   props or context value exist before any descendant evaluates.

use std::collections::HashMap;

use smallvec::SmallVec;

use super::element::Element;
use super::instance::{InstanceId, InstanceRecord, InstanceStatus, OrderKey};
use crate::reactive::ContextId;

/// Result of matching a parent's new child elements against its instances.
#[derive(Debug, Default)]
pub(crate) struct ChildUpdate {
    /// Children that must be evaluated (new props or newly mounted).
    pub scheduled: Vec<InstanceId>,
    /// Roots of subtrees removed from the tree, now detached.
    pub removed: Vec<InstanceId>,
}

/// All mounted instances.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    records: HashMap<InstanceId, InstanceRecord>,
    root: Option<InstanceId>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<InstanceId> {
        self.root
    }

    /// Insert a root record, replacing the root pointer.
    pub fn insert_root(&mut self, element: Element) -> InstanceId {
        let record = InstanceRecord::new(None, SmallVec::new(), element);
        let id = record.id;
        self.records.insert(id, record);
        self.root = Some(id);
        id
    }

    /// Insert a child record at `position` under `parent`.
    ///
    /// The caller is responsible for placing the id into the parent's
    /// child list.
    fn insert_child(&mut self, parent: InstanceId, position: usize, element: Element) -> Option<InstanceId> {
        let mut path = self.records.get(&parent)?.path.clone();
        path.push(position as u32);
        let record = InstanceRecord::new(Some(parent), path, element);
        let id = record.id;
        self.records.insert(id, record);
        Some(id)
    }

    pub fn get(&self, id: InstanceId) -> Option<&InstanceRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut InstanceRecord> {
        self.records.get_mut(&id)
    }

    /// Remove a single record. Children are not touched.
    pub fn remove(&mut self, id: InstanceId) -> Option<InstanceRecord> {
        if self.root == Some(id) {
            self.root = None;
        }
        self.records.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn order_key(&self, id: InstanceId) -> Option<OrderKey> {
        self.records.get(&id).map(InstanceRecord::order_key)
    }

    /// Pre-order traversal of the subtree rooted at `id`.
    pub fn subtree_preorder(&self, id: InstanceId) -> Vec<InstanceId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(record) = self.records.get(&next) {
                order.push(next);
                stack.extend(record.children.iter().rev().copied());
            }
        }
        order
    }

    /// Pre-order position of every instance reachable from the root.
    pub fn preorder_positions(&self) -> HashMap<InstanceId, usize> {
        self.root
            .map(|root| self.subtree_preorder(root))
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(position, id)| (id, position))
            .collect()
    }

    /// Nearest strict ancestor of `id` providing `context`.
    pub fn find_provider(&self, id: InstanceId, context: ContextId) -> Option<InstanceId> {
        let mut current = self.records.get(&id)?.parent;
        while let Some(ancestor) = current {
            let record = self.records.get(&ancestor)?;
            if record.providers.contains_key(&context) {
                return Some(ancestor);
            }
            current = record.parent;
        }
        None
    }

    /// Mark a subtree as detached so nothing in it is evaluated again.
    fn detach_subtree(&mut self, id: InstanceId) {
        for member in self.subtree_preorder(id) {
            if let Some(record) = self.records.get_mut(&member) {
                record.status = InstanceStatus::Detached;
            }
        }
    }

    /// Match `elements` against the current children of `parent`.
    ///
    /// A child at the same position with the same component type is kept
    /// and receives the new element; anything else is replaced by a freshly
    /// mounted instance. Children past the end of `elements` are removed.
    pub fn update_children(&mut self, parent: InstanceId, elements: Vec<Element>) -> ChildUpdate {
        let mut update = ChildUpdate::default();
        let Some(record) = self.records.get_mut(&parent) else {
            return update;
        };
        let previous = std::mem::take(&mut record.children);
        let mut next = Vec::with_capacity(elements.len());

        for (position, element) in elements.into_iter().enumerate() {
            let reusable = previous.get(position).copied().filter(|child| {
                self.records
                    .get(child)
                    .is_some_and(|r| r.element.same_component(&element))
            });

            match reusable {
                Some(child) => {
                    if let Some(record) = self.records.get_mut(&child) {
                        let skip = record.layout_committed && record.element.can_skip(&element);
                        if !skip {
                            record.element = element;
                            update.scheduled.push(child);
                        }
                    }
                    next.push(child);
                }
                None => {
                    if let Some(&old) = previous.get(position) {
                        self.detach_subtree(old);
                        update.removed.push(old);
                    }
                    if let Some(child) = self.insert_child(parent, position, element) {
                        update.scheduled.push(child);
                        next.push(child);
                    }
                }
            }
        }

        for &old in previous.iter().skip(next.len()) {
            self.detach_subtree(old);
            update.removed.push(old);
        }

        if let Some(record) = self.records.get_mut(&parent) {
            record.children = next;
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PresentationError;
    use crate::scope::Scope;
    use crate::tree::{Component, View};

    struct Leaf;

    impl Component for Leaf {
        type Props = u32;

        fn render(&self, _: &mut Scope<'_>, _: &u32) -> Result<View, PresentationError> {
            Ok(View::empty())
        }
    }

    struct Other;

    impl Component for Other {
        type Props = ();

        fn render(&self, _: &mut Scope<'_>, _: &()) -> Result<View, PresentationError> {
            Ok(View::empty())
        }
    }

    fn leaves(n: u32) -> Vec<Element> {
        (0..n).map(|i| Element::new(Leaf, i)).collect()
    }

    #[test]
    fn insert_and_remove_records() {
        let mut arena = Arena::new();
        let root = arena.insert_root(Other.into());
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.root(), Some(root));

        arena.remove(root);
        assert!(arena.is_empty());
        assert_eq!(arena.root(), None);
    }

    #[test]
    fn new_children_are_mounted_and_scheduled() {
        let mut arena = Arena::new();
        let root = arena.insert_root(Other.into());

        let update = arena.update_children(root, leaves(3));
        assert_eq!(update.scheduled.len(), 3);
        assert!(update.removed.is_empty());

        let children = arena.get(root).unwrap().children.clone();
        assert_eq!(children, update.scheduled);
        assert_eq!(arena.get(children[2]).unwrap().path.to_vec(), vec![2]);
        assert_eq!(arena.get(children[2]).unwrap().depth(), 1);
    }

    #[test]
    fn same_type_at_same_position_is_reused() {
        let mut arena = Arena::new();
        let root = arena.insert_root(Other.into());
        let first = arena.update_children(root, leaves(2)).scheduled;

        let second = arena.update_children(root, leaves(2));
        assert_eq!(second.scheduled, first);
        assert!(second.removed.is_empty());
    }

    #[test]
    fn type_change_replaces_and_shrinking_removes() {
        let mut arena = Arena::new();
        let root = arena.insert_root(Other.into());
        let first = arena.update_children(root, leaves(3)).scheduled;

        let update = arena.update_children(root, vec![Other.into()]);
        assert_eq!(update.removed, vec![first[0], first[1], first[2]]);
        assert_eq!(update.scheduled.len(), 1);
        assert_ne!(update.scheduled[0], first[0]);
        assert_eq!(arena.get(first[1]).unwrap().status, InstanceStatus::Detached);
    }

    #[test]
    fn preorder_visits_parents_before_children() {
        let mut arena = Arena::new();
        let root = arena.insert_root(Other.into());
        let kids = arena.update_children(root, leaves(2)).scheduled;
        let grandkids = arena.update_children(kids[0], leaves(1)).scheduled;

        let order = arena.subtree_preorder(root);
        assert_eq!(order, vec![root, kids[0], grandkids[0], kids[1]]);

        let positions = arena.preorder_positions();
        assert!(positions[&grandkids[0]] < positions[&kids[1]]);
    }
}
