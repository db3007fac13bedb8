//! Instance Records
//!
//! This module defines the record the arena keeps for each mounted
//! component instance, and the hook slots stored in it.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;

use super::element::Element;
use crate::reactive::{ContextId, ContextSlot, EffectSlot, Flushable, MemoSlot, ProviderEntry};

/// Stable identifier for a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Generate a new unique instance ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Mounted but not evaluated yet.
    Pending,

    /// The last evaluation succeeded.
    Rendered,

    /// The last evaluation returned a presentation error. The previous
    /// children are kept; a later successful evaluation recovers.
    Failed,

    /// A slot violation was detected. The instance is never evaluated again.
    Faulted,

    /// Removed from its parent during this flush; waiting for teardown.
    Detached,
}

impl InstanceStatus {
    /// Whether the instance may be evaluated.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Pending | Self::Rendered | Self::Failed)
    }
}

/// The kind of hook occupying a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    State,
    Reducer,
    Ref,
    Effect,
    Memo,
    Context,
    Provider,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotKind::State => "state",
            SlotKind::Reducer => "reducer",
            SlotKind::Ref => "ref",
            SlotKind::Effect => "effect",
            SlotKind::Memo => "memo",
            SlotKind::Context => "context",
            SlotKind::Provider => "provider",
        };
        f.write_str(name)
    }
}

/// One call-order-identified hook slot.
pub(crate) enum HookSlot {
    /// `use_state`: the cell as `Any` for typed access, and as `Flushable`
    /// for disposal.
    State {
        cell: Rc<dyn Any>,
        handle: Rc<dyn Flushable>,
    },
    /// `use_reducer`: the typed dispatcher plus its cell.
    Reducer {
        dispatcher: Rc<dyn Any>,
        handle: Rc<dyn Flushable>,
    },
    Ref(Rc<dyn Any>),
    Effect(EffectSlot),
    Memo(MemoSlot),
    Context(ContextSlot),
    Provider(ContextId),
}

impl HookSlot {
    pub fn kind(&self) -> SlotKind {
        match self {
            HookSlot::State { .. } => SlotKind::State,
            HookSlot::Reducer { .. } => SlotKind::Reducer,
            HookSlot::Ref(_) => SlotKind::Ref,
            HookSlot::Effect(_) => SlotKind::Effect,
            HookSlot::Memo(_) => SlotKind::Memo,
            HookSlot::Context(_) => SlotKind::Context,
            HookSlot::Provider(_) => SlotKind::Provider,
        }
    }
}

impl fmt::Debug for HookSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookSlot::Effect(slot) => fmt::Debug::fmt(slot, f),
            HookSlot::Memo(slot) => fmt::Debug::fmt(slot, f),
            HookSlot::Context(slot) => fmt::Debug::fmt(slot, f),
            other => write!(f, "HookSlot({})", other.kind()),
        }
    }
}

/// Position of an instance for breadth-first ordering: depth first, then
/// the child-index path from the root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct OrderKey {
    pub depth: u32,
    pub path: SmallVec<[u32; 8]>,
}

/// A mounted component instance.
#[derive(Debug)]
pub(crate) struct InstanceRecord {
    pub id: InstanceId,
    pub parent: Option<InstanceId>,
    pub path: SmallVec<[u32; 8]>,
    pub element: Element,
    pub slots: Vec<HookSlot>,
    /// Set after the first successful evaluation; from then on the slot
    /// layout is fixed.
    pub layout_committed: bool,
    pub children: Vec<InstanceId>,
    pub providers: IndexMap<ContextId, ProviderEntry>,
    pub status: InstanceStatus,
    pub evaluations: u64,
    pub content: Option<String>,
}

impl InstanceRecord {
    pub fn new(parent: Option<InstanceId>, path: SmallVec<[u32; 8]>, element: Element) -> Self {
        Self {
            id: InstanceId::new(),
            parent,
            path,
            element,
            slots: Vec::new(),
            layout_committed: false,
            children: Vec::new(),
            providers: IndexMap::new(),
            status: InstanceStatus::Pending,
            evaluations: 0,
            content: None,
        }
    }

    pub fn depth(&self) -> u32 {
        self.path.len() as u32
    }

    pub fn order_key(&self) -> OrderKey {
        OrderKey {
            depth: self.depth(),
            path: self.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ids_are_unique() {
        let id1 = InstanceId::new();
        let id2 = InstanceId::new();
        assert_ne!(id1, id2);
        assert_eq!(id1.to_string(), format!("#{}", id1.raw()));
    }

    #[test]
    fn order_keys_sort_breadth_first() {
        let key = |path: &[u32]| OrderKey {
            depth: path.len() as u32,
            path: path.iter().copied().collect(),
        };
        let mut keys = vec![key(&[0, 0]), key(&[1]), key(&[]), key(&[0]), key(&[0, 1]), key(&[1, 0])];
        keys.sort();
        let paths: Vec<Vec<u32>> = keys.into_iter().map(|k| k.path.to_vec()).collect();
        assert_eq!(
            paths,
            vec![vec![], vec![0], vec![1], vec![0, 0], vec![0, 1], vec![1, 0]]
        );
    }

    #[test]
    fn live_statuses() {
        assert!(InstanceStatus::Pending.is_live());
        assert!(InstanceStatus::Failed.is_live());
        assert!(!InstanceStatus::Faulted.is_live());
        assert!(!InstanceStatus::Detached.is_live());
    }
}
