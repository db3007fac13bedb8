//! State Cell Implementation
//!
//! A `StateCell` is the reactive storage behind `use_state`. It holds the
//! committed value and a queue of mutation requests that accumulate during
//! a tick.
//!
//! # How Cells Work
//!
//! 1. Handlers call [`Setter::set`] or [`Setter::update`]. The request is
//!    appended to the cell's pending queue and the cell registers itself with
//!    the scheduler's open tick. Registration is idempotent: one cell appears
//!    once per tick no matter how many requests it receives.
//!
//! 2. Reads return the committed value. A handler that sets a value and then
//!    reads it back sees the old value until the tick flushes.
//!
//! 3. At flush time the queue is folded left over the committed value.
//!    An updater receives the accumulated value; a replacement resets the
//!    accumulator, so `[set 1, +1, set 42, +1]` yields `43`.
//!
//! 4. If the folded value equals the committed one under the cell's
//!    equality policy, nothing is committed and the owner is not
//!    re-evaluated.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::equality::{Equality, Same};
use crate::scheduler::WeakRuntime;
use crate::tree::InstanceId;

/// Counter for generating unique cell IDs.
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique cell ID.
fn next_cell_id() -> CellId {
    CellId(CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Unique identifier for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

/// A queued mutation: a replacement value or an updater function.
pub enum MutationRequest<V> {
    Replace(V),
    Update(Box<dyn FnOnce(V) -> V>),
}

impl<V> MutationRequest<V> {
    /// Apply this request to the accumulated value.
    pub fn apply(self, acc: V) -> V {
        match self {
            MutationRequest::Replace(value) => value,
            MutationRequest::Update(update) => update(acc),
        }
    }
}

impl<V> fmt::Debug for MutationRequest<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationRequest::Replace(_) => f.write_str("Replace(..)"),
            MutationRequest::Update(_) => f.write_str("Update(..)"),
        }
    }
}

/// Left-fold a request queue over the committed value.
pub fn fold_requests<V, I>(committed: V, requests: I) -> V
where
    I: IntoIterator<Item = MutationRequest<V>>,
{
    requests
        .into_iter()
        .fold(committed, |acc, request| request.apply(acc))
}

/// Result of flushing one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Changed,
    Unchanged,
}

/// What happened to a request handed to [`StateCell::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pushed {
    /// First request since the last flush; the cell must join the tick.
    First,
    /// Appended behind requests already registered with the tick.
    Queued,
    /// The cell is disposed; the request was discarded.
    Dropped,
}

struct CellInner<V> {
    committed: V,
    pending: VecDeque<MutationRequest<V>>,
    disposed: bool,
}

/// Reactive storage for one state slot.
pub struct StateCell<V> {
    id: CellId,
    owner: InstanceId,
    slot: usize,
    equality: Equality<V>,
    inner: RefCell<CellInner<V>>,
}

impl<V> StateCell<V>
where
    V: Clone + 'static,
{
    pub(crate) fn new(owner: InstanceId, slot: usize, value: V, equality: Equality<V>) -> Self {
        Self {
            id: next_cell_id(),
            owner,
            slot,
            equality,
            inner: RefCell::new(CellInner {
                committed: value,
                pending: VecDeque::new(),
                disposed: false,
            }),
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn owner(&self) -> InstanceId {
        self.owner
    }

    /// Return the committed value. Pending requests are not visible.
    pub fn read(&self) -> V {
        self.inner.borrow().committed.clone()
    }

    /// Number of requests waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    pub(crate) fn push(&self, request: MutationRequest<V>) -> Pushed {
        let mut inner = self.inner.borrow_mut();
        if inner.disposed {
            return Pushed::Dropped;
        }
        inner.pending.push_back(request);
        if inner.pending.len() == 1 {
            Pushed::First
        } else {
            Pushed::Queued
        }
    }

    /// Drain the queue and commit the folded value if it changed.
    ///
    /// Updaters run with no borrow held, so an updater that (against its
    /// contract) requests another mutation lands in the next tick instead of
    /// panicking.
    pub(crate) fn flush_queue(&self) -> FlushOutcome {
        let (committed, queue) = {
            let mut inner = self.inner.borrow_mut();
            if inner.pending.is_empty() {
                return FlushOutcome::Unchanged;
            }
            (inner.committed.clone(), mem::take(&mut inner.pending))
        };

        let next = fold_requests(committed, queue);

        let mut inner = self.inner.borrow_mut();
        if self.equality.eq(&inner.committed, &next) {
            FlushOutcome::Unchanged
        } else {
            inner.committed = next;
            FlushOutcome::Changed
        }
    }
}

/// Type-erased view of a cell used by the scheduler.
pub(crate) trait Flushable {
    fn cell_id(&self) -> CellId;
    fn owner(&self) -> InstanceId;
    fn slot(&self) -> usize;
    fn flush(&self) -> FlushOutcome;
    fn discard_pending(&self) -> usize;
    fn dispose(&self);
}

impl<V> Flushable for StateCell<V>
where
    V: Clone + 'static,
{
    fn cell_id(&self) -> CellId {
        self.id
    }

    fn owner(&self) -> InstanceId {
        self.owner
    }

    fn slot(&self) -> usize {
        self.slot
    }

    fn flush(&self) -> FlushOutcome {
        self.flush_queue()
    }

    fn discard_pending(&self) -> usize {
        let mut inner = self.inner.borrow_mut();
        let dropped = inner.pending.len();
        inner.pending.clear();
        dropped
    }

    fn dispose(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.disposed = true;
        inner.pending.clear();
    }
}

/// Handle for requesting mutations of a cell.
///
/// Setters are cheap to clone and compare by identity, so they can be passed
/// as props or listed as effect dependencies.
pub struct Setter<V> {
    cell: Rc<StateCell<V>>,
    runtime: WeakRuntime,
}

impl<V> Setter<V>
where
    V: Clone + 'static,
{
    pub(crate) fn new(cell: Rc<StateCell<V>>, runtime: WeakRuntime) -> Self {
        Self { cell, runtime }
    }

    /// Queue a replacement value.
    pub fn set(&self, value: V) {
        self.request(MutationRequest::Replace(value));
    }

    /// Queue an updater that receives the accumulated value.
    pub fn update<F>(&self, update: F)
    where
        F: FnOnce(V) -> V + 'static,
    {
        self.request(MutationRequest::Update(Box::new(update)));
    }

    /// Queue a request and register the cell with the open tick.
    ///
    /// Returns immediately; nothing is applied until the tick flushes.
    pub fn request(&self, request: MutationRequest<V>) {
        match self.cell.push(request) {
            Pushed::First => {
                tracing::trace!(cell = ?self.cell.id, owner = %self.cell.owner, "mutation requested");
                self.runtime.enqueue(self.cell.clone());
            }
            Pushed::Queued => {
                tracing::trace!(cell = ?self.cell.id, owner = %self.cell.owner, "mutation coalesced");
            }
            Pushed::Dropped => {
                tracing::warn!(
                    cell = ?self.cell.id,
                    owner = %self.cell.owner,
                    "mutation requested on a disposed cell; dropped"
                );
            }
        }
    }

    /// The committed value of the underlying cell.
    pub fn read(&self) -> V {
        self.cell.read()
    }

    pub fn cell(&self) -> &StateCell<V> {
        &self.cell
    }
}

impl<V> Clone for Setter<V> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            runtime: self.runtime.clone(),
        }
    }
}

impl<V> PartialEq for Setter<V> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<V> Same for Setter<V> {
    fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<V> fmt::Debug for Setter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter")
            .field("cell", &self.cell.id)
            .field("owner", &self.cell.owner)
            .finish()
    }
}
