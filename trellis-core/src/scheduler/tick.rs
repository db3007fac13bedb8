//! Tick Accumulation
//!
//! The tick queue collects the cells that received mutation requests since
//! the last flush and tracks the scheduler phase.
//!
//! # Phases
//!
//! ```text
//! Idle --first request--> Accumulating --context exits--> Flushing --> Idle
//! ```
//!
//! Requests that arrive while `Flushing` are collected into a fresh tick,
//! which the flush loop picks up only after the current tick has finished
//! re-evaluating and reconciling.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::reactive::{CellId, Flushable};

/// Scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No pending work.
    Idle,
    /// At least one request is waiting for the current tick to flush.
    Accumulating,
    /// A flush is in progress.
    Flushing,
}

/// Cells registered with the open tick, plus scheduler bookkeeping.
pub(crate) struct TickQueue {
    phase: Phase,
    /// Nesting depth of execution contexts (`Runtime::batch`).
    depth: usize,
    /// Id of the most recently opened tick.
    tick: u64,
    /// Whether `cells` belongs to a tick that has been opened but not taken.
    open: bool,
    cells: IndexMap<CellId, Rc<dyn Flushable>>,
}

impl TickQueue {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            depth: 0,
            tick: 0,
            open: false,
            cells: IndexMap::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    #[cfg(test)]
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn has_pending(&self) -> bool {
        !self.cells.is_empty()
    }

    /// Whether a tick has been opened and not yet taken.
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn open_tick(&mut self) {
        if !self.open {
            self.open = true;
            self.tick += 1;
            tracing::debug!(tick = self.tick, "tick opened");
        }
    }

    /// Register a cell with the open tick, opening one if needed.
    ///
    /// Idempotent per cell per tick.
    pub fn enqueue(&mut self, cell: Rc<dyn Flushable>) {
        self.open_tick();
        if self.phase == Phase::Idle {
            self.phase = Phase::Accumulating;
        }
        self.cells.entry(cell.cell_id()).or_insert(cell);
    }

    pub fn enter(&mut self) -> usize {
        self.depth += 1;
        self.depth
    }

    pub fn exit(&mut self) -> usize {
        debug_assert!(self.depth > 0, "execution context exited more often than entered");
        self.depth = self.depth.saturating_sub(1);
        self.depth
    }

    /// Enter `Flushing`. Returns false if a flush is already running.
    pub fn begin_flush(&mut self) -> bool {
        if self.phase == Phase::Flushing {
            return false;
        }
        self.phase = Phase::Flushing;
        true
    }

    /// Take the open tick's cells.
    ///
    /// With `force`, a tick is opened even if no cell is registered; mount
    /// uses this for its initial evaluation pass.
    pub fn take_tick(&mut self, force: bool) -> Option<(u64, Vec<Rc<dyn Flushable>>)> {
        debug_assert_eq!(self.phase, Phase::Flushing, "ticks are taken only while flushing");
        if force {
            self.open_tick();
        }
        if !self.open {
            return None;
        }
        self.open = false;
        let cells = std::mem::take(&mut self.cells).into_values().collect();
        Some((self.tick, cells))
    }

    /// Drop every registered cell's pending requests. Returns how many
    /// requests were dropped.
    pub fn discard(&mut self) -> usize {
        self.open = false;
        std::mem::take(&mut self.cells)
            .into_values()
            .map(|cell| cell.discard_pending())
            .sum()
    }

    /// Leave `Flushing`.
    pub fn finish_flush(&mut self) {
        debug_assert_eq!(self.phase, Phase::Flushing);
        self.phase = if self.cells.is_empty() {
            Phase::Idle
        } else {
            Phase::Accumulating
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Equality, StateCell, MutationRequest};
    use crate::tree::InstanceId;

    fn cell() -> Rc<StateCell<i32>> {
        Rc::new(StateCell::new(InstanceId::new(), 0, 0, Equality::never()))
    }

    #[test]
    fn first_request_opens_a_tick() {
        let mut queue = TickQueue::new();
        assert_eq!(queue.phase(), Phase::Idle);

        queue.enqueue(cell());
        assert_eq!(queue.phase(), Phase::Accumulating);
        assert_eq!(queue.tick(), 1);
        assert!(queue.has_pending());
    }

    #[test]
    fn registration_is_idempotent() {
        let mut queue = TickQueue::new();
        let c = cell();
        queue.enqueue(c.clone());
        queue.enqueue(c.clone());
        queue.enqueue(cell());

        assert!(queue.begin_flush());
        let (tick, cells) = queue.take_tick(false).unwrap();
        assert_eq!(tick, 1);
        assert_eq!(cells.len(), 2);
    }

    #[test]
    fn requests_during_flush_open_the_next_tick() {
        let mut queue = TickQueue::new();
        queue.enqueue(cell());
        assert!(queue.begin_flush());
        assert!(!queue.begin_flush());

        let (first, _) = queue.take_tick(false).unwrap();
        assert!(!queue.is_open());
        queue.enqueue(cell());
        assert!(queue.is_open());
        let (second, cells) = queue.take_tick(false).unwrap();
        assert_eq!(second, first + 1);
        assert_eq!(cells.len(), 1);

        assert!(queue.take_tick(false).is_none());
        queue.finish_flush();
        assert_eq!(queue.phase(), Phase::Idle);
    }

    #[test]
    fn forced_tick_without_cells() {
        let mut queue = TickQueue::new();
        queue.begin_flush();
        let (tick, cells) = queue.take_tick(true).unwrap();
        assert_eq!(tick, 1);
        assert!(cells.is_empty());
    }

    #[test]
    fn discard_drops_pending_requests() {
        let mut queue = TickQueue::new();
        let c = cell();
        c.push(MutationRequest::Replace(1));
        c.push(MutationRequest::Replace(2));
        queue.enqueue(c.clone());

        assert_eq!(queue.discard(), 2);
        assert_eq!(c.pending_len(), 0);
        assert!(!queue.has_pending());
    }

    #[test]
    fn context_depth_nests() {
        let mut queue = TickQueue::new();
        assert_eq!(queue.enter(), 1);
        assert_eq!(queue.enter(), 2);
        assert_eq!(queue.exit(), 1);
        assert_eq!(queue.exit(), 0);
        assert_eq!(queue.depth(), 0);
    }
}
