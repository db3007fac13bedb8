//! Scheduler
//!
//! The scheduler is the central coordinator that connects cells, effects,
//! contexts and the instance tree. It owns the notion of a tick and performs
//! flushes.
//!
//! # How It Works
//!
//! 1. Handlers run inside an execution context ([`Runtime::batch`], a timer
//!    callback, a resumed continuation). Mutation requests issued there are
//!    queued on their cells, and each cell registers once with the open tick.
//!
//! 2. When the outermost context returns, the tick flushes:
//!    a. Registered cells fold their queues, in tree pre-order of owner.
//!    b. Every owner of a changed cell is re-evaluated once, breadth-first.
//!       Re-evaluated parents push new props to their children; changed
//!       providers schedule their subscribers.
//!    c. Subtrees the parents stopped producing are torn down.
//!    d. Effects of every evaluated instance reconcile, in the same order.
//!
//! 3. Requests issued during steps b-d form the next tick, which flushes
//!    right after, up to `RuntimeConfig::max_chained_ticks` ticks.
//!
//! # Threading
//!
//! The runtime is single-threaded. All handles are `!Send`; asynchronous
//! work is driven through [`AsyncHost`](crate::host::AsyncHost) on a tokio
//! `LocalSet`.

mod flush;
mod tick;

pub use tick::Phase;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use serde::Serialize;

use self::tick::TickQueue;
use crate::boundary::{ErrorBoundary, ErrorReport, LoggingBoundary};
use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::reactive::Flushable;
use crate::tree::{Arena, Element, InstanceId, InstanceStatus};

/// State shared by every handle to one runtime.
pub(crate) struct Shared {
    config: RuntimeConfig,
    ticks: RefCell<TickQueue>,
    arena: RefCell<Arena>,
    boundary: RefCell<Rc<dyn ErrorBoundary>>,
    errors: RefCell<VecDeque<ErrorReport>>,
}

/// Handle to a reactive runtime. Cheap to clone.
#[derive(Clone)]
pub struct Runtime {
    shared: Rc<Shared>,
}

/// Non-owning handle held by setters, so a cell outliving its runtime
/// does not keep the tree alive.
#[derive(Clone)]
pub(crate) struct WeakRuntime {
    shared: Weak<Shared>,
}

impl WeakRuntime {
    /// A handle that never upgrades; requests through it are queued on the
    /// cell but never scheduled.
    pub fn detached() -> Self {
        Self { shared: Weak::new() }
    }

    pub fn upgrade(&self) -> Option<Runtime> {
        self.shared.upgrade().map(|shared| Runtime { shared })
    }

    pub fn enqueue(&self, cell: Rc<dyn Flushable>) {
        match self.shared.upgrade() {
            Some(shared) => shared.ticks.borrow_mut().enqueue(cell),
            None => tracing::debug!("mutation requested after its runtime was dropped"),
        }
    }
}

/// Summary of one call to a flushing operation.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Ticks processed, including chained ones.
    pub ticks: usize,
    pub cells_flushed: usize,
    pub cells_changed: usize,
    /// Instances evaluated, in evaluation order.
    pub evaluated: Vec<InstanceId>,
    /// Instances torn down, in teardown order.
    pub torn_down: Vec<InstanceId>,
    pub effects_run: usize,
    pub cleanups_run: usize,
}

impl FlushReport {
    /// Whether the flush changed nothing observable.
    pub fn is_noop(&self) -> bool {
        self.evaluated.is_empty() && self.torn_down.is_empty() && self.effects_run == 0
    }
}

/// Public view of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceInfo {
    pub id: InstanceId,
    pub name: &'static str,
    pub parent: Option<InstanceId>,
    pub depth: u32,
    pub status: InstanceStatus,
    pub evaluations: u64,
    pub content: Option<String>,
    pub children: Vec<InstanceId>,
}

/// Serializable snapshot of the presentation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSnapshot {
    pub name: &'static str,
    pub status: InstanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ViewSnapshot>,
}

impl ViewSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Depth-first list of every node's content.
    pub fn contents(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_contents(&mut out);
        out
    }

    fn collect_contents(&self, out: &mut Vec<String>) {
        if let Some(content) = &self.content {
            out.push(content.clone());
        }
        for child in &self.children {
            child.collect_contents(out);
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Build a runtime. A `max_chained_ticks` of 0 is raised to 1.
    pub fn with_config(mut config: RuntimeConfig) -> Self {
        if config.max_chained_ticks == 0 {
            tracing::warn!("max_chained_ticks of 0 raised to 1");
            config.max_chained_ticks = 1;
        }
        Self {
            shared: Rc::new(Shared {
                config,
                ticks: RefCell::new(TickQueue::new()),
                arena: RefCell::new(Arena::new()),
                boundary: RefCell::new(Rc::new(LoggingBoundary)),
                errors: RefCell::new(VecDeque::new()),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    /// Replace the error boundary.
    pub fn set_error_boundary<B>(&self, boundary: B)
    where
        B: ErrorBoundary + 'static,
    {
        *self.shared.boundary.borrow_mut() = Rc::new(boundary);
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            shared: Rc::downgrade(&self.shared),
        }
    }

    /// Run `f` with the arena borrowed. `f` must not call user code.
    pub(crate) fn with_arena<R>(&self, f: impl FnOnce(&mut Arena) -> R) -> R {
        f(&mut self.shared.arena.borrow_mut())
    }

    pub fn phase(&self) -> Phase {
        self.shared.ticks.borrow().phase()
    }

    /// Id of the most recently opened tick.
    pub fn tick(&self) -> u64 {
        self.shared.ticks.borrow().tick()
    }

    /// Whether requests are waiting for a flush.
    pub fn has_pending(&self) -> bool {
        self.shared.ticks.borrow().has_pending()
    }

    /// Run `f` as one execution context.
    ///
    /// Requests issued inside `f` accumulate; when the outermost context
    /// returns, the tick flushes. Errors that stop the flush itself (such as
    /// [`RuntimeError::TickLimitExceeded`]) go to the error boundary.
    pub fn batch<T>(&self, f: impl FnOnce() -> T) -> T {
        struct Context<'a>(&'a Runtime);

        impl Drop for Context<'_> {
            fn drop(&mut self) {
                let depth = self.0.shared.ticks.borrow_mut().exit();
                if depth == 0 && !std::thread::panicking() {
                    if let Err(error) = self.0.flush() {
                        self.0.report(error);
                    }
                }
            }
        }

        self.shared.ticks.borrow_mut().enter();
        let _context = Context(self);
        f()
    }

    /// Flush the open tick, and every tick it chains.
    ///
    /// Called from inside a flush this is a no-op: the running flush picks
    /// up the new requests once the current tick concludes.
    pub fn flush(&self) -> Result<FlushReport> {
        self.drive(Vec::new())
    }

    /// Mount `element` as the root, replacing any mounted tree.
    ///
    /// The initial evaluation and effect pass run as one flush. If that
    /// flush fails, the new tree is torn down again before the error is
    /// returned.
    pub fn mount(&self, element: impl Into<Element>) -> Result<InstanceId> {
        if self.phase() == Phase::Flushing {
            return Err(RuntimeError::Busy);
        }
        if self.root().is_some() {
            self.unmount()?;
        }
        let root = self.shared.arena.borrow_mut().insert_root(element.into());
        tracing::debug!(%root, "mounting root");
        if let Err(error) = self.drive(vec![root]) {
            tracing::warn!(%root, %error, "initial flush failed; unmounting");
            self.teardown(&[root], &mut FlushReport::default());
            return Err(error);
        }
        Ok(root)
    }

    /// Tear down the whole tree. Cleanups run top-down, in declaration
    /// order within each instance.
    pub fn unmount(&self) -> Result<FlushReport> {
        if self.phase() == Phase::Flushing {
            return Err(RuntimeError::Busy);
        }
        let root = self.root().ok_or(RuntimeError::NotMounted)?;
        let mut report = FlushReport::default();
        self.teardown(&[root], &mut report);
        Ok(report)
    }

    pub fn root(&self) -> Option<InstanceId> {
        self.shared.arena.borrow().root()
    }

    pub fn instance_count(&self) -> usize {
        self.shared.arena.borrow().len()
    }

    pub fn inspect(&self, id: InstanceId) -> Option<InstanceInfo> {
        let arena = self.shared.arena.borrow();
        let record = arena.get(id)?;
        Some(InstanceInfo {
            id,
            name: record.element.name(),
            parent: record.parent,
            depth: record.depth(),
            status: record.status,
            evaluations: record.evaluations,
            content: record.content.clone(),
            children: record.children.clone(),
        })
    }

    /// Snapshot the mounted tree.
    pub fn snapshot(&self) -> Option<ViewSnapshot> {
        let arena = self.shared.arena.borrow();
        fn build(arena: &Arena, id: InstanceId) -> Option<ViewSnapshot> {
            let record = arena.get(id)?;
            Some(ViewSnapshot {
                name: record.element.name(),
                status: record.status,
                content: record.content.clone(),
                children: record
                    .children
                    .iter()
                    .filter_map(|&child| build(arena, child))
                    .collect(),
            })
        }
        build(&arena, arena.root()?)
    }

    /// Drain the errors reported since the last call, oldest first. At most
    /// `RuntimeConfig::error_capacity` are kept.
    pub fn take_errors(&self) -> Vec<ErrorReport> {
        self.shared.errors.borrow_mut().drain(..).collect()
    }

    /// Deliver an error to the boundary and record it.
    pub(crate) fn report(&self, error: RuntimeError) {
        let report = ErrorReport {
            tick: self.tick(),
            error,
        };
        let boundary = Rc::clone(&*self.shared.boundary.borrow());
        boundary.report(&report);

        let capacity = self.shared.config.error_capacity;
        if capacity == 0 {
            return;
        }
        let mut errors = self.shared.errors.borrow_mut();
        if errors.len() >= capacity {
            errors.pop_front();
            tracing::warn!(capacity, "error log full; oldest report dropped");
        }
        errors.push_back(report);
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("phase", &self.phase())
            .field("tick", &self.tick())
            .field("instances", &self.instance_count())
            .finish()
    }
}
