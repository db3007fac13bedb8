//! Effect Table
//!
//! Effects synchronize committed state with the outside world. Each
//! `use_effect` call owns one slot in its instance's hook list, identified
//! by call order.
//!
//! # How Effects Work
//!
//! 1. During evaluation, `use_effect(deps, body)` stages a registration on
//!    its slot. Nothing runs yet.
//!
//! 2. After every re-evaluation of the flush is done, the scheduler walks
//!    the re-evaluated instances top-down and reconciles their slots in
//!    declaration order.
//!
//! 3. A slot whose dependencies changed (or that never ran) is stale: its
//!    previous cleanup runs, then the new body runs, and the body's return
//!    value becomes the next cleanup.
//!
//! 4. On teardown every slot's last cleanup runs exactly once, in
//!    declaration order.
//!
//! # Failures
//!
//! A body that returns `Err` installs no cleanup. The previous cleanup has
//! already run at that point. The error is reported and the remaining slots
//! keep reconciling.

use std::error::Error;
use std::fmt;

use super::deps::{Deps, DepsChange};
use super::equality::EqualityMode;

/// Error type returned by failing effect bodies.
pub type BoxError = Box<dyn Error + 'static>;

/// What an effect body produced.
pub type EffectResult = Result<Option<Cleanup>, BoxError>;

pub(crate) type EffectBody = Box<dyn FnOnce() -> EffectResult>;

/// A cleanup function returned by an effect body.
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    pub fn new<F>(cleanup: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self(Box::new(cleanup))
    }

    pub fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup(..)")
    }
}

/// Values an effect body may return.
///
/// `()` means no cleanup. `Cleanup` and `Option<Cleanup>` install one.
/// `Result<T, E>` reports `E` as an effect failure.
pub trait IntoEffectResult {
    fn into_effect_result(self) -> EffectResult;
}

impl IntoEffectResult for () {
    fn into_effect_result(self) -> EffectResult {
        Ok(None)
    }
}

impl IntoEffectResult for Cleanup {
    fn into_effect_result(self) -> EffectResult {
        Ok(Some(self))
    }
}

impl IntoEffectResult for Option<Cleanup> {
    fn into_effect_result(self) -> EffectResult {
        Ok(self)
    }
}

impl<T, E> IntoEffectResult for Result<T, E>
where
    T: IntoEffectResult,
    E: Into<BoxError>,
{
    fn into_effect_result(self) -> EffectResult {
        self.map_err(Into::into)
            .and_then(IntoEffectResult::into_effect_result)
    }
}

/// Registration staged during the current evaluation.
struct Staged {
    deps: Option<Deps>,
    body: EffectBody,
}

/// One effect slot in an instance's hook list.
pub(crate) struct EffectSlot {
    index: usize,
    /// Dependencies of the last reconciled pass. `None` runs every pass.
    deps: Option<Deps>,
    last_cleanup: Option<Cleanup>,
    has_run_before: bool,
    staged: Option<Staged>,
}

/// A stale slot's work, taken out of the table so it can run without any
/// runtime borrow held.
pub(crate) struct EffectWork {
    pub index: usize,
    pub cleanup: Option<Cleanup>,
    pub body: EffectBody,
    pub length_change: Option<(usize, usize)>,
}

impl EffectSlot {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            deps: None,
            last_cleanup: None,
            has_run_before: false,
            staged: None,
        }
    }

    /// Stage this evaluation's registration, replacing any earlier one.
    pub fn stage(&mut self, deps: Option<Deps>, body: EffectBody) {
        self.staged = Some(Staged { deps, body });
    }

    /// Drop a staged registration without reconciling it.
    pub fn clear_staged(&mut self) {
        self.staged = None;
    }

    #[cfg(test)]
    pub fn has_run_before(&self) -> bool {
        self.has_run_before
    }

    /// Decide whether the staged registration is stale.
    ///
    /// Returns the work to perform if it is. Either way the staged
    /// dependencies become the slot's dependencies.
    pub fn take_work(&mut self, mode: EqualityMode) -> Option<EffectWork> {
        let Staged { deps, body } = self.staged.take()?;

        let mut length_change = None;
        let stale = if !self.has_run_before {
            true
        } else {
            match (&deps, &self.deps) {
                (Some(next), Some(previous)) => match next.compare(previous, mode) {
                    DepsChange::Unchanged => false,
                    DepsChange::Changed => true,
                    DepsChange::LengthChanged { previous, current } => {
                        length_change = Some((previous, current));
                        true
                    }
                },
                (None, None) => true,
                (Some(next), None) => {
                    length_change = Some((0, next.len()));
                    true
                }
                (None, Some(previous)) => {
                    length_change = Some((previous.len(), 0));
                    true
                }
            }
        };

        self.deps = deps;
        if !stale {
            return None;
        }

        self.has_run_before = true;
        Some(EffectWork {
            index: self.index,
            cleanup: self.last_cleanup.take(),
            body,
            length_change,
        })
    }

    /// Install the cleanup returned by a body that just ran.
    pub fn install(&mut self, cleanup: Option<Cleanup>) {
        debug_assert!(
            self.last_cleanup.is_none(),
            "effect slot {} installed a cleanup over an unrun one",
            self.index
        );
        self.last_cleanup = cleanup;
    }

    /// Remove the last cleanup for teardown.
    pub fn take_cleanup(&mut self) -> Option<Cleanup> {
        self.staged = None;
        self.last_cleanup.take()
    }
}

impl fmt::Debug for EffectSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectSlot")
            .field("index", &self.index)
            .field("deps", &self.deps)
            .field("has_cleanup", &self.last_cleanup.is_some())
            .field("has_run_before", &self.has_run_before)
            .field("staged", &self.staged.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::deps::IntoDeps;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn body(log: &Log, room: &'static str) -> EffectBody {
        let log = log.clone();
        Box::new(move || {
            log.borrow_mut().push(format!("connect {room}"));
            let log = log.clone();
            Ok(Some(Cleanup::new(move || {
                log.borrow_mut().push(format!("disconnect {room}"));
            })))
        })
    }

    /// Run one reconciliation pass the way the scheduler does.
    fn pass(slot: &mut EffectSlot, deps: Option<Deps>, body: EffectBody) -> bool {
        slot.stage(deps, body);
        match slot.take_work(EqualityMode::Same) {
            Some(work) => {
                if let Some(cleanup) = work.cleanup {
                    cleanup.run();
                }
                let cleanup = (work.body)().ok().flatten();
                slot.install(cleanup);
                true
            }
            None => false,
        }
    }

    #[test]
    fn room_scenario() {
        let log: Log = Rc::default();
        let mut slot = EffectSlot::new(0);

        assert!(!slot.has_run_before());
        assert!(pass(&mut slot, Some(("a",).into_deps()), body(&log, "a")));
        assert!(slot.has_run_before());
        assert!(!pass(&mut slot, Some(("a",).into_deps()), body(&log, "a")));
        assert!(pass(&mut slot, Some(("b",).into_deps()), body(&log, "b")));

        assert_eq!(
            *log.borrow(),
            vec!["connect a", "disconnect a", "connect b"]
        );

        slot.take_cleanup().unwrap().run();
        assert_eq!(log.borrow().last().unwrap(), "disconnect b");
    }

    #[test]
    fn empty_deps_run_once() {
        let log: Log = Rc::default();
        let mut slot = EffectSlot::new(0);
        assert!(pass(&mut slot, Some(Deps::new()), body(&log, "x")));
        assert!(!pass(&mut slot, Some(Deps::new()), body(&log, "x")));
        assert!(!pass(&mut slot, Some(Deps::new()), body(&log, "x")));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn missing_deps_run_every_pass() {
        let log: Log = Rc::default();
        let mut slot = EffectSlot::new(0);
        assert!(pass(&mut slot, None, body(&log, "x")));
        assert!(pass(&mut slot, None, body(&log, "x")));
        assert_eq!(
            *log.borrow(),
            vec!["connect x", "disconnect x", "connect x"]
        );
    }

    #[test]
    fn length_change_is_stale_and_flagged() {
        let log: Log = Rc::default();
        let mut slot = EffectSlot::new(3);
        pass(&mut slot, Some((1u8,).into_deps()), body(&log, "x"));

        slot.stage(Some((1u8, 2u8).into_deps()), body(&log, "y"));
        let work = slot.take_work(EqualityMode::Same).unwrap();
        assert_eq!(work.index, 3);
        assert_eq!(work.length_change, Some((1, 2)));
        assert!(work.cleanup.is_some());
    }

    #[test]
    fn failing_body_installs_no_cleanup() {
        let mut slot = EffectSlot::new(0);
        slot.stage(
            Some(Deps::new()),
            Box::new(|| Err::<Option<Cleanup>, _>("boom").into_effect_result()),
        );
        let work = slot.take_work(EqualityMode::Same).unwrap();
        let result = (work.body)();
        assert_eq!(result.unwrap_err().to_string(), "boom");
        assert!(slot.take_cleanup().is_none());
    }

    #[test]
    fn into_effect_result_conversions() {
        assert!(().into_effect_result().unwrap().is_none());
        assert!(Cleanup::new(|| {}).into_effect_result().unwrap().is_some());
        assert!(Ok::<(), String>(()).into_effect_result().unwrap().is_none());
        assert!(Err::<(), _>("nope").into_effect_result().is_err());
    }
}
