//! Hook Scope
//!
//! A [`Scope`] is handed to a component's `render` for the duration of one
//! evaluation. Every hook call claims the next slot of the instance; the
//! n-th call of one evaluation always refers to the same slot as the n-th
//! call of the previous evaluation.
//!
//! # Slot Layout
//!
//! The layout is fixed by the first successful evaluation. Afterwards a
//! hook that finds a slot of another kind, a value of another type, or a
//! slot past the end of the layout is a violation. The evaluation still
//! completes: every hook called after the violation gets a detached value
//! (a cell nobody flushes, a fresh ref, an effect that never runs), and the
//! instance is faulted once `render` returns.

use std::any::Any;
use std::rc::Rc;

use crate::error::SlotViolation;
use crate::reactive::{
    ContextId, ContextKey, ContextSlot, Deps, Dispatcher, EffectSlot, Equality, Flushable, IntoDeps,
    IntoEffectResult, MemoSlot, MutRef, Same, Setter, StateCell,
};
use crate::scheduler::{Runtime, WeakRuntime};
use crate::tree::{HookSlot, InstanceId, SlotKind};

/// A value staged by `provide`, applied when the evaluation succeeds.
pub(crate) struct Provided {
    pub context: ContextId,
    pub value: Rc<dyn Any>,
    pub changed: bool,
}

/// What an evaluation left behind for the scheduler.
pub(crate) struct ScopeOutcome {
    pub violation: Option<(usize, SlotViolation)>,
    pub provided: Vec<Provided>,
}

enum Claim {
    Existing(usize),
    Fresh(usize),
    Violated,
}

/// Hook access for one evaluation of one instance.
pub struct Scope<'a> {
    runtime: &'a Runtime,
    instance: InstanceId,
    slots: &'a mut Vec<HookSlot>,
    committed: bool,
    cursor: usize,
    violation: Option<(usize, SlotViolation)>,
    provided: Vec<Provided>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(
        runtime: &'a Runtime,
        instance: InstanceId,
        slots: &'a mut Vec<HookSlot>,
        committed: bool,
    ) -> Self {
        Self {
            runtime,
            instance,
            slots,
            committed,
            cursor: 0,
            violation: None,
            provided: Vec::new(),
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance
    }

    pub fn runtime(&self) -> &Runtime {
        self.runtime
    }

    /// Close the evaluation. The hook count is only checked when `render`
    /// succeeded, since a failing render may return early.
    pub(crate) fn finish(mut self, rendered: bool) -> ScopeOutcome {
        if rendered && self.committed && self.violation.is_none() && self.cursor != self.slots.len() {
            self.violation = Some((
                self.cursor,
                SlotViolation::CountChanged {
                    previous: self.slots.len(),
                    current: self.cursor,
                },
            ));
        }
        ScopeOutcome {
            violation: self.violation,
            provided: self.provided,
        }
    }

    fn violate(&mut self, slot: usize, violation: SlotViolation) {
        tracing::debug!(instance = %self.instance, slot, %violation, "hook slot violation");
        self.violation.get_or_insert((slot, violation));
    }

    fn claim(&mut self, kind: SlotKind) -> Claim {
        if self.violation.is_some() {
            return Claim::Violated;
        }
        let index = self.cursor;
        self.cursor += 1;

        match self.slots.get(index) {
            Some(slot) if slot.kind() == kind => Claim::Existing(index),
            Some(slot) => {
                let expected = slot.kind();
                self.violate(index, SlotViolation::KindChanged { expected, found: kind });
                Claim::Violated
            }
            None if self.committed => {
                let previous = self.slots.len();
                self.violate(
                    index,
                    SlotViolation::CountChanged {
                        previous,
                        current: index + 1,
                    },
                );
                Claim::Violated
            }
            None => Claim::Fresh(index),
        }
    }

    fn weak(&self) -> WeakRuntime {
        self.runtime.downgrade()
    }

    /// A state cell compared with the runtime's default policy.
    pub fn use_state<V, F>(&mut self, init: F) -> (V, Setter<V>)
    where
        V: Clone + Same + 'static,
        F: FnOnce() -> V,
    {
        let mode = self.runtime.config().equality;
        self.use_state_with(init, Equality::for_mode(mode))
    }

    /// A state cell with an explicit equality policy. The policy given on
    /// the first evaluation sticks.
    pub fn use_state_with<V, F>(&mut self, init: F, equality: Equality<V>) -> (V, Setter<V>)
    where
        V: Clone + 'static,
        F: FnOnce() -> V,
    {
        let cell = match self.claim(SlotKind::State) {
            Claim::Existing(index) => {
                let cell = match &self.slots[index] {
                    HookSlot::State { cell, .. } => Rc::clone(cell).downcast::<StateCell<V>>().ok(),
                    _ => None,
                };
                if cell.is_none() {
                    self.violate(index, SlotViolation::TypeChanged { kind: SlotKind::State });
                }
                cell
            }
            Claim::Fresh(index) => {
                let cell = Rc::new(StateCell::new(self.instance, index, init(), equality));
                self.slots.push(HookSlot::State {
                    cell: cell.clone(),
                    handle: cell.clone(),
                });
                return (cell.read(), Setter::new(cell, self.weak()));
            }
            Claim::Violated => None,
        };

        match cell {
            Some(cell) => (cell.read(), Setter::new(cell, self.weak())),
            None => {
                let value = init();
                let cell = Rc::new(StateCell::new(self.instance, self.cursor, value.clone(), equality));
                cell.dispose();
                (value, Setter::new(cell, WeakRuntime::detached()))
            }
        }
    }

    /// A reducer store. `reduce` is fixed by the first evaluation.
    pub fn use_reducer<S, A, R, F>(&mut self, reduce: R, init: F) -> (S, Dispatcher<S, A>)
    where
        S: Clone + Same + 'static,
        A: 'static,
        R: Fn(&S, A) -> S + 'static,
        F: FnOnce() -> S,
    {
        let mode = self.runtime.config().equality;
        match self.claim(SlotKind::Reducer) {
            Claim::Existing(index) => {
                if let HookSlot::Reducer { dispatcher, .. } = &self.slots[index] {
                    if let Some(dispatcher) = dispatcher.downcast_ref::<Dispatcher<S, A>>() {
                        return (dispatcher.read(), dispatcher.clone());
                    }
                }
                self.violate(index, SlotViolation::TypeChanged { kind: SlotKind::Reducer });
            }
            Claim::Fresh(index) => {
                let cell = Rc::new(StateCell::new(self.instance, index, init(), Equality::for_mode(mode)));
                let dispatcher = Dispatcher::new(Setter::new(cell.clone(), self.weak()), Rc::new(reduce));
                self.slots.push(HookSlot::Reducer {
                    dispatcher: Rc::new(dispatcher.clone()),
                    handle: cell,
                });
                return (dispatcher.read(), dispatcher);
            }
            Claim::Violated => {}
        }

        let value = init();
        let cell = Rc::new(StateCell::new(self.instance, self.cursor, value.clone(), Equality::for_mode(mode)));
        cell.dispose();
        let dispatcher = Dispatcher::new(Setter::new(cell, WeakRuntime::detached()), Rc::new(reduce));
        (value, dispatcher)
    }

    /// A mutable box that persists across evaluations and never schedules.
    pub fn use_ref<T, F>(&mut self, init: F) -> MutRef<T>
    where
        T: 'static,
        F: FnOnce() -> T,
    {
        match self.claim(SlotKind::Ref) {
            Claim::Existing(index) => {
                if let HookSlot::Ref(value) = &self.slots[index] {
                    if let Some(value) = value.downcast_ref::<MutRef<T>>() {
                        return value.clone();
                    }
                }
                self.violate(index, SlotViolation::TypeChanged { kind: SlotKind::Ref });
                MutRef::new(init())
            }
            Claim::Fresh(_) => {
                let value = MutRef::new(init());
                self.slots.push(HookSlot::Ref(Rc::new(value.clone())));
                value
            }
            Claim::Violated => MutRef::new(init()),
        }
    }

    /// Register an effect keyed by `deps`.
    ///
    /// The body runs after the flush's render phase, the first time and
    /// whenever any dependency is no longer the same. Its cleanup runs
    /// before the next body and on teardown.
    pub fn use_effect<D, F, R>(&mut self, deps: D, body: F)
    where
        D: IntoDeps,
        F: FnOnce() -> R + 'static,
        R: IntoEffectResult,
    {
        self.register_effect(Some(deps.into_deps()), body);
    }

    /// Register an effect that runs after every evaluation.
    pub fn use_effect_always<F, R>(&mut self, body: F)
    where
        F: FnOnce() -> R + 'static,
        R: IntoEffectResult,
    {
        self.register_effect(None, body);
    }

    fn register_effect<F, R>(&mut self, deps: Option<Deps>, body: F)
    where
        F: FnOnce() -> R + 'static,
        R: IntoEffectResult,
    {
        let body = Box::new(move || body().into_effect_result());
        match self.claim(SlotKind::Effect) {
            Claim::Existing(index) => match &mut self.slots[index] {
                HookSlot::Effect(slot) => slot.stage(deps, body),
                _ => self.violate(index, SlotViolation::TypeChanged { kind: SlotKind::Effect }),
            },
            Claim::Fresh(index) => {
                let mut slot = EffectSlot::new(index);
                slot.stage(deps, body);
                self.slots.push(HookSlot::Effect(slot));
            }
            Claim::Violated => {}
        }
    }

    /// A value derived during evaluation, recomputed only when `deps` change.
    pub fn use_memo<T, D, F>(&mut self, deps: D, compute: F) -> Rc<T>
    where
        T: 'static,
        D: IntoDeps,
        F: FnOnce() -> T,
    {
        let mode = self.runtime.config().equality;
        match self.claim(SlotKind::Memo) {
            Claim::Existing(index) => {
                let refreshed = match &mut self.slots[index] {
                    HookSlot::Memo(slot) => slot.refresh(deps.into_deps(), mode, compute),
                    _ => Err(compute),
                };
                match refreshed {
                    Ok(value) => value,
                    Err(compute) => {
                        self.violate(index, SlotViolation::TypeChanged { kind: SlotKind::Memo });
                        Rc::new(compute())
                    }
                }
            }
            Claim::Fresh(_) => {
                let value = Rc::new(compute());
                self.slots.push(HookSlot::Memo(MemoSlot::new(deps.into_deps(), value.clone())));
                value
            }
            Claim::Violated => Rc::new(compute()),
        }
    }

    /// Read the nearest ancestor's value for `key`, or its default.
    ///
    /// The instance is subscribed: when that provider later provides a value
    /// that is not the same, the instance re-evaluates in the same flush.
    pub fn use_context<T>(&mut self, key: &ContextKey<T>) -> T
    where
        T: Same + Clone + 'static,
    {
        let context = key.id();
        let instance = self.instance;
        let provider = self.runtime.with_arena(|arena| arena.find_provider(instance, context));

        let subscribe = match self.claim(SlotKind::Context) {
            Claim::Existing(index) => match &mut self.slots[index] {
                HookSlot::Context(slot) if slot.context == context => {
                    let previous = slot.provider;
                    slot.provider = provider;
                    if let Some(previous) = previous.filter(|&previous| Some(previous) != provider) {
                        self.runtime.with_arena(|arena| {
                            if let Some(entry) = arena
                                .get_mut(previous)
                                .and_then(|record| record.providers.get_mut(&context))
                            {
                                entry.unsubscribe(instance);
                            }
                        });
                    }
                    true
                }
                _ => {
                    self.violate(index, SlotViolation::ContextChanged);
                    false
                }
            },
            Claim::Fresh(_) => {
                self.slots.push(HookSlot::Context(ContextSlot { context, provider }));
                true
            }
            Claim::Violated => false,
        };

        let Some(provider) = provider else {
            return key.default_value();
        };
        self.runtime
            .with_arena(|arena| {
                let entry = arena.get_mut(provider)?.providers.get_mut(&context)?;
                if subscribe {
                    entry.subscribe(instance);
                }
                entry.value::<T>()
            })
            .unwrap_or_else(|| key.default_value())
    }

    /// Provide `value` for `key` to this instance's descendants.
    ///
    /// The value is installed when the evaluation succeeds. The instance
    /// itself keeps seeing the value from its own ancestors.
    pub fn provide<T>(&mut self, key: &ContextKey<T>, value: T)
    where
        T: Same + Clone + 'static,
    {
        let context = key.id();
        match self.claim(SlotKind::Provider) {
            Claim::Existing(index) => {
                if let HookSlot::Provider(installed) = self.slots[index] {
                    if installed != context {
                        self.violate(index, SlotViolation::ContextChanged);
                        return;
                    }
                }
            }
            Claim::Fresh(_) => self.slots.push(HookSlot::Provider(context)),
            Claim::Violated => return,
        }

        let mode = self.runtime.config().equality;
        let instance = self.instance;
        let changed = self.runtime.with_arena(|arena| {
            arena
                .get(instance)
                .and_then(|record| record.providers.get(&context))
                .map_or(true, |entry| entry.changed_by(&value, mode))
        });
        self.provided.push(Provided {
            context,
            value: Rc::new(value),
            changed,
        });
    }
}
