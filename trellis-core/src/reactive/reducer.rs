//! Reducer Store
//!
//! A reducer store is a state cell whose requests are actions. The
//! transition function is fixed when the slot is first created and is
//! applied during flush, in dispatch order.
//!
//! # Purity
//!
//! `reduce` must be pure: no cell reads or writes, no effect scheduling, no
//! I/O. The runtime does not enforce this. An impure reducer observes
//! intermediate states that will never be committed and can request
//! mutations that land in a later tick, so the order of observable changes
//! stops matching dispatch order.

use std::fmt;
use std::rc::Rc;

use super::cell::{Setter, StateCell};
use super::equality::Same;

/// A pure `(state, action) -> state` transition.
pub type ReduceFn<S, A> = Rc<dyn Fn(&S, A) -> S>;

/// Handle for dispatching actions into a reducer store.
pub struct Dispatcher<S, A> {
    setter: Setter<S>,
    reduce: ReduceFn<S, A>,
}

impl<S, A> Dispatcher<S, A>
where
    S: Clone + 'static,
    A: 'static,
{
    pub(crate) fn new(setter: Setter<S>, reduce: ReduceFn<S, A>) -> Self {
        Self { setter, reduce }
    }

    /// Queue an action. Equivalent to
    /// `update(move |state| reduce(&state, action))`.
    pub fn dispatch(&self, action: A) {
        let reduce = Rc::clone(&self.reduce);
        self.setter.update(move |state| reduce(&state, action));
    }

    /// The committed state.
    pub fn read(&self) -> S {
        self.setter.read()
    }

    pub fn cell(&self) -> &StateCell<S> {
        self.setter.cell()
    }
}

impl<S, A> Clone for Dispatcher<S, A> {
    fn clone(&self) -> Self {
        Self {
            setter: self.setter.clone(),
            reduce: Rc::clone(&self.reduce),
        }
    }
}

impl<S, A> PartialEq for Dispatcher<S, A> {
    fn eq(&self, other: &Self) -> bool {
        self.setter == other.setter
    }
}

impl<S, A> Same for Dispatcher<S, A> {
    fn same(&self, other: &Self) -> bool {
        self.setter.same(&other.setter)
    }
}

impl<S, A> fmt::Debug for Dispatcher<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("setter", &self.setter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::cell::{FlushOutcome, MutationRequest};
    use crate::reactive::equality::Equality;
    use crate::tree::InstanceId;

    #[derive(Debug, Clone, Copy)]
    enum Action {
        Add(i32),
        Reset,
    }

    fn reduce(state: &i32, action: Action) -> i32 {
        match action {
            Action::Add(n) => state + n,
            Action::Reset => 0,
        }
    }

    #[test]
    fn actions_reduce_in_dispatch_order() {
        let cell = StateCell::new(InstanceId::new(), 0, 10, Equality::<i32>::never());
        let reduce: ReduceFn<i32, Action> = Rc::new(reduce);

        for action in [Action::Add(5), Action::Reset, Action::Add(2)] {
            let reduce = Rc::clone(&reduce);
            cell.push(MutationRequest::Update(Box::new(move |s| reduce(&s, action))));
        }

        assert_eq!(cell.flush_queue(), FlushOutcome::Changed);
        assert_eq!(cell.read(), 2);
    }
}
