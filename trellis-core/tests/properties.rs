//! Property tests for request folding and dependency comparison.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use trellis_core::reactive::{fold_requests, DepsChange, IntoDeps};
use trellis_core::{
    Component, EqualityMode, MutationRequest, PresentationError, Runtime, Scope, Setter, View,
};

#[derive(Debug, Clone)]
enum Op {
    Set(i64),
    Add(i64),
    Double,
}

impl Op {
    fn request(&self) -> MutationRequest<i64> {
        match *self {
            Op::Set(value) => MutationRequest::Replace(value),
            Op::Add(n) => MutationRequest::Update(Box::new(move |v: i64| v.wrapping_add(n))),
            Op::Double => MutationRequest::Update(Box::new(|v: i64| v.wrapping_mul(2))),
        }
    }

    fn apply(&self, value: i64) -> i64 {
        match *self {
            Op::Set(next) => next,
            Op::Add(n) => value.wrapping_add(n),
            Op::Double => value.wrapping_mul(2),
        }
    }
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-1000i64..1000).prop_map(Op::Set),
        (-1000i64..1000).prop_map(Op::Add),
        Just(Op::Double),
    ]
}

struct Probe {
    setter: Rc<RefCell<Option<Setter<i64>>>>,
    renders: Rc<RefCell<Vec<i64>>>,
}

impl Component for Probe {
    type Props = ();

    fn render(&self, cx: &mut Scope<'_>, _: &()) -> Result<View, PresentationError> {
        let (value, set) = cx.use_state(|| 0i64);
        *self.setter.borrow_mut() = Some(set);
        self.renders.borrow_mut().push(value);
        Ok(View::text(value.to_string()))
    }
}

proptest! {
    #[test]
    fn fold_matches_sequential_application(start in -1000i64..1000, ops in prop::collection::vec(op(), 0..16)) {
        let expected = ops.iter().fold(start, |acc, op| op.apply(acc));
        let folded = fold_requests(start, ops.iter().map(Op::request));
        prop_assert_eq!(folded, expected);
    }

    #[test]
    fn one_handler_commits_its_fold_once(ops in prop::collection::vec(op(), 1..16)) {
        let setter = Rc::new(RefCell::new(None));
        let renders = Rc::new(RefCell::new(Vec::new()));
        let runtime = Runtime::new();
        let root = runtime
            .mount(Probe { setter: setter.clone(), renders: renders.clone() })
            .unwrap();
        let set = setter.borrow().clone().unwrap();

        runtime.batch(|| {
            for op in &ops {
                set.request(op.request());
            }
        });

        let expected = ops.iter().fold(0, |acc, op| op.apply(acc));
        prop_assert_eq!(set.read(), expected);
        let renders = renders.borrow();
        if expected == 0 {
            prop_assert_eq!(renders.len(), 1);
        } else {
            prop_assert_eq!(renders.len(), 2);
            prop_assert_eq!(renders[1], expected);
        }
        let content = expected.to_string();
        let inspected = runtime.inspect(root).unwrap();
        prop_assert_eq!(inspected.content.as_deref(), Some(content.as_str()));
    }

    #[test]
    fn flushing_twice_is_a_noop(ops in prop::collection::vec(op(), 0..8)) {
        let setter = Rc::new(RefCell::new(None));
        let renders = Rc::new(RefCell::new(Vec::new()));
        let runtime = Runtime::new();
        runtime
            .mount(Probe { setter: setter.clone(), renders: renders.clone() })
            .unwrap();
        let set = setter.borrow().clone().unwrap();

        for op in &ops {
            set.request(op.request());
        }
        runtime.flush().unwrap();
        let after_first = renders.borrow().len();

        let report = runtime.flush().unwrap();
        prop_assert!(report.is_noop());
        prop_assert_eq!(renders.borrow().len(), after_first);
    }

    #[test]
    fn equal_dep_lists_are_unchanged(values in prop::collection::vec(any::<i32>(), 0..8)) {
        let next = values.clone().into_deps();
        let previous = values.into_deps();
        prop_assert_eq!(next.compare(&previous, EqualityMode::Same), DepsChange::Unchanged);
    }

    #[test]
    fn any_differing_element_is_a_change(
        values in prop::collection::vec(any::<i32>(), 1..8),
        index in any::<prop::sample::Index>(),
    ) {
        let mut changed = values.clone();
        let at = index.index(changed.len());
        changed[at] = changed[at].wrapping_add(1);
        let next = changed.into_deps();
        let previous = values.into_deps();
        prop_assert_eq!(next.compare(&previous, EqualityMode::Same), DepsChange::Changed);
    }

    #[test]
    fn length_changes_are_reported(a in prop::collection::vec(any::<u8>(), 0..6), b in prop::collection::vec(any::<u8>(), 0..6)) {
        prop_assume!(a.len() != b.len());
        let (previous, current) = (a.len(), b.len());
        let change = b.into_deps().compare(&a.into_deps(), EqualityMode::Same);
        prop_assert_eq!(change, DepsChange::LengthChanged { previous, current });
    }

    #[test]
    fn always_changed_mode_never_matches(values in prop::collection::vec(any::<i32>(), 0..8)) {
        let next = values.clone().into_deps();
        let previous = values.into_deps();
        prop_assert_eq!(next.compare(&previous, EqualityMode::AlwaysChanged), DepsChange::Changed);
    }
}
