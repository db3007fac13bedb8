//! Dependency Lists
//!
//! Effects and memos are keyed by an ordered list of values. On every
//! evaluation the new list is compared element-wise against the list from
//! the previous evaluation of the same slot.
//!
//! Values are type-erased so one list can mix types: `(room_id, retries)`
//! becomes a `Deps` holding a `String` and a `u32`. Two elements at the same
//! position with different types are never the same.

use std::any::Any;
use std::fmt;

use smallvec::SmallVec;

use super::equality::{EqualityMode, Same};

/// A single dependency value.
pub trait DepValue: Any {
    /// Compare against another dependency at the same position.
    fn same_dep(&self, other: &dyn DepValue) -> bool;

    fn as_any(&self) -> &dyn Any;
}

impl<T: Same + 'static> DepValue for T {
    fn same_dep(&self, other: &dyn DepValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self.same(other))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An ordered dependency list.
#[derive(Default)]
pub struct Deps {
    values: SmallVec<[Box<dyn DepValue>; 4]>,
}

/// How a new dependency list relates to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepsChange {
    /// Every element is the same.
    Unchanged,

    /// At least one element differs.
    Changed,

    /// The list length differs, which means slot identity was broken.
    LengthChanged { previous: usize, current: usize },
}

impl Deps {
    /// Create an empty list. An effect with empty deps runs once on mount.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value.
    pub fn with<T: Same + 'static>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    pub fn push<T: Same + 'static>(&mut self, value: T) {
        self.values.push(Box::new(value));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compare `self` (the new list) against `previous`.
    pub fn compare(&self, previous: &Deps, mode: EqualityMode) -> DepsChange {
        if self.len() != previous.len() {
            return DepsChange::LengthChanged {
                previous: previous.len(),
                current: self.len(),
            };
        }
        if mode == EqualityMode::AlwaysChanged {
            return DepsChange::Changed;
        }
        let unchanged = self
            .values
            .iter()
            .zip(previous.values.iter())
            .all(|(next, prev)| (**next).same_dep(&**prev));
        if unchanged {
            DepsChange::Unchanged
        } else {
            DepsChange::Changed
        }
    }
}

impl fmt::Debug for Deps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deps").field("len", &self.len()).finish()
    }
}

/// Conversion into a dependency list.
///
/// Implemented for `()`, tuples up to eight elements, arrays, vectors, and
/// [`Deps`] itself.
pub trait IntoDeps {
    fn into_deps(self) -> Deps;
}

impl IntoDeps for Deps {
    fn into_deps(self) -> Deps {
        self
    }
}

impl IntoDeps for () {
    fn into_deps(self) -> Deps {
        Deps::new()
    }
}

impl<T: Same + 'static, const N: usize> IntoDeps for [T; N] {
    fn into_deps(self) -> Deps {
        let mut deps = Deps::new();
        for value in self {
            deps.push(value);
        }
        deps
    }
}

impl<T: Same + 'static> IntoDeps for Vec<T> {
    fn into_deps(self) -> Deps {
        let mut deps = Deps::new();
        for value in self {
            deps.push(value);
        }
        deps
    }
}

macro_rules! deps_for_tuple {
    ($($name:ident),+) => {
        impl<$($name: Same + 'static),+> IntoDeps for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_deps(self) -> Deps {
                let ($($name,)+) = self;
                Deps::new()$(.with($name))+
            }
        }
    };
}

deps_for_tuple!(A);
deps_for_tuple!(A, B);
deps_for_tuple!(A, B, C);
deps_for_tuple!(A, B, C, D);
deps_for_tuple!(A, B, C, D, E);
deps_for_tuple!(A, B, C, D, E, F);
deps_for_tuple!(A, B, C, D, E, F, G);
deps_for_tuple!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn equal_lists_are_unchanged() {
        let a = ("room".to_string(), 3u32).into_deps();
        let b = ("room".to_string(), 3u32).into_deps();
        assert_eq!(b.compare(&a, EqualityMode::Same), DepsChange::Unchanged);
    }

    #[test]
    fn one_differing_element_is_a_change() {
        let a = ("a", 1i32).into_deps();
        let b = ("a", 2i32).into_deps();
        assert_eq!(b.compare(&a, EqualityMode::Same), DepsChange::Changed);
    }

    #[test]
    fn type_change_at_same_position_is_a_change() {
        let a = (1i32,).into_deps();
        let b = (1i64,).into_deps();
        assert_eq!(b.compare(&a, EqualityMode::Same), DepsChange::Changed);
    }

    #[test]
    fn length_change_is_reported() {
        let a = [1u8, 2].into_deps();
        let b = [1u8, 2, 3].into_deps();
        assert_eq!(
            b.compare(&a, EqualityMode::Same),
            DepsChange::LengthChanged { previous: 2, current: 3 }
        );
    }

    #[test]
    fn shared_values_compare_by_identity() {
        let shared = Rc::new(vec![1, 2]);
        let a = (shared.clone(),).into_deps();
        let b = (shared,).into_deps();
        let c = (Rc::new(vec![1, 2]),).into_deps();
        assert_eq!(b.compare(&a, EqualityMode::Same), DepsChange::Unchanged);
        assert_eq!(c.compare(&b, EqualityMode::Same), DepsChange::Changed);
    }

    #[test]
    fn always_changed_mode_ignores_values() {
        let a = (1u8,).into_deps();
        let b = (1u8,).into_deps();
        assert_eq!(b.compare(&a, EqualityMode::AlwaysChanged), DepsChange::Changed);
    }

    #[test]
    fn empty_lists_are_unchanged() {
        let a = ().into_deps();
        let b = Deps::new();
        assert!(b.is_empty());
        assert_eq!(b.compare(&a, EqualityMode::Same), DepsChange::Unchanged);
    }
}
