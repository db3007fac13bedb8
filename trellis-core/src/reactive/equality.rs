//! Equality Policies
//!
//! Every comparison the runtime makes (cell bailout, effect and memo
//! dependencies, context provider values) goes through one of the policies
//! defined here.
//!
//! # Default Policy
//!
//! The default is the [`Same`] trait: value equality for primitives and
//! strings, pointer identity for shared composites (`Rc`, `Arc`). Owned
//! composites such as `Vec<T>` have no identity in Rust, so they do not
//! implement `Same`; wrap them in an `Rc` or supply an explicit
//! [`Equality`] when creating the cell.
//!
//! Floats compare like `Object.is`: `NaN` is the same as `NaN`, and `0.0`
//! is not the same as `-0.0`.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// "Is this the same value as before?" as the runtime understands it.
pub trait Same {
    fn same(&self, other: &Self) -> bool;
}

macro_rules! same_by_eq {
    ($($t:ty),* $(,)?) => {
        $(
            impl Same for $t {
                #[inline]
                fn same(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

same_by_eq!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize,
    String, &'static str,
);

impl Same for f32 {
    #[inline]
    fn same(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits() || (self.is_nan() && other.is_nan())
    }
}

impl Same for f64 {
    #[inline]
    fn same(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits() || (self.is_nan() && other.is_nan())
    }
}

impl<T: ?Sized> Same for Rc<T> {
    #[inline]
    fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Same for Arc<T> {
    #[inline]
    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: Same> Same for Option<T> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same(b),
            _ => false,
        }
    }
}

macro_rules! same_for_tuple {
    ($($name:ident . $idx:tt),+) => {
        impl<$($name: Same),+> Same for ($($name,)+) {
            fn same(&self, other: &Self) -> bool {
                $(self.$idx.same(&other.$idx))&&+
            }
        }
    };
}

same_for_tuple!(A.0);
same_for_tuple!(A.0, B.1);
same_for_tuple!(A.0, B.1, C.2);
same_for_tuple!(A.0, B.1, C.2, D.3);

/// Process-wide default comparison mode, set through `RuntimeConfig`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityMode {
    /// Compare with [`Same`].
    #[default]
    Same,

    /// Never bail out: every flushed request and every dependency list
    /// counts as a change.
    AlwaysChanged,
}

/// A comparison function attached to one cell.
pub struct Equality<V> {
    eq: Rc<dyn Fn(&V, &V) -> bool>,
}

impl<V: 'static> Equality<V> {
    /// Wrap an arbitrary comparison.
    pub fn new<F>(eq: F) -> Self
    where
        F: Fn(&V, &V) -> bool + 'static,
    {
        Self { eq: Rc::new(eq) }
    }

    /// Compare with `PartialEq`, for composites compared by content.
    pub fn structural() -> Self
    where
        V: PartialEq,
    {
        Self::new(|a: &V, b: &V| a == b)
    }

    /// Treat every new value as a change.
    pub fn never() -> Self {
        Self::new(|_: &V, _: &V| false)
    }

    /// The default policy under the given mode.
    pub fn for_mode(mode: EqualityMode) -> Self
    where
        V: Same,
    {
        match mode {
            EqualityMode::Same => Self::new(|a: &V, b: &V| a.same(b)),
            EqualityMode::AlwaysChanged => Self::never(),
        }
    }

    /// Returns true if `a` and `b` are considered the same value.
    pub fn eq(&self, a: &V, b: &V) -> bool {
        (self.eq)(a, b)
    }
}

impl<V> Clone for Equality<V> {
    fn clone(&self) -> Self {
        Self {
            eq: Rc::clone(&self.eq),
        }
    }
}

impl<V> fmt::Debug for Equality<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Equality(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_compare_by_value() {
        assert!(42i32.same(&42));
        assert!(!42i32.same(&43));
        assert!("a".same(&"a"));
        assert!(String::from("room").same(&String::from("room")));
    }

    #[test]
    fn floats_follow_object_is() {
        assert!(f64::NAN.same(&f64::NAN));
        assert!(!0.0f64.same(&-0.0));
        assert!(1.5f32.same(&1.5));
    }

    #[test]
    fn shared_composites_compare_by_identity() {
        let a = Rc::new(vec![1, 2, 3]);
        let b = Rc::new(vec![1, 2, 3]);
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
    }

    #[test]
    fn tuples_and_options_compare_elementwise() {
        assert!((1u8, "x").same(&(1, "x")));
        assert!(!(1u8, "x").same(&(1, "y")));
        assert!(Some(3u32).same(&Some(3)));
        assert!(!Some(3u32).same(&None));
    }

    #[test]
    fn mode_selects_policy() {
        let same = Equality::<i32>::for_mode(EqualityMode::Same);
        let always = Equality::<i32>::for_mode(EqualityMode::AlwaysChanged);
        assert!(same.eq(&1, &1));
        assert!(!always.eq(&1, &1));
    }

    #[test]
    fn structural_policy_uses_partial_eq() {
        let eq = Equality::<Vec<u8>>::structural();
        assert!(eq.eq(&vec![1], &vec![1]));
        assert!(!eq.eq(&vec![1], &vec![2]));
    }
}
