//! Memo Slots
//!
//! A memo caches a value derived during evaluation and recomputes it only
//! when its dependency list changes. Dependencies are compared exactly like
//! effect dependencies.
//!
//! Unlike an effect, the computation runs synchronously inside the
//! evaluation that asks for it, so the value is available to the
//! presentation function of the same pass.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use super::deps::{Deps, DepsChange};
use super::equality::EqualityMode;

/// One memo slot in an instance's hook list.
pub(crate) struct MemoSlot {
    deps: Deps,
    value: Rc<dyn Any>,
    computations: u64,
}

impl MemoSlot {
    /// A slot holding the value of its first computation.
    pub fn new<T: 'static>(deps: Deps, value: Rc<T>) -> Self {
        Self {
            deps,
            value,
            computations: 1,
        }
    }

    /// Return the cached value, recomputing it if `deps` changed.
    ///
    /// Hands `compute` back if the cached value is not a `T`, which means
    /// the slot was reused by a different hook.
    pub fn refresh<T, F>(&mut self, deps: Deps, mode: EqualityMode, compute: F) -> Result<Rc<T>, F>
    where
        T: 'static,
        F: FnOnce() -> T,
    {
        let Ok(cached) = Rc::clone(&self.value).downcast::<T>() else {
            return Err(compute);
        };
        let value = match deps.compare(&self.deps, mode) {
            DepsChange::Unchanged => cached,
            DepsChange::Changed | DepsChange::LengthChanged { .. } => {
                let fresh = Rc::new(compute());
                self.value = fresh.clone();
                self.computations += 1;
                fresh
            }
        };
        self.deps = deps;
        Ok(value)
    }

    #[cfg(test)]
    pub fn value<T: 'static>(&self) -> Option<Rc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    #[cfg(test)]
    pub fn computations(&self) -> u64 {
        self.computations
    }
}

impl fmt::Debug for MemoSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoSlot")
            .field("deps", &self.deps)
            .field("computations", &self.computations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::deps::IntoDeps;

    #[test]
    fn memo_caches_until_deps_change() {
        let mut slot = MemoSlot::new((2i32,).into_deps(), Rc::new(20i32));
        assert_eq!(*slot.value::<i32>().unwrap(), 20);

        let v = slot
            .refresh::<i32, _>((2i32,).into_deps(), EqualityMode::Same, || unreachable!())
            .ok()
            .unwrap();
        assert_eq!(*v, 20);
        assert_eq!(slot.computations(), 1);

        let v = slot
            .refresh::<i32, _>((3i32,).into_deps(), EqualityMode::Same, || 3 * 10)
            .ok()
            .unwrap();
        assert_eq!(*v, 30);
        assert_eq!(slot.computations(), 2);
    }

    #[test]
    fn memo_rejects_type_change() {
        let mut slot = MemoSlot::new(Deps::new(), Rc::new(1u8));
        assert!(slot
            .refresh::<String, _>(Deps::new(), EqualityMode::Same, String::new)
            .is_err());
        assert_eq!(slot.computations(), 1);
    }
}
