//! Mutable references that sit outside the reactive system.
//!
//! A `MutRef` is what `use_ref` hands out: a box that survives
//! re-evaluation and can be written from handlers and effects without
//! scheduling anything.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::equality::Same;

/// A shared mutable box. Reads and writes never notify.
pub struct MutRef<T> {
    value: Rc<RefCell<T>>,
}

impl<T> MutRef<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
        }
    }

    /// Clone the current value out.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.borrow().clone()
    }

    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
    }

    /// Swap in a new value, returning the old one.
    pub fn replace(&self, value: T) -> T {
        self.value.replace(value)
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.value.borrow())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *self.value.borrow_mut())
    }
}

impl<T> Clone for MutRef<T> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
        }
    }
}

impl<T> PartialEq for MutRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

impl<T> Same for MutRef<T> {
    fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

impl<T: fmt::Debug> fmt::Debug for MutRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutRef").field(&*self.value.borrow()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_box() {
        let a = MutRef::new(1);
        let b = a.clone();
        b.set(5);
        assert_eq!(a.get(), 5);
        assert!(a.same(&b));
    }

    #[test]
    fn replace_and_with_mut() {
        let r = MutRef::new(vec![1]);
        r.with_mut(|v| v.push(2));
        assert_eq!(r.with(|v| v.len()), 2);
        assert_eq!(r.replace(Vec::new()), vec![1, 2]);
        assert!(r.with(Vec::is_empty));
    }
}
