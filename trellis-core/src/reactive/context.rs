//! Context Scopes
//!
//! A context broadcasts a value down the instance tree without threading it
//! through every intermediate component's props.
//!
//! # How Contexts Work
//!
//! 1. A [`ContextKey`] names a context and carries its default value.
//!
//! 2. An instance calls `provide(&key, value)` during evaluation. The value
//!    is installed for the instance's subtree; the provider itself does not
//!    see it.
//!
//! 3. A descendant calls `use_context(&key)`. The runtime walks up the
//!    parent chain to the nearest instance providing that key, subscribes the
//!    caller to that provider, and returns the current value. With no
//!    provider in scope the key's default is returned.
//!
//! 4. When a provider re-evaluates with a value that is not the same as the
//!    previous one, every subscriber is re-evaluated in the same flush,
//!    top-down. An equal value notifies nobody.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

use super::equality::{EqualityMode, Same};
use crate::tree::InstanceId;

/// Counter for generating unique context IDs.
static CONTEXT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifies one context across the whole tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(CONTEXT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A typed context handle with its default value.
///
/// Keys are cheap to clone. Two clones name the same context.
pub struct ContextKey<T> {
    id: ContextId,
    default: Rc<T>,
}

impl<T> ContextKey<T>
where
    T: Same + Clone + 'static,
{
    pub fn new(default: T) -> Self {
        Self {
            id: ContextId::next(),
            default: Rc::new(default),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The value consumers see with no provider in scope.
    pub fn default_value(&self) -> T {
        (*self.default).clone()
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: Rc::clone(&self.default),
        }
    }
}

impl<T> PartialEq for ContextKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextKey").field("id", &self.id).finish()
    }
}

/// The value one instance provides for one context.
pub(crate) struct ProviderEntry {
    value: Rc<dyn Any>,
    subscribers: IndexSet<InstanceId>,
}

impl ProviderEntry {
    pub fn new(value: Rc<dyn Any>) -> Self {
        Self {
            value,
            subscribers: IndexSet::new(),
        }
    }

    pub fn value<T: Clone + 'static>(&self) -> Option<T> {
        self.value.downcast_ref::<T>().cloned()
    }

    /// Whether providing `next` would change the installed value.
    pub fn changed_by<T: Same + 'static>(&self, next: &T, mode: EqualityMode) -> bool {
        provided_value_changed(&self.value, next, mode)
    }

    /// Replace the provided value. The caller has already decided it changed.
    pub fn replace(&mut self, value: Rc<dyn Any>) {
        self.value = value;
    }

    pub fn subscribe(&mut self, consumer: InstanceId) {
        self.subscribers.insert(consumer);
    }

    pub fn unsubscribe(&mut self, consumer: InstanceId) {
        self.subscribers.shift_remove(&consumer);
    }

    pub fn subscribers(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.subscribers.iter().copied()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Decide whether a newly provided value differs from the installed one.
///
/// A value of a different type always counts as a change.
pub(crate) fn provided_value_changed<T>(previous: &Rc<dyn Any>, next: &T, mode: EqualityMode) -> bool
where
    T: Same + 'static,
{
    if mode == EqualityMode::AlwaysChanged {
        return true;
    }
    previous
        .downcast_ref::<T>()
        .map_or(true, |previous| !previous.same(next))
}

/// A consumer's subscription, stored in its hook slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContextSlot {
    pub context: ContextId,
    /// The provider this consumer resolved to, if any.
    pub provider: Option<InstanceId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_distinct_and_clones_match() {
        let a = ContextKey::new("light");
        let b = ContextKey::new("light");
        assert_ne!(a.id(), b.id());
        assert_eq!(a, a.clone());
        assert_eq!(a.default_value(), "light");
    }

    #[test]
    fn provider_entry_tracks_subscribers() {
        let mut entry = ProviderEntry::new(Rc::new(1i32));
        let first = InstanceId::new();
        let second = InstanceId::new();

        entry.subscribe(first);
        entry.subscribe(second);
        entry.subscribe(first);
        assert_eq!(entry.subscriber_count(), 2);
        assert_eq!(entry.subscribers().collect::<Vec<_>>(), vec![first, second]);

        entry.unsubscribe(first);
        assert_eq!(entry.subscribers().collect::<Vec<_>>(), vec![second]);
        assert_eq!(entry.value::<i32>(), Some(1));
        assert!(!entry.changed_by(&1i32, EqualityMode::Same));
        assert!(entry.changed_by(&2i32, EqualityMode::Same));
    }

    #[test]
    fn change_detection_uses_same() {
        let installed: Rc<dyn Any> = Rc::new(String::from("dark"));
        assert!(!provided_value_changed(&installed, &String::from("dark"), EqualityMode::Same));
        assert!(provided_value_changed(&installed, &String::from("light"), EqualityMode::Same));
        assert!(provided_value_changed(&installed, &7u8, EqualityMode::Same));
        assert!(provided_value_changed(
            &installed,
            &String::from("dark"),
            EqualityMode::AlwaysChanged
        ));
    }
}
