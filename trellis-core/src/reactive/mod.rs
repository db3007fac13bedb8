//! Reactive Primitives
//!
//! This module implements the storage behind every hook: state cells,
//! reducer stores, mutable refs, effect slots, memo slots and context keys.
//! These primitives form the foundation of Trellis's tick-based reactivity.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A [`StateCell`] holds a committed value and a FIFO queue of mutation
//! requests. Requests accumulate during a tick and are folded in one go when
//! the tick flushes. Reads always return the committed value.
//!
//! ## Effects
//!
//! An effect slot holds a body keyed by a dependency list. After the render
//! phase of a flush, a slot whose dependencies changed runs its previous
//! cleanup, then its new body.
//!
//! ## Contexts
//!
//! A [`ContextKey`] names a value broadcast down the instance tree. Consumers
//! read the nearest provider and are re-evaluated when it provides a value
//! that is no longer the same.
//!
//! # Implementation Notes
//!
//! Dependency tracking is explicit. Nothing is recorded on read; effects
//! and memos list their dependencies, and cells know only their owner.
//! Every comparison goes through [`Same`] or a per-cell [`Equality`].

mod cell;
mod context;
mod deps;
mod effect;
mod equality;
mod memo;
mod mut_ref;
mod reducer;

pub use cell::{fold_requests, CellId, FlushOutcome, MutationRequest, Setter, StateCell};
pub use context::{ContextId, ContextKey};
pub use deps::{DepValue, Deps, DepsChange, IntoDeps};
pub use effect::{BoxError, Cleanup, EffectResult, IntoEffectResult};
pub use equality::{Equality, EqualityMode, Same};
pub use mut_ref::MutRef;
pub use reducer::{Dispatcher, ReduceFn};

pub(crate) use cell::Flushable;
pub(crate) use context::{ContextSlot, ProviderEntry};
pub(crate) use effect::EffectSlot;
pub(crate) use memo::MemoSlot;
