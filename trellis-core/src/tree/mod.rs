//! Instance Tree
//!
//! This module implements the explicit component tree: an arena of instance
//! records indexed by stable id, each holding its ordered hook slots.
//!
//! # Overview
//!
//! - An [`Element`] is a component plus props, produced by a parent's
//!   [`View`].
//! - An instance is the persistent record behind one element position. It
//!   survives re-evaluation for as long as its parent keeps producing an
//!   element of the same component type at the same position.
//! - Hook slots are identified purely by call order. The first successful
//!   evaluation fixes the layout; any later mismatch is a slot violation.
//!
//! # Design Decisions
//!
//! 1. Records live in a central arena rather than in the call stack, so the
//!    scheduler can order work across the whole tree and detect removed
//!    instances without walking user code.
//!
//! 2. Records are indexed by id for O(1) lookups, with parent and children
//!    stored as ids.

mod arena;
mod element;
mod instance;

pub use element::{Component, Element, View};
pub use instance::{InstanceId, InstanceStatus, SlotKind};

pub(crate) use arena::Arena;
pub(crate) use instance::{HookSlot, OrderKey};
