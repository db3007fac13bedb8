//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive component
//! framework. It implements:
//!
//! - Hook-style state cells with batched, FIFO-folded mutation requests
//! - A tick scheduler that re-evaluates each affected instance once per tick
//! - Effect slots reconciled against dependency lists, with ordered cleanups
//! - Context values broadcast down the instance tree
//!
//! Rendering is out of scope: a component's output is an opaque [`View`]
//! the runtime stores for inspection.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: cells, reducers, refs, effects, memos and context keys
//! - `tree`: components, elements and the arena of instance records
//! - `scope`: call-order hook allocation during one evaluation
//! - `scheduler`: ticks, flushes and the public [`Runtime`] handle
//! - `host`: tokio-backed timers and continuations
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::{Component, PresentationError, Runtime, Scope, View};
//!
//! struct Counter;
//!
//! impl Component for Counter {
//!     type Props = ();
//!
//!     fn render(&self, cx: &mut Scope<'_>, _: &()) -> Result<View, PresentationError> {
//!         let (count, set_count) = cx.use_state(|| 0);
//!         cx.use_effect((count,), move || {
//!             println!("count is {count}");
//!         });
//!         Ok(View::text(count.to_string()))
//!     }
//! }
//!
//! let runtime = Runtime::new();
//! runtime.mount(Counter)?;
//! ```

pub mod boundary;
pub mod config;
pub mod error;
pub mod host;
pub mod reactive;
pub mod scheduler;
pub mod scope;
pub mod tree;

pub use boundary::{ErrorBoundary, ErrorReport, LoggingBoundary};
pub use config::RuntimeConfig;
pub use error::{PresentationError, Result, RuntimeError, SlotViolation};
pub use host::{AsyncHost, TaskHandle};
pub use reactive::{
    Cleanup, ContextKey, Deps, Dispatcher, Equality, EqualityMode, MutRef, MutationRequest, Same,
    Setter,
};
pub use scheduler::{FlushReport, InstanceInfo, Phase, Runtime, ViewSnapshot};
pub use scope::Scope;
pub use tree::{Component, Element, InstanceId, InstanceStatus, SlotKind, View};
