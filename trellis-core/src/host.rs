//! Async Host
//!
//! Timers and continuations that resume on a tokio `LocalSet`, each
//! resumption running as its own execution context.
//!
//! Every poll of a spawned future is wrapped in [`Runtime::batch`], so the
//! requests one resumption issues form one tick that flushes before the
//! task yields again. A task cancelled before it resumes opens no tick.
//!
//! # Example
//!
//! ```rust,ignore
//! let local = tokio::task::LocalSet::new();
//! local.run_until(async {
//!     let host = AsyncHost::new(runtime.clone());
//!     host.set_timeout(Duration::from_millis(10), move || setter.set(1));
//! }).await;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::scheduler::{Runtime, WeakRuntime};

/// Drives asynchronous work against one runtime.
///
/// Spawning requires a tokio `LocalSet` on the current thread.
#[derive(Debug, Clone)]
pub struct AsyncHost {
    runtime: Runtime,
}

impl AsyncHost {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Spawn a continuation. Each resumption is one tick.
    pub fn spawn<F>(&self, future: F) -> TaskHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let ticked = Ticked {
            runtime: self.runtime.downgrade(),
            inner: Box::pin(future),
        };
        TaskHandle {
            handle: tokio::task::spawn_local(ticked),
        }
    }

    /// Run `callback` once after `delay`, inside its own tick.
    pub fn set_timeout<F>(&self, delay: Duration, callback: F) -> TaskHandle<()>
    where
        F: FnOnce() + 'static,
    {
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        })
    }
}

/// A future whose every poll runs inside an execution context.
struct Ticked<F: Future> {
    runtime: WeakRuntime,
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for Ticked<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.runtime.upgrade() {
            Some(runtime) => runtime.batch(|| this.inner.as_mut().poll(cx)),
            None => this.inner.as_mut().poll(cx),
        }
    }
}

/// Handle to a spawned continuation or timer.
#[derive(Debug)]
pub struct TaskHandle<T> {
    handle: JoinHandle<T>,
}

impl<T> TaskHandle<T> {
    /// Abort the task. If it has not resumed yet, it never will.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task. Returns `None` if it was cancelled or panicked.
    pub async fn join(self) -> Option<T> {
        match self.handle.await {
            Ok(value) => Some(value),
            Err(error) => {
                if !error.is_cancelled() {
                    tracing::warn!(%error, "host task failed");
                }
                None
            }
        }
    }
}
