//! Error Boundaries
//!
//! Effect failures, presentation failures and slot violations never abort a
//! flush. They are delivered to the runtime's [`ErrorBoundary`] and recorded
//! so the host can drain them with [`Runtime::take_errors`](crate::Runtime::take_errors).

use crate::error::RuntimeError;
use crate::tree::InstanceId;

/// One reported failure.
#[derive(Debug)]
pub struct ErrorReport {
    /// Tick during which the error happened.
    pub tick: u64,
    pub error: RuntimeError,
}

impl ErrorReport {
    pub fn instance(&self) -> Option<InstanceId> {
        self.error.instance()
    }
}

/// Receives every error the runtime isolates.
pub trait ErrorBoundary {
    fn report(&self, report: &ErrorReport);
}

impl<F> ErrorBoundary for F
where
    F: Fn(&ErrorReport),
{
    fn report(&self, report: &ErrorReport) {
        self(report)
    }
}

/// Default boundary: logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingBoundary;

impl ErrorBoundary for LoggingBoundary {
    fn report(&self, report: &ErrorReport) {
        match report.instance() {
            Some(instance) => tracing::error!(
                tick = report.tick,
                %instance,
                error = %report.error,
                "isolated runtime error"
            ),
            None => tracing::error!(tick = report.tick, error = %report.error, "runtime error"),
        }
    }
}
