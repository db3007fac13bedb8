//! Error types for trellis-core

use thiserror::Error;

use crate::reactive::BoxError;
use crate::tree::{InstanceId, SlotKind};

/// How a hook slot layout was violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotViolation {
    #[error("expected a {expected} hook, found a {found} hook")]
    KindChanged { expected: SlotKind, found: SlotKind },

    #[error("{kind} hook changed its value type")]
    TypeChanged { kind: SlotKind },

    #[error("provider slot switched to a different context")]
    ContextChanged,

    #[error("hook count changed from {previous} to {current}")]
    CountChanged { previous: usize, current: usize },

    #[error("dependency count changed from {previous} to {current}")]
    DependencyCountChanged { previous: usize, current: usize },
}

/// A presentation function failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PresentationError {
    message: String,
}

impl PresentationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Core error type
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("stale slot {slot} in instance {instance}: {violation}")]
    StaleSlot {
        instance: InstanceId,
        slot: usize,
        violation: SlotViolation,
    },

    #[error("effect in slot {slot} of instance {instance} failed: {source}")]
    EffectBody {
        instance: InstanceId,
        slot: usize,
        source: BoxError,
    },

    #[error("presentation of instance {instance} failed: {source}")]
    Presentation {
        instance: InstanceId,
        source: PresentationError,
    },

    #[error("update depth exceeded: more than {limit} chained ticks in one flush")]
    TickLimitExceeded { limit: usize },

    #[error("runtime is flushing")]
    Busy,

    #[error("no tree is mounted")]
    NotMounted,

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
}

impl RuntimeError {
    /// The instance the error is attributed to, if any.
    pub fn instance(&self) -> Option<InstanceId> {
        match self {
            RuntimeError::StaleSlot { instance, .. }
            | RuntimeError::EffectBody { instance, .. }
            | RuntimeError::Presentation { instance, .. } => Some(*instance),
            _ => None,
        }
    }

    /// Whether the error disables its instance for good.
    pub fn is_fatal_to_instance(&self) -> bool {
        matches!(
            self,
            RuntimeError::StaleSlot { violation, .. }
                if !matches!(violation, SlotViolation::DependencyCountChanged { .. })
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_layout_violations_fault_an_instance() {
        let instance = InstanceId::new();
        let stale = |violation| RuntimeError::StaleSlot {
            instance,
            slot: 0,
            violation,
        };

        assert!(stale(SlotViolation::CountChanged { previous: 2, current: 3 }).is_fatal_to_instance());
        assert!(stale(SlotViolation::ContextChanged).is_fatal_to_instance());
        assert!(!stale(SlotViolation::DependencyCountChanged { previous: 1, current: 2 })
            .is_fatal_to_instance());

        let failed = RuntimeError::Presentation {
            instance,
            source: PresentationError::new("nope"),
        };
        assert!(!failed.is_fatal_to_instance());
        assert_eq!(failed.instance(), Some(instance));
        assert_eq!(RuntimeError::NotMounted.instance(), None);
    }
}
