//! Runtime configuration.
//!
//! Configuration is passed to [`Runtime::with_config`](crate::Runtime::with_config)
//! at construction; there is no process-wide mutable default.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuntimeError};
use crate::reactive::EqualityMode;

/// Tunables for one runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of ticks a single flush may chain (ticks opened by
    /// requests issued during the flush itself) before it gives up.
    pub max_chained_ticks: usize,

    /// Default comparison for cells, dependencies and provided values.
    pub equality: EqualityMode,

    /// How many isolated errors `Runtime::take_errors` keeps. Older reports
    /// are dropped first; 0 keeps none.
    pub error_capacity: usize,
}

impl RuntimeConfig {
    pub const DEFAULT_MAX_CHAINED_TICKS: usize = 50;
    pub const DEFAULT_ERROR_CAPACITY: usize = 256;

    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges. A flush needs room for at least one tick.
    pub fn validate(&self) -> Result<()> {
        if self.max_chained_ticks == 0 {
            return Err(RuntimeError::InvalidConfig {
                field: "max_chained_ticks",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_chained_ticks: Self::DEFAULT_MAX_CHAINED_TICKS,
            equality: EqualityMode::Same,
            error_capacity: Self::DEFAULT_ERROR_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RuntimeConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn fields_override_defaults() {
        let config =
            RuntimeConfig::from_json_str(r#"{"max_chained_ticks": 3, "equality": "always_changed"}"#)
                .unwrap();
        assert_eq!(config.max_chained_ticks, 3);
        assert_eq!(config.equality, EqualityMode::AlwaysChanged);
    }

    #[test]
    fn malformed_document_is_a_config_error() {
        let err = RuntimeConfig::from_json_str(r#"{"equality": "sometimes"}"#).unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn zero_tick_limit_is_rejected() {
        let err = RuntimeConfig::from_json_str(r#"{"max_chained_ticks": 0}"#).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::InvalidConfig {
                field: "max_chained_ticks",
                ..
            }
        ));
        assert!(RuntimeConfig::default().validate().is_ok());
    }
}
