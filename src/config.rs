//! Client configuration.
//!
//! Durations are (de)serialized as whole milliseconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{KvError, Result};

/// Default timeout for a single key-value operation.
pub const DEFAULT_KV_TIMEOUT: Duration = Duration::from_millis(2500);
/// Default number of long-lived bulk workers.
pub const DEFAULT_BULK_WORKER_COUNT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Timeout for one key-value operation. Bulk batches without an explicit
    /// timeout get this budget once per item.
    #[serde(rename = "kv_timeout_ms", with = "millis")]
    pub kv_timeout: Duration,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            kv_timeout: DEFAULT_KV_TIMEOUT,
        }
    }
}

impl TimeoutsConfig {
    pub fn with_kv_timeout(mut self, timeout: Duration) -> Self {
        self.kv_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Number of workers started on the first bulk submission.
    pub worker_count: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_BULK_WORKER_COUNT,
        }
    }
}

impl BulkConfig {
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }
}

/// Serializable part of the client configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub timeouts: TimeoutsConfig,
    pub bulk: BulkConfig,
}

impl ClientConfig {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| KvError::Configuration(format!("invalid client config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeouts.kv_timeout.is_zero() {
            return Err(KvError::Configuration(
                "kv_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.bulk.worker_count == 0 {
            return Err(KvError::Configuration(
                "bulk.worker_count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ClientConfig::from_json(r#"{"timeouts":{"kv_timeout_ms":750}}"#).unwrap();
        assert_eq!(config.timeouts.kv_timeout, Duration::from_millis(750));
        assert_eq!(config.bulk.worker_count, DEFAULT_BULK_WORKER_COUNT);
    }

    #[test]
    fn zero_workers_rejected() {
        let err = ClientConfig::from_json(r#"{"bulk":{"worker_count":0}}"#).unwrap_err();
        assert!(matches!(err, KvError::Configuration(_)));
    }

    #[test]
    fn serializes_millis() {
        let json = serde_json::to_string(&TimeoutsConfig::default()).unwrap();
        assert_eq!(json, r#"{"kv_timeout_ms":2500}"#);
    }
}
