//! Configuration for store connections and the connection pool

use crate::{StoreError, StoreUrl};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for opening a lifecycle store
///
/// # Examples
///
/// ```
/// use sieve_store::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert_eq!(config.max_connections, 8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection string
    /// Default: `sqlite://sieve.db`
    #[serde(with = "url_string")]
    pub url: StoreUrl,

    /// Upper bound on concurrently open connections
    /// Default: 8
    pub max_connections: usize,

    /// How long a statement waits on a locked database (ms)
    /// Default: 5000
    pub busy_timeout_ms: u64,

    /// How long `acquire` waits for a free connection before retrying (ms)
    /// Default: 30000
    pub acquire_timeout_ms: u64,

    /// Acquire attempts after the first timeout before giving up
    /// Default: 3
    pub acquire_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: StoreUrl::default(),
            max_connections: 8,
            busy_timeout_ms: 5000,
            acquire_timeout_ms: 30_000,
            acquire_retries: 3,
        }
    }
}

impl StoreConfig {
    /// Default settings for the store at `url`
    pub fn with_url(url: StoreUrl) -> Self {
        Self {
            url,
            ..Self::default()
        }
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.max_connections == 0 {
            return Err(StoreError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(StoreError::Config(
                "acquire_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Busy timeout as Duration
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

mod url_string {
    use crate::StoreUrl;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(url: &StoreUrl, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&url.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StoreUrl, D::Error> {
        let raw = String::deserialize(deserializer)?;
        StoreUrl::parse(&raw).map_err(de::Error::custom)
    }
}
