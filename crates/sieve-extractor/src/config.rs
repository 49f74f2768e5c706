//! Configuration for the extractors

use serde::{Deserialize, Serialize};
use sieve_store::RetryPolicy;
use std::time::Duration;

/// Upper bound on the delay between retries of one document, as a multiple
/// of the initial backoff
const MAX_BACKOFF_FACTOR: u64 = 32;

/// Settings shared by mention and candidate extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Requested number of workers (capped by the connection budget)
    pub parallelism: usize,

    /// Documents buffered between the coordinator and the workers
    pub channel_capacity: usize,

    /// Further attempts for a document failing on lock contention
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds)
    pub retry_backoff_ms: u64,

    /// Drop matches nested inside an earlier match of the same triple
    pub longest_match_only: bool,
}

impl ExtractionConfig {
    /// Get the initial retry delay as a Duration
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Backoff schedule for documents hitting transient store errors
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            self.retry_backoff_ms,
            self.retry_backoff_ms.saturating_mul(MAX_BACKOFF_FACTOR),
        )
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.parallelism == 0 {
            return Err("parallelism must be greater than 0".to_string());
        }
        if self.channel_capacity == 0 {
            return Err("channel_capacity must be greater than 0".to_string());
        }
        if self.max_retries > 0 && self.retry_backoff_ms == 0 {
            return Err("retry_backoff_ms must be greater than 0 when retrying".to_string());
        }
        Ok(())
    }

    /// Aggressive preset: more workers, fewer retries
    pub fn aggressive() -> Self {
        Self {
            parallelism: 16,
            channel_capacity: 256,
            max_retries: 1,
            retry_backoff_ms: 20,
            longest_match_only: true,
        }
    }

    /// Conservative preset: a single worker that retries patiently
    pub fn conservative() -> Self {
        Self {
            parallelism: 1,
            channel_capacity: 16,
            max_retries: 6,
            retry_backoff_ms: 200,
            longest_match_only: true,
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

impl Default for ExtractionConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            parallelism: 4,
            channel_capacity: 64,
            max_retries: 3,
            retry_backoff_ms: 50,
            longest_match_only: true,
        }
    }
}

/// Settings for candidate extraction
///
/// The relation flags only compare argument positions that share a mention
/// type. A relation over distinct types always sees its full cross product.
/// By default only self pairs are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateExtractorConfig {
    /// Worker and retry settings
    pub extraction: ExtractionConfig,

    /// Allow the same mention in two positions
    pub self_relations: bool,

    /// Allow a mention whose span contains another argument's span
    pub nested_relations: bool,

    /// Allow a permutation of an already emitted tuple
    pub symmetric_relations: bool,
}

impl Default for CandidateExtractorConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            self_relations: false,
            nested_relations: true,
            symmetric_relations: true,
        }
    }
}

impl CandidateExtractorConfig {
    /// Wrap extraction settings with the default relation flags
    pub fn new(extraction: ExtractionConfig) -> Self {
        Self {
            extraction,
            ..Self::default()
        }
    }

    /// Keep one ordering of each unordered set of distinct, non-overlapping
    /// same-typed mentions
    pub fn distinct_unordered(extraction: ExtractionConfig) -> Self {
        Self {
            extraction,
            self_relations: false,
            nested_relations: false,
            symmetric_relations: false,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.extraction.validate()
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
