//! Error types for the extractors

use sieve_domain::DomainError;
use sieve_store::StoreError;
use thiserror::Error;

/// Errors that can occur during extraction
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Invalid extractor setup, reported before any work starts
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lifecycle store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A space, matcher or throttler failed on one document
    #[error("Extraction failed for document '{document}' in {stage}: {message}")]
    Extraction {
        /// Name of the offending document
        document: String,
        /// Triple or relation being evaluated
        stage: String,
        /// What went wrong
        message: String,
    },

    /// No connection could be obtained for a partition
    #[error("Resource error: {0}")]
    Resource(String),

    /// A worker task died
    #[error("Worker error: {0}")]
    Worker(String),
}

impl ExtractorError {
    /// Whether re-running the same document may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ExtractorError::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Triple or relation the error is attributed to
    pub fn stage(&self) -> &str {
        match self {
            ExtractorError::Extraction { stage, .. } => stage,
            ExtractorError::Store(_) => "store",
            ExtractorError::Resource(_) => "acquire",
            ExtractorError::Worker(_) => "worker",
            ExtractorError::Config(_) => "config",
        }
    }
}

impl From<DomainError> for ExtractorError {
    fn from(e: DomainError) -> Self {
        ExtractorError::Config(e.to_string())
    }
}
