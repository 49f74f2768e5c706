//! Inputs and results of extraction runs

use crate::error::ExtractorError;
use crate::metrics::ExtractionMetrics;
use sieve_domain::traits::{Matcher, MentionSpace};
use sieve_domain::{DocumentId, DocumentRef, MentionType};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One (type, space, matcher) rule for mention extraction
#[derive(Clone)]
pub struct MentionTriple {
    /// Type the matches are stored as
    pub mention_type: Arc<MentionType>,

    /// Generator of candidate spans
    pub space: Arc<dyn MentionSpace>,

    /// Filter over generated spans
    pub matcher: Arc<dyn Matcher>,

    /// Overrides [`crate::ExtractionConfig::longest_match_only`] for this triple
    pub longest_match_only: Option<bool>,
}

impl MentionTriple {
    /// Create a triple that follows the extractor's longest-match setting
    pub fn new(
        mention_type: Arc<MentionType>,
        space: Arc<dyn MentionSpace>,
        matcher: Arc<dyn Matcher>,
    ) -> Self {
        Self {
            mention_type,
            space,
            matcher,
            longest_match_only: None,
        }
    }

    /// Keep or drop matches nested inside earlier matches
    pub fn with_longest_match_only(mut self, enabled: bool) -> Self {
        self.longest_match_only = Some(enabled);
        self
    }

    /// Label used in logs and failure reports
    pub fn label(&self) -> String {
        format!(
            "{}({}/{})",
            self.mention_type.name(),
            self.space.name(),
            self.matcher.name()
        )
    }
}

impl fmt::Debug for MentionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MentionTriple")
            .field("mention_type", &self.mention_type.name())
            .field("space", &self.space.name())
            .field("matcher", &self.matcher.name())
            .field("longest_match_only", &self.longest_match_only)
            .finish()
    }
}

/// A document that could not be extracted
///
/// Its writes were rolled back, so re-running the same documents picks up
/// where the failed run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    /// Id of the document
    pub document: DocumentId,

    /// Name of the document
    pub document_name: String,

    /// Triple or relation being evaluated, or the worker phase that failed
    pub stage: String,

    /// Error message
    pub message: String,
}

impl DocumentFailure {
    /// Attribute `error` to `document`
    pub fn new(document: &DocumentRef, error: &ExtractorError) -> Self {
        let message = match error {
            ExtractorError::Extraction { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            document: document.id,
            document_name: document.name.clone(),
            stage: error.stage().to_string(),
            message,
        }
    }
}

impl fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) in {}: {}",
            self.document_name, self.document, self.stage, self.message
        )
    }
}

/// Outcome of one `apply` call
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Counts per type
    pub metrics: ExtractionMetrics,

    /// Documents that failed, in no particular order
    pub failures: Vec<DocumentFailure>,

    /// Parallelism the caller asked for
    pub requested_parallelism: usize,

    /// Workers actually started
    pub parallelism: usize,

    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl ExtractionReport {
    /// Rows written for one type
    pub fn inserted(&self, type_name: &str) -> usize {
        self.metrics.inserted_for(type_name)
    }

    /// Rows that already existed for one type
    pub fn skipped(&self, type_name: &str) -> usize {
        self.metrics.skipped_for(type_name)
    }

    /// Rows written across all types
    pub fn total_inserted(&self) -> usize {
        self.metrics.total_inserted()
    }

    /// Documents processed to completion
    pub fn documents(&self) -> usize {
        self.metrics.documents
    }

    /// Whether every document succeeded
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn collected failures into an error naming the first one
    pub fn into_result(self) -> Result<Self, ExtractorError> {
        match self.failures.first() {
            None => Ok(self),
            Some(failure) => Err(ExtractorError::Extraction {
                document: failure.document_name.clone(),
                stage: failure.stage.clone(),
                message: failure.message.clone(),
            }),
        }
    }
}
