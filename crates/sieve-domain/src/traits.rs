//! Trait definitions for pluggable predicates and persistence
//!
//! Spaces, matchers and throttlers are supplied by the caller and shared by
//! every worker, so they must be `Send + Sync` and free of side effects.
//! The lifecycle store is implemented by the infrastructure layer
//! (sieve-store).

use crate::candidate::CandidateRecord;
use crate::context::ContextTree;
use crate::error::PredicateError;
use crate::ids::{CandidateId, DocumentId, MentionId};
use crate::mention::MentionRecord;
use crate::schema::{CandidateType, MentionType};
use crate::temporary::TemporaryContext;
use std::sync::Arc;

/// Generator of candidate spans for one document
///
/// Every call to [`MentionSpace::apply`] returns a fresh iterator.
pub trait MentionSpace: Send + Sync {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    /// Lazily enumerate the temporary contexts of `tree`
    fn apply<'a>(
        &'a self,
        tree: &'a ContextTree,
    ) -> Result<Box<dyn Iterator<Item = TemporaryContext> + 'a>, PredicateError>;
}

/// Membership predicate over one temporary context
pub trait Matcher: Send + Sync {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    /// Whether `candidate` should become a mention
    fn matches(&self, candidate: &TemporaryContext) -> Result<bool, PredicateError>;
}

/// Predicate pruning candidate mention tuples before persistence
pub trait Throttler: Send + Sync {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    /// Whether the ordered tuple `mentions` should become a candidate
    fn accept(&self, mentions: &[&MentionRecord]) -> Result<bool, PredicateError>;

    /// Tuple length this throttler expects, if it declares one
    fn arity(&self) -> Option<usize> {
        None
    }
}

/// Result of an insert-or-skip write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome<T> {
    /// A new row was written
    Inserted(T),
    /// An identical row already existed
    Skipped(T),
}

impl<T: Copy> InsertOutcome<T> {
    /// Id of the new or existing row
    pub fn id(&self) -> T {
        match self {
            InsertOutcome::Inserted(id) | InsertOutcome::Skipped(id) => *id,
        }
    }

    /// Whether a row was written
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Which documents a mention deletion applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionScope {
    /// Every document
    All,
    /// One document
    Document(DocumentId),
}

/// Trait for the persistent entity graph
///
/// Implemented by the infrastructure layer (sieve-store). Implementations
/// must enforce the cascade rules in the persistence engine itself, so
/// they hold no matter which code path issues a delete.
pub trait LifecycleStore {
    /// Error type for store operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a document together with its contexts
    fn context_tree(&self, document: DocumentId) -> Result<ContextTree, Self::Error>;

    /// Create the subclass table for a mention type if missing
    fn ensure_mention_type(&mut self, mention_type: &MentionType) -> Result<(), Self::Error>;

    /// Create the subclass table for a candidate type if missing
    fn ensure_candidate_type(&mut self, candidate_type: &CandidateType)
        -> Result<(), Self::Error>;

    /// Persist a mention unless one with the same canonical key exists
    fn insert_mention(
        &mut self,
        mention_type: &MentionType,
        document: DocumentId,
        span: &TemporaryContext,
    ) -> Result<InsertOutcome<MentionId>, Self::Error>;

    /// Mentions of a type in (document, position, char_start, id) order
    fn mentions_of(
        &self,
        mention_type: &MentionType,
        document: Option<DocumentId>,
    ) -> Result<Vec<MentionRecord>, Self::Error>;

    /// Delete mentions of `types` in `scope`, cascading to candidates
    fn delete_mentions(
        &mut self,
        types: &[Arc<MentionType>],
        scope: MentionScope,
    ) -> Result<usize, Self::Error>;

    /// Persist a candidate unless the same ordered tuple exists
    fn insert_candidate(
        &mut self,
        candidate_type: &CandidateType,
        document: DocumentId,
        split: i64,
        mentions: &[MentionId],
    ) -> Result<InsertOutcome<CandidateId>, Self::Error>;

    /// Candidates of a type in (document, id) order
    fn candidates_of(
        &self,
        candidate_type: &CandidateType,
        document: Option<DocumentId>,
        split: Option<i64>,
    ) -> Result<Vec<CandidateRecord>, Self::Error>;

    /// Delete candidates of `types`, optionally within one split
    fn delete_candidates(
        &mut self,
        types: &[Arc<CandidateType>],
        split: Option<i64>,
    ) -> Result<usize, Self::Error>;

    /// Run `f` inside one write transaction, rolling back on error
    fn in_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        E: From<Self::Error>,
        F: FnOnce(&mut Self) -> Result<T, E>;
}
