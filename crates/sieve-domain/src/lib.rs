//! Sieve Domain Layer
//!
//! This crate contains the entity model shared by the store and the
//! extractors. It has no external dependencies and defines the value objects,
//! type declarations and trait interfaces that all other layers depend upon.
//!
//! ## Key Concepts
//!
//! - **Document**: root unit of the corpus, owning a tree of Contexts
//! - **Context**: an addressable span of a document (sentence, table, figure)
//! - **TemporaryContext**: an in-memory span produced by a Mention Space,
//!   identified by its canonical key
//! - **Mention**: a persisted, typed wrapper around one TemporaryContext
//! - **Candidate**: a persisted, typed tuple of Mentions forming a relation
//!
//! ## Lifecycle
//!
//! ```text
//! Document ──owns──▶ Context ──anchors──▶ Mention ──joins──▶ Candidate
//! ```
//!
//! Deleting any node removes everything to its right that depends on it.
//! Deleting a Candidate never removes the Mentions it references.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod candidate;
pub mod context;
pub mod error;
pub mod ids;
pub mod mention;
pub mod schema;
pub mod temporary;
pub mod traits;

// Re-exports for convenience
pub use candidate::CandidateRecord;
pub use context::{Context, ContextDraft, ContextKind, ContextTree, DocumentRef};
pub use error::{DomainError, PredicateError};
pub use ids::{CandidateId, ContextId, DocumentId, MentionId};
pub use mention::MentionRecord;
pub use schema::{
    CandidateType, CandidateTypeSpec, LabelDomain, MentionType, MentionTypeSpec, TypeRegistry,
};
pub use temporary::{CanonicalKey, TemporaryContext, TemporaryFigure, TemporaryRegion, TemporarySpan};
pub use traits::{InsertOutcome, LifecycleStore, Matcher, MentionScope, MentionSpace, Throttler};
