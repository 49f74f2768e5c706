//! Sieve Extractor
//!
//! Two-stage extraction of mentions and candidate relations over a corpus
//! of parsed documents.
//!
//! # Overview
//!
//! The [`MentionExtractor`] runs (type, space, matcher) triples over each
//! document's context tree and stores the matching spans as typed mentions.
//! The [`CandidateExtractor`] then combines each document's mentions into
//! typed candidate tuples, pruned by optional throttlers and tagged with a
//! split.
//!
//! # Architecture
//!
//! ```text
//! ContextTree → MentionSpace → Matcher → Mentions → CrossProduct → Throttler → Candidates
//! ```
//!
//! Both stages partition documents across a [`WorkerPool`]. Each worker
//! holds one pooled connection and writes one document per transaction.
//!
//! # Key Features
//!
//! - **Idempotent**: mentions are unique per canonical key and candidates
//!   per ordered mention tuple, so re-running adds nothing
//! - **Bounded**: workers are capped at the connection budget and wait for
//!   connections rather than failing
//! - **Attributed failures**: a failing document is rolled back and
//!   reported with the triple or relation that failed
//! - **Deterministic order**: candidates of unchanged mentions are
//!   enumerated in the same order on every run
//!
//! # Example Usage
//!
//! ```no_run
//! use sieve_domain::TypeRegistry;
//! use sieve_extractor::{
//!     CandidateExtractor, CandidateExtractorConfig, ExtractionConfig, MentionExtractor,
//!     MentionTriple, NgramSpace, RegexMatcher,
//! };
//! use sieve_store::{ConnectionPool, StoreConfig, StoreUrl};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = ConnectionPool::open(StoreConfig::with_url(StoreUrl::parse("sqlite://corpus.db")?))?;
//! let registry = TypeRegistry::new();
//! let part = registry.declare_mention("Part")?;
//! let temp = registry.declare_mention("Temp")?;
//! let part_temp = registry.declare_candidate("PartTemp", &[part.clone(), temp.clone()])?;
//!
//! let ngrams = Arc::new(NgramSpace::new(3)?);
//! let mentions = MentionExtractor::new(
//!     pool.clone(),
//!     vec![
//!         MentionTriple::new(part, ngrams.clone(), Arc::new(RegexMatcher::new(r"BC\d+")?)),
//!         MentionTriple::new(temp, ngrams, Arc::new(RegexMatcher::new(r"-?\d{2,3}")?)),
//!     ],
//!     ExtractionConfig::default(),
//! )
//! .await?;
//!
//! let documents = pool.with_store(|s| s.documents()).await?;
//! mentions.apply(&documents, 4).await?;
//!
//! let candidates = CandidateExtractor::new(
//!     pool,
//!     vec![part_temp],
//!     Vec::new(),
//!     CandidateExtractorConfig::default(),
//! )
//! .await?;
//! let report = candidates.apply(&documents, 0, 4).await?;
//! println!("{}", report.metrics.summary());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod candidate;
pub mod config;
pub mod error;
pub mod matchers;
pub mod mention;
pub mod metrics;
pub mod product;
pub mod space;
pub mod types;
pub mod worker;


pub use candidate::{CandidateExtractor, ThrottlerChain};
pub use config::{CandidateExtractorConfig, ExtractionConfig};
pub use error::ExtractorError;
pub use matchers::{
    DictionaryMatcher, Intersect, Inverse, LambdaMatcher, LambdaThrottler, RegexMatcher, Union,
};
pub use mention::MentionExtractor;
pub use metrics::ExtractionMetrics;
pub use product::CrossProduct;
pub use space::{FigureSpace, NgramSpace};
pub use types::{DocumentFailure, ExtractionReport, MentionTriple};
pub use worker::WorkerPool;
