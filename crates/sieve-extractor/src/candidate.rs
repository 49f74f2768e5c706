//! Candidate extraction
//!
//! For every document and every relation the cross product of that
//! document's mentions is enumerated, filtered by the relation policy and
//! the relation's throttler, and persisted insert-or-skip on the ordered
//! mention-id tuple.

use crate::config::CandidateExtractorConfig;
use crate::error::ExtractorError;
use crate::metrics::ExtractionMetrics;
use crate::product::{CrossProduct, RelationPolicy};
use crate::types::ExtractionReport;
use crate::worker::WorkerPool;
use sieve_domain::traits::{InsertOutcome, LifecycleStore, Throttler};
use sieve_domain::{CandidateRecord, CandidateType, DocumentId, DocumentRef, MentionRecord};
use sieve_store::{ConnectionPool, SqliteStore, StoreError};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// One optional throttler per relation
pub type ThrottlerChain = Vec<Option<Arc<dyn Throttler>>>;

/// Extracts candidate relations from persisted mentions
pub struct CandidateExtractor {
    relations: Arc<Vec<Arc<CandidateType>>>,
    throttlers: ThrottlerChain,
    workers: WorkerPool,
    config: CandidateExtractorConfig,
}

impl CandidateExtractor {
    /// Create an extractor and make sure every relation has its table
    ///
    /// `throttlers` is either empty (no throttling) or holds exactly one
    /// entry per relation, where `None` accepts every tuple.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::Config`] for an empty or duplicated
    /// relation list, a throttler list of the wrong length, a throttler
    /// whose declared arity differs from its relation's, or an invalid
    /// configuration.
    pub async fn new(
        pool: ConnectionPool,
        relations: Vec<Arc<CandidateType>>,
        throttlers: ThrottlerChain,
        config: CandidateExtractorConfig,
    ) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;
        if relations.is_empty() {
            return Err(ExtractorError::Config(
                "a candidate extractor needs at least one relation".to_string(),
            ));
        }
        let mut names = HashSet::new();
        for relation in &relations {
            if !names.insert(relation.name().to_string()) {
                return Err(ExtractorError::Config(format!(
                    "relation '{}' is listed more than once",
                    relation.name()
                )));
            }
        }
        validate_throttlers(&relations, &throttlers)?;

        let types = relations.clone();
        pool.with_store(move |store| {
            for relation in &types {
                store.ensure_candidate_type(relation)?;
            }
            Ok(())
        })
        .await?;

        info!(
            relations = relations.len(),
            throttled = throttlers.iter().filter(|t| t.is_some()).count(),
            "Candidate extractor ready"
        );

        Ok(Self {
            relations: Arc::new(relations),
            throttlers,
            workers: WorkerPool::new(pool, config.extraction.clone()),
            config,
        })
    }

    /// Relations this extractor manages
    pub fn relations(&self) -> &[Arc<CandidateType>] {
        &self.relations
    }

    /// Extraction settings
    pub fn config(&self) -> &CandidateExtractorConfig {
        &self.config
    }

    /// Extract candidates from `documents` into `split`
    pub async fn apply(
        &self,
        documents: &[DocumentRef],
        split: i64,
        parallelism: usize,
    ) -> Result<ExtractionReport, ExtractorError> {
        self.run(documents, split, parallelism, self.throttlers.clone())
            .await
    }

    /// Like [`CandidateExtractor::apply`] but with a throttler chain for
    /// this run only
    pub async fn apply_with_throttlers(
        &self,
        documents: &[DocumentRef],
        split: i64,
        parallelism: usize,
        throttlers: ThrottlerChain,
    ) -> Result<ExtractionReport, ExtractorError> {
        validate_throttlers(&self.relations, &throttlers)?;
        self.run(documents, split, parallelism, throttlers).await
    }

    async fn run(
        &self,
        documents: &[DocumentRef],
        split: i64,
        parallelism: usize,
        throttlers: ThrottlerChain,
    ) -> Result<ExtractionReport, ExtractorError> {
        let relations = Arc::clone(&self.relations);
        let throttlers = Arc::new(throttlers);
        let config = self.config.clone();
        self.workers
            .run("candidates", documents, parallelism, move |store, document| {
                extract_document(store, document, &relations, &throttlers, split, &config)
            })
            .await
    }

    /// Delete this extractor's candidates in `split`
    ///
    /// Mentions are never touched. Returns the number of candidates deleted.
    pub async fn clear(&self, split: i64) -> Result<usize, ExtractorError> {
        self.delete(Some(split)).await
    }

    /// Delete this extractor's candidates in `split`, or in every split
    pub async fn clear_all(&self, split: Option<i64>) -> Result<usize, ExtractorError> {
        self.delete(split).await
    }

    async fn delete(&self, split: Option<i64>) -> Result<usize, ExtractorError> {
        let relations: Vec<Arc<CandidateType>> = self.relations.to_vec();
        let deleted = self
            .workers
            .connections()
            .with_store(move |store| {
                store.with_transaction(|s| s.delete_candidates(&relations, split))
            })
            .await?;
        info!(deleted, split = ?split, "Cleared candidates");
        Ok(deleted)
    }

    /// Candidates per relation name, in (document, id) order
    pub async fn get_candidates(
        &self,
        documents: Option<&[DocumentId]>,
        split: Option<i64>,
    ) -> Result<BTreeMap<String, Vec<CandidateRecord>>, ExtractorError> {
        let relations: Vec<Arc<CandidateType>> = self.relations.to_vec();
        let documents: Option<Vec<DocumentId>> = documents.map(|ids| {
            let mut ids = ids.to_vec();
            ids.sort();
            ids.dedup();
            ids
        });

        let candidates = self
            .workers
            .connections()
            .with_store(move |store| {
                let mut candidates = BTreeMap::new();
                for relation in &relations {
                    let records = match &documents {
                        None => store.candidates_of(relation, None, split)?,
                        Some(ids) => {
                            let mut records = Vec::new();
                            for id in ids {
                                records.extend(store.candidates_of(relation, Some(*id), split)?);
                            }
                            records
                        }
                    };
                    candidates.insert(relation.name().to_string(), records);
                }
                Ok::<_, StoreError>(candidates)
            })
            .await?;

        Ok(candidates)
    }
}

fn validate_throttlers(
    relations: &[Arc<CandidateType>],
    throttlers: &[Option<Arc<dyn Throttler>>],
) -> Result<(), ExtractorError> {
    if throttlers.is_empty() {
        return Ok(());
    }
    if throttlers.len() != relations.len() {
        return Err(ExtractorError::Config(format!(
            "expected {} throttlers (one per relation), got {}",
            relations.len(),
            throttlers.len()
        )));
    }
    for (relation, throttler) in relations.iter().zip(throttlers) {
        let Some(throttler) = throttler else {
            continue;
        };
        if let Some(arity) = throttler.arity() {
            if arity != relation.arity() {
                return Err(ExtractorError::Config(format!(
                    "throttler '{}' expects {} mentions but relation '{}' has arity {}",
                    throttler.name(),
                    arity,
                    relation.name(),
                    relation.arity()
                )));
            }
        }
    }
    Ok(())
}

/// Build every relation's candidates for one document
fn extract_document(
    store: &mut SqliteStore,
    document: &DocumentRef,
    relations: &[Arc<CandidateType>],
    throttlers: &[Option<Arc<dyn Throttler>>],
    split: i64,
    config: &CandidateExtractorConfig,
) -> Result<ExtractionMetrics, ExtractorError> {
    let mut metrics = ExtractionMetrics::new();

    for (index, relation) in relations.iter().enumerate() {
        let throttler = throttlers.get(index).and_then(|t| t.as_ref());
        let failed = |e: sieve_domain::PredicateError| ExtractorError::Extraction {
            document: document.name.clone(),
            stage: match throttler {
                Some(t) => format!("{}({})", relation.name(), t.name()),
                None => relation.name().to_string(),
            },
            message: e.to_string(),
        };

        // Already in (position, char_start, id) order
        let mut pools: Vec<Vec<MentionRecord>> = Vec::with_capacity(relation.arity());
        for mention_type in relation.mention_types() {
            pools.push(store.mentions_of(mention_type, Some(document.id))?);
        }

        let mut policy = RelationPolicy::new(relation, config);
        let product = CrossProduct::new(pools.iter().map(Vec::len).collect());
        let combinations = product.len();
        let mut inserted = 0usize;

        for indices in product {
            let tuple: Vec<&MentionRecord> = indices
                .iter()
                .zip(&pools)
                .map(|(&i, pool)| &pool[i])
                .collect();
            if !policy.admits(&tuple) {
                continue;
            }

            if let Some(throttler) = throttler {
                if !throttler.accept(&tuple).map_err(failed)? {
                    metrics.record_throttled(relation.name());
                    continue;
                }
            }

            let ids: Vec<_> = tuple.iter().map(|m| m.id).collect();
            match store.insert_candidate(relation, document.id, split, &ids)? {
                InsertOutcome::Inserted(_) => {
                    inserted += 1;
                    metrics.record_inserted(relation.name());
                }
                InsertOutcome::Skipped(_) => metrics.record_skipped(relation.name()),
            }
            policy.record(&tuple);
        }

        debug!(
            document = %document.name,
            relation = relation.name(),
            combinations,
            inserted,
            "Relation applied"
        );
    }

    Ok(metrics)
}
