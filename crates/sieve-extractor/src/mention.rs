//! Mention extraction
//!
//! For every document and every (type, space, matcher) triple the space's
//! spans are filtered by the matcher and persisted insert-or-skip on the
//! canonical key, so re-running over the same documents adds nothing.

use crate::config::ExtractionConfig;
use crate::error::ExtractorError;
use crate::metrics::ExtractionMetrics;
use crate::types::{ExtractionReport, MentionTriple};
use crate::worker::WorkerPool;
use sieve_domain::traits::{InsertOutcome, LifecycleStore, MentionScope};
use sieve_domain::{
    CanonicalKey, DocumentId, DocumentRef, MentionRecord, MentionType, TemporaryContext,
};
use sieve_store::{ConnectionPool, SqliteStore, StoreError};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Extracts typed mentions from documents
pub struct MentionExtractor {
    triples: Arc<Vec<MentionTriple>>,
    workers: WorkerPool,
    config: ExtractionConfig,
}

impl MentionExtractor {
    /// Create an extractor and make sure every mention type has its table
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::Config`] when `triples` is empty, when a
    /// mention type appears in two triples, or when the configuration is
    /// invalid.
    pub async fn new(
        pool: ConnectionPool,
        triples: Vec<MentionTriple>,
        config: ExtractionConfig,
    ) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;
        if triples.is_empty() {
            return Err(ExtractorError::Config(
                "a mention extractor needs at least one triple".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for triple in &triples {
            if !names.insert(triple.mention_type.name().to_string()) {
                return Err(ExtractorError::Config(format!(
                    "mention type '{}' appears in more than one triple",
                    triple.mention_type.name()
                )));
            }
        }

        let types: Vec<Arc<MentionType>> =
            triples.iter().map(|t| Arc::clone(&t.mention_type)).collect();
        pool.with_store(move |store| {
            for mention_type in &types {
                store.ensure_mention_type(mention_type)?;
            }
            Ok(())
        })
        .await?;

        info!(
            triples = triples.len(),
            types = ?names,
            "Mention extractor ready"
        );

        Ok(Self {
            triples: Arc::new(triples),
            workers: WorkerPool::new(pool, config.clone()),
            config,
        })
    }

    /// Configured triples
    pub fn triples(&self) -> &[MentionTriple] {
        &self.triples
    }

    /// Mention types this extractor manages
    pub fn mention_types(&self) -> Vec<Arc<MentionType>> {
        self.triples
            .iter()
            .map(|t| Arc::clone(&t.mention_type))
            .collect()
    }

    /// Extraction settings
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract mentions from `documents` using up to `parallelism` workers
    ///
    /// Documents that fail are listed in the report with the triple that
    /// failed; their partial writes are rolled back.
    pub async fn apply(
        &self,
        documents: &[DocumentRef],
        parallelism: usize,
    ) -> Result<ExtractionReport, ExtractorError> {
        let triples = Arc::clone(&self.triples);
        let longest_match_only = self.config.longest_match_only;
        self.workers
            .run("mentions", documents, parallelism, move |store, document| {
                extract_document(store, document, &triples, longest_match_only)
            })
            .await
    }

    /// [`MentionExtractor::apply`] with the configured parallelism
    pub async fn apply_default(
        &self,
        documents: &[DocumentRef],
    ) -> Result<ExtractionReport, ExtractorError> {
        self.apply(documents, self.config.parallelism).await
    }

    /// Delete mentions of `types` (default: all of this extractor's types)
    /// within `scope`, cascading to every candidate that references them
    ///
    /// Returns the number of mentions deleted.
    pub async fn clear(
        &self,
        scope: MentionScope,
        types: Option<&[Arc<MentionType>]>,
    ) -> Result<usize, ExtractorError> {
        let types = match types {
            None => self.mention_types(),
            Some(types) => {
                let own = self.mention_types();
                for requested in types {
                    if !own.iter().any(|t| **t == **requested) {
                        return Err(ExtractorError::Config(format!(
                            "mention type '{}' is not managed by this extractor",
                            requested.name()
                        )));
                    }
                }
                types.to_vec()
            }
        };

        let deleted = self
            .workers
            .connections()
            .with_store(move |store| {
                store.with_transaction(|s| s.delete_mentions(&types, scope))
            })
            .await?;

        info!(deleted, scope = ?scope, "Cleared mentions");
        Ok(deleted)
    }

    /// Delete every mention of this extractor's types in every document
    pub async fn clear_all(&self) -> Result<usize, ExtractorError> {
        self.clear(MentionScope::All, None).await
    }

    /// Mentions per type name, in (document, position, id) order
    ///
    /// `None` returns mentions of every document.
    pub async fn get_mentions(
        &self,
        documents: Option<&[DocumentId]>,
    ) -> Result<BTreeMap<String, Vec<MentionRecord>>, ExtractorError> {
        let types = self.mention_types();
        let documents: Option<Vec<DocumentId>> = documents.map(|ids| {
            let mut ids = ids.to_vec();
            ids.sort();
            ids.dedup();
            ids
        });

        let mentions = self
            .workers
            .connections()
            .with_store(move |store| {
                let mut mentions = BTreeMap::new();
                for mention_type in &types {
                    let records = match &documents {
                        None => store.mentions_of(mention_type, None)?,
                        Some(ids) => {
                            let mut records = Vec::new();
                            for id in ids {
                                records.extend(store.mentions_of(mention_type, Some(*id))?);
                            }
                            records
                        }
                    };
                    mentions.insert(mention_type.name().to_string(), records);
                }
                Ok::<_, StoreError>(mentions)
            })
            .await?;

        Ok(mentions)
    }
}

/// Run every triple over one document
fn extract_document(
    store: &mut SqliteStore,
    document: &DocumentRef,
    triples: &[MentionTriple],
    longest_match_default: bool,
) -> Result<ExtractionMetrics, ExtractorError> {
    let tree = store.context_tree(document.id)?;
    let mut metrics = ExtractionMetrics::new();

    for triple in triples {
        let type_name = triple.mention_type.name();
        let longest_match_only = triple.longest_match_only.unwrap_or(longest_match_default);
        let failed = |e: sieve_domain::PredicateError| ExtractorError::Extraction {
            document: document.name.clone(),
            stage: triple.label(),
            message: e.to_string(),
        };

        let mut seen: HashSet<CanonicalKey> = HashSet::new();
        let mut accepted: Vec<TemporaryContext> = Vec::new();
        let mut inserted = 0usize;

        for span in triple.space.apply(&tree).map_err(failed)? {
            if !seen.insert(span.canonical_key()) {
                continue;
            }
            if !triple.matcher.matches(&span).map_err(failed)? {
                continue;
            }
            if longest_match_only && accepted.iter().any(|a| a.contains(&span)) {
                continue;
            }

            match store.insert_mention(&triple.mention_type, document.id, &span)? {
                InsertOutcome::Inserted(_) => {
                    inserted += 1;
                    metrics.record_inserted(type_name);
                }
                InsertOutcome::Skipped(_) => metrics.record_skipped(type_name),
            }
            if longest_match_only {
                accepted.push(span);
            }
        }

        debug!(
            document = %document.name,
            mention_type = type_name,
            inserted,
            "Triple applied"
        );
    }

    Ok(metrics)
}
