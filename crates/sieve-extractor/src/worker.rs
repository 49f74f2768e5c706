//! Document-partitioned worker pool
//!
//! A coordinator sends every document exactly once over a bounded MPMC
//! channel. Each worker holds one pooled connection for its whole
//! partition and processes one document per `BEGIN IMMEDIATE` transaction,
//! so a failure never loses the writes of documents finished earlier.

use crate::config::ExtractionConfig;
use crate::error::ExtractorError;
use crate::metrics::ExtractionMetrics;
use crate::types::{DocumentFailure, ExtractionReport};
use async_channel::Receiver;
use sieve_domain::{DocumentId, DocumentRef};
use sieve_store::{ConnectionPool, PooledStore, RetryPolicy, SqliteStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct WorkerTally {
    metrics: ExtractionMetrics,
    failures: Vec<DocumentFailure>,
    completed: Vec<DocumentId>,
}

/// Fixed-size pool of extraction workers over a [`ConnectionPool`]
#[derive(Clone)]
pub struct WorkerPool {
    pool: ConnectionPool,
    config: ExtractionConfig,
}

impl WorkerPool {
    /// Create a worker pool drawing connections from `pool`
    pub fn new(pool: ConnectionPool, config: ExtractionConfig) -> Self {
        Self { pool, config }
    }

    /// Connection pool the workers draw from
    pub fn connections(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Worker count for a run: never more than the connection budget or
    /// the number of documents
    pub fn effective_parallelism(&self, requested: usize, documents: usize) -> usize {
        requested
            .min(self.pool.max_connections())
            .min(documents)
            .max(1)
    }

    /// Run `job` once per document across at most `parallelism` workers
    ///
    /// Failing documents are collected in the report; only setup problems
    /// are returned as errors.
    pub(crate) async fn run<J>(
        &self,
        run_name: &str,
        documents: &[DocumentRef],
        parallelism: usize,
        job: J,
    ) -> Result<ExtractionReport, ExtractorError>
    where
        J: Fn(&mut SqliteStore, &DocumentRef) -> Result<ExtractionMetrics, ExtractorError>
            + Send
            + Sync
            + 'static,
    {
        if parallelism == 0 {
            return Err(ExtractorError::Config(
                "parallelism must be greater than 0".to_string(),
            ));
        }

        // A document listed twice must still go to exactly one worker
        let mut unique = HashSet::new();
        let documents: Vec<DocumentRef> = documents
            .iter()
            .filter(|d| unique.insert(d.id))
            .cloned()
            .collect();

        let start = Instant::now();
        let mut report = ExtractionReport {
            requested_parallelism: parallelism,
            ..ExtractionReport::default()
        };
        if documents.is_empty() {
            debug!(run = run_name, "No documents to process");
            return Ok(report);
        }

        let workers = self.effective_parallelism(parallelism, documents.len());
        if workers < parallelism.min(documents.len()) {
            warn!(
                run = run_name,
                requested = parallelism,
                max_connections = self.pool.max_connections(),
                workers,
                "Parallelism capped by the connection budget"
            );
        }
        report.parallelism = workers;

        info!(
            run = run_name,
            documents = documents.len(),
            workers,
            "Starting extraction run"
        );

        let (sender, receiver) = async_channel::bounded(self.config.channel_capacity);
        let job = Arc::new(job);
        let policy = self.config.retry_policy();

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            handles.push(tokio::spawn(run_worker(
                worker,
                self.pool.clone(),
                receiver.clone(),
                Arc::clone(&job),
                policy.clone(),
            )));
        }
        drop(receiver);

        for document in &documents {
            if sender.send(document.clone()).await.is_err() {
                // Every worker has stopped; the rest is reported below
                break;
            }
        }
        sender.close();

        let mut accounted: HashSet<DocumentId> = HashSet::new();
        for (worker, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(tally) => {
                    report.metrics.merge(&tally.metrics);
                    accounted.extend(tally.completed);
                    accounted.extend(tally.failures.iter().map(|f| f.document));
                    report.failures.extend(tally.failures);
                }
                Err(e) => {
                    error!(run = run_name, worker, error = %e, "Worker task died");
                }
            }
        }

        for document in &documents {
            if !accounted.contains(&document.id) {
                let err = ExtractorError::Worker("no worker processed the document".to_string());
                report.failures.push(DocumentFailure::new(document, &err));
                report.metrics.record_failure();
            }
        }

        report.elapsed = start.elapsed();
        report.metrics.total_runtime_ms = report.elapsed.as_millis() as u64;

        if report.failures.is_empty() {
            info!(
                run = run_name,
                documents = report.metrics.documents,
                inserted = report.metrics.total_inserted(),
                skipped = report.metrics.total_skipped(),
                elapsed_ms = report.metrics.total_runtime_ms,
                "Extraction run completed"
            );
        } else {
            warn!(
                run = run_name,
                documents = report.metrics.documents,
                failures = report.failures.len(),
                "Extraction run completed with failures"
            );
        }

        Ok(report)
    }
}

async fn run_worker<J>(
    worker: usize,
    pool: ConnectionPool,
    documents: Receiver<DocumentRef>,
    job: Arc<J>,
    policy: RetryPolicy,
) -> WorkerTally
where
    J: Fn(&mut SqliteStore, &DocumentRef) -> Result<ExtractionMetrics, ExtractorError>
        + Send
        + Sync
        + 'static,
{
    let mut tally = WorkerTally::default();
    let mut held: Option<PooledStore> = None;

    while let Ok(document) = documents.recv().await {
        let mut attempt = 0u32;
        loop {
            let store = match held.take() {
                Some(store) => store,
                None => match pool.acquire().await {
                    Ok(store) => store,
                    Err(e) => {
                        // Fatal for this partition; the other workers drain the channel
                        let err = ExtractorError::Resource(e.to_string());
                        error!(worker, document = %document.name, error = %e, "Could not acquire a connection");
                        tally.failures.push(DocumentFailure::new(&document, &err));
                        tally.metrics.record_failure();
                        return tally;
                    }
                },
            };

            let task_job = Arc::clone(&job);
            let task_document = document.clone();
            let joined = tokio::task::spawn_blocking(move || {
                let mut store = store;
                let result = store.with_transaction(|s| (*task_job)(s, &task_document));
                (store, result)
            })
            .await;

            match joined {
                Ok((store, Ok(metrics))) => {
                    held = Some(store);
                    debug!(
                        worker,
                        document = %document.name,
                        inserted = metrics.total_inserted(),
                        "Document processed"
                    );
                    tally.metrics.merge(&metrics);
                    tally.metrics.record_document();
                    tally.completed.push(document.id);
                    break;
                }
                Ok((store, Err(e))) if e.is_transient() && attempt < policy.max_retries() => {
                    held = Some(store);
                    attempt += 1;
                    let backoff = policy.backoff(attempt);
                    warn!(
                        worker,
                        document = %document.name,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Document hit lock contention, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Ok((store, Err(e))) => {
                    held = Some(store);
                    warn!(worker, document = %document.name, error = %e, "Document failed");
                    tally.failures.push(DocumentFailure::new(&document, &e));
                    tally.metrics.record_failure();
                    break;
                }
                Err(e) => {
                    // The connection went down with the task; the next
                    // document gets a fresh one
                    error!(worker, document = %document.name, error = %e, "Document task panicked");
                    let err = ExtractorError::Worker(e.to_string());
                    tally.failures.push(DocumentFailure::new(&document, &err));
                    tally.metrics.record_failure();
                    break;
                }
            }
        }
    }

    debug!(worker, documents = tally.completed.len(), "Worker finished");
    tally
}
