//! Sieve Storage Layer
//!
//! Implements the [`LifecycleStore`] trait on SQLite.
//!
//! # Architecture
//!
//! - Static tables for documents, contexts and the base identities of every
//!   Mention and Candidate (`schema.sql`)
//! - One subclass table per declared type, created on first use, linked 1:1
//!   to its base table by a shared row id
//! - Foreign keys with `ON DELETE CASCADE` plus `AFTER DELETE` triggers on
//!   the subclass tables, so the cascade rules hold for any `DELETE`
//!   statement, not only for the methods below
//! - A bounded [`ConnectionPool`] handing one connection to each worker
//!
//! # Examples
//!
//! ```no_run
//! use sieve_store::SqliteStore;
//!
//! let store = SqliteStore::new("sieve.db").unwrap();
//! // Store is now ready for documents and extraction
//! ```

#![warn(missing_docs)]

mod candidates;
mod config;
mod documents;
mod invariants;
mod mentions;
mod pool;
mod retry;
mod subclass;
mod url;

pub use config::StoreConfig;
pub use invariants::Violation;
pub use pool::{ConnectionPool, PooledStore};
pub use retry::RetryPolicy;
pub use subclass::CatalogEntry;
pub use url::StoreUrl;

use rusqlite::{Connection, ErrorCode, OpenFlags};
use sieve_domain::traits::{InsertOutcome, LifecycleStore, MentionScope};
use sieve_domain::{
    CandidateId, CandidateRecord, CandidateType, ContextTree, DocumentId, DomainError, MentionId,
    MentionRecord, MentionType, TemporaryContext,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Bad connection string, pool settings or conflicting type catalog
    #[error("Configuration error: {0}")]
    Config(String),

    /// No connection became available in time
    #[error("Connection pool exhausted after {attempts} attempts ({max_connections} connections)")]
    PoolExhausted {
        /// Acquire attempts made
        attempts: u32,
        /// Size of the pool
        max_connections: usize,
    },

    /// A lifecycle invariant does not hold
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Type declaration rejected
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// A blocking store task panicked or was cancelled
    #[error("Store task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Whether retrying the same operation may succeed
    ///
    /// True for lock contention (`SQLITE_BUSY`, `SQLITE_LOCKED`) and pool
    /// exhaustion.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            StoreError::PoolExhausted { .. } => true,
            _ => false,
        }
    }
}

/// SQLite-based implementation of [`LifecycleStore`]
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Each worker should hold its own
/// SqliteStore instance, normally checked out of a [`ConnectionPool`].
pub struct SqliteStore {
    conn: Connection,
    url: StoreUrl,
    /// Types whose tables this connection has already ensured
    ensured: HashSet<String>,
    /// Types ensured inside the open transaction; kept only if it commits
    pending: HashSet<String>,
}

impl SqliteStore {
    /// Open (creating if needed) the database file at `path`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sieve_store::SqliteStore;
    ///
    /// let store = SqliteStore::new("sieve.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let config = StoreConfig::with_url(StoreUrl::file(path));
        Self::connect(&config.url, &config)
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self, StoreError> {
        let config = StoreConfig::with_url(StoreUrl::memory());
        Self::connect(&config.url, &config)
    }

    /// Open a connection to `url` using the timeouts from `config`
    pub fn connect(url: &StoreUrl, config: &StoreConfig) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(url.sqlite_uri(), flags)?;
        conn.busy_timeout(config.busy_timeout())?;

        let mut store = Self {
            conn,
            url: url.clone(),
            ensured: HashSet::new(),
            pending: HashSet::new(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Apply connection pragmas and create the static tables
    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        if !self.url.is_memory() {
            // WAL lets readers proceed while one worker writes
            let mode: String =
                self.conn
                    .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            if !mode.eq_ignore_ascii_case("wal") {
                warn!(url = %self.url, mode = %mode, "WAL journal mode unavailable");
            }
            self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        }
        // Cascades live in the schema, so foreign keys must be enforced
        self.conn.pragma_update(None, "foreign_keys", "ON")?;

        let schema = include_str!("schema.sql");
        self.conn.execute_batch(schema)?;

        Ok(())
    }

    /// Location of this store
    pub fn url(&self) -> &StoreUrl {
        &self.url
    }

    /// Whether no transaction is open on this connection
    pub fn is_idle(&self) -> bool {
        self.conn.is_autocommit()
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction
    ///
    /// The write lock is taken up front so two workers never deadlock
    /// upgrading read locks. The transaction is rolled back if `f` fails.
    pub fn with_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(StoreError::from)?;

        match f(self) {
            Ok(value) => match self.conn.execute_batch("COMMIT") {
                Ok(()) => {
                    self.ensured.extend(self.pending.drain());
                    Ok(value)
                }
                Err(e) => {
                    self.rollback();
                    Err(StoreError::from(e).into())
                }
            },
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }

    fn rollback(&mut self) {
        self.pending.clear();
        if self.conn.is_autocommit() {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            warn!(error = %e, "Rollback failed");
        }
    }

    /// Create a mention type's subclass table if missing
    pub fn ensure_mention_type(&mut self, mention_type: &MentionType) -> Result<(), StoreError> {
        let key = format!("mention:{}", mention_type.name());
        if self.is_ensured(&key) {
            return Ok(());
        }
        subclass::ensure_mention(&mut self.conn, mention_type)?;
        self.remember(key);
        Ok(())
    }

    /// Create a candidate type's subclass table (and those of its argument
    /// types) if missing
    pub fn ensure_candidate_type(
        &mut self,
        candidate_type: &CandidateType,
    ) -> Result<(), StoreError> {
        let key = format!("candidate:{}", candidate_type.name());
        if self.is_ensured(&key) {
            return Ok(());
        }
        for mention_type in candidate_type.mention_types() {
            self.ensure_mention_type(mention_type)?;
        }
        subclass::ensure_candidate(&mut self.conn, candidate_type)?;
        self.remember(key);
        Ok(())
    }

    fn is_ensured(&self, key: &str) -> bool {
        self.ensured.contains(key) || self.pending.contains(key)
    }

    /// DDL run inside a transaction is undone by its rollback
    fn remember(&mut self, key: String) {
        if self.conn.is_autocommit() {
            self.ensured.insert(key);
        } else {
            self.pending.insert(key);
        }
    }

    /// Rebuild type handles from the persisted catalog
    pub fn load_types(&self) -> Result<sieve_domain::TypeRegistry, StoreError> {
        subclass::load_registry(&self.conn)
    }

    /// Declared types recorded in the catalog
    pub fn catalog(&self) -> Result<Vec<CatalogEntry>, StoreError> {
        subclass::catalog(&self.conn)
    }

    /// Delete one mention through its base identity
    ///
    /// Cascades to its subclass row and every candidate referencing it.
    pub fn delete_mention(&mut self, id: MentionId) -> Result<bool, StoreError> {
        mentions::delete_one(&self.conn, id)
    }

    /// Delete one mention through its subclass row
    pub fn delete_mention_subclass_row(
        &mut self,
        mention_type: &MentionType,
        id: MentionId,
    ) -> Result<bool, StoreError> {
        mentions::delete_subclass_row(&self.conn, mention_type, id)
    }

    /// Number of mentions: subclass rows of one type, or all base rows
    pub fn count_mentions(&self, mention_type: Option<&MentionType>) -> Result<usize, StoreError> {
        mentions::count(&self.conn, mention_type)
    }

    /// Delete one candidate through its base identity
    ///
    /// Removes the subclass row; referenced mentions stay.
    pub fn delete_candidate(&mut self, id: CandidateId) -> Result<bool, StoreError> {
        candidates::delete_one(&self.conn, id)
    }

    /// Delete one candidate through its subclass row
    ///
    /// Removes the base row; referenced mentions stay.
    pub fn delete_candidate_subclass_row(
        &mut self,
        candidate_type: &CandidateType,
        id: CandidateId,
    ) -> Result<bool, StoreError> {
        candidates::delete_subclass_row(&self.conn, candidate_type, id)
    }

    /// Number of candidates: subclass rows of one type, or all base rows
    pub fn count_candidates(
        &self,
        candidate_type: Option<&CandidateType>,
    ) -> Result<usize, StoreError> {
        candidates::count(&self.conn, candidate_type)
    }

    /// Execute a raw SQL statement, returning the number of rows it changed
    ///
    /// Cascades still apply: they live in the schema, not in this crate.
    pub fn execute_statement(&mut self, sql: &str) -> Result<usize, StoreError> {
        Ok(self.conn.execute(sql, [])?)
    }

    /// Check the lifecycle invariants, returning every violation found
    pub fn check_invariants(&self) -> Result<Vec<Violation>, StoreError> {
        invariants::check(&self.conn)
    }
}

impl LifecycleStore for SqliteStore {
    type Error = StoreError;

    fn context_tree(&self, document: DocumentId) -> Result<ContextTree, Self::Error> {
        documents::context_tree(&self.conn, document)
    }

    fn ensure_mention_type(&mut self, mention_type: &MentionType) -> Result<(), Self::Error> {
        SqliteStore::ensure_mention_type(self, mention_type)
    }

    fn ensure_candidate_type(
        &mut self,
        candidate_type: &CandidateType,
    ) -> Result<(), Self::Error> {
        SqliteStore::ensure_candidate_type(self, candidate_type)
    }

    fn insert_mention(
        &mut self,
        mention_type: &MentionType,
        document: DocumentId,
        span: &TemporaryContext,
    ) -> Result<InsertOutcome<MentionId>, Self::Error> {
        SqliteStore::ensure_mention_type(self, mention_type)?;
        mentions::insert(&self.conn, mention_type, document, span)
    }

    fn mentions_of(
        &self,
        mention_type: &MentionType,
        document: Option<DocumentId>,
    ) -> Result<Vec<MentionRecord>, Self::Error> {
        mentions::list(&self.conn, mention_type, document)
    }

    fn delete_mentions(
        &mut self,
        types: &[Arc<MentionType>],
        scope: MentionScope,
    ) -> Result<usize, Self::Error> {
        mentions::delete_by_types(&self.conn, types, scope)
    }

    fn insert_candidate(
        &mut self,
        candidate_type: &CandidateType,
        document: DocumentId,
        split: i64,
        mentions: &[MentionId],
    ) -> Result<InsertOutcome<CandidateId>, Self::Error> {
        SqliteStore::ensure_candidate_type(self, candidate_type)?;
        candidates::insert(&self.conn, candidate_type, document, split, mentions)
    }

    fn candidates_of(
        &self,
        candidate_type: &CandidateType,
        document: Option<DocumentId>,
        split: Option<i64>,
    ) -> Result<Vec<CandidateRecord>, Self::Error> {
        candidates::list(&self.conn, candidate_type, document, split)
    }

    fn delete_candidates(
        &mut self,
        types: &[Arc<CandidateType>],
        split: Option<i64>,
    ) -> Result<usize, Self::Error> {
        candidates::delete_by_types(&self.conn, types, split)
    }

    fn in_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        E: From<Self::Error>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        self.with_transaction(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;
    use sieve_domain::{ContextDraft, ContextKind, TemporaryContext, TemporarySpan, TypeRegistry};

    #[test]
    fn test_transient_classification() {
        let busy = StoreError::Database(rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_BUSY),
            None,
        ));
        let constraint = StoreError::Database(rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_CONSTRAINT),
            None,
        ));
        assert!(busy.is_transient());
        assert!(!constraint.is_transient());
        assert!(!StoreError::NotFound("x".into()).is_transient());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut store = SqliteStore::in_memory().unwrap();
        let result: Result<(), StoreError> = store.with_transaction(|s| {
            s.insert_document("doc", &[])?;
            Err(StoreError::InvalidData("abort".into()))
        });
        assert!(result.is_err());
        assert!(store.is_idle());
        assert!(store.document_by_name("doc").unwrap().is_none());
    }

    #[test]
    fn test_type_tables_created_in_rolled_back_transaction() {
        let mut store = SqliteStore::in_memory().unwrap();
        let doc = store
            .insert_document(
                "doc",
                &[
                    ContextDraft::new(ContextKind::Document, "doc"),
                    ContextDraft::sentence(&["BC546", "BC547"]).with_parent(0),
                ],
            )
            .unwrap();
        let tree = store.context_tree(doc.id).unwrap();
        let sentence = tree.sentences().next().unwrap();
        let first = TemporaryContext::Span(TemporarySpan::from_words(sentence, 0, 1).unwrap());
        let second = TemporaryContext::Span(TemporarySpan::from_words(sentence, 1, 2).unwrap());

        let registry = TypeRegistry::new();
        let part = registry.declare_mention("Part").unwrap();

        let result: Result<(), StoreError> = store.with_transaction(|s| {
            s.insert_mention(&part, doc.id, &first)?;
            Err(StoreError::InvalidData("abort".into()))
        });
        assert!(result.is_err());

        // The table went away with the rollback and is created again
        let outcome = store
            .with_transaction(|s| s.insert_mention(&part, doc.id, &second))
            .unwrap();
        assert!(outcome.is_inserted());
        assert!(store.insert_mention(&part, doc.id, &first).unwrap().is_inserted());
        assert_eq!(store.count_mentions(Some(&*part)).unwrap(), 2);
    }

    #[test]
    fn test_transaction_commits() {
        let mut store = SqliteStore::in_memory().unwrap();
        let doc = store
            .with_transaction(|s| s.insert_document("doc", &[]))
            .unwrap();
        assert_eq!(store.document_by_name("doc").unwrap(), Some(doc));
    }
}
