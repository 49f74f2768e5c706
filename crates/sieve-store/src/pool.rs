//! Bounded connection pool
//!
//! At most `max_connections` stores are checked out at once. Callers beyond
//! that wait on a semaphore instead of opening more connections, so a
//! request for more workers than the database can serve queues rather than
//! failing.

use crate::{RetryPolicy, SqliteStore, StoreConfig, StoreError};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Upper bound on the delay between acquire attempts
const MAX_ACQUIRE_BACKOFF_MS: u64 = 5_000;
const INITIAL_ACQUIRE_BACKOFF_MS: u64 = 100;

/// Lock a mutex, recovering the data if a holder panicked
fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Connection pool mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

struct PoolInner {
    config: StoreConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<SqliteStore>>,
}

/// Pool of [`SqliteStore`] connections to one database
///
/// Cloning is cheap; clones share the same connections and budget.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Open a pool, eagerly connecting once to create the schema and to
    /// surface a bad url immediately
    ///
    /// The first connection stays idle in the pool, which also keeps an
    /// in-memory database alive for the pool's lifetime.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let first = SqliteStore::connect(&config.url, &config)?;
        debug!(
            url = %config.url,
            max_connections = config.max_connections,
            "Opened connection pool"
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                permits: Arc::new(Semaphore::new(config.max_connections)),
                idle: Mutex::new(vec![first]),
                config,
            }),
        })
    }

    /// Maximum number of connections checked out at once
    pub fn max_connections(&self) -> usize {
        self.inner.config.max_connections
    }

    /// Connections that could be checked out right now without waiting
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Open connections currently parked in the pool
    pub fn idle_count(&self) -> usize {
        acquire_lock(&self.inner.idle).len()
    }

    /// Pool settings
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Check out a connection, waiting for one to free up
    ///
    /// Each wait is bounded by `acquire_timeout`; after `acquire_retries`
    /// further timed-out waits (with backoff in between) the call fails with
    /// [`StoreError::PoolExhausted`].
    pub async fn acquire(&self) -> Result<PooledStore, StoreError> {
        let config = &self.inner.config;
        let policy = RetryPolicy::new(
            config.acquire_retries,
            INITIAL_ACQUIRE_BACKOFF_MS,
            MAX_ACQUIRE_BACKOFF_MS,
        );
        let mut attempts = 0u32;

        let permit = policy
            .retry_if("acquire_connection", StoreError::is_transient, || {
                attempts += 1;
                let permits = Arc::clone(&self.inner.permits);
                let wait = config.acquire_timeout();
                let max_connections = config.max_connections;
                let attempt = attempts;
                async move {
                    match timeout(wait, permits.acquire_owned()).await {
                        Ok(Ok(permit)) => Ok(permit),
                        Ok(Err(_closed)) => Err(StoreError::Config(
                            "connection pool has been closed".to_string(),
                        )),
                        Err(_elapsed) => Err(StoreError::PoolExhausted {
                            attempts: attempt,
                            max_connections,
                        }),
                    }
                }
            })
            .await?;

        let parked = acquire_lock(&self.inner.idle).pop();
        let store = match parked {
            Some(store) => store,
            None => {
                let url = config.url.clone();
                let config = config.clone();
                tokio::task::spawn_blocking(move || SqliteStore::connect(&url, &config))
                    .await
                    .map_err(|e| StoreError::Task(e.to_string()))??
            }
        };

        Ok(PooledStore {
            store: Some(store),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Run blocking store work on a pooled connection
    pub async fn with_store<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteStore) -> Result<T, StoreError> + Send + 'static,
    {
        let mut store = self.acquire().await?;
        tokio::task::spawn_blocking(move || f(&mut store))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// A connection checked out of a [`ConnectionPool`]
///
/// Returned to the pool on drop. A connection left inside a transaction is
/// rolled back first, and closed if that fails.
pub struct PooledStore {
    store: Option<SqliteStore>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledStore {
    type Target = SqliteStore;

    fn deref(&self) -> &SqliteStore {
        // Only `drop` takes the store out
        self.store.as_ref().unwrap_or_else(|| unreachable!("pooled store already released"))
    }
}

impl DerefMut for PooledStore {
    fn deref_mut(&mut self) -> &mut SqliteStore {
        self.store.as_mut().unwrap_or_else(|| unreachable!("pooled store already released"))
    }
}

impl Drop for PooledStore {
    fn drop(&mut self) {
        let Some(mut store) = self.store.take() else {
            return;
        };
        if !store.is_idle() {
            warn!("Returning a connection with an open transaction, rolling back");
            store.rollback();
            if !store.is_idle() {
                return;
            }
        }
        acquire_lock(&self.pool.idle).push(store);
    }
}
