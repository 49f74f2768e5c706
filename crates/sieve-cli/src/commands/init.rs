//! Init command implementation.

use crate::error::Result;
use crate::output::Formatter;
use sieve_store::ConnectionPool;
use tracing::info;

/// Execute the init command.
///
/// Opening the pool already creates the static schema; this checks a
/// connection out once so the database file exists afterwards.
pub async fn execute_init(pool: &ConnectionPool, formatter: &Formatter) -> Result<()> {
    let documents = pool.with_store(|store| store.count_documents()).await?;
    let url = pool.config().url.clone();
    info!(url = %url, documents, "Store initialized");
    println!(
        "{}",
        formatter.success(&format!("Store ready at {} ({} document(s))", url, documents))
    );
    Ok(())
}
