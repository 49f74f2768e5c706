//! Types command implementation.

use crate::error::Result;
use crate::output::Formatter;
use sieve_store::ConnectionPool;

/// Execute the types command.
pub async fn execute_types(pool: &ConnectionPool, formatter: &Formatter) -> Result<()> {
    let catalog = pool.with_store(|store| store.catalog()).await?;
    println!("{}", formatter.format_catalog(&catalog)?);
    Ok(())
}
