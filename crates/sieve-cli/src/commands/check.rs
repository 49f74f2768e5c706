//! Check command implementation.

use crate::error::{CliError, Result};
use crate::output::Formatter;
use sieve_store::ConnectionPool;
use tracing::warn;

/// Execute the check command.
///
/// Fails with [`CliError::Violations`] when any invariant is broken, so the
/// process exits non-zero.
pub async fn execute_check(pool: &ConnectionPool, formatter: &Formatter) -> Result<()> {
    let violations = pool.with_store(|store| store.check_invariants()).await?;
    println!("{}", formatter.format_violations(&violations)?);

    if violations.is_empty() {
        return Ok(());
    }
    for violation in &violations {
        warn!(check = violation.check, table = %violation.table, rows = violation.count, "Invariant violated");
    }
    Err(CliError::Violations(violations.len()))
}
