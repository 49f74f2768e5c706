//! Stats command implementation.

use crate::error::Result;
use crate::output::{Formatter, StoreStats, TypeCount};
use sieve_store::ConnectionPool;

/// Execute the stats command.
pub async fn execute_stats(pool: &ConnectionPool, formatter: &Formatter) -> Result<()> {
    let stats = collect_stats(pool).await?;
    println!("{}", formatter.format_stats(&stats)?);
    Ok(())
}

/// Count documents, contexts and the rows of every declared type.
pub async fn collect_stats(pool: &ConnectionPool) -> Result<StoreStats> {
    let stats = pool
        .with_store(|store| {
            let registry = store.load_types()?;
            let mut types = Vec::new();
            for mention_type in registry.mention_types() {
                types.push(TypeCount {
                    kind: "mention".to_string(),
                    name: mention_type.name().to_string(),
                    rows: store.count_mentions(Some(&*mention_type))?,
                });
            }
            for candidate_type in registry.candidate_types() {
                types.push(TypeCount {
                    kind: "candidate".to_string(),
                    name: candidate_type.name().to_string(),
                    rows: store.count_candidates(Some(&*candidate_type))?,
                });
            }

            Ok(StoreStats {
                documents: store.count_documents()?,
                contexts: store.count_contexts()?,
                mentions: store.count_mentions(None)?,
                candidates: store.count_candidates(None)?,
                types,
            })
        })
        .await?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::populated;

    #[tokio::test]
    async fn test_collect_stats() {
        let (_dir, pool) = populated().await;
        let stats = collect_stats(&pool).await.unwrap();

        assert_eq!(stats.documents, 1);
        assert_eq!(stats.contexts, 2);
        assert_eq!(stats.mentions, 3);
        assert_eq!(stats.candidates, 2);

        let rows = |name: &str| stats.types.iter().find(|t| t.name == name).unwrap().rows;
        assert_eq!(rows("Part"), 2);
        assert_eq!(rows("Temp"), 1);
        assert_eq!(rows("PartTemp"), 2);
    }
}
