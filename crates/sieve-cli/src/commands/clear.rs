//! Clear command implementations.

use crate::cli::{ClearCandidatesArgs, ClearMentionsArgs};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use sieve_domain::traits::{LifecycleStore, MentionScope};
use sieve_store::{ConnectionPool, StoreError};
use std::sync::Arc;
use tracing::info;

/// Execute the clear-mentions command.
pub async fn execute_clear_mentions(
    args: ClearMentionsArgs,
    pool: &ConnectionPool,
    formatter: &Formatter,
) -> Result<()> {
    let deleted = clear_mentions(args, pool).await?;
    println!("{}", formatter.deleted("mention", deleted)?);
    Ok(())
}

/// Execute the clear-candidates command.
pub async fn execute_clear_candidates(
    args: ClearCandidatesArgs,
    pool: &ConnectionPool,
    formatter: &Formatter,
) -> Result<()> {
    let deleted = clear_candidates(args, pool).await?;
    println!("{}", formatter.deleted("candidate", deleted)?);
    Ok(())
}

/// Delete the selected mentions, cascading to their candidates.
pub async fn clear_mentions(args: ClearMentionsArgs, pool: &ConnectionPool) -> Result<usize> {
    let deleted = pool
        .with_store(move |store| {
            let registry = store.load_types()?;
            let types = select(
                registry.mention_types(),
                &args.types,
                |t| t.name(),
                "mention",
            )?;
            let scope = match &args.document {
                None => MentionScope::All,
                Some(name) => {
                    let document = store.document_by_name(name)?.ok_or_else(|| {
                        StoreError::NotFound(format!("document '{}'", name))
                    })?;
                    MentionScope::Document(document.id)
                }
            };
            store.with_transaction(|s| s.delete_mentions(&types, scope))
        })
        .await?;

    info!(deleted, "Cleared mentions");
    Ok(deleted)
}

/// Delete the selected candidates; mentions stay.
pub async fn clear_candidates(args: ClearCandidatesArgs, pool: &ConnectionPool) -> Result<usize> {
    let split = args.split;
    let deleted = pool
        .with_store(move |store| {
            let registry = store.load_types()?;
            let types = select(
                registry.candidate_types(),
                &args.types,
                |t| t.name(),
                "candidate",
            )?;
            store.with_transaction(|s| s.delete_candidates(&types, split))
        })
        .await?;

    info!(deleted, split = ?split, "Cleared candidates");
    Ok(deleted)
}

/// Pick the declared types named in `names`; all of them when empty
fn select<T>(
    declared: Vec<Arc<T>>,
    names: &[String],
    name_of: impl Fn(&T) -> &str,
    kind: &str,
) -> std::result::Result<Vec<Arc<T>>, StoreError> {
    if names.is_empty() {
        return Ok(declared);
    }
    names
        .iter()
        .map(|name| {
            declared
                .iter()
                .find(|t| {
                    let t: &T = t;
                    name_of(t) == name.as_str()
                })
                .cloned()
                .ok_or_else(|| StoreError::NotFound(format!("{} type '{}'", kind, name)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::populated;

    #[tokio::test]
    async fn test_clear_one_mention_type_cascades() {
        let (_dir, pool) = populated().await;
        let deleted = clear_mentions(
            ClearMentionsArgs {
                types: vec!["Temp".to_string()],
                document: None,
            },
            &pool,
        )
        .await
        .unwrap();
        assert_eq!(deleted, 1);

        let (parts, candidates) = pool
            .with_store(|s| Ok((s.count_mentions(None)?, s.count_candidates(None)?)))
            .await
            .unwrap();
        assert_eq!(parts, 2);
        assert_eq!(candidates, 0);
    }

    #[tokio::test]
    async fn test_clear_mentions_of_unknown_document() {
        let (_dir, pool) = populated().await;
        let result = clear_mentions(
            ClearMentionsArgs {
                types: Vec::new(),
                document: Some("missing".to_string()),
            },
            &pool,
        )
        .await;
        assert!(matches!(result, Err(CliError::Store(StoreError::NotFound(_)))));
    }

    #[tokio::test]
    async fn test_clear_candidates_by_split() {
        let (_dir, pool) = populated().await;
        let other_split = clear_candidates(
            ClearCandidatesArgs {
                types: Vec::new(),
                split: Some(1),
            },
            &pool,
        )
        .await
        .unwrap();
        assert_eq!(other_split, 0);

        let deleted = clear_candidates(
            ClearCandidatesArgs {
                types: vec!["PartTemp".to_string()],
                split: Some(0),
            },
            &pool,
        )
        .await
        .unwrap();
        assert_eq!(deleted, 2);

        let mentions = pool.with_store(|s| s.count_mentions(None)).await.unwrap();
        assert_eq!(mentions, 3);
    }

    #[tokio::test]
    async fn test_unknown_type_is_rejected() {
        let (_dir, pool) = populated().await;
        let result = clear_candidates(
            ClearCandidatesArgs {
                types: vec!["Nope".to_string()],
                split: None,
            },
            &pool,
        )
        .await;
        assert!(matches!(result, Err(CliError::Store(StoreError::NotFound(_)))));
    }
}
