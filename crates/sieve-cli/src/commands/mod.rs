//! Command implementations.

pub mod check;
pub mod clear;
pub mod config;
pub mod init;
pub mod stats;
pub mod types;

pub use self::check::execute_check;
pub use self::clear::{execute_clear_candidates, execute_clear_mentions};
pub use self::config::execute_config;
pub use self::init::execute_init;
pub use self::stats::execute_stats;
pub use self::types::execute_types;

#[cfg(test)]
pub(crate) mod fixtures {
    use sieve_domain::traits::LifecycleStore;
    use sieve_domain::{ContextDraft, ContextKind, TemporaryContext, TemporarySpan, TypeRegistry};
    use sieve_store::{ConnectionPool, StoreConfig, StoreUrl};
    use tempfile::TempDir;

    /// A store with one document, two Part mentions, one Temp mention and
    /// two PartTemp candidates in split 0
    pub(crate) async fn populated() -> (TempDir, ConnectionPool) {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::open(StoreConfig::with_url(StoreUrl::file(
            dir.path().join("cli.db"),
        )))
        .unwrap();

        pool.with_store(|store| {
            let registry = TypeRegistry::new();
            let part = registry.declare_mention("Part").unwrap();
            let temp = registry.declare_mention("Temp").unwrap();
            let part_temp = registry
                .declare_candidate("PartTemp", &[part.clone(), temp.clone()])
                .unwrap();
            store.ensure_mention_type(&part)?;
            store.ensure_mention_type(&temp)?;
            store.ensure_candidate_type(&part_temp)?;

            let doc = store.insert_document(
                "bc546",
                &[
                    ContextDraft::new(ContextKind::Document, "bc546"),
                    ContextDraft::sentence(&["BC546", "BC547", "150"]).with_parent(0),
                ],
            )?;
            let tree = store.context_tree(doc.id)?;
            let sentence = tree.sentences().next().unwrap().clone();
            let span = |i: usize| {
                TemporaryContext::Span(TemporarySpan::from_words(&sentence, i, i + 1).unwrap())
            };

            let a = store.insert_mention(&part, doc.id, &span(0))?.id();
            let b = store.insert_mention(&part, doc.id, &span(1))?.id();
            let t = store.insert_mention(&temp, doc.id, &span(2))?.id();
            store.insert_candidate(&part_temp, doc.id, 0, &[a, t])?;
            store.insert_candidate(&part_temp, doc.id, 0, &[b, t])?;
            Ok(())
        })
        .await
        .unwrap();

        (dir, pool)
    }
}
