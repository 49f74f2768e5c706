//! Integration tests for sieve-store
//!
//! These tests verify the cascade rules on a database file, including
//! deletes issued as raw SQL and writes from several connections.

use sieve_domain::traits::{LifecycleStore, MentionScope};
use sieve_domain::{
    CandidateType, ContextDraft, ContextKind, DocumentRef, MentionId, MentionType,
    TemporaryContext, TemporarySpan, TypeRegistry,
};
use sieve_store::{ConnectionPool, SqliteStore, StoreConfig, StoreUrl};
use std::sync::Arc;
use tempfile::TempDir;

struct Corpus {
    _dir: TempDir,
    path: std::path::PathBuf,
    store: SqliteStore,
    part: Arc<MentionType>,
    temp: Arc<MentionType>,
    part_temp: Arc<CandidateType>,
    part_part: Arc<CandidateType>,
}

fn corpus() -> Corpus {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lifecycle.db");
    let store = SqliteStore::new(&path).unwrap();

    let registry = TypeRegistry::new();
    let part = registry.declare_mention("Part").unwrap();
    let temp = registry.declare_mention("Temp").unwrap();
    let part_temp = registry
        .declare_candidate("PartTemp", &[part.clone(), temp.clone()])
        .unwrap();
    let part_part = registry
        .declare_candidate("PartPart", &[part.clone(), part.clone()])
        .unwrap();

    Corpus {
        _dir: dir,
        path,
        store,
        part,
        temp,
        part_temp,
        part_part,
    }
}

/// Load a document with one sentence of `words` words and store every word
/// as a Part, and as a Temp when its index is odd
fn populate(c: &mut Corpus, name: &str, words: usize) -> (DocumentRef, Vec<MentionId>, Vec<MentionId>) {
    let tokens: Vec<String> = (0..words).map(|i| format!("w{}", i)).collect();
    let refs: Vec<&str> = tokens.iter().map(|t| t.as_str()).collect();
    let doc = c
        .store
        .insert_document(
            name,
            &[
                ContextDraft::new(ContextKind::Document, ""),
                ContextDraft::sentence(&refs).with_parent(0),
            ],
        )
        .unwrap();
    let tree = c.store.context_tree(doc.id).unwrap();
    let sentence = tree.sentences().next().unwrap();

    let mut parts = Vec::new();
    let mut temps = Vec::new();
    for w in 0..words {
        let span = TemporaryContext::Span(TemporarySpan::from_words(sentence, w, w + 1).unwrap());
        parts.push(c.store.insert_mention(&c.part, doc.id, &span).unwrap().id());
        if w % 2 == 1 {
            temps.push(c.store.insert_mention(&c.temp, doc.id, &span).unwrap().id());
        }
    }
    for &p in &parts {
        for &t in &temps {
            c.store.insert_candidate(&c.part_temp, doc.id, 0, &[p, t]).unwrap();
        }
    }
    for pair in parts.windows(2) {
        c.store.insert_candidate(&c.part_part, doc.id, 0, pair).unwrap();
    }
    (doc, parts, temps)
}

#[test]
fn test_document_delete_cascades_everything() {
    let mut c = corpus();
    let (doc_a, _, _) = populate(&mut c, "a", 6);
    let (_doc_b, _, _) = populate(&mut c, "b", 4);

    let before = c.store.count_candidates(None).unwrap();
    assert!(c.store.delete_document(doc_a.id).unwrap());

    // Document b: 4 parts, 2 temps, 8 PartTemp + 3 PartPart
    assert_eq!(c.store.count_documents().unwrap(), 1);
    assert_eq!(c.store.count_contexts().unwrap(), 2);
    assert_eq!(c.store.count_mentions(Some(&c.part)).unwrap(), 4);
    assert_eq!(c.store.count_mentions(Some(&c.temp)).unwrap(), 2);
    assert_eq!(c.store.count_candidates(None).unwrap(), 11);
    assert!(before > 11);
    assert!(c.store.check_invariants().unwrap().is_empty());
}

#[test]
fn test_mention_delete_cascades_across_relations() {
    let mut c = corpus();
    let (_, parts, temps) = populate(&mut c, "doc", 6);

    // parts[1] is in 3 PartTemp and 2 PartPart candidates
    assert!(c.store.delete_mention(parts[1]).unwrap());
    assert_eq!(c.store.count_candidates(Some(&c.part_temp)).unwrap(), 5 * 3);
    assert_eq!(c.store.count_candidates(Some(&c.part_part)).unwrap(), 3);

    for candidate in c.store.candidates_of(&c.part_temp, None, None).unwrap() {
        assert!(!candidate.references(parts[1]));
    }

    // Unrelated mentions survive
    assert_eq!(c.store.count_mentions(Some(&c.part)).unwrap(), 5);
    assert_eq!(c.store.count_mentions(Some(&c.temp)).unwrap(), temps.len());
    assert!(c.store.check_invariants().unwrap().is_empty());
}

#[test]
fn test_candidate_deletes_never_touch_mentions() {
    let mut c = corpus();
    populate(&mut c, "doc", 6);
    let mentions_before = c.store.count_mentions(None).unwrap();
    let candidates = c.store.candidates_of(&c.part_temp, None, None).unwrap();
    let total = candidates.len();

    assert!(c.store.delete_candidate(candidates[0].id).unwrap());
    assert_eq!(c.store.count_candidates(Some(&c.part_temp)).unwrap(), total - 1);

    assert!(c
        .store
        .delete_candidate_subclass_row(&c.part_temp, candidates[1].id)
        .unwrap());
    assert_eq!(c.store.count_candidates(Some(&c.part_temp)).unwrap(), total - 2);

    let cleared = c
        .store
        .delete_candidates(&[c.part_temp.clone(), c.part_part.clone()], None)
        .unwrap();
    assert_eq!(cleared, total - 2 + 5);
    assert_eq!(c.store.count_candidates(None).unwrap(), 0);
    assert_eq!(c.store.count_mentions(None).unwrap(), mentions_before);
    assert!(c.store.check_invariants().unwrap().is_empty());
}

#[test]
fn test_raw_sql_deletes_cascade() {
    let mut c = corpus();
    populate(&mut c, "doc", 4);

    // Delete through a subclass table with plain SQL
    let removed = c
        .store
        .execute_statement("DELETE FROM mention__temp")
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(c.store.count_mentions(None).unwrap(), 4);
    assert_eq!(c.store.count_candidates(Some(&c.part_temp)).unwrap(), 0);
    assert_eq!(c.store.count_candidates(Some(&c.part_part)).unwrap(), 3);

    // And through the base table
    c.store
        .execute_statement("DELETE FROM candidate WHERE type_name = 'PartPart'")
        .unwrap();
    assert_eq!(c.store.count_candidates(Some(&c.part_part)).unwrap(), 0);
    assert!(c.store.check_invariants().unwrap().is_empty());
}

#[test]
fn test_clear_mentions_of_all_types_empties_relations() {
    let mut c = corpus();
    populate(&mut c, "a", 5);
    populate(&mut c, "b", 3);

    let types = vec![c.part.clone(), c.temp.clone()];
    c.store.delete_mentions(&types, MentionScope::All).unwrap();

    assert_eq!(c.store.count_mentions(None).unwrap(), 0);
    assert_eq!(c.store.count_mentions(Some(&c.part)).unwrap(), 0);
    assert_eq!(c.store.count_candidates(None).unwrap(), 0);
    assert_eq!(c.store.count_candidates(Some(&c.part_temp)).unwrap(), 0);
    assert_eq!(c.store.count_documents().unwrap(), 2);
}

#[test]
fn test_second_connection_sees_types_and_rows() {
    let mut c = corpus();
    let (doc, _, _) = populate(&mut c, "doc", 4);

    let other = SqliteStore::new(&c.path).unwrap();
    let registry = other.load_types().unwrap();
    let part_temp = registry.candidate_type("PartTemp").unwrap();
    assert_eq!(*part_temp, *c.part_temp);
    assert_eq!(
        other.candidates_of(&part_temp, Some(doc.id), Some(0)).unwrap().len(),
        8
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pool_writers_on_file_database() {
    let c = corpus();
    let mut config = StoreConfig::with_url(StoreUrl::file(&c.path));
    config.max_connections = 4;
    let pool = ConnectionPool::open(config).unwrap();

    let mut handles = Vec::new();
    for i in 0..12 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            pool.with_store(move |store| {
                store.with_transaction(|s| {
                    s.insert_document(&format!("doc-{}", i), &[ContextDraft::sentence(&["x"])])
                })
            })
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let count = pool.with_store(|s| s.count_documents()).await.unwrap();
    assert_eq!(count, 12);
}
