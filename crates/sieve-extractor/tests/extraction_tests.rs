//! End-to-end extraction tests against a database file
//!
//! The corpus mirrors a small datasheet collection: part numbers `BC100`
//! to `BC169`, storage temperatures `300` to `322` and a few figures.

use sieve_domain::traits::{MentionScope, Throttler};
use sieve_domain::{ContextDraft, ContextKind, DocumentRef, MentionRecord, TypeRegistry};
use sieve_extractor::{
    CandidateExtractor, CandidateExtractorConfig, ExtractionConfig, FigureSpace,
    LambdaMatcher, LambdaThrottler, MentionExtractor, MentionTriple, NgramSpace, RegexMatcher,
};
use sieve_store::{ConnectionPool, StoreConfig, StoreUrl};
use std::sync::Arc;
use tempfile::TempDir;

const PARTS: usize = 70;
const TEMPS: usize = 23;

fn file_pool(dir: &TempDir, max_connections: usize) -> ConnectionPool {
    let mut config = StoreConfig::with_url(StoreUrl::file(dir.path().join("corpus.db")));
    config.max_connections = max_connections;
    ConnectionPool::open(config).unwrap()
}

async fn insert(pool: &ConnectionPool, name: &str, drafts: Vec<ContextDraft>) -> DocumentRef {
    let name = name.to_string();
    pool.with_store(move |store| store.insert_document(&name, &drafts))
        .await
        .unwrap()
}

/// One document holding every part, every temperature and three figures
async fn datasheet(pool: &ConnectionPool) -> DocumentRef {
    let parts: Vec<String> = (0..PARTS).map(|i| format!("BC{}", 100 + i)).collect();
    let temps: Vec<String> = (0..TEMPS).map(|j| format!("{}", 300 + j)).collect();
    let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
    let temps: Vec<&str> = temps.iter().map(String::as_str).collect();

    let drafts = vec![
        ContextDraft::new(ContextKind::Document, "bc-series"),
        ContextDraft::sentence(&parts).with_parent(0),
        ContextDraft::sentence(&temps).with_parent(0),
        ContextDraft::figure("img/pinout.png").with_parent(0),
        ContextDraft::figure("img/curve.jpg").with_parent(0),
        ContextDraft::figure("img/package.PNG?raw=1").with_parent(0),
    ];
    insert(pool, "bc-series", drafts).await
}

fn part_index(mention: &MentionRecord) -> usize {
    mention.text[2..].parse::<usize>().unwrap() - 100
}

fn temp_index(mention: &MentionRecord) -> usize {
    mention.text.parse::<usize>().unwrap() - 300
}

/// Rejects 178 of the 1610 part/temperature pairs
fn temp_throttler() -> Arc<dyn Throttler> {
    Arc::new(
        LambdaThrottler::new("temp_throttler", |m| {
            (part_index(&m[0]) + temp_index(&m[1])) % 9 != 0
        })
        .with_arity(2),
    )
}

async fn mention_extractor(pool: &ConnectionPool, registry: &TypeRegistry) -> MentionExtractor {
    let ngrams = Arc::new(NgramSpace::new(1).unwrap());
    MentionExtractor::new(
        pool.clone(),
        vec![
            MentionTriple::new(
                registry.declare_mention("Part").unwrap(),
                ngrams.clone(),
                Arc::new(RegexMatcher::new(r"BC\d{3}").unwrap()),
            ),
            MentionTriple::new(
                registry.declare_mention("Temp").unwrap(),
                ngrams,
                Arc::new(RegexMatcher::new(r"3\d\d").unwrap()),
            ),
            MentionTriple::new(
                registry.declare_mention("Figure").unwrap(),
                Arc::new(FigureSpace::new(["png"])),
                Arc::new(LambdaMatcher::new("any_figure", |_| true)),
            ),
        ],
        ExtractionConfig::default(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_cascade_lifecycle() {
    let dir = TempDir::new().unwrap();
    let pool = file_pool(&dir, 4);
    let doc = datasheet(&pool).await;

    let registry = TypeRegistry::new();
    let mentions = mention_extractor(&pool, &registry).await;
    let report = mentions.apply(&[doc.clone()], 4).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.inserted("Part"), PARTS);
    assert_eq!(report.inserted("Temp"), TEMPS);
    assert_eq!(report.inserted("Figure"), 2);

    let part = registry.declare_mention("Part").unwrap();
    let temp = registry.declare_mention("Temp").unwrap();
    let part_temp = registry
        .declare_candidate("PartTemp", &[part.clone(), temp.clone()])
        .unwrap();
    let candidates = CandidateExtractor::new(
        pool.clone(),
        vec![part_temp.clone()],
        vec![Some(temp_throttler())],
        CandidateExtractorConfig::default(),
    )
    .await
    .unwrap();

    let report = candidates.apply(&[doc.clone()], 0, 4).await.unwrap();
    assert_eq!(report.inserted("PartTemp"), 1432);
    assert_eq!(report.metrics.total_throttled(), PARTS * TEMPS - 1432);

    let stored = candidates.get_candidates(None, Some(0)).await.unwrap();
    let first = stored["PartTemp"][0].id;
    let second = stored["PartTemp"][1].id;

    // Deleting through the base row removes the subclass row
    let table = part_temp.clone();
    let (base, subclass) = pool
        .with_store(move |s| {
            assert!(s.delete_candidate(first)?);
            Ok((s.count_candidates(None)?, s.count_candidates(Some(&*table))?))
        })
        .await
        .unwrap();
    assert_eq!((base, subclass), (1431, 1431));

    // Deleting through the subclass row removes the base row
    let table = part_temp.clone();
    let (base, subclass, parts, temps) = pool
        .with_store(move |s| {
            assert!(s.delete_candidate_subclass_row(&table, second)?);
            Ok((
                s.count_candidates(None)?,
                s.count_candidates(Some(&*table))?,
                s.count_mentions(Some(&*part))?,
                s.count_mentions(Some(&*temp))?,
            ))
        })
        .await
        .unwrap();
    assert_eq!((base, subclass), (1430, 1430));
    assert_eq!((parts, temps), (PARTS, TEMPS));

    // Clearing mentions takes every candidate with them
    let deleted = mentions.clear(MentionScope::All, None).await.unwrap();
    assert_eq!(deleted, PARTS + TEMPS + 2);
    let (mention_rows, candidate_rows, violations) = pool
        .with_store(|s| {
            Ok((
                s.count_mentions(None)?,
                s.count_candidates(None)?,
                s.check_invariants()?,
            ))
        })
        .await
        .unwrap();
    assert_eq!(mention_rows, 0);
    assert_eq!(candidate_rows, 0);
    assert!(violations.is_empty(), "{:?}", violations);
}

#[tokio::test]
async fn test_figures_with_mixed_throttler_chain() {
    let dir = TempDir::new().unwrap();
    let pool = file_pool(&dir, 2);
    let doc = datasheet(&pool).await;

    let registry = TypeRegistry::new();
    let mentions = mention_extractor(&pool, &registry).await;
    mentions.apply(&[doc.clone()], 2).await.unwrap();

    let part = registry.declare_mention("Part").unwrap();
    let temp = registry.declare_mention("Temp").unwrap();
    let figure = registry.declare_mention("Figure").unwrap();
    let candidates = CandidateExtractor::new(
        pool.clone(),
        vec![
            registry
                .declare_candidate("PartTemp", &[part.clone(), temp])
                .unwrap(),
            registry.declare_candidate("PartFigure", &[part, figure]).unwrap(),
        ],
        vec![Some(temp_throttler()), None],
        CandidateExtractorConfig::default(),
    )
    .await
    .unwrap();

    let report = candidates.apply(&[doc], 0, 2).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.inserted("PartTemp"), 1432);
    assert_eq!(report.inserted("PartFigure"), PARTS * 2);

    let figures = mentions.get_mentions(None).await.unwrap();
    let urls: Vec<&str> = figures["Figure"].iter().map(|m| m.text.as_str()).collect();
    assert_eq!(urls, vec!["img/pinout.png", "img/package.PNG?raw=1"]);

    // Split 1 was never written
    assert_eq!(candidates.clear(1).await.unwrap(), 0);
    assert_eq!(candidates.clear_all(None).await.unwrap(), 1432 + PARTS * 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallelism_beyond_connection_budget() {
    let dir = TempDir::new().unwrap();
    let pool = file_pool(&dir, 3);

    let mut docs = Vec::new();
    for i in 0..40 {
        let part = format!("BC{}", 100 + i);
        let temp = format!("{}", 300 + i % TEMPS);
        let drafts = vec![
            ContextDraft::new(ContextKind::Document, format!("sheet-{}", i)),
            ContextDraft::sentence(&[part.as_str(), "max", temp.as_str()]).with_parent(0),
        ];
        docs.push(insert(&pool, &format!("sheet-{}", i), drafts).await);
    }

    let registry = TypeRegistry::new();
    let mentions = mention_extractor(&pool, &registry).await;
    let report = mentions.apply(&docs, 32).await.unwrap();
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.requested_parallelism, 32);
    assert_eq!(report.parallelism, 3);
    assert_eq!(report.documents(), 40);
    assert_eq!(report.inserted("Part"), 40);
    assert_eq!(report.inserted("Temp"), 40);

    let part = registry.declare_mention("Part").unwrap();
    let temp = registry.declare_mention("Temp").unwrap();
    let candidates = CandidateExtractor::new(
        pool.clone(),
        vec![registry.declare_candidate("PartTemp", &[part, temp]).unwrap()],
        Vec::new(),
        CandidateExtractorConfig::default(),
    )
    .await
    .unwrap();

    // Both stages share the three connections at once
    let (again, built) = tokio::join!(mentions.apply(&docs, 64), candidates.apply(&docs, 0, 64));
    let again = again.unwrap();
    let built = built.unwrap();
    assert!(again.is_success(), "{:?}", again.failures);
    assert!(built.is_success(), "{:?}", built.failures);
    assert_eq!(again.total_inserted(), 0);
    assert_eq!(built.documents(), 40);
    assert_eq!(pool.available(), 3);

    let stored = candidates.get_candidates(None, None).await.unwrap();
    assert_eq!(stored["PartTemp"].len(), 40);
}
