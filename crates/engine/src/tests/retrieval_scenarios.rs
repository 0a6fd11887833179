//! End-to-end retrieval behaviour through the engine façade.

use super::fixtures;
use crate::config::{EngineConfig, EnginePaths};
use crate::engine::RetrievalEngine;
use crate::index::SqliteBackend;
use crate::types::{Classification, IndexMode, SearchHit};
use crate::vector_index::{IndexEntry, VectorIndex};
use std::collections::HashSet;
use tempfile::TempDir;

fn engine(temp: &TempDir) -> RetrievalEngine {
    let assets = temp.path().join("assets");
    fixtures::write_assets(&assets);
    RetrievalEngine::new(EngineConfig::default(), EnginePaths::new(temp.path(), assets)).unwrap()
}

fn paths(hits: &[SearchHit]) -> Vec<&str> {
    hits.iter().map(|h| h.path.as_str()).collect()
}

#[test]
fn test_search_ranks_finance_documents_above_science() {
    let temp = TempDir::new().unwrap();
    let engine = engine(&temp);
    engine
        .index_documents(&fixtures::scenario_batch(), IndexMode::Rebuild)
        .unwrap();

    let hits = engine.search("bank payment", None).unwrap();
    // A and B tie, so they come back in path order; C scores 0
    assert_eq!(paths(&hits), vec!["/docs/a.txt", "/docs/b.txt"]);
    assert!((hits[0].score - 0.894_427).abs() < 1e-4);
}

#[test]
fn test_related_documents_are_not_duplicates() {
    let temp = TempDir::new().unwrap();
    let engine = engine(&temp);
    engine
        .index_documents(&fixtures::scenario_batch(), IndexMode::Rebuild)
        .unwrap();

    assert!(engine.duplicate_clusters().unwrap().is_empty());

    // A verbatim copy of A under a new path is a duplicate of A
    engine
        .index_documents(
            &fixtures::batch(&[("/docs/d.txt", "bank account balance transfer")]),
            IndexMode::Incremental,
        )
        .unwrap();
    assert_eq!(
        engine.duplicate_clusters().unwrap(),
        vec![vec!["/docs/a.txt".to_string(), "/docs/d.txt".to_string()]]
    );
}

#[test]
fn test_unrecognized_text_classifies_as_none() {
    let temp = TempDir::new().unwrap();
    let engine = engine(&temp);

    for text in ["", "abc", "   \t  ", "zebra quokka platypus"] {
        assert_eq!(engine.classify(text).unwrap(), Classification::none());
    }
}

#[test]
fn test_classify_is_deterministic() {
    let temp = TempDir::new().unwrap();
    let engine = engine(&temp);

    let first = engine.classify("satellite orbit deposit").unwrap();
    let second = engine.classify("satellite orbit deposit").unwrap();
    assert_eq!(first, second);
    assert_eq!(first.label.as_deref(), Some("Science"));
}

#[test]
fn test_rebuild_stores_exactly_documents_with_vocabulary() {
    let temp = TempDir::new().unwrap();
    let engine = engine(&temp);

    let mut batch = fixtures::scenario_batch();
    batch.insert("/docs/empty.txt".to_string(), String::new());
    batch.insert("/docs/unknown.txt".to_string(), "zebra".to_string());
    engine.index_documents(&batch, IndexMode::Rebuild).unwrap();

    // Read back through a fresh index over the same file
    let index = VectorIndex::new(SqliteBackend::new(engine.paths().index_path()));
    let snapshot = index.load().unwrap();
    let stored: HashSet<&str> = snapshot.entries().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        stored,
        HashSet::from(["/docs/a.txt", "/docs/b.txt", "/docs/c.txt"])
    );
    for IndexEntry { embedding, .. } in snapshot.entries() {
        let norm: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}

#[test]
fn test_similar_never_returns_self() {
    let temp = TempDir::new().unwrap();
    let engine = engine(&temp);
    engine
        .index_documents(&fixtures::scenario_batch(), IndexMode::Rebuild)
        .unwrap();

    for path in ["/docs/a.txt", "/docs/b.txt", "/docs/c.txt"] {
        let hits = engine.similar_to(path, None).unwrap();
        assert!(hits.iter().all(|h| h.path != path));
    }

    let hits = engine.similar_to("/docs/a.txt", None).unwrap();
    assert_eq!(paths(&hits), vec!["/docs/b.txt"]);
    assert!(engine.similar_to("/docs/missing.txt", None).unwrap().is_empty());
}

#[test]
fn test_clusters_never_overlap_or_hold_singletons() {
    let temp = TempDir::new().unwrap();
    let engine = engine(&temp);
    let mut batch = fixtures::scenario_batch();
    for (path, text) in [
        ("/docs/a2.txt", "bank account balance transfer"),
        ("/docs/c2.txt", "rocket launch orbit satellite"),
        ("/docs/c3.txt", "orbit satellite"),
    ] {
        batch.insert(path.to_string(), text.to_string());
    }
    engine.index_documents(&batch, IndexMode::Rebuild).unwrap();

    let clusters = engine.duplicate_clusters().unwrap();
    assert_eq!(clusters.len(), 2);

    let mut seen = HashSet::new();
    for cluster in &clusters {
        assert!(cluster.len() >= 2);
        for path in cluster {
            assert!(seen.insert(path.as_str()));
        }
    }
    assert!(seen.contains("/docs/c3.txt"));
    assert!(!seen.contains("/docs/b.txt"));
}

#[test]
fn test_incremental_reindex_keeps_single_entry() {
    let temp = TempDir::new().unwrap();
    let engine = engine(&temp);
    engine
        .index_documents(&fixtures::scenario_batch(), IndexMode::Rebuild)
        .unwrap();

    let docs = fixtures::batch(&[("/docs/a.txt", "rocket launch")]);
    engine.index_documents(&docs, IndexMode::Incremental).unwrap();
    let report = engine.index_documents(&docs, IndexMode::Incremental).unwrap();
    assert_eq!(report.total_entries, 3);

    // A now reads as science and is a duplicate of C
    let hits = engine.search("bank payment", None).unwrap();
    assert_eq!(paths(&hits), vec!["/docs/b.txt"]);
    assert_eq!(
        engine.duplicate_clusters().unwrap(),
        vec![vec!["/docs/a.txt".to_string(), "/docs/c.txt".to_string()]]
    );
}

#[test]
fn test_unknown_query_returns_empty() {
    let temp = TempDir::new().unwrap();
    let engine = engine(&temp);
    engine
        .index_documents(&fixtures::scenario_batch(), IndexMode::Rebuild)
        .unwrap();

    assert!(engine.search("zebra", None).unwrap().is_empty());
    assert!(engine.search("", None).unwrap().is_empty());
}

#[test]
fn test_index_survives_restart() {
    let temp = TempDir::new().unwrap();
    {
        let engine = engine(&temp);
        engine
            .index_documents(&fixtures::scenario_batch(), IndexMode::Rebuild)
            .unwrap();
    }

    let engine = engine(&temp);
    let hits = engine.search("rocket", None).unwrap();
    assert_eq!(paths(&hits), vec!["/docs/c.txt"]);
    assert_eq!(engine.stats().documents, 3);
}
