//! Persistent per-document vector index.
//!
//! Readers work on an immutable [`IndexSnapshot`] shared through an `Arc`.
//! Writers are serialized, build a modified copy, persist it and only then
//! publish it, so in-flight readers keep the snapshot they started with.

use crate::types::{DocumentBatch, IndexReport, IndexStats};
use crate::vectorizer::DocumentVectorizer;
use chrono::{DateTime, Utc};
use smartfind_core::{AppError, AppResult};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

/// Durable storage for index snapshots.
///
/// Implementations must replace the stored snapshot atomically.
pub trait IndexBackend: Send + Sync {
    /// Read the stored snapshot; `Ok(None)` when nothing was ever saved.
    fn load(&self) -> AppResult<Option<IndexSnapshot>>;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &IndexSnapshot) -> AppResult<()>;

    /// On-disk size, 0 if unknown.
    fn size_bytes(&self) -> u64 {
        0
    }
}

/// One indexed document.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub path: String,
    /// Unit-norm document embedding.
    pub embedding: Vec<f32>,
}

/// Immutable view of every index entry, in index order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSnapshot {
    entries: Vec<IndexEntry>,
    positions: HashMap<String, usize>,
    dimension: usize,
    asset_fingerprint: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl IndexSnapshot {
    pub fn empty(dimension: usize, asset_fingerprint: Option<String>) -> Self {
        Self {
            dimension,
            asset_fingerprint,
            ..Default::default()
        }
    }

    /// Build a snapshot, rejecting duplicate paths and wrong-sized vectors.
    pub fn from_entries(
        entries: Vec<IndexEntry>,
        dimension: usize,
        asset_fingerprint: Option<String>,
        updated_at: Option<DateTime<Utc>>,
    ) -> AppResult<Self> {
        let mut positions = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if entry.embedding.len() != dimension {
                return Err(AppError::Persistence(format!(
                    "Entry '{}' has dimension {}, index has {}",
                    entry.path,
                    entry.embedding.len(),
                    dimension
                )));
            }
            if positions.insert(entry.path.clone(), position).is_some() {
                return Err(AppError::Persistence(format!(
                    "Duplicate index entry '{}'",
                    entry.path
                )));
            }
        }

        Ok(Self {
            entries,
            positions,
            dimension,
            asset_fingerprint,
            updated_at,
        })
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.positions.get(path).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.positions.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn asset_fingerprint(&self) -> Option<&str> {
        self.asset_fingerprint.as_deref()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Replace the entry for `entry.path` in place, or append it.
    fn upsert(&mut self, entry: IndexEntry) {
        match self.positions.get(&entry.path) {
            Some(&position) => self.entries[position] = entry,
            None => {
                self.positions.insert(entry.path.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Drop every entry whose path is in `paths`; returns how many were removed.
    fn remove_all(&mut self, paths: &BTreeSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !paths.contains(&entry.path));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.reindex_positions();
        }
        removed
    }

    fn reindex_positions(&mut self) {
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.path.clone(), i))
            .collect();
    }
}

/// Vectors computed for one batch, in batch order.
struct EmbeddedBatch {
    entries: Vec<IndexEntry>,
    skipped: Vec<String>,
}

fn embed_batch(documents: &DocumentBatch, vectorizer: &DocumentVectorizer) -> EmbeddedBatch {
    let mut entries = Vec::with_capacity(documents.len());
    let mut skipped = Vec::new();

    for (path, text) in documents {
        match vectorizer.embed(text) {
            Some(embedding) => entries.push(IndexEntry {
                path: path.clone(),
                embedding,
            }),
            None => {
                tracing::debug!("Skipping {}: no recognized vocabulary", path);
                skipped.push(path.clone());
            }
        }
    }

    EmbeddedBatch { entries, skipped }
}

/// Vector index with a cached snapshot and a durable backend.
pub struct VectorIndex {
    backend: Box<dyn IndexBackend>,
    cached: RwLock<Option<Arc<IndexSnapshot>>>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl VectorIndex {
    pub fn new(backend: impl IndexBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            cached: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// Whether a snapshot is cached in memory.
    pub fn is_loaded(&self) -> bool {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Current snapshot, reading it from the backend on first use.
    ///
    /// Fails with [`AppError::IndexUnavailable`] when nothing has been
    /// persisted yet.
    pub fn load(&self) -> AppResult<Arc<IndexSnapshot>> {
        self.try_load()?.ok_or_else(|| {
            AppError::IndexUnavailable("no documents have been indexed yet".to_string())
        })
    }

    /// Current snapshot, or `None` when nothing has been persisted yet.
    pub fn try_load(&self) -> AppResult<Option<Arc<IndexSnapshot>>> {
        if let Some(snapshot) = self.cached_snapshot() {
            return Ok(Some(snapshot));
        }

        // Serialize with writers so a stale disk read never overwrites a newer publish
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(snapshot) = self.cached_snapshot() {
            return Ok(Some(snapshot));
        }

        match self.backend.load()? {
            Some(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.publish(Arc::clone(&snapshot));
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Replace every entry with the embeddings of `documents`.
    pub fn rebuild(
        &self,
        documents: &DocumentBatch,
        vectorizer: &DocumentVectorizer,
    ) -> AppResult<IndexReport> {
        let start = Instant::now();
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let batch = embed_batch(documents, vectorizer);
        let indexed = batch.entries.len();
        let snapshot = IndexSnapshot::from_entries(
            batch.entries,
            vectorizer.dimension(),
            Some(vectorizer.store().fingerprint().to_string()),
            Some(Utc::now()),
        )?;

        let total_entries = self.commit(snapshot)?;
        tracing::info!(
            "Rebuilt index: {} documents indexed, {} skipped",
            indexed,
            batch.skipped.len()
        );

        Ok(IndexReport {
            indexed,
            skipped: batch.skipped,
            total_entries,
            duration_secs: start.elapsed().as_secs_f64(),
            keyword_error: None,
        })
    }

    /// Merge the embeddings of `documents` into the existing entries.
    ///
    /// Re-indexed paths keep their position; new paths are appended.
    pub fn upsert(
        &self,
        documents: &DocumentBatch,
        vectorizer: &DocumentVectorizer,
    ) -> AppResult<IndexReport> {
        let start = Instant::now();
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut snapshot = self.current_for_write()?.unwrap_or_else(|| {
            IndexSnapshot::empty(
                vectorizer.dimension(),
                Some(vectorizer.store().fingerprint().to_string()),
            )
        });

        if !snapshot.is_empty() && snapshot.dimension() != vectorizer.dimension() {
            return Err(AppError::Persistence(format!(
                "Index has dimension {} but the embedding assets have {}; rebuild the index",
                snapshot.dimension(),
                vectorizer.dimension()
            )));
        }
        snapshot.dimension = vectorizer.dimension();
        snapshot.asset_fingerprint = Some(vectorizer.store().fingerprint().to_string());
        snapshot.updated_at = Some(Utc::now());

        let batch = embed_batch(documents, vectorizer);
        let indexed = batch.entries.len();
        for entry in batch.entries {
            snapshot.upsert(entry);
        }

        let total_entries = self.commit(snapshot)?;
        tracing::info!(
            "Updated index: {} documents indexed, {} skipped, {} total",
            indexed,
            batch.skipped.len(),
            total_entries
        );

        Ok(IndexReport {
            indexed,
            skipped: batch.skipped,
            total_entries,
            duration_secs: start.elapsed().as_secs_f64(),
            keyword_error: None,
        })
    }

    /// Delete the entries for `paths`; absent paths are ignored.
    pub fn remove(&self, paths: &BTreeSet<String>) -> AppResult<usize> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(mut snapshot) = self.current_for_write()? else {
            return Ok(0);
        };

        let removed = snapshot.remove_all(paths);
        if removed == 0 {
            return Ok(0);
        }
        snapshot.updated_at = Some(Utc::now());

        self.commit(snapshot)?;
        tracing::info!("Removed {} documents from index", removed);
        Ok(removed)
    }

    /// Drop the cached snapshot so the next read goes to the backend.
    pub fn invalidate(&self) {
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Statistics of the current snapshot; an unreadable index reports as empty.
    pub fn stats(&self) -> IndexStats {
        let size_bytes = self.backend.size_bytes();
        match self.try_load() {
            Ok(Some(snapshot)) => IndexStats {
                documents: snapshot.len(),
                dimension: snapshot.dimension(),
                asset_fingerprint: snapshot.asset_fingerprint.clone(),
                updated_at: snapshot.updated_at(),
                size_bytes,
            },
            Ok(None) => IndexStats {
                size_bytes,
                ..Default::default()
            },
            Err(e) => {
                tracing::warn!("Index unreadable, reporting empty stats: {}", e);
                IndexStats {
                    size_bytes,
                    ..Default::default()
                }
            }
        }
    }

    fn cached_snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Owned copy of the current snapshot; caller holds the write lock.
    fn current_for_write(&self) -> AppResult<Option<IndexSnapshot>> {
        if let Some(snapshot) = self.cached_snapshot() {
            return Ok(Some((*snapshot).clone()));
        }
        self.backend.load()
    }

    /// Persist then publish; caller holds the write lock.
    fn commit(&self, snapshot: IndexSnapshot) -> AppResult<usize> {
        self.backend.save(&snapshot)?;
        let total = snapshot.len();
        self.publish(Arc::new(snapshot));
        Ok(total)
    }

    fn publish(&self, snapshot: Arc<IndexSnapshot>) {
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SqliteBackend;
    use crate::tests::fixtures;
    use tempfile::TempDir;

    /// Backend whose saves always fail.
    struct ReadOnlyBackend;

    impl IndexBackend for ReadOnlyBackend {
        fn load(&self) -> AppResult<Option<IndexSnapshot>> {
            Ok(None)
        }

        fn save(&self, _snapshot: &IndexSnapshot) -> AppResult<()> {
            Err(AppError::Persistence("disk full".to_string()))
        }
    }

    fn batch(docs: &[(&str, &str)]) -> DocumentBatch {
        docs.iter()
            .map(|(path, text)| (path.to_string(), text.to_string()))
            .collect()
    }

    fn setup() -> (TempDir, VectorIndex, DocumentVectorizer) {
        let temp = TempDir::new().unwrap();
        let index = VectorIndex::new(SqliteBackend::new(temp.path().join("index.sqlite")));
        let vectorizer = DocumentVectorizer::new(Arc::new(fixtures::store()));
        (temp, index, vectorizer)
    }

    #[test]
    fn test_load_before_any_index_is_unavailable() {
        let (_temp, index, _) = setup();
        assert!(matches!(index.load(), Err(AppError::IndexUnavailable(_))));
        assert!(index.try_load().unwrap().is_none());
    }

    #[test]
    fn test_rebuild_skips_documents_without_vocabulary() {
        let (_temp, index, vectorizer) = setup();
        let report = index
            .rebuild(
                &batch(&[
                    ("/a.txt", "bank account balance transfer"),
                    ("/b.txt", "zebra quokka"),
                    ("/c.txt", "upward downward"),
                    ("/d.txt", "rocket launch"),
                ]),
                &vectorizer,
            )
            .unwrap();

        assert_eq!(report.indexed, 2);
        assert_eq!(report.skipped, vec!["/b.txt", "/c.txt"]);
        let snapshot = index.load().unwrap();
        let paths: Vec<_> = snapshot.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/a.txt", "/d.txt"]);
    }

    #[test]
    fn test_rebuild_discards_previous_entries() {
        let (_temp, index, vectorizer) = setup();
        index
            .rebuild(&batch(&[("/old.txt", "bank balance")]), &vectorizer)
            .unwrap();
        index
            .rebuild(&batch(&[("/new.txt", "orbit satellite")]), &vectorizer)
            .unwrap();

        let snapshot = index.load().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains("/new.txt"));
    }

    #[test]
    fn test_upsert_replaces_in_place_and_appends() {
        let (_temp, index, vectorizer) = setup();
        index
            .rebuild(
                &batch(&[("/a.txt", "bank account"), ("/b.txt", "rocket orbit")]),
                &vectorizer,
            )
            .unwrap();

        let report = index
            .upsert(
                &batch(&[("/a.txt", "rocket launch"), ("/c.txt", "deposit")]),
                &vectorizer,
            )
            .unwrap();
        assert_eq!(report.total_entries, 3);

        let snapshot = index.load().unwrap();
        let paths: Vec<_> = snapshot.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/a.txt", "/b.txt", "/c.txt"]);
        // /a.txt now carries the science vector
        assert!((snapshot.get("/a.txt").unwrap().embedding[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_upsert_is_idempotent_on_path() {
        let (_temp, index, vectorizer) = setup();
        let docs = batch(&[("/a.txt", "bank account balance transfer")]);
        index.upsert(&docs, &vectorizer).unwrap();
        index.upsert(&docs, &vectorizer).unwrap();

        let snapshot = index.load().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.get("/a.txt").unwrap().embedding,
            vectorizer.embed("bank account balance transfer").unwrap()
        );
    }

    #[test]
    fn test_upsert_without_existing_index_creates_one() {
        let (temp, index, vectorizer) = setup();
        index
            .upsert(&batch(&[("/a.txt", "bank")]), &vectorizer)
            .unwrap();
        assert!(temp.path().join("index.sqlite").exists());
    }

    #[test]
    fn test_mutations_are_durable() {
        let (temp, index, vectorizer) = setup();
        index
            .rebuild(
                &batch(&[("/a.txt", "bank account"), ("/b.txt", "rocket orbit")]),
                &vectorizer,
            )
            .unwrap();
        index.remove(&BTreeSet::from(["/a.txt".to_string()])).unwrap();

        // A fresh index over the same file observes every mutation
        let reopened = VectorIndex::new(SqliteBackend::new(temp.path().join("index.sqlite")));
        let snapshot = reopened.load().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.get("/b.txt").unwrap().embedding,
            index.load().unwrap().get("/b.txt").unwrap().embedding
        );
        assert_eq!(snapshot.asset_fingerprint(), Some(vectorizer.store().fingerprint()));
    }

    #[test]
    fn test_remove_absent_paths_is_noop() {
        let (_temp, index, vectorizer) = setup();
        assert_eq!(index.remove(&BTreeSet::from(["/x".to_string()])).unwrap(), 0);

        index
            .rebuild(&batch(&[("/a.txt", "bank")]), &vectorizer)
            .unwrap();
        let removed = index
            .remove(&BTreeSet::from(["/x".to_string(), "/a.txt".to_string()]))
            .unwrap();
        assert_eq!(removed, 1);
        assert!(index.load().unwrap().is_empty());
    }

    #[test]
    fn test_failed_save_keeps_previous_snapshot() {
        let index = VectorIndex::new(ReadOnlyBackend);
        let vectorizer = DocumentVectorizer::new(Arc::new(fixtures::store()));

        let result = index.rebuild(&batch(&[("/a.txt", "bank")]), &vectorizer);
        assert!(matches!(result, Err(AppError::Persistence(_))));
        assert!(!index.is_loaded());
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let (_temp, index, vectorizer) = setup();
        index
            .rebuild(&batch(&[("/a.txt", "bank")]), &vectorizer)
            .unwrap();
        let before = index.load().unwrap();

        index
            .upsert(&batch(&[("/b.txt", "orbit")]), &vectorizer)
            .unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(index.load().unwrap().len(), 2);
    }

    #[test]
    fn test_invalidate_rereads_backend() {
        let (temp, index, vectorizer) = setup();
        index
            .rebuild(&batch(&[("/a.txt", "bank")]), &vectorizer)
            .unwrap();

        let other = VectorIndex::new(SqliteBackend::new(temp.path().join("index.sqlite")));
        other
            .upsert(&batch(&[("/b.txt", "orbit")]), &vectorizer)
            .unwrap();

        assert_eq!(index.load().unwrap().len(), 1);
        index.invalidate();
        assert!(!index.is_loaded());
        assert_eq!(index.load().unwrap().len(), 2);
    }

    #[test]
    fn test_stats() {
        let (_temp, index, vectorizer) = setup();
        assert_eq!(index.stats().documents, 0);

        index
            .rebuild(&batch(&[("/a.txt", "bank"), ("/b.txt", "orbit")]), &vectorizer)
            .unwrap();
        let stats = index.stats();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.dimension, fixtures::DIM);
        assert!(stats.updated_at.is_some());
        assert!(stats.size_bytes > 0);
    }

    #[test]
    fn test_stats_of_corrupt_index_are_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.sqlite");
        std::fs::write(&path, vec![0x5au8; 4096]).unwrap();
        let index = VectorIndex::new(SqliteBackend::new(&path));

        let stats = index.stats();
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.dimension, 0);
        assert!(stats.updated_at.is_none());
        assert_eq!(stats.size_bytes, 4096);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let (_temp, index, vectorizer) = setup();
        index
            .rebuild(&batch(&[("/a.txt", "bank")]), &vectorizer)
            .unwrap();
        let index = Arc::new(index);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let snapshot = index.load().unwrap();
                        assert!(snapshot.contains("/a.txt"));
                    }
                })
            })
            .collect();

        for i in 0..5 {
            let path = format!("/doc{}.txt", i);
            index
                .upsert(&batch(&[(path.as_str(), "orbit satellite")]), &vectorizer)
                .unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(index.load().unwrap().len(), 6);
    }
}
