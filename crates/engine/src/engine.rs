//! Retrieval engine façade.
//!
//! One engine is bound to one asset directory and one storage root. It owns
//! the asset cache, the vector index and, optionally, the keyword index.

use crate::config::{EngineConfig, EnginePaths};
use crate::embeddings::{AssetCache, EmbeddingStore};
use crate::hybrid;
use crate::index::SqliteBackend;
use crate::lexical::{LexicalIndex, SqliteLexicalIndex};
use crate::retrieval;
use crate::topics;
use crate::types::{
    Classification, DocumentBatch, EngineState, IndexMode, IndexReport, IndexStats,
    RetrievalStrategy, SearchHit,
};
use crate::vector_index::{IndexSnapshot, VectorIndex};
use crate::vectorizer::DocumentVectorizer;
use smartfind_core::{AppConfig, AppResult};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Classification, indexing and similarity retrieval over one storage root.
pub struct RetrievalEngine {
    config: EngineConfig,
    paths: EnginePaths,
    assets: AssetCache,
    index: VectorIndex,
    lexical: Option<Box<dyn LexicalIndex>>,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("paths", &self.paths)
            .field("strategy", &self.config.strategy)
            .field("lexical", &self.lexical.is_some())
            .finish()
    }
}

impl RetrievalEngine {
    /// Build an engine; nothing is loaded until the first operation needs it.
    pub fn new(config: EngineConfig, paths: EnginePaths) -> AppResult<Self> {
        config.validate()?;

        let lexical: Option<Box<dyn LexicalIndex>> = if config.lexical_enabled {
            Some(Box::new(SqliteLexicalIndex::open(&paths.lexical_path())?))
        } else {
            None
        };

        let index = VectorIndex::new(SqliteBackend::new(paths.index_path()));

        tracing::debug!(
            "Created retrieval engine: data {:?}, assets {:?}, strategy {}",
            paths.data_dir,
            paths.asset_dir,
            config.strategy
        );

        Ok(Self {
            config,
            paths,
            assets: AssetCache::new(),
            index,
            lexical,
        })
    }

    /// Build an engine from application config and the persisted engine settings.
    pub fn open(app_config: &AppConfig) -> AppResult<Self> {
        let paths = EnginePaths::from_app_config(app_config);
        let config = EngineConfig::load(&paths.config_path())?;
        Self::new(config, paths)
    }

    /// Replace the keyword index collaborator.
    pub fn with_lexical_index(mut self, lexical: Box<dyn LexicalIndex>) -> Self {
        self.lexical = Some(lexical);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn paths(&self) -> &EnginePaths {
        &self.paths
    }

    pub fn has_lexical_index(&self) -> bool {
        self.lexical.is_some()
    }

    /// Topic of `text`, or [`Classification::none`] when no confident answer exists.
    pub fn classify(&self, text: &str) -> AppResult<Classification> {
        let store = self.store()?;
        Ok(topics::classify_with_min_chars(
            text,
            &store,
            store.centroids(),
            self.config.min_text_chars,
        ))
    }

    /// Index a batch, replacing everything (`Rebuild`) or merging (`Incremental`).
    ///
    /// Documents without recognized vocabulary are reported as skipped. The
    /// vector index is authoritative: once it is committed, a keyword-index
    /// failure is logged and returned in [`IndexReport::keyword_error`]
    /// instead of failing the call.
    pub fn index_documents(
        &self,
        documents: &DocumentBatch,
        mode: IndexMode,
    ) -> AppResult<IndexReport> {
        let vectorizer = self.vectorizer()?;

        let mut report = match mode {
            IndexMode::Rebuild => self.index.rebuild(documents, &vectorizer)?,
            IndexMode::Incremental => self.index.upsert(documents, &vectorizer)?,
        };

        if let Some(lexical) = &self.lexical {
            let non_empty: DocumentBatch = documents
                .iter()
                .filter(|(_, text)| !text.trim().is_empty())
                .map(|(path, text)| (path.clone(), text.clone()))
                .collect();
            let result = match mode {
                IndexMode::Rebuild => lexical.replace_all(&non_empty),
                IndexMode::Incremental => lexical.index_batch(&non_empty),
            };
            if let Err(e) = result {
                tracing::warn!("Vector index updated but keyword index was not: {}", e);
                report.keyword_error = Some(e.to_string());
            }
        }

        Ok(report)
    }

    /// Delete `paths` from every index; returns how many vector entries were removed.
    ///
    /// Keyword-index failures after the vector commit are logged only.
    pub fn remove_documents(&self, paths: &BTreeSet<String>) -> AppResult<usize> {
        let removed = self.index.remove(paths)?;
        if let Some(lexical) = &self.lexical {
            for path in paths {
                if let Err(e) = lexical.remove(path) {
                    tracing::warn!("Failed to remove {} from keyword index: {}", path, e);
                }
            }
        }
        Ok(removed)
    }

    /// Search with the configured strategy.
    pub fn search(&self, query: &str, top_k: Option<usize>) -> AppResult<Vec<SearchHit>> {
        self.search_with(query, top_k, self.config.strategy)
    }

    pub fn search_with(
        &self,
        query: &str,
        top_k: Option<usize>,
        strategy: RetrievalStrategy,
    ) -> AppResult<Vec<SearchHit>> {
        let top_k = top_k.unwrap_or(self.config.top_k);

        let hits = match strategy {
            RetrievalStrategy::Vector => self.vector_search(query, top_k)?,
            RetrievalStrategy::Lexical => {
                let paths = self.lexical_search(query, top_k);
                hybrid::fuse([paths.as_slice()], self.config.rrf_k, top_k)
            }
            RetrievalStrategy::Hybrid => {
                // Fetch more from each side so fusion has overlap to work with
                let fetch_k = top_k.saturating_mul(2);
                let vector: Vec<String> = self
                    .vector_search(query, fetch_k)?
                    .into_iter()
                    .map(|hit| hit.path)
                    .collect();
                let keyword = self.lexical_search(query, fetch_k);
                hybrid::fuse(
                    [vector.as_slice(), keyword.as_slice()],
                    self.config.rrf_k,
                    top_k,
                )
            }
        };

        tracing::info!(
            "Search ({}) returned {} results for '{}'",
            strategy,
            hits.len(),
            query
        );
        Ok(hits)
    }

    /// Cosine-ranked hits for `query` above the search threshold.
    pub fn vector_search(&self, query: &str, top_k: usize) -> AppResult<Vec<SearchHit>> {
        let vectorizer = self.vectorizer()?;

        let Some(query_vector) = vectorizer.embed(query) else {
            tracing::debug!("Query has no recognized vocabulary: '{}'", query);
            return Ok(Vec::new());
        };
        let Some(snapshot) = self.readable_snapshot(vectorizer.store()) else {
            return Ok(Vec::new());
        };

        Ok(retrieval::rank(
            &query_vector,
            &snapshot,
            self.config.search_threshold,
            top_k,
            None,
        ))
    }

    /// Keyword matches for `query`; empty without a keyword index.
    pub fn lexical_search(&self, query: &str, top_k: usize) -> Vec<String> {
        let Some(lexical) = &self.lexical else {
            tracing::debug!("Keyword index is not enabled");
            return Vec::new();
        };

        match lexical.search(query, top_k) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!("Keyword search failed, returning no results: {}", e);
                Vec::new()
            }
        }
    }

    /// Documents most similar to the indexed document `path`, never `path` itself.
    pub fn similar_to(&self, path: &str, top_k: Option<usize>) -> AppResult<Vec<SearchHit>> {
        let store = self.store()?;
        let Some(snapshot) = self.readable_snapshot(&store) else {
            return Ok(Vec::new());
        };

        Ok(retrieval::similar_to(
            &snapshot,
            path,
            self.config.similar_threshold,
            top_k.unwrap_or(self.config.top_k),
        ))
    }

    /// Groups of near-identical documents (at least two members each).
    pub fn duplicate_clusters(&self) -> AppResult<Vec<Vec<String>>> {
        self.duplicate_clusters_with(self.config.duplicate_threshold)
    }

    pub fn duplicate_clusters_with(&self, threshold: f32) -> AppResult<Vec<Vec<String>>> {
        let store = self.store()?;
        let Some(snapshot) = self.readable_snapshot(&store) else {
            return Ok(Vec::new());
        };

        let clusters = retrieval::duplicate_clusters(&snapshot, threshold);
        tracing::info!("Found {} duplicate clusters", clusters.len());
        Ok(clusters)
    }

    /// Index statistics; a missing or unreadable index reports as empty.
    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    pub fn state(&self) -> EngineState {
        if self.assets.current().is_some() && self.index.is_loaded() {
            EngineState::Loaded
        } else {
            EngineState::Unloaded
        }
    }

    /// Forget cached assets and index after they changed on disk.
    pub fn invalidate(&self) {
        self.assets.invalidate();
        self.index.invalidate();
        tracing::info!("Invalidated cached assets and index");
    }

    fn store(&self) -> AppResult<Arc<EmbeddingStore>> {
        self.assets.get_or_load(&self.paths.asset_dir).map_err(|e| {
            tracing::warn!(
                "Embedding assets unavailable at {:?}: {}",
                self.paths.asset_dir,
                e
            );
            e.into()
        })
    }

    fn vectorizer(&self) -> AppResult<DocumentVectorizer> {
        Ok(DocumentVectorizer::new(self.store()?))
    }

    /// Snapshot usable with `store`, or `None` when reads should come back empty.
    fn readable_snapshot(&self, store: &EmbeddingStore) -> Option<Arc<IndexSnapshot>> {
        let snapshot = match self.index.try_load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::debug!("No index at {:?} yet", self.paths.index_path());
                return None;
            }
            Err(e) => {
                tracing::warn!("Index unreadable, treating as empty: {}", e);
                return None;
            }
        };

        if !snapshot.is_empty() && snapshot.dimension() != store.dimension() {
            tracing::warn!(
                "Index dimension {} does not match asset dimension {}; rebuild the index",
                snapshot.dimension(),
                store.dimension()
            );
            return None;
        }

        if let Some(fingerprint) = snapshot.asset_fingerprint() {
            if fingerprint != store.fingerprint() {
                tracing::warn!("Index was built with different embedding assets");
            }
        }

        Some(snapshot)
    }
}
