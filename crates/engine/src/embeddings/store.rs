//! Static vocabulary, word-vector table and topic centroids.

use super::npy::{self, Matrix};
use crate::topics::{TopicCentroids, TopicLabels};
use sha2::{Digest, Sha256};
use smartfind_core::LoadError;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Vocabulary file: JSON object mapping word to row index.
pub const VOCAB_FILE: &str = "vocab.json";
/// Word-vector table, one row per vocabulary entry.
pub const WORD_VECTORS_FILE: &str = "word_vectors.npy";
/// Topic centroid table, one row per topic.
pub const TOPIC_VECTORS_FILE: &str = "topic_vectors.npy";
/// Optional topic labels.
pub const TOPIC_MAP_FILE: &str = "topic_map.json";

/// Immutable embedding assets: vocabulary, word vectors and topic centroids.
///
/// All lookups are read-only; the store is shared behind an `Arc` once loaded.
pub struct EmbeddingStore {
    source: Option<PathBuf>,
    vocabulary: HashMap<String, usize>,
    vectors: Matrix,
    centroids: TopicCentroids,
    fingerprint: String,
}

impl fmt::Debug for EmbeddingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingStore")
            .field("source", &self.source)
            .field("vocabulary", &self.vocabulary.len())
            .field("dimension", &self.dimension())
            .field("topics", &self.centroids.len())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl EmbeddingStore {
    /// Load the three mandatory asset files (and optional topic labels) from `asset_dir`.
    pub fn load(asset_dir: &Path) -> Result<Self, LoadError> {
        let vocab_path = asset_dir.join(VOCAB_FILE);
        let vectors_path = asset_dir.join(WORD_VECTORS_FILE);
        let topics_path = asset_dir.join(TOPIC_VECTORS_FILE);

        for path in [&vocab_path, &vectors_path, &topics_path] {
            if !path.is_file() {
                return Err(LoadError::MissingAsset { path: path.clone() });
            }
        }

        let vocab_bytes = fs::read(&vocab_path)
            .map_err(|e| LoadError::Corrupt(format!("failed to read {:?}: {}", vocab_path, e)))?;
        let vocabulary: HashMap<String, usize> = serde_json::from_slice(&vocab_bytes)
            .map_err(|e| LoadError::Corrupt(format!("invalid {}: {}", VOCAB_FILE, e)))?;

        let vectors = npy::read_matrix(&vectors_path)?;
        let centroids = npy::read_matrix(&topics_path)?;
        let labels = TopicLabels::load(&asset_dir.join(TOPIC_MAP_FILE))?;

        let mut store = Self::from_parts(
            vocabulary,
            vectors,
            TopicCentroids::new(centroids).with_labels(labels),
        )?;
        store.source = Some(asset_dir.to_path_buf());

        tracing::info!(
            "Loaded embedding assets from {:?}: {} words, {} topics, dimension {}",
            asset_dir,
            store.vocabulary.len(),
            store.centroids.len(),
            store.dimension()
        );

        Ok(store)
    }

    /// Assemble a store from in-memory parts, enforcing the shape invariants.
    pub fn from_parts(
        vocabulary: HashMap<String, usize>,
        vectors: Matrix,
        centroids: TopicCentroids,
    ) -> Result<Self, LoadError> {
        if vectors.rows() != vocabulary.len() {
            return Err(LoadError::Corrupt(format!(
                "word-vector table has {} rows but vocabulary has {} entries",
                vectors.rows(),
                vocabulary.len()
            )));
        }

        if vectors.cols() == 0 {
            return Err(LoadError::Corrupt(
                "word-vector dimension must be positive".to_string(),
            ));
        }

        let mut seen = vec![false; vectors.rows()];
        for (word, &index) in &vocabulary {
            match seen.get_mut(index) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(LoadError::Corrupt(format!(
                        "vocabulary index {} is assigned to more than one word ('{}')",
                        index, word
                    )))
                }
                None => {
                    return Err(LoadError::Corrupt(format!(
                        "vocabulary index {} for '{}' is out of range",
                        index, word
                    )))
                }
            }
        }

        if !centroids.is_empty() && centroids.dimension() != vectors.cols() {
            return Err(LoadError::Corrupt(format!(
                "topic centroids have dimension {}, word vectors have {}",
                centroids.dimension(),
                vectors.cols()
            )));
        }

        let fingerprint = fingerprint(&vocabulary, &vectors, &centroids);

        Ok(Self {
            source: None,
            vocabulary,
            vectors,
            centroids,
            fingerprint,
        })
    }

    /// Vector for `word`, if it is in the vocabulary.
    pub fn lookup(&self, word: &str) -> Option<&[f32]> {
        self.vocabulary
            .get(word)
            .and_then(|&index| self.vectors.row(index))
    }

    /// Embedding dimension D.
    pub fn dimension(&self) -> usize {
        self.vectors.cols()
    }

    /// Number of words in the vocabulary.
    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn centroids(&self) -> &TopicCentroids {
        &self.centroids
    }

    /// Directory the store was loaded from (`None` for in-memory stores).
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// SHA-256 over the vocabulary, word vectors and centroids.
    ///
    /// Recorded in the persisted index to detect an index built with other assets.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn fingerprint(
    vocabulary: &HashMap<String, usize>,
    vectors: &Matrix,
    centroids: &TopicCentroids,
) -> String {
    let mut words: Vec<(&String, &usize)> = vocabulary.iter().collect();
    words.sort_by_key(|(_, index)| **index);

    let mut hasher = Sha256::new();
    for (word, _) in words {
        hasher.update(word.as_bytes());
        hasher.update([0u8]);
    }
    for row in vectors.iter_rows().chain(centroids.iter()) {
        for value in row {
            hasher.update(value.to_le_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}
