//! Topic centroids and document classification.

use crate::embeddings::{EmbeddingStore, Matrix};
use crate::tokenizer;
use crate::types::Classification;
use crate::vectorizer::{cosine_similarity, normalize, vectorize};
use smartfind_core::LoadError;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Texts shorter than this (after trimming) are not classified.
pub const MIN_TEXT_CHARS: usize = 5;

/// Human-readable topic names from `topic_map.json`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicLabels {
    by_id: BTreeMap<usize, String>,
    default_label: Option<String>,
}

impl TopicLabels {
    /// Load labels; a missing file yields no labels.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.is_file() {
            tracing::debug!("No topic map at {:?}, topics are unlabelled", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| LoadError::Corrupt(format!("failed to read {:?}: {}", path, e)))?;
        let raw: HashMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| LoadError::Corrupt(format!("invalid topic map {:?}: {}", path, e)))?;

        let mut labels = Self::default();
        for (key, label) in raw {
            if key == "default" {
                labels.default_label = Some(label);
                continue;
            }
            let id = key.parse::<usize>().map_err(|_| {
                LoadError::Corrupt(format!("topic map key '{}' is not a topic id", key))
            })?;
            labels.by_id.insert(id, label);
        }
        Ok(labels)
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            by_id: names
                .into_iter()
                .enumerate()
                .map(|(i, name)| (i, name.into()))
                .collect(),
            default_label: None,
        }
    }

    pub fn with_default(mut self, label: impl Into<String>) -> Self {
        self.default_label = Some(label.into());
        self
    }
}

/// Static per-topic centroid vectors; the row position is the topic id.
#[derive(Debug, Clone)]
pub struct TopicCentroids {
    centroids: Matrix,
    labels: TopicLabels,
}

impl TopicCentroids {
    pub fn new(centroids: Matrix) -> Self {
        Self {
            centroids,
            labels: TopicLabels::default(),
        }
    }

    pub fn with_labels(mut self, labels: TopicLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Number of topics K.
    pub fn len(&self) -> usize {
        self.centroids.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.rows() == 0
    }

    pub fn dimension(&self) -> usize {
        self.centroids.cols()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.centroids.iter_rows()
    }

    /// Label for a topic id; ids without an explicit label fall back to the default label.
    pub fn label(&self, topic_id: usize) -> Option<&str> {
        if topic_id >= self.len() {
            return None;
        }
        self.labels
            .by_id
            .get(&topic_id)
            .or(self.labels.default_label.as_ref())
            .map(String::as_str)
    }

    /// Index and similarity of the closest centroid, first occurrence on ties.
    pub fn nearest(&self, vector: &[f32]) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (index, centroid) in self.iter().enumerate() {
            let score = cosine_similarity(vector, centroid);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((index, score)),
            }
        }
        best
    }
}

/// Classify `text` against the store's centroids with the default length guard.
pub fn classify(text: &str, store: &EmbeddingStore, centroids: &TopicCentroids) -> Classification {
    classify_with_min_chars(text, store, centroids, MIN_TEXT_CHARS)
}

/// Classify `text`, rejecting inputs shorter than `min_chars` trimmed characters.
///
/// Any failure along tokenize → vectorize → normalize yields
/// [`Classification::none`]. Negative similarities are reported as zero
/// confidence.
pub fn classify_with_min_chars(
    text: &str,
    store: &EmbeddingStore,
    centroids: &TopicCentroids,
    min_chars: usize,
) -> Classification {
    if text.trim().chars().count() < min_chars {
        return Classification::none();
    }

    let tokens = tokenizer::tokenize(text);
    let Some(vector) = vectorize(&tokens, store).and_then(normalize) else {
        tracing::debug!("No recognized vocabulary among {} tokens", tokens.len());
        return Classification::none();
    };

    match centroids.nearest(&vector) {
        Some((topic, score)) => Classification {
            topic_id: topic as i32,
            confidence: score.clamp(0.0, 1.0),
            label: centroids.label(topic).map(str::to_string),
        },
        None => Classification::none(),
    }
}
