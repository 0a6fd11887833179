//! Retrieval engine type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Batch of documents to index, keyed by path.
///
/// Ordered so that index insertion order is deterministic.
pub type DocumentBatch = BTreeMap<String, String>;

/// Topic assignment for a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// Index of the closest topic centroid, or -1 when no result.
    pub topic_id: i32,

    /// Cosine similarity to that centroid, clamped to [0, 1].
    pub confidence: f32,

    /// Human-readable topic name, when the assets ship one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Classification {
    /// The explicit "no result" value.
    pub fn none() -> Self {
        Self {
            topic_id: -1,
            confidence: 0.0,
            label: None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.topic_id < 0
    }
}

/// How `index_documents` treats the existing index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Discard every existing entry first.
    Rebuild,
    /// Merge the batch into the existing entries.
    Incremental,
}

/// Outcome of one indexing batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexReport {
    /// Documents that produced an embedding and were stored.
    pub indexed: usize,

    /// Documents skipped because they had no recognized vocabulary.
    pub skipped: Vec<String>,

    /// Entries in the index after the batch.
    pub total_entries: usize,

    pub duration_secs: f64,

    /// Set when the vector index was updated but the keyword index was not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_error: Option<String>,
}

/// Statistics for the persisted vector index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub documents: usize,
    pub dimension: usize,
    pub asset_fingerprint: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

/// Externally visible engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Assets or index not cached yet (or the last load failed).
    Unloaded,
    /// Assets and index both cached.
    Loaded,
}

/// Which signal ranks search results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategy {
    /// Cosine similarity over document embeddings.
    #[default]
    Vector,
    /// Keyword index only.
    Lexical,
    /// Reciprocal-rank fusion of both.
    Hybrid,
}

impl RetrievalStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Lexical => "lexical",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "lexical" => Ok(Self::Lexical),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!(
                "unknown strategy '{}' (expected vector, lexical or hybrid)",
                other
            )),
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    pub score: f32,
}

impl SearchHit {
    pub fn new(path: impl Into<String>, score: f32) -> Self {
        Self {
            path: path.into(),
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_json_shape() {
        let value = serde_json::to_value(Classification {
            topic_id: 2,
            confidence: 0.5,
            label: Some("Travel".to_string()),
        })
        .unwrap();
        assert_eq!(value["topicId"], 2);
        assert_eq!(value["label"], "Travel");

        let none = serde_json::to_value(Classification::none()).unwrap();
        assert_eq!(none["topicId"], -1);
        assert!(none.get("label").is_none());
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("Hybrid".parse::<RetrievalStrategy>(), Ok(RetrievalStrategy::Hybrid));
        assert_eq!(RetrievalStrategy::Lexical.to_string(), "lexical");
        assert!("fuzzy".parse::<RetrievalStrategy>().is_err());
    }
}
