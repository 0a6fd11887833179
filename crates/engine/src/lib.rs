//! Embedding-based document classification and similarity retrieval.
//!
//! Documents are tokenized, mapped to the mean of their word vectors and
//! L2-normalized. The resulting embeddings drive topic classification
//! against static centroids and a persistent per-document vector index used
//! for search, "find similar" and duplicate detection. An optional keyword
//! index complements the vector path.

pub mod config;
pub mod embeddings;
pub mod engine;
pub mod hybrid;
pub mod index;
pub mod lexical;
pub mod parser;
pub mod retrieval;
pub mod summarizer;
pub mod tokenizer;
pub mod topics;
pub mod types;
pub mod vector_index;
pub mod vectorizer;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{EngineConfig, EnginePaths};
pub use embeddings::{AssetCache, EmbeddingStore};
pub use engine::RetrievalEngine;
pub use lexical::{LexicalIndex, SqliteLexicalIndex};
pub use parser::{PlainTextExtractor, TextExtractor};
pub use topics::{classify, TopicCentroids, TopicLabels};
pub use types::{
    Classification, DocumentBatch, EngineState, IndexMode, IndexReport, IndexStats,
    RetrievalStrategy, SearchHit,
};
pub use vector_index::{IndexBackend, IndexSnapshot, VectorIndex};
pub use vectorizer::DocumentVectorizer;
