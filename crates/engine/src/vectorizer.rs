//! Document vectors from token sequences.
//!
//! A document's embedding is the component-wise mean of the word vectors of
//! every recognized token, L2-normalized. A document with no recognized
//! tokens, or whose mean is the zero vector, has no embedding.

use crate::embeddings::EmbeddingStore;
use crate::tokenizer;
use std::sync::Arc;

/// Mean of the word vectors for every token found in `store`.
///
/// Returns `None` when no token is in the vocabulary.
pub fn vectorize(tokens: &[String], store: &EmbeddingStore) -> Option<Vec<f32>> {
    let mut sum = vec![0.0f64; store.dimension()];
    let mut hits = 0usize;

    for token in tokens {
        if let Some(vector) = store.lookup(token) {
            for (acc, value) in sum.iter_mut().zip(vector) {
                *acc += f64::from(*value);
            }
            hits += 1;
        }
    }

    if hits == 0 {
        return None;
    }

    let count = hits as f64;
    Some(sum.into_iter().map(|v| (v / count) as f32).collect())
}

/// Scale `vector` to unit L2 norm.
///
/// Returns `None` for a zero (or non-finite) norm.
pub fn normalize(vector: Vec<f32>) -> Option<Vec<f32>> {
    let norm = vector
        .iter()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt();

    if norm == 0.0 || !norm.is_finite() {
        return None;
    }

    Some(
        vector
            .into_iter()
            .map(|v| (f64::from(v) / norm) as f32)
            .collect(),
    )
}

/// L2 norm of `vector`.
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Cosine similarity between two vectors.
///
/// Mismatched lengths and zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Turns raw text into normalized document vectors using one embedding store.
#[derive(Debug, Clone)]
pub struct DocumentVectorizer {
    store: Arc<EmbeddingStore>,
}

impl DocumentVectorizer {
    pub fn new(store: Arc<EmbeddingStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    /// Tokenize, average and normalize `text`.
    pub fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let tokens = tokenizer::tokenize(text);
        self.embed_tokens(&tokens)
    }

    /// Average and normalize an already tokenized document.
    pub fn embed_tokens(&self, tokens: &[String]) -> Option<Vec<f32>> {
        vectorize(tokens, &self.store).and_then(normalize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_vectorize_is_mean_of_hits() {
        let store = fixtures::store();
        let mean = vectorize(&tokens(&["bank", "transfer", "unknownword"]), &store).unwrap();
        // bank = e0, transfer = e0 + 2*e1
        assert_eq!(mean.len(), fixtures::DIM);
        assert!((mean[0] - 1.0).abs() < 1e-6);
        assert!((mean[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_vectorize_counts_repeats() {
        let store = fixtures::store();
        let mean = vectorize(&tokens(&["transfer", "bank", "bank", "bank"]), &store).unwrap();
        assert!((mean[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_vectorize_without_hits_is_none() {
        let store = fixtures::store();
        assert!(vectorize(&tokens(&["zebra", "quokka"]), &store).is_none());
        assert!(vectorize(&[], &store).is_none());
    }

    #[test]
    fn test_normalize_unit_norm() {
        let vectorizer = DocumentVectorizer::new(Arc::new(fixtures::store()));
        for text in [
            "bank account balance transfer",
            "rocket launch orbit satellite",
            "deposit transfer payment antibank",
        ] {
            let vector = vectorizer.embed(text).unwrap();
            assert_eq!(vector.len(), vectorizer.dimension());
            let norm: f64 = vector.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-6, "norm {} for {:?}", norm, text);
        }
    }

    #[test]
    fn test_normalize_zero_is_none() {
        assert!(normalize(vec![0.0; 4]).is_none());
        assert!(normalize(Vec::new()).is_none());
    }

    #[test]
    fn test_cancelling_vectors_have_no_embedding() {
        let vectorizer = DocumentVectorizer::new(Arc::new(fixtures::store()));
        // upward and downward cancel exactly
        assert!(vectorizer.embed("upward downward").is_none());
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![1.0, 0.0, 0.0];
        let d = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&c, &d).abs() < 0.001);

        let e = vec![-2.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &e) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }
}
