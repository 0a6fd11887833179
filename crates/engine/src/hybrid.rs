//! Reciprocal-rank fusion of vector and keyword results.
//!
//! RRF_score(doc) = sum(1 / (k + rank_i(doc))), ranks starting at 1.

use crate::retrieval::sort_hits;
use crate::types::SearchHit;
use std::collections::HashMap;

/// Default RRF constant.
pub const RRF_K: f32 = 60.0;

/// Merge ranked path lists into one list scored by RRF.
///
/// Each input is assumed best-first. Ties are broken by path.
pub fn fuse<'a, I>(rankings: I, k: f32, top_k: usize) -> Vec<SearchHit>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut scores: HashMap<&str, f32> = HashMap::new();

    for ranking in rankings {
        for (rank, path) in ranking.iter().enumerate() {
            *scores.entry(path.as_str()).or_insert(0.0) += 1.0 / (k + rank as f32 + 1.0);
        }
    }

    let mut hits: Vec<SearchHit> = scores
        .into_iter()
        .map(|(path, score)| SearchHit::new(path, score))
        .collect();
    sort_hits(&mut hits);
    hits.truncate(top_k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_documents_in_both_lists_win() {
        let vector = paths(&["/a", "/b", "/c"]);
        let keyword = paths(&["/c", "/d"]);
        let fused = fuse([vector.as_slice(), keyword.as_slice()], RRF_K, 10);

        assert_eq!(fused[0].path, "/c");
        assert!((fused[0].score - (1.0 / 63.0 + 1.0 / 61.0)).abs() < 1e-6);
        assert_eq!(fused.len(), 4);
    }

    #[test]
    fn test_ties_by_path_and_truncation() {
        let first = paths(&["/z"]);
        let second = paths(&["/y"]);
        let fused = fuse([first.as_slice(), second.as_slice()], RRF_K, 1);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].path, "/y");
    }

    #[test]
    fn test_empty_inputs() {
        let empty: Vec<String> = Vec::new();
        assert!(fuse([empty.as_slice()], RRF_K, 10).is_empty());
    }
}
