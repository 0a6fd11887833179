//! Similarity ranking and duplicate detection over an index snapshot.

use crate::types::SearchHit;
use crate::vector_index::IndexSnapshot;
use crate::vectorizer::cosine_similarity;
use std::cmp::Ordering;

/// Rank every entry against `query`.
///
/// Keeps entries scoring strictly above `threshold`, best first, ties by
/// path, at most `top_k`. `exclude` drops one path from consideration.
pub fn rank(
    query: &[f32],
    snapshot: &IndexSnapshot,
    threshold: f32,
    top_k: usize,
    exclude: Option<&str>,
) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = snapshot
        .entries()
        .iter()
        .filter(|entry| exclude != Some(entry.path.as_str()))
        .map(|entry| SearchHit::new(entry.path.clone(), cosine_similarity(query, &entry.embedding)))
        .filter(|hit| hit.score > threshold)
        .collect();

    sort_hits(&mut hits);
    hits.truncate(top_k);

    tracing::debug!(
        "Ranked {} entries, {} above {:.2} (requested top-{})",
        snapshot.len(),
        hits.len(),
        threshold,
        top_k
    );
    hits
}

/// Entries most similar to the stored vector of `path`, never `path` itself.
///
/// Empty when `path` is not indexed.
pub fn similar_to(
    snapshot: &IndexSnapshot,
    path: &str,
    threshold: f32,
    top_k: usize,
) -> Vec<SearchHit> {
    match snapshot.get(path) {
        Some(entry) => rank(&entry.embedding, snapshot, threshold, top_k, Some(path)),
        None => {
            tracing::debug!("{} is not indexed", path);
            Vec::new()
        }
    }
}

/// Groups of near-identical documents.
///
/// Walks entries in index order. Each unvisited entry seeds a cluster that
/// absorbs every later unvisited entry whose similarity to the seed (not to
/// other members) exceeds `threshold`. Singletons are not reported.
pub fn duplicate_clusters(snapshot: &IndexSnapshot, threshold: f32) -> Vec<Vec<String>> {
    let entries = snapshot.entries();
    let mut visited = vec![false; entries.len()];
    let mut clusters = Vec::new();

    for (i, seed) in entries.iter().enumerate() {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let mut cluster = vec![seed.path.clone()];
        for (j, candidate) in entries.iter().enumerate().skip(i + 1) {
            if visited[j] {
                continue;
            }
            if cosine_similarity(&seed.embedding, &candidate.embedding) > threshold {
                visited[j] = true;
                cluster.push(candidate.path.clone());
            }
        }

        if cluster.len() >= 2 {
            clusters.push(cluster);
        }
    }

    tracing::debug!(
        "Found {} duplicate clusters among {} entries",
        clusters.len(),
        entries.len()
    );
    clusters
}

/// Best score first, ties by path.
pub fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
}
