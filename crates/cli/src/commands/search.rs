//! Search, similar and duplicates command implementations.

use clap::Args;
use smartfind_core::AppConfig;
use smartfind_engine::{RetrievalEngine, RetrievalStrategy, SearchHit};
use std::path::PathBuf;

use super::{document_key, open_engine, print_json};

/// Search indexed documents
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Maximum number of results
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Ranking strategy: vector, lexical or hybrid
    #[arg(short, long)]
    pub strategy: Option<RetrievalStrategy>,

    /// Fall back to keyword matches when the vector search finds nothing
    #[arg(long)]
    pub fallback_lexical: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing search command");

        let query = self.query.join(" ");
        let engine = open_engine(config)?;
        let strategy = self.strategy.unwrap_or(engine.config().strategy);
        let top_k = self.top_k.unwrap_or(engine.config().top_k);

        let mut hits = engine.search_with(&query, Some(top_k), strategy)?;
        let mut used = strategy;
        if hits.is_empty() && self.fallback_lexical && strategy != RetrievalStrategy::Lexical {
            hits = lexical_fallback(&engine, &query, top_k)?;
            used = RetrievalStrategy::Lexical;
        }

        if self.json {
            return print_json(&serde_json::json!({
                "query": query,
                "strategy": used,
                "results": hits,
            }));
        }

        if hits.is_empty() {
            println!("No matching documents");
            return Ok(());
        }
        print_hits(&hits);
        Ok(())
    }
}

fn lexical_fallback(
    engine: &RetrievalEngine,
    query: &str,
    top_k: usize,
) -> anyhow::Result<Vec<SearchHit>> {
    if !engine.has_lexical_index() {
        tracing::warn!("Keyword fallback requested but the keyword index is disabled");
        return Ok(Vec::new());
    }
    tracing::info!("Vector search found nothing, falling back to keyword search");
    Ok(engine.search_with(query, Some(top_k), RetrievalStrategy::Lexical)?)
}

/// Find documents similar to an indexed file
#[derive(Args, Debug)]
pub struct SimilarCommand {
    /// Indexed file to compare against
    pub path: PathBuf,

    /// Maximum number of results
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SimilarCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing similar command");

        let key = document_key(&self.path);
        let engine = open_engine(config)?;
        let hits = engine.similar_to(&key, self.top_k)?;

        if self.json {
            return print_json(&serde_json::json!({
                "path": key,
                "results": hits,
            }));
        }

        if hits.is_empty() {
            println!("No similar documents for {}", key);
            return Ok(());
        }
        print_hits(&hits);
        Ok(())
    }
}

/// List groups of near-identical documents
#[derive(Args, Debug)]
pub struct DuplicatesCommand {
    /// Similarity a document must exceed to join a group
    #[arg(short, long)]
    pub threshold: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DuplicatesCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing duplicates command");

        let engine = open_engine(config)?;
        let clusters = match self.threshold {
            Some(threshold) => {
                if !(-1.0..=1.0).contains(&threshold) {
                    anyhow::bail!("threshold must be between -1 and 1, got {}", threshold);
                }
                engine.duplicate_clusters_with(threshold)?
            }
            None => engine.duplicate_clusters()?,
        };

        if self.json {
            return print_json(&serde_json::json!({ "clusters": clusters }));
        }

        if clusters.is_empty() {
            println!("No duplicates found");
            return Ok(());
        }
        for (i, cluster) in clusters.iter().enumerate() {
            println!("Group {} ({} files):", i + 1, cluster.len());
            for path in cluster {
                println!("  {}", path);
            }
        }
        Ok(())
    }
}

fn print_hits(hits: &[SearchHit]) {
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, hit.score, hit.path);
    }
}
