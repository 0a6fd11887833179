//! Stats command implementation.

use clap::Args;
use smartfind_core::AppConfig;

use super::{open_engine, print_json};

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing stats command");

        let engine = open_engine(config)?;
        let stats = engine.stats();

        if self.json {
            return print_json(&serde_json::json!({
                "state": engine.state(),
                "strategy": engine.config().strategy.as_str(),
                "index_path": engine.paths().index_path(),
                "stats": stats,
            }));
        }

        println!("Index: {}", engine.paths().index_path().display());
        println!("State: {:?}", engine.state());
        println!("Documents: {}", stats.documents);
        println!("Dimension: {}", stats.dimension);
        println!(
            "Asset fingerprint: {}",
            stats.asset_fingerprint.as_deref().unwrap_or("-")
        );
        match stats.updated_at {
            Some(updated_at) => println!("Updated: {}", updated_at.to_rfc3339()),
            None => println!("Updated: never"),
        }
        println!("Size: {} bytes", stats.size_bytes);
        println!("Strategy: {}", engine.config().strategy);
        println!(
            "Keyword index: {}",
            if engine.has_lexical_index() {
                "enabled"
            } else {
                "disabled"
            }
        );

        Ok(())
    }
}
