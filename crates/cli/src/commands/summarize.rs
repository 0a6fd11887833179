//! Summarize command implementation.

use anyhow::Context;
use clap::Args;
use smartfind_engine::summarizer::{self, DEFAULT_MAX_SENTENCES};
use smartfind_engine::{PlainTextExtractor, TextExtractor};
use std::path::PathBuf;

use super::print_json;

/// Print an extractive summary of a file
#[derive(Args, Debug)]
pub struct SummarizeCommand {
    /// File to summarize
    pub file: PathBuf,

    /// Maximum number of sentences
    #[arg(short, long, default_value_t = DEFAULT_MAX_SENTENCES)]
    pub sentences: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SummarizeCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        tracing::info!("Executing summarize command");

        // The summarizer sees the whole file, not the indexing budget
        let text = PlainTextExtractor::new(usize::MAX)
            .extract(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        let summary = summarizer::summarize(&text, self.sentences);

        if self.json {
            print_json(&serde_json::json!({
                "file": self.file,
                "summary": summary,
            }))
        } else {
            println!("{}", summary);
            Ok(())
        }
    }
}
