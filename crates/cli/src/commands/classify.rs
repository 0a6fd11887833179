//! Classify command implementation.

use anyhow::Context;
use clap::Args;
use smartfind_core::AppConfig;
use smartfind_engine::{PlainTextExtractor, TextExtractor};
use std::path::PathBuf;

use super::{open_engine, print_json};

/// Assign a topic to a text or a file
#[derive(Args, Debug)]
pub struct ClassifyCommand {
    /// Text to classify
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub text: Option<String>,

    /// Classify the contents of a file instead
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ClassifyCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing classify command");

        let text = match (&self.text, &self.file) {
            (Some(text), _) => text.clone(),
            (None, Some(file)) => PlainTextExtractor::default()
                .extract(file)
                .with_context(|| format!("failed to read {}", file.display()))?,
            (None, None) => anyhow::bail!("provide a text or --file"),
        };

        let engine = open_engine(config)?;
        let classification = engine.classify(&text)?;

        if self.json {
            return print_json(&classification);
        }

        if classification.is_none() {
            println!("No confident topic");
        } else {
            println!(
                "Topic {} ({}), confidence {:.3}",
                classification.topic_id,
                classification.label.as_deref().unwrap_or("unlabeled"),
                classification.confidence
            );
        }

        Ok(())
    }
}
