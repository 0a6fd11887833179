//! Index and remove command implementations.

use anyhow::Context;
use clap::Args;
use futures::stream::{self, StreamExt};
use smartfind_core::AppConfig;
use smartfind_engine::parser::DEFAULT_MAX_CHARS;
use smartfind_engine::{DocumentBatch, IndexMode, PlainTextExtractor, TextExtractor};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use super::{document_key, open_engine, print_json};

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &[".smartfind", ".git"];

/// Index files and directories
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Files or directories to index
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Replace the whole index instead of merging into it
    #[arg(long)]
    pub rebuild: bool,

    /// Only index paths containing one of these patterns
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Skip paths containing any of these patterns
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Characters of text read per file
    #[arg(long, default_value_t = DEFAULT_MAX_CHARS)]
    pub max_chars: usize,

    /// Files read in parallel
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing index command");

        let files = collect_files(&self.paths, &self.include, &self.exclude);
        tracing::info!("Found {} candidate files", files.len());

        let extractor = Arc::new(PlainTextExtractor::new(self.max_chars));
        let (batch, failed) = extract_all(files, extractor, self.concurrency.max(1)).await;

        let mode = if self.rebuild {
            IndexMode::Rebuild
        } else {
            IndexMode::Incremental
        };

        let engine = open_engine(config)?;
        let document_count = batch.len();
        let report = tokio::task::spawn_blocking(move || engine.index_documents(&batch, mode))
            .await
            .context("indexing task panicked")??;

        if self.json {
            return print_json(&serde_json::json!({
                "mode": mode,
                "read": document_count,
                "failed": failed,
                "report": report,
            }));
        }

        println!("✓ Indexed {} of {} files", report.indexed, document_count);
        if !report.skipped.is_empty() {
            println!("  Skipped (no known words): {}", report.skipped.len());
        }
        if !failed.is_empty() {
            println!("  Unreadable: {}", failed.len());
        }
        if let Some(error) = &report.keyword_error {
            println!("  Keyword index not updated: {}", error);
        }
        println!("  Index now holds {} documents", report.total_entries);
        println!("  Duration: {:.2}s", report.duration_secs);

        Ok(())
    }
}

/// Remove files from the index
#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Files to remove
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RemoveCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing remove command");

        let keys: BTreeSet<String> = self.paths.iter().map(|p| document_key(p)).collect();
        let engine = open_engine(config)?;
        let removed = engine.remove_documents(&keys)?;

        if self.json {
            print_json(&serde_json::json!({ "removed": removed }))
        } else {
            println!("✓ Removed {} documents", removed);
            Ok(())
        }
    }
}

/// Expand files and directories into the list of files to index.
fn collect_files(paths: &[PathBuf], include: &[String], exclude: &[String]) -> Vec<PathBuf> {
    let mut files = BTreeSet::new();

    for path in paths {
        if path.is_file() {
            files.insert(path.clone());
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| !is_skipped_dir(e.path()))
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if entry.file_type().is_file() && should_include(entry_path, include, exclude) {
                    files.insert(entry_path.to_path_buf());
                }
            }
        } else {
            tracing::warn!("Path not found: {:?}", path);
        }
    }

    files.into_iter().collect()
}

fn is_skipped_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Check if a file should be included based on patterns.
fn should_include(path: &Path, include: &[String], exclude: &[String]) -> bool {
    let path_str = path.to_string_lossy();

    if exclude.iter().any(|pattern| path_str.contains(pattern.as_str())) {
        return false;
    }

    include.is_empty() || include.iter().any(|pattern| path_str.contains(pattern.as_str()))
}

/// Read files concurrently; returns the batch and the files that failed.
async fn extract_all(
    files: Vec<PathBuf>,
    extractor: Arc<PlainTextExtractor>,
    concurrency: usize,
) -> (DocumentBatch, Vec<String>) {
    let results: Vec<(String, anyhow::Result<String>)> = stream::iter(files)
        .map(|path| {
            let extractor = Arc::clone(&extractor);
            async move {
                let key = document_key(&path);
                let text = tokio::task::spawn_blocking(move || extractor.extract(&path))
                    .await
                    .map_err(anyhow::Error::from)
                    .and_then(|r| r.map_err(anyhow::Error::from));
                (key, text)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut batch = DocumentBatch::new();
    let mut failed = Vec::new();
    for (key, text) in results {
        match text {
            Ok(text) => {
                batch.insert(key, text);
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {:#}", key, e);
                failed.push(key);
            }
        }
    }
    failed.sort();

    (batch, failed)
}
