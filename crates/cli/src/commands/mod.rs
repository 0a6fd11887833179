//! Command handlers for the SmartFind CLI.
//!
//! Each subcommand lives in its own module; shared helpers sit here.

pub mod classify;
pub mod index;
pub mod init;
pub mod search;
pub mod stats;
pub mod summarize;

// Re-export command types for convenience
pub use classify::ClassifyCommand;
pub use index::{IndexCommand, RemoveCommand};
pub use init::InitCommand;
pub use search::{DuplicatesCommand, SearchCommand, SimilarCommand};
pub use stats::StatsCommand;
pub use summarize::SummarizeCommand;

use anyhow::Context;
use serde::Serialize;
use smartfind_core::AppConfig;
use smartfind_engine::RetrievalEngine;
use std::path::{Path, PathBuf};

/// Open the engine for the configured data and asset directories.
pub(crate) fn open_engine(config: &AppConfig) -> anyhow::Result<RetrievalEngine> {
    RetrievalEngine::open(config).with_context(|| {
        format!(
            "failed to open index under {}",
            config.data_dir.display()
        )
    })
}

/// Key under which a file is stored in the index.
///
/// Canonical when the file exists so that relative and absolute
/// spellings of the same file agree. A file that no longer exists keys
/// as its canonical parent joined with its name, which is what indexing
/// stored while it existed.
pub(crate) fn document_key(path: &Path) -> String {
    resolve_path(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

fn resolve_path(path: &Path) -> std::io::Result<PathBuf> {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return Ok(canonical);
    }

    let absolute = std::path::absolute(path)?;
    let reparented = match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .ok()
            .map(|parent| parent.join(name)),
        _ => None,
    };
    Ok(reparented.unwrap_or(absolute))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
