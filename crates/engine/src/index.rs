//! SQLite persistence for the vector index.
//!
//! Every save writes a complete database to a sibling temporary file and
//! renames it over the previous one, so a crash never leaves a partially
//! written index behind.

use crate::vector_index::{IndexBackend, IndexEntry, IndexSnapshot};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use smartfind_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Stores an [`IndexSnapshot`] as a single SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: PathBuf,
}

impl SqliteBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl IndexBackend for SqliteBackend {
    fn load(&self) -> AppResult<Option<IndexSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| persistence("Failed to open index", e))?;

        let dimension = read_meta(&conn, "dimension")?
            .and_then(|v| v.parse::<usize>().ok())
            .ok_or_else(|| {
                AppError::Persistence(format!("Index at {:?} has no dimension", self.path))
            })?;
        let fingerprint = read_meta(&conn, "asset_fingerprint")?;
        let updated_at = read_meta(&conn, "updated_at")?.and_then(|v| {
            DateTime::parse_from_rfc3339(&v)
                .map(|d| d.with_timezone(&Utc))
                .ok()
        });

        let mut stmt = conn
            .prepare("SELECT path, embedding FROM documents ORDER BY position")
            .map_err(|e| persistence("Failed to prepare query", e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(|e| persistence("Failed to query documents", e))?;

        let mut entries = Vec::new();
        for row in rows {
            let (path, bytes) = row.map_err(|e| persistence("Failed to read document", e))?;
            let embedding = bytes_to_embedding(&bytes)?;
            entries.push(IndexEntry { path, embedding });
        }

        let snapshot = IndexSnapshot::from_entries(entries, dimension, fingerprint, updated_at)?;
        tracing::debug!(
            "Loaded {} index entries from {:?}",
            snapshot.len(),
            self.path
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &IndexSnapshot) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Persistence(format!("Failed to create index directory: {}", e))
            })?;
        }

        let temp_path = self.temp_path();
        if temp_path.exists() {
            fs::remove_file(&temp_path).map_err(|e| {
                AppError::Persistence(format!("Failed to clear stale {:?}: {}", temp_path, e))
            })?;
        }

        if let Err(e) = write_database(&temp_path, snapshot) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            AppError::Persistence(format!("Failed to replace {:?}: {}", self.path, e))
        })?;

        tracing::debug!("Saved {} index entries to {:?}", snapshot.len(), self.path);
        Ok(())
    }

    fn size_bytes(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

fn write_database(path: &Path, snapshot: &IndexSnapshot) -> AppResult<()> {
    let mut conn = Connection::open(path).map_err(|e| persistence("Failed to create index", e))?;

    conn.execute_batch(
        r#"
        CREATE TABLE meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE documents (
            position INTEGER PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            embedding BLOB NOT NULL
        );
        "#,
    )
    .map_err(|e| persistence("Failed to create tables", e))?;

    let tx = conn
        .transaction()
        .map_err(|e| persistence("Failed to begin transaction", e))?;
    {
        let mut meta = tx
            .prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")
            .map_err(|e| persistence("Failed to prepare metadata insert", e))?;
        meta.execute(params!["dimension", snapshot.dimension().to_string()])
            .map_err(|e| persistence("Failed to write metadata", e))?;
        if let Some(fingerprint) = snapshot.asset_fingerprint() {
            meta.execute(params!["asset_fingerprint", fingerprint])
                .map_err(|e| persistence("Failed to write metadata", e))?;
        }
        if let Some(updated_at) = snapshot.updated_at() {
            meta.execute(params!["updated_at", updated_at.to_rfc3339()])
                .map_err(|e| persistence("Failed to write metadata", e))?;
        }

        let mut insert = tx
            .prepare("INSERT INTO documents (position, path, embedding) VALUES (?1, ?2, ?3)")
            .map_err(|e| persistence("Failed to prepare document insert", e))?;
        for (position, entry) in snapshot.entries().iter().enumerate() {
            insert
                .execute(params![
                    position as i64,
                    entry.path,
                    embedding_to_bytes(&entry.embedding)
                ])
                .map_err(|e| persistence("Failed to insert document", e))?;
        }
    }
    tx.commit()
        .map_err(|e| persistence("Failed to commit index", e))?;

    conn.close()
        .map_err(|(_, e)| persistence("Failed to close index", e))?;
    Ok(())
}

fn read_meta(conn: &Connection, key: &str) -> AppResult<Option<String>> {
    conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
        row.get(0)
    })
    .optional()
    .map_err(|e| persistence("Failed to read metadata", e))
}

fn persistence(context: &str, err: rusqlite::Error) -> AppError {
    AppError::Persistence(format!("{}: {}", context, err))
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Persistence(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
