//! Keyword index used as a fallback or complement to vector search.
//!
//! The SQLite implementation uses a contentless FTS5 table: document text is
//! tokenized into the index but never stored. A side table maps FTS row ids
//! back to paths.

use crate::types::DocumentBatch;
use regex_lite::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use smartfind_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, PoisonError};

static TERM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9]+").expect("valid regex"));

/// Exact and prefix keyword matching over document text.
pub trait LexicalIndex: Send + Sync {
    /// Add or replace the text indexed for `path`.
    fn index_document(&self, path: &str, text: &str) -> AppResult<()>;

    /// Paths matching every query term as a prefix, best match first.
    fn search(&self, query: &str, limit: usize) -> AppResult<Vec<String>>;

    /// Forget `path`; returns false if it was not indexed.
    fn remove(&self, path: &str) -> AppResult<bool>;

    /// Drop every document.
    fn reset(&self) -> AppResult<()>;

    /// Number of indexed documents.
    fn len(&self) -> AppResult<usize>;

    fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Index a whole batch.
    fn index_batch(&self, documents: &DocumentBatch) -> AppResult<usize> {
        for (path, text) in documents {
            self.index_document(path, text)?;
        }
        Ok(documents.len())
    }

    /// Drop every document and index `documents` in their place.
    fn replace_all(&self, documents: &DocumentBatch) -> AppResult<usize> {
        self.reset()?;
        self.index_batch(documents)
    }
}

/// Build an FTS5 query that prefix-matches every alphanumeric term.
///
/// Returns `None` when the query has no searchable terms. User text is
/// never interpolated into the MATCH expression as-is.
pub fn build_match_query(query: &str) -> Option<String> {
    let terms: Vec<String> = TERM_PATTERN
        .find_iter(query)
        .map(|m| format!("\"{}\"*", m.as_str().to_lowercase()))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Contentless FTS5 keyword index in its own SQLite file.
pub struct SqliteLexicalIndex {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteLexicalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLexicalIndex")
            .field("path", &self.path)
            .finish()
    }
}

impl SqliteLexicalIndex {
    /// Open (creating if needed) the keyword index at `path`.
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Lexical(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| lexical("Failed to open keyword index", e))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS files_map (
                rowid INTEGER PRIMARY KEY,
                path TEXT NOT NULL UNIQUE
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS search_index
                USING fts5(content, content='', contentless_delete=1);
            "#,
        )
        .map_err(|e| lexical("Failed to create keyword tables", e))?;

        tracing::debug!("Opened keyword index at {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn insert(conn: &Connection, path: &str, text: &str) -> AppResult<()> {
        let existing: Option<i64> = conn
            .query_row(
                "SELECT rowid FROM files_map WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| lexical("Failed to look up document", e))?;

        let row_id = match existing {
            Some(row_id) => {
                conn.execute("DELETE FROM search_index WHERE rowid = ?1", params![row_id])
                    .map_err(|e| lexical("Failed to clear previous text", e))?;
                row_id
            }
            None => {
                conn.execute("INSERT INTO files_map (path) VALUES (?1)", params![path])
                    .map_err(|e| lexical("Failed to register document", e))?;
                conn.last_insert_rowid()
            }
        };

        conn.execute(
            "INSERT INTO search_index (rowid, content) VALUES (?1, ?2)",
            params![row_id, text],
        )
        .map_err(|e| lexical("Failed to index text", e))?;
        Ok(())
    }
}

impl LexicalIndex for SqliteLexicalIndex {
    fn index_document(&self, path: &str, text: &str) -> AppResult<()> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn
            .transaction()
            .map_err(|e| lexical("Failed to begin transaction", e))?;
        Self::insert(&tx, path, text)?;
        tx.commit().map_err(|e| lexical("Failed to commit", e))?;
        Ok(())
    }

    fn index_batch(&self, documents: &DocumentBatch) -> AppResult<usize> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn
            .transaction()
            .map_err(|e| lexical("Failed to begin transaction", e))?;
        for (path, text) in documents {
            Self::insert(&tx, path, text)?;
        }
        tx.commit().map_err(|e| lexical("Failed to commit", e))?;

        tracing::debug!("Indexed {} documents for keyword search", documents.len());
        Ok(documents.len())
    }

    /// Reset and re-index in one transaction; on failure the previous
    /// contents stay in place.
    fn replace_all(&self, documents: &DocumentBatch) -> AppResult<usize> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn
            .transaction()
            .map_err(|e| lexical("Failed to begin transaction", e))?;
        clear(&tx)?;
        for (path, text) in documents {
            Self::insert(&tx, path, text)?;
        }
        tx.commit().map_err(|e| lexical("Failed to commit", e))?;

        tracing::debug!("Replaced keyword index with {} documents", documents.len());
        Ok(documents.len())
    }

    fn search(&self, query: &str, limit: usize) -> AppResult<Vec<String>> {
        let Some(match_query) = build_match_query(query) else {
            return Ok(Vec::new());
        };

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn
            .prepare(
                "SELECT files_map.path FROM files_map
                 JOIN (SELECT rowid AS id, rank AS score FROM search_index
                       WHERE search_index MATCH ?1) AS hits
                   ON files_map.rowid = hits.id
                 ORDER BY hits.score, files_map.path
                 LIMIT ?2",
            )
            .map_err(|e| lexical("Failed to prepare keyword query", e))?;

        let paths = stmt
            .query_map(params![match_query, limit as i64], |row| row.get(0))
            .map_err(|e| lexical("Failed to run keyword query", e))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| lexical("Failed to read keyword results", e))?;

        tracing::debug!("Keyword index found {} matches for '{}'", paths.len(), query);
        Ok(paths)
    }

    fn remove(&self, path: &str) -> AppResult<bool> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn
            .transaction()
            .map_err(|e| lexical("Failed to begin transaction", e))?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT rowid FROM files_map WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| lexical("Failed to look up document", e))?;

        let Some(row_id) = existing else {
            return Ok(false);
        };

        tx.execute("DELETE FROM search_index WHERE rowid = ?1", params![row_id])
            .map_err(|e| lexical("Failed to delete text", e))?;
        tx.execute("DELETE FROM files_map WHERE rowid = ?1", params![row_id])
            .map_err(|e| lexical("Failed to delete document", e))?;
        tx.commit().map_err(|e| lexical("Failed to commit", e))?;
        Ok(true)
    }

    fn reset(&self) -> AppResult<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        clear(&conn)?;

        tracing::info!("Reset keyword index at {:?}", self.path);
        Ok(())
    }

    fn len(&self) -> AppResult<usize> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.query_row("SELECT COUNT(*) FROM files_map", [], |row| {
            row.get::<_, i64>(0).map(|v| v as usize)
        })
        .map_err(|e| lexical("Failed to count documents", e))
    }
}

fn lexical(context: &str, err: rusqlite::Error) -> AppError {
    AppError::Lexical(format!("{}: {}", context, err))
}

fn clear(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "INSERT INTO search_index (search_index) VALUES ('delete-all');
         DELETE FROM files_map;",
    )
    .map_err(|e| lexical("Failed to reset keyword index", e))
}
