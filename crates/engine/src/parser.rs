//! Plain-text extraction from files on disk.

use smartfind_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Default character budget for extracted text.
pub const DEFAULT_MAX_CHARS: usize = 5000;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("txt") | Some("text") | Some("csv") | Some("log") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }
}

/// Turns a file into plain text for indexing.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> AppResult<String>;
}

/// Reads UTF-8 text (lossily), strips markup and truncates.
#[derive(Debug, Clone)]
pub struct PlainTextExtractor {
    max_chars: usize,
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS)
    }
}

impl PlainTextExtractor {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> AppResult<String> {
        let bytes = fs::read(path)?;

        if !is_likely_text(&bytes) {
            tracing::warn!("Skipping likely binary file: {:?}", path);
            return Err(AppError::Other(format!(
                "{} looks like a binary file",
                path.display()
            )));
        }

        let raw = String::from_utf8_lossy(&bytes);
        let cleaned = match ContentType::from_path(path) {
            ContentType::Markdown => clean_markdown(&raw),
            ContentType::Html => clean_html(&raw),
            ContentType::PlainText | ContentType::Unknown => raw.into_owned(),
        };

        Ok(truncate_chars(cleaned, self.max_chars))
    }
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((byte_index, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_index);
    }
    text
}

/// Clean markdown by removing excess formatting.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        // Skip horizontal rules and code fences
        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

/// Clean HTML by stripping tags and script/style bodies.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    for (i, ch) in text.char_indices() {
        if ch == '<' {
            in_tag = true;
            let rest = &text[i..];
            if starts_with_ignore_case(rest, "<script") {
                in_script = true;
            } else if starts_with_ignore_case(rest, "</script") {
                in_script = false;
            } else if starts_with_ignore_case(rest, "<style") {
                in_style = true;
            } else if starts_with_ignore_case(rest, "</style") {
                in_style = false;
            }
        } else if ch == '>' {
            in_tag = false;
            // Keep words on either side of a tag apart
            result.push(' ');
        } else if !in_tag && !in_script && !in_style {
            result.push(ch);
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Binary files contain NUL bytes early on.
fn is_likely_text(bytes: &[u8]) -> bool {
    !bytes.iter().take(8192).any(|&b| b == 0)
}
