//! Text normalization into vocabulary tokens.
//!
//! Lowercases the input, keeps runs of at least three ASCII letters bounded by
//! word boundaries and removes stopwords. The stopword list must match the one
//! used when the embedding table was trained.

use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-z]{3,}\b").expect("valid regex"));

/// Stopwords excluded from tokenization, identical to the training pipeline.
pub const STOPWORDS: &[&str] = &[
    "the", "and", "to", "of", "a", "in", "is", "that", "for", "it", "on", "with", "as", "was",
    "at", "by", "an", "be", "this", "which", "or", "from", "but", "not", "are", "your", "all",
    "have", "new", "more", "we", "will", "home", "can", "us", "about", "if", "page", "my", "has",
    "search", "free", "our", "one", "other", "do", "no", "information", "time", "they", "site",
    "he", "up", "may", "what", "their", "news", "out", "use", "any", "there", "see", "only", "so",
    "his", "when", "contact", "here", "business", "who", "web", "also", "now", "help", "get", "pm",
    "view", "online", "c", "e", "first", "am", "been", "would", "how", "were", "me", "s",
    "services", "some", "these", "click", "its", "like", "service", "x", "than", "find", "price",
    "date", "back", "top", "people", "had", "list", "name", "just", "over", "state", "year",
    "day", "into", "email", "two", "health", "n", "world", "re", "next", "used", "go", "b",
    "work", "last", "most",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

/// Returns true if `word` is excluded from tokenization.
pub fn is_stopword(word: &str) -> bool {
    STOPWORD_SET.contains(word)
}

/// Split `text` into normalized tokens, in order of appearance.
///
/// Repeated words are kept; callers that weight by frequency rely on it.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|token| !is_stopword(token))
        .map(str::to_string)
        .collect()
}
