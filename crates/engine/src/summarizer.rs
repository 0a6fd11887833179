//! Frequency-based extractive summaries.
//!
//! Word frequencies (stopwords removed, normalized by the most frequent
//! word) score each sentence; the best sentences are returned in their
//! original order.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Default number of sentences in a summary.
pub const DEFAULT_MAX_SENTENCES: usize = 3;

/// Texts shorter than this are returned truncated instead of summarized.
const MIN_INPUT_CHARS: usize = 50;

/// Length of the truncated fallback.
const FALLBACK_CHARS: usize = 200;

/// Sentences with this many words or fewer are ignored.
const MIN_SENTENCE_WORDS: usize = 4;

const SUMMARY_STOPWORDS: &[&str] = &[
    "the", "and", "of", "to", "a", "in", "is", "that", "for", "it", "on", "with", "as", "are",
    "was", "this", "by", "be", "at", "or", "from", "an", "not", "but", "can", "if", "we", "has",
    "have", "which", "their", "will", "its", "about", "would", "there", "so", "what", "who",
    "when", "they", "he", "she", "his", "her", "been", "had", "were", "one", "all",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| SUMMARY_STOPWORDS.iter().copied().collect());

/// Summarize `text` in at most `max_sentences` sentences.
pub fn summarize(text: &str, max_sentences: usize) -> String {
    if text.trim().chars().count() < MIN_INPUT_CHARS {
        return truncate(text);
    }

    let frequencies = word_frequencies(text);
    if frequencies.is_empty() {
        return truncate(text);
    }

    let sentences: Vec<&str> = split_sentences(text)
        .into_iter()
        .map(str::trim)
        .filter(|s| s.split_whitespace().count() > MIN_SENTENCE_WORDS)
        .collect();

    if sentences.len() <= max_sentences {
        return sentences.join(" ");
    }

    let mut seen = HashSet::new();
    let mut scored: Vec<(usize, f32)> = Vec::new();
    for (position, sentence) in sentences.iter().enumerate() {
        if !seen.insert(*sentence) {
            continue;
        }
        if let Some(score) = score_sentence(sentence, &frequencies) {
            scored.push((position, score));
        }
    }

    // Stable sort keeps earlier sentences ahead on equal scores
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(max_sentences);
    scored.sort_by_key(|(position, _)| *position);

    tracing::debug!(
        "Summarized {} sentences into {}",
        sentences.len(),
        scored.len()
    );

    scored
        .into_iter()
        .map(|(position, _)| sentences[position])
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate(text: &str) -> String {
    text.chars().take(FALLBACK_CHARS).collect()
}

/// Lowercase and drop everything that is not a word character or whitespace.
fn clean_words(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn word_frequencies(text: &str) -> HashMap<String, f32> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in clean_words(text) {
        if !STOPWORD_SET.contains(word.as_str()) {
            *counts.entry(word).or_insert(0) += 1;
        }
    }

    let max = counts.values().copied().max().unwrap_or(0);
    if max == 0 {
        return HashMap::new();
    }

    counts
        .into_iter()
        .map(|(word, count)| (word, count as f32 / max as f32))
        .collect()
}

/// Summed frequency over the sentence's word count; `None` if no word scores.
fn score_sentence(sentence: &str, frequencies: &HashMap<String, f32>) -> Option<f32> {
    let words = clean_words(sentence);
    let mut score = 0.0;
    let mut hits = 0;
    for word in &words {
        if let Some(frequency) = frequencies.get(word) {
            score += frequency;
            hits += 1;
        }
    }
    (hits > 0).then(|| score / words.len() as f32)
}

/// Split after `.`, `?` or `!` followed by whitespace.
///
/// Does not split after dotted abbreviations ("U.S.") or capitalized
/// two-letter titles ("Mr.", "Dr.").
fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;

    for i in 0..chars.len() {
        let (offset, c) = chars[i];
        if !c.is_whitespace() || i == 0 {
            continue;
        }
        let prev = chars[i - 1].1;
        if !matches!(prev, '.' | '?' | '!') {
            continue;
        }
        if i >= 4 && is_dotted_abbreviation(&chars[i - 4..i]) {
            continue;
        }
        if i >= 3 && is_title_abbreviation(&chars[i - 3..i]) {
            continue;
        }

        sentences.push(&text[start..offset]);
        start = offset + c.len_utf8();
    }
    sentences.push(&text[start..]);
    sentences
}

/// `w.w?` as in "U.S." or "e.g."
fn is_dotted_abbreviation(window: &[(usize, char)]) -> bool {
    is_word_char(window[0].1) && window[1].1 == '.' && is_word_char(window[2].1)
}

/// `Aa.` as in "Mr." or "Dr."
fn is_title_abbreviation(window: &[(usize, char)]) -> bool {
    window[0].1.is_ascii_uppercase() && window[1].1.is_ascii_lowercase() && window[2].1 == '.'
}
