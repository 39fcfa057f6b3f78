// ── trustmem: Text Normalization ────────────────────────────────────────────
//
// Shared by slot extraction, the ledger's value comparison, grounding and the
// classifier's features. All functions are pure and lowercase their input.

use std::collections::HashSet;

/// Words that carry no content for grounding or fact comparison.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "of", "at", "by", "for", "with", "about", "to",
    "from", "in", "on", "into", "is", "are", "was", "were", "be", "been", "being", "am", "do",
    "does", "did", "have", "has", "had", "i", "me", "my", "mine", "you", "your", "yours", "we",
    "our", "it", "its", "it's", "this", "that", "these", "those", "there", "here", "what", "which",
    "who", "whom", "where", "when", "why", "how", "so", "than", "too", "very", "just", "also",
    "now", "then", "not", "no", "yes", "can", "will", "would", "should", "could", "as", "i'm",
    "you're", "that's", "based", "told",
];

/// Suffixes dropped when comparing organisation names.
const CORPORATE_SUFFIXES: &[&str] = &[
    "inc", "inc.", "llc", "ltd", "ltd.", "corp", "corp.", "corporation", "co", "co.", "gmbh",
    "plc", "company",
];

/// Lowercase, collapse whitespace, strip punctuation except apostrophes.
pub fn normalize_text(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a slot value: strip leading articles and corporate suffixes so
/// "The Acme Corp." and "acme" compare equal.
pub fn normalize_value(value: &str) -> String {
    let norm = normalize_text(value);
    let mut words: Vec<&str> = norm.split(' ').filter(|w| !w.is_empty()).collect();
    while words.first().is_some_and(|w| matches!(*w, "the" | "a" | "an")) {
        words.remove(0);
    }
    while words.len() > 1 && words.last().is_some_and(|w| CORPORATE_SUFFIXES.contains(w)) {
        words.pop();
    }
    words.join(" ")
}

/// Word tokens of normalized text.
pub fn tokens(text: &str) -> Vec<String> {
    normalize_text(text)
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Distinct content words (stop words removed, length ≥ 2).
pub fn content_words(text: &str) -> HashSet<String> {
    tokens(text)
        .into_iter()
        .filter(|w| w.len() >= 2 && !is_stop_word(w))
        .collect()
}

/// Levenshtein distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Levenshtein distance scaled to [0, 1] by the longer string.
pub fn normalized_edit_distance(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    levenshtein(a, b) as f64 / longest as f64
}

/// `true` when `needle` occurs in `haystack` on word boundaries
/// (both already normalized).
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let padded_h = format!(" {haystack} ");
    let padded_n = format!(" {needle} ");
    padded_h.contains(&padded_n)
}
