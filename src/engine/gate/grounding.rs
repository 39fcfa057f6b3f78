// ── Gate inputs: alignment, grounding, citation coverage ───────────────────
//
// Cheap lexical measures over the retrieved records. No model calls.
//
//   grounding  — how much of the answer is supported by memory
//   coverage   — how many retrieved records a synthesis answer cites
//   alignment  — cosine in [0, 1]

use std::collections::HashSet;

use crate::atoms::constants::{
    CITATION_WORD_SHARE, GROUNDING_TOP_RECORDS, SHORT_ANSWER_WORDS, VERBATIM_GROUNDING_SCORE,
};
use crate::atoms::types::MemoryRecord;
use crate::engine::sessions::cosine_similarity;
use crate::engine::text::{contains_phrase, content_words, normalize_text};

/// Cosine similarity clamped to [0, 1]. Mismatched or empty vectors score 0.
pub fn alignment(a: &[f32], b: &[f32]) -> f64 {
    cosine_similarity(a, b).clamp(0.0, 1.0)
}

/// Affirmed slot value of a record, already normalized at extraction time.
fn affirmed_value(record: &MemoryRecord) -> Option<&str> {
    record
        .slot
        .as_ref()
        .filter(|s| !s.negated && !s.value.is_empty())
        .map(|s| s.value.as_str())
}

fn word_share(record_words: &HashSet<String>, answer_words: &HashSet<String>) -> f64 {
    if record_words.is_empty() {
        return 0.0;
    }
    let hit = record_words.iter().filter(|w| answer_words.contains(*w)).count();
    hit as f64 / record_words.len() as f64
}

/// How well `answer` is supported by `records` (ranked best first).
///
/// Short answers found verbatim in a record, or carrying a record's slot
/// value, score `VERBATIM_GROUNDING_SCORE`. Everything else gets the best
/// per-record share of content words that reappear in the answer, over the
/// top few records.
pub fn grounding_score(answer: &str, records: &[MemoryRecord]) -> f64 {
    let answer_norm = normalize_text(answer);
    if answer_norm.is_empty() || records.is_empty() {
        return 0.0;
    }
    let answer_words = content_words(&answer_norm);

    if answer_words.len() <= SHORT_ANSWER_WORDS {
        let verbatim = records.iter().any(|r| {
            contains_phrase(&normalize_text(&r.text), &answer_norm)
                || affirmed_value(r).is_some_and(|v| contains_phrase(&answer_norm, v))
        });
        if verbatim {
            return VERBATIM_GROUNDING_SCORE;
        }
    }

    records
        .iter()
        .take(GROUNDING_TOP_RECORDS)
        .map(|r| word_share(&content_words(&r.text), &answer_words))
        .fold(0.0, f64::max)
}

/// Fraction of `records` the answer cites: slot value present, or most of
/// the record's content words present.
pub fn citation_coverage(answer: &str, records: &[MemoryRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let answer_norm = normalize_text(answer);
    let answer_words = content_words(&answer_norm);
    let cited = records
        .iter()
        .filter(|r| {
            affirmed_value(r).is_some_and(|v| contains_phrase(&answer_norm, v))
                || word_share(&content_words(&r.text), &answer_words) >= CITATION_WORD_SHARE
        })
        .count();
    cited as f64 / records.len() as f64
}
