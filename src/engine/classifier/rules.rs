// ── Response-type rules ─────────────────────────────────────────────────────
//
// Keyword heuristics for the unambiguous cases. A rule fires only on a clear
// pattern; anything else returns `None` so the next stage decides.
//
//   "hi", "thanks", "how are you"        → Conversational
//   leading why / how / how many / when  → Explanatory
//   "what is my", "where do I", "who is my" → Factual

use crate::atoms::gate_types::ResponseType;
use crate::engine::text::normalize_text;

const CONVERSATIONAL_OPENERS: &[&str] = &[
    "hi", "hello", "hey", "yo", "good morning", "good afternoon", "good evening", "thanks",
    "thank you", "thx", "cheers", "how are you", "how's it going", "how is it going",
    "what's up", "whats up", "nice to meet you", "bye", "goodbye", "see you", "good night",
];

const EXPLANATORY_OPENERS: &[&str] =
    &["why", "how", "how many", "when", "explain", "describe", "what causes", "what happens"];

/// "how" lookups about the user that are answered from a stored value.
const QUANTITY_OPENERS: &[&str] = &["how old", "how much", "how long have i", "how tall"];

const FIRST_PERSON_LOOKUPS: &[&str] = &[
    "what is my", "what's my", "whats my", "where do i", "where did i", "where am i", "who is my",
    "who's my", "what do i", "which company do i", "what company do i", "how old am i", "do i work",
    "do i live", "am i", "what did i tell you", "what was my", "where i work", "where i live",
];

const SYNTHESIS_MARKERS: &[&str] = &[
    "list", "everything you know", "what do you know about me", "summarize", "summarise",
    "summary of", "all my", "all the things", "tell me about myself", "overview of",
];

/// Rule-stage verdict, or `None` when no rule fires.
pub fn rule_verdict(query: &str) -> Option<ResponseType> {
    let q = normalize_text(query);
    if q.is_empty() {
        return None;
    }

    if starts_with_any(&q, CONVERSATIONAL_OPENERS) {
        return Some(ResponseType::Conversational);
    }
    if starts_with_any(&q, EXPLANATORY_OPENERS) && !starts_with_any(&q, QUANTITY_OPENERS) {
        return Some(ResponseType::Explanatory);
    }
    if contains_any(&q, FIRST_PERSON_LOOKUPS) {
        return Some(ResponseType::Factual);
    }
    None
}

/// Aggregation queries ("list everything you know about me") that should
/// retrieve a wider set of records and be gated on citation coverage.
pub fn detect_synthesis(query: &str) -> bool {
    contains_any(&normalize_text(query), SYNTHESIS_MARKERS)
}

/// Whole-word prefix match: "hi" matches "hi there" but not "hiking".
fn starts_with_any(s: &str, prefixes: &[&str]) -> bool {
    prefixes
        .iter()
        .any(|p| s == *p || s.strip_prefix(p).is_some_and(|rest| rest.starts_with(' ')))
}

/// Whole-word containment.
fn contains_any(s: &str, terms: &[&str]) -> bool {
    let padded = format!(" {s} ");
    terms.iter().any(|t| padded.contains(&format!(" {t} ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversational() {
        assert_eq!(rule_verdict("Hello!"), Some(ResponseType::Conversational));
        assert_eq!(rule_verdict("thanks a lot"), Some(ResponseType::Conversational));
        assert_eq!(rule_verdict("How are you today?"), Some(ResponseType::Conversational));
        assert_eq!(rule_verdict("hiking is fun"), None);
    }

    #[test]
    fn test_explanatory() {
        assert_eq!(rule_verdict("Why did I leave Acme?"), Some(ResponseType::Explanatory));
        assert_eq!(rule_verdict("explain my schedule"), Some(ResponseType::Explanatory));
        assert_eq!(rule_verdict("how does compounding work"), Some(ResponseType::Explanatory));
        assert_eq!(rule_verdict("How many kids do I have?"), Some(ResponseType::Explanatory));
        assert_eq!(rule_verdict("when did I move to Porto"), Some(ResponseType::Explanatory));
    }

    #[test]
    fn test_factual_lookups() {
        assert_eq!(rule_verdict("where do I work?"), Some(ResponseType::Factual));
        assert_eq!(rule_verdict("What's my dog's name"), Some(ResponseType::Factual));
        assert_eq!(rule_verdict("how old am I"), Some(ResponseType::Factual));
    }

    #[test]
    fn test_no_rule() {
        assert_eq!(rule_verdict("tell me a joke about databases"), None);
        assert_eq!(rule_verdict("   "), None);
    }

    #[test]
    fn test_synthesis() {
        assert!(detect_synthesis("List everything you know about me"));
        assert!(detect_synthesis("summarize my preferences"));
        assert!(!detect_synthesis("where do I work?"));
        assert!(!detect_synthesis("I enlisted in 2010"));
    }
}
