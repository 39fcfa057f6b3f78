// ── trustmem: Slot Extraction ───────────────────────────────────────────────
//
// Turns a user statement into structured facts:
//   • slot      — (SlotKind, normalized value, polarity)
//   • topic     — coarse subject, used to pair sentiment statements
//   • sentiment — positive / negative / uncertain / neutral
//   • correction markers ("actually", "I meant", "no longer", "not X, it's Y")
//
// Every slot kind is backed by a row in SLOT_PATTERNS. Adding a kind means
// adding a `SlotKind` variant and its rows here; call sites never match on
// raw strings.
//
// The sentiment and topic lexicons are a starting vocabulary, tuned on
// everyday statements about work, home and relationships.

use std::sync::LazyLock;

use log::warn;
use regex::{Captures, Regex};

use crate::atoms::types::{Sentiment, SlotFact, SlotKind, Topic};
use crate::engine::text::{contains_phrase, normalize_text, normalize_value};

// ═══════════════════════════════════════════════════════════════════════════
// Pattern Table
// ═══════════════════════════════════════════════════════════════════════════

/// Words after which a captured value ends ("I work at Globex now").
const VALUE_END: &str = r"(?:\s+(?:now|anymore|any\s+more|these\s+days|currently|anyway|since|and|but|though|because|so|too|either|instead)\b|\s*[,.!?;:]|\s*$)";

/// Up to four words of name-like text, captured lazily under `name`.
fn value_group(name: &str) -> String {
    format!(r"(?P<{name}>[\p{{L}}\p{{N}}][\p{{L}}\p{{N}}'&\-]*(?:\s+[\p{{L}}\p{{N}}][\p{{L}}\p{{N}}'&\-]*){{0,3}}?)")
}

/// `prefix` followed by a value and a terminator.
fn valued(prefix: &str) -> String {
    format!("(?i){prefix}{}{VALUE_END}", value_group("v"))
}

struct SlotPattern {
    regex: Regex,
    kind: SlotKind,
    negated: bool,
}

static SLOT_PATTERNS: LazyLock<Vec<SlotPattern>> = LazyLock::new(|| {
    use SlotKind::*;
    let rows: Vec<(SlotKind, bool, String)> = vec![
        // ── Name ──
        (Name, true, valued(r"\bmy\s+name\s+(?:is\s+not|isn't)\s+")),
        (Name, false, valued(r"\bmy\s+name\s+is\s+")),
        (Name, false, valued(r"\bcall\s+me\s+")),
        // ── Employer ──
        (Employer, true, valued(r"\bi\s+(?:don't|do\s+not|no\s+longer|never|didn't|did\s+not)\s+(?:work|worked)\s+(?:at|for)\s+")),
        (Employer, true, valued(r"\b(?:i'm|i\s+am)\s+(?:not|no\s+longer)\s+(?:working|employed)\s+(?:at|for|by)\s+")),
        (Employer, true, valued(r"\bmy\s+(?:employer|company)\s+(?:is\s+not|isn't)\s+")),
        (Employer, false, valued(r"\bi\s+(?:now\s+|currently\s+|still\s+|actually\s+)?work\s+(?:at|for)\s+")),
        (Employer, false, valued(r"\b(?:i'm|i\s+am)\s+(?:now\s+|currently\s+|still\s+)?(?:working|employed)\s+(?:at|for|by)\s+")),
        (Employer, false, valued(r"\bmy\s+(?:employer|company)\s+is\s+")),
        (Employer, false, valued(r"\bi\s+(?:just\s+)?(?:joined|started\s+at|got\s+a\s+job\s+at)\s+")),
        // ── Job title ──
        (JobTitle, true, valued(r"\bi\s+(?:don't|do\s+not|no\s+longer)\s+work\s+as\s+(?:an?\s+)?")),
        (JobTitle, false, valued(r"\bi\s+(?:now\s+|currently\s+)?work\s+as\s+(?:an?\s+)?")),
        (JobTitle, false, valued(r"\bmy\s+(?:job\s+title|title|role)\s+is\s+(?:an?\s+)?")),
        // ── Location ──
        (Location, true, valued(r"\bi\s+(?:don't|do\s+not|no\s+longer|never|didn't|did\s+not)\s+(?:live|lived)\s+in\s+")),
        (Location, true, valued(r"\b(?:i'm|i\s+am)\s+not\s+(?:living|based)\s+in\s+")),
        (Location, false, valued(r"\bi\s+(?:now\s+|currently\s+|still\s+|actually\s+)?live\s+in\s+")),
        (Location, false, valued(r"\b(?:i'm|i\s+am)\s+(?:now\s+|currently\s+)?(?:living|based)\s+in\s+")),
        (Location, false, valued(r"\bi\s+(?:just\s+)?moved\s+to\s+")),
        // ── Age ──
        (Age, true, r"(?i)\b(?:i'm|i\s+am)\s+not\s+(?P<v>\d{1,3})(?:\s+years?\s+old)?\b".to_string()),
        (Age, false, r"(?i)\b(?:i'm|i\s+am)\s+(?:now\s+)?(?P<v>\d{1,3})\s+years?\s+old\b".to_string()),
        (Age, false, r"(?i)\bmy\s+age\s+is\s+(?P<v>\d{1,3})\b".to_string()),
        (Age, false, r"(?i)\bi\s+(?:just\s+)?turned\s+(?P<v>\d{1,3})\b".to_string()),
        // ── Favorite color ──
        (FavoriteColor, true, valued(r"\bmy\s+favou?rite\s+colou?r\s+(?:is\s+not|isn't)\s+")),
        (FavoriteColor, false, valued(r"\bmy\s+favou?rite\s+colou?r\s+is\s+")),
        // ── Pet name ──
        (PetName, true, valued(r"\bmy\s+(?:dog|cat|pet|puppy|kitten)(?:'s\s+name\s+(?:is\s+not|isn't)|\s+(?:is\s+not|isn't)\s+(?:named|called))\s+")),
        (PetName, false, valued(r"\bmy\s+(?:dog|cat|pet|puppy|kitten)(?:'s\s+name\s+is|\s+is\s+(?:named|called))\s+")),
        // ── Partner ──
        (Partner, true, valued(r"\bmy\s+(?:wife|husband|partner|spouse|girlfriend|boyfriend)(?:'s\s+name)?\s+(?:is\s+not|isn't)\s+")),
        (Partner, true, valued(r"\b(?:i'm|i\s+am)\s+not\s+married\s+to\s+")),
        (Partner, false, valued(r"\bmy\s+(?:wife|husband|partner|spouse|girlfriend|boyfriend)(?:'s\s+name)?\s+is\s+")),
        (Partner, false, valued(r"\b(?:i'm|i\s+am)\s+married\s+to\s+")),
        // ── School ──
        (School, true, valued(r"\bi\s+(?:don't|do\s+not|didn't|did\s+not|never)\s+(?:study|studied|attend|attended|go\s+to\s+school)\s+(?:at\s+)?")),
        (School, false, valued(r"\bi\s+(?:study|studied|go\s+to\s+school|went\s+to\s+school)\s+at\s+")),
        (School, false, valued(r"\bi\s+(?:graduated|graduate)\s+from\s+")),
        (School, false, valued(r"\bmy\s+(?:school|university|college)\s+is\s+")),
    ];

    rows.into_iter()
        .filter_map(|(kind, negated, pattern)| match Regex::new(&pattern) {
            Ok(regex) => Some(SlotPattern { regex, kind, negated }),
            Err(e) => {
                warn!("[trustmem:slots] Failed to compile {} pattern: {}", kind, e);
                None
            }
        })
        .collect()
});

/// Phrases that mark a statement as correcting an earlier one.
static CORRECTION_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bactually\b",
        r"(?i)\bi\s+meant\b",
        r"(?i)\bno\s+longer\b",
        r"(?i)\bcorrection\b",
        r"(?i)\bnot\s+[^,.;]+,\s*(?:it's|it\s+is|but)\b",
        r"(?i)\b(?:it's|it\s+is)\s+[^,.;]+,\s*not\b",
        r"(?i)\bnow\s+(?:work|live)\b",
        r"(?i)\b(?:changed|switched)\s+jobs?\b",
        r"(?i)\bi\s+(?:just\s+)?moved\s+to\b",
    ]
    .iter()
    .filter_map(|p| match Regex::new(p) {
        Ok(r) => Some(r),
        Err(e) => {
            warn!("[trustmem:slots] Failed to compile correction marker '{}': {}", p, e);
            None
        }
    })
    .collect()
});

/// "not X, it's Y" / "it's Y, not X" without a slot phrase.
static BARE_CORRECTIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let old = value_group("old");
    let new = value_group("new");
    [
        format!(r"(?i)\bnot\s+{old},\s*(?:it's|it\s+is)\s+{new}{VALUE_END}"),
        format!(r"(?i)\b(?:it's|it\s+is)\s+{new},?\s+not\s+{old}{VALUE_END}"),
    ]
    .iter()
    .filter_map(|p| match Regex::new(p) {
        Ok(r) => Some(r),
        Err(e) => {
            warn!("[trustmem:slots] Failed to compile bare correction pattern: {}", e);
            None
        }
    })
    .collect()
});

// ═══════════════════════════════════════════════════════════════════════════
// Lexicons
// ═══════════════════════════════════════════════════════════════════════════

const TOPIC_KEYWORDS: &[(Topic, &[&str])] = &[
    (
        Topic::Work,
        &[
            "job", "work", "working", "boss", "office", "career", "employer", "company", "coworker",
            "coworkers", "colleague", "colleagues", "manager", "salary", "promotion", "promoted",
        ],
    ),
    (
        Topic::Home,
        &["home", "house", "apartment", "flat", "neighborhood", "neighbourhood", "city", "town", "rent"],
    ),
    (
        Topic::Relationships,
        &[
            "wife", "husband", "partner", "spouse", "girlfriend", "boyfriend", "dog", "cat", "pet",
            "friend", "friends", "family", "kids",
        ],
    ),
    (
        Topic::Education,
        &["school", "university", "college", "class", "classes", "degree", "studying", "professor"],
    ),
    (Topic::Preferences, &["favorite", "favourite", "color", "colour", "food", "music", "hobby"]),
    (Topic::Identity, &["name", "age", "birthday"]),
];

const UNCERTAIN_PHRASES: &[&str] = &[
    "not sure", "unsure", "don't know if", "not certain", "thinking about leaving",
    "thinking of leaving", "thinking about quitting", "considering leaving", "might quit",
    "might leave", "wondering if", "having doubts", "second thoughts", "torn about",
];

const NEGATIVE_PHRASES: &[&str] = &[
    "hate", "dislike", "can't stand", "cannot stand", "miserable", "unhappy", "awful", "terrible",
    "frustrated", "frustrating", "sick of", "tired of", "dread", "don't like", "do not like",
    "don't love", "don't enjoy", "not happy", "not enjoying", "burned out", "burnt out",
    "stressful", "not satisfied",
];

const POSITIVE_PHRASES: &[&str] = &[
    "love", "loving", "enjoy", "enjoying", "like", "happy", "great", "excited", "glad", "proud",
    "amazing", "wonderful", "promoted", "promotion", "got a raise", "satisfied",
];

// ═══════════════════════════════════════════════════════════════════════════
// Extractor
// ═══════════════════════════════════════════════════════════════════════════

/// Everything the extractor could read from one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub slot: Option<SlotFact>,
    pub topic: Option<Topic>,
    pub sentiment: Sentiment,
    /// The statement carries a correction marker.
    pub is_correction: bool,
    /// Value being corrected away from, when the statement names it
    /// ("I don't work at Acme, I work at Globex" → "acme").
    pub replaced_value: Option<String>,
    /// "not X, it's Y" with no slot phrase: (old, new), both normalized.
    /// The caller resolves the slot from stored records holding `old`.
    pub bare_correction: Option<(String, String)>,
}

/// Pattern-based slot extractor over the closed `SlotKind` set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotExtractor;

struct Hit {
    kind: SlotKind,
    negated: bool,
    value: String,
    start: usize,
}

impl SlotExtractor {
    pub fn new() -> Self {
        SlotExtractor
    }

    /// Full extraction: slot, topic, sentiment, correction markers.
    pub fn extract(&self, text: &str) -> Extraction {
        let text = text.replace('\u{2019}', "'");
        let (slot, replaced_value) = self.extract_slot(&text);
        let marked = is_correction(&text) || replaced_value.is_some();
        let bare = if slot.is_none() { bare_correction(&text) } else { None };
        Extraction {
            topic: slot.as_ref().map(|s| s.kind.topic()).or_else(|| infer_topic(&text)),
            sentiment: infer_sentiment(&text),
            slot,
            is_correction: marked || bare.is_some(),
            replaced_value,
            bare_correction: bare,
        }
    }

    /// Just the slot fact, if any.
    pub fn slot(&self, text: &str) -> Option<SlotFact> {
        self.extract_slot(&text.replace('\u{2019}', "'")).0
    }

    fn extract_slot(&self, text: &str) -> (Option<SlotFact>, Option<String>) {
        let hits: Vec<Hit> = SLOT_PATTERNS
            .iter()
            .filter_map(|p| {
                let caps = p.regex.captures(text)?;
                let value = clean_value(p.kind, &caps)?;
                Some(Hit {
                    kind: p.kind,
                    negated: p.negated,
                    value,
                    start: caps.get(0).map(|m| m.start()).unwrap_or(0),
                })
            })
            .collect();

        // The earliest mentioned kind wins when a statement touches several.
        let Some(kind) = hits.iter().min_by_key(|h| h.start).map(|h| h.kind) else {
            return (None, None);
        };
        let first_neg = hits.iter().filter(|h| h.kind == kind && h.negated).min_by_key(|h| h.start);
        let first_aff = hits.iter().filter(|h| h.kind == kind && !h.negated).min_by_key(|h| h.start);

        match (first_neg, first_aff) {
            (Some(neg), Some(aff)) if neg.value != aff.value => {
                (Some(SlotFact::affirmed(kind, aff.value.clone())), Some(neg.value.clone()))
            }
            (Some(neg), Some(aff)) => {
                // Same value both ways: the later phrase is the user's last word.
                let last = if aff.start > neg.start { aff } else { neg };
                (Some(SlotFact { kind, value: last.value.clone(), negated: last.negated }), None)
            }
            (Some(neg), None) => (Some(SlotFact::denied(kind, neg.value.clone())), None),
            (None, Some(aff)) => (Some(SlotFact::affirmed(kind, aff.value.clone())), None),
            (None, None) => (None, None),
        }
    }
}

/// Normalize a captured value; reject empties and leaked negations
/// ("my name is not Bob" must not yield the name "not bob").
fn clean_value(kind: SlotKind, caps: &Captures<'_>) -> Option<String> {
    let raw = caps.name("v")?.as_str();
    let value = if kind.is_numeric() {
        raw.trim().to_string()
    } else {
        normalize_value(raw)
    };
    if value.is_empty() || value == "not" || value.starts_with("not ") {
        return None;
    }
    Some(value)
}

/// `true` when the statement carries a correction marker.
pub fn is_correction(text: &str) -> bool {
    CORRECTION_MARKERS.iter().any(|r| r.is_match(text))
}

fn bare_correction(text: &str) -> Option<(String, String)> {
    BARE_CORRECTIONS.iter().find_map(|r| {
        let caps = r.captures(text)?;
        let old = normalize_value(caps.name("old")?.as_str());
        let new = normalize_value(caps.name("new")?.as_str());
        (!old.is_empty() && !new.is_empty() && old != new).then_some((old, new))
    })
}

/// First topic whose keyword appears in the text.
pub fn infer_topic(text: &str) -> Option<Topic> {
    let norm = normalize_text(text);
    TOPIC_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| contains_phrase(&norm, w)))
        .map(|(topic, _)| *topic)
}

/// Uncertainty outranks negativity, which outranks positivity:
/// "I love it but I'm not sure I'll stay" reads as uncertain.
pub fn infer_sentiment(text: &str) -> Sentiment {
    let norm = normalize_text(&text.replace('\u{2019}', "'"));
    let has = |phrases: &[&str]| phrases.iter().any(|p| contains_phrase(&norm, p));
    if has(UNCERTAIN_PHRASES) {
        Sentiment::Uncertain
    } else if has(NEGATIVE_PHRASES) {
        Sentiment::Negative
    } else if has(POSITIVE_PHRASES) {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    }
}
