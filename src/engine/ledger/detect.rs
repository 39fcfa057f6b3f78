// ── Contradiction tiers ─────────────────────────────────────────────────────
//
// Pure scoring for candidate pairs. Tiers run in order, first match wins:
//   1. explicit correction / negation marker  → value conflict @ 0.95
//   2. entity or number mismatch               → value conflict @ min(0.89, 0.4 + 0.6·d)
//   3. opposing sentiment on the same topic    → sentiment conflict @ 0.6 (0.5 if only uncertain)

use crate::atoms::constants::{
    EXPLICIT_CORRECTION_CONFIDENCE, MISMATCH_CONFIDENCE_BASE, MISMATCH_CONFIDENCE_CAP,
};
use crate::atoms::types::{Sentiment, SlotKind};
use crate::engine::config::LedgerConfig;
use crate::engine::text::normalized_edit_distance;

/// Distance in [0, 1] between two normalized values of a slot: relative
/// delta for numbers, normalized Levenshtein for text.
pub(crate) fn value_distance(kind: SlotKind, old: &str, new: &str) -> f64 {
    if kind.is_numeric() {
        if let (Ok(a), Ok(b)) = (old.trim().parse::<f64>(), new.trim().parse::<f64>()) {
            let scale = a.abs().max(b.abs());
            if scale == 0.0 {
                return 0.0;
            }
            return ((a - b).abs() / scale).min(1.0);
        }
    }
    normalized_edit_distance(old, new)
}

/// Confidence that two affirmed values of the same slot conflict.
/// `None` for equal values.
pub(crate) fn value_conflict_confidence(
    kind: SlotKind,
    old: &str,
    new: &str,
    explicit_correction: bool,
) -> Option<f64> {
    if old == new {
        return None;
    }
    if explicit_correction {
        return Some(EXPLICIT_CORRECTION_CONFIDENCE);
    }
    let d = value_distance(kind, old, new);
    let raw = MISMATCH_CONFIDENCE_BASE + (1.0 - MISMATCH_CONFIDENCE_BASE) * d;
    Some(raw.min(MISMATCH_CONFIDENCE_CAP))
}

/// Confidence that two statements on one topic pull in opposite directions.
pub(crate) fn sentiment_conflict_confidence(
    old: Sentiment,
    new: Sentiment,
    cfg: &LedgerConfig,
) -> Option<f64> {
    if !old.opposes(new) {
        return None;
    }
    if old == Sentiment::Uncertain || new == Sentiment::Uncertain {
        Some(cfg.sentiment_uncertain_confidence)
    } else {
        Some(cfg.sentiment_confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_correction_is_tier_one() {
        let c = value_conflict_confidence(SlotKind::Employer, "acme", "globex", true);
        assert_eq!(c, Some(EXPLICIT_CORRECTION_CONFIDENCE));
    }

    #[test]
    fn mismatch_confidence_is_capped_below_tier_one() {
        let c = value_conflict_confidence(SlotKind::Employer, "acme", "globex", false).unwrap();
        assert!((c - MISMATCH_CONFIDENCE_CAP).abs() < 1e-9);
        let typo = value_conflict_confidence(SlotKind::Employer, "globex", "globx", false).unwrap();
        assert!(typo < c);
        assert!(typo >= 0.4);
    }

    #[test]
    fn equal_values_never_conflict() {
        assert_eq!(value_conflict_confidence(SlotKind::Name, "sam", "sam", true), None);
    }

    #[test]
    fn numeric_slots_use_relative_delta() {
        assert!((value_distance(SlotKind::Age, "30", "60") - 0.5).abs() < 1e-9);
        assert!(value_distance(SlotKind::Age, "34", "35") < 0.05);
        // Unparseable numbers fall back to text distance.
        assert!(value_distance(SlotKind::Age, "thirty", "30") > 0.5);
    }

    #[test]
    fn sentiment_tiers() {
        let cfg = LedgerConfig::default();
        assert_eq!(
            sentiment_conflict_confidence(Sentiment::Positive, Sentiment::Negative, &cfg),
            Some(cfg.sentiment_confidence)
        );
        assert_eq!(
            sentiment_conflict_confidence(Sentiment::Positive, Sentiment::Uncertain, &cfg),
            Some(cfg.sentiment_uncertain_confidence)
        );
        assert_eq!(sentiment_conflict_confidence(Sentiment::Negative, Sentiment::Uncertain, &cfg), None);
        assert_eq!(sentiment_conflict_confidence(Sentiment::Neutral, Sentiment::Positive, &cfg), None);
    }
}
