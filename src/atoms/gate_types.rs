// ── trustmem Atoms: Gate & Classifier Types ─────────────────────────────────
//
// Pure data for the response-type classifier, the gradient gate and the
// active-learning event log. No logic beyond string forms and small helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::SessionId;

// ═══════════════════════════════════════════════════════════════════════════
// Response Types
// ═══════════════════════════════════════════════════════════════════════════

/// What kind of answer a query calls for. Selects the gate threshold row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Factual,
    Explanatory,
    Conversational,
}

impl ResponseType {
    pub const ALL: [ResponseType; 3] = [
        ResponseType::Factual,
        ResponseType::Explanatory,
        ResponseType::Conversational,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Factual => "factual",
            ResponseType::Explanatory => "explanatory",
            ResponseType::Conversational => "conversational",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "factual" => Some(ResponseType::Factual),
            "explanatory" => Some(ResponseType::Explanatory),
            "conversational" => Some(ResponseType::Conversational),
            _ => None,
        }
    }

    /// Dense index, used by the learned model's count arrays.
    pub fn index(&self) -> usize {
        match self {
            ResponseType::Factual => 0,
            ResponseType::Explanatory => 1,
            ResponseType::Conversational => 2,
        }
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which classifier stage produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum PredictionSource {
    Rules,
    Model { version: i64 },
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub response_type: ResponseType,
    pub source: PredictionSource,
    /// 1.0 for rules and the default; posterior probability for the model.
    pub confidence: f64,
}

/// Order in which the classifier stages are consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    #[default]
    RulesFirst,
    ModelFirst,
}

impl Precedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Precedence::RulesFirst => "rules_first",
            Precedence::ModelFirst => "model_first",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rules_first" => Some(Precedence::RulesFirst),
            "model_first" => Some(Precedence::ModelFirst),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Gate
// ═══════════════════════════════════════════════════════════════════════════

/// How strongly the ledger objects to an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContradictionSeverity {
    #[default]
    None,
    /// Passage allowed; the consumer must attach a disclosure.
    Note,
    /// Fails the gate regardless of scores.
    Blocking,
}

impl ContradictionSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContradictionSeverity::None => "none",
            ContradictionSeverity::Note => "note",
            ContradictionSeverity::Blocking => "blocking",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(ContradictionSeverity::None),
            "note" => Some(ContradictionSeverity::Note),
            "blocking" => Some(ContradictionSeverity::Blocking),
            _ => None,
        }
    }
}

/// Why the gate decided the way it did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateReason {
    Passed,
    BlockingContradiction,
    IntentBelowThreshold { score: f64, threshold: f64 },
    MemoryBelowThreshold { score: f64, threshold: f64 },
    GroundingBelowThreshold { score: f64, threshold: f64 },
    CitationBelowThreshold { score: f64, threshold: f64 },
}

impl fmt::Display for GateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateReason::Passed => f.write_str("all gates passed"),
            GateReason::BlockingContradiction => f.write_str("blocking contradiction in memory"),
            GateReason::IntentBelowThreshold { score, threshold } => {
                write!(f, "intent alignment {score:.2} < {threshold:.2}")
            }
            GateReason::MemoryBelowThreshold { score, threshold } => {
                write!(f, "memory alignment {score:.2} < {threshold:.2}")
            }
            GateReason::GroundingBelowThreshold { score, threshold } => {
                write!(f, "grounding {score:.2} < {threshold:.2}")
            }
            GateReason::CitationBelowThreshold { score, threshold } => {
                write!(f, "citation coverage {score:.2} < {threshold:.2}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub passed: bool,
    pub reason: GateReason,
    /// Set for `Note` severity: the answer must carry a disclosure.
    pub requires_disclosure: bool,
}

// ═══════════════════════════════════════════════════════════════════════════
// Active Learning
// ═══════════════════════════════════════════════════════════════════════════

/// One gate evaluation, as logged for active learning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateEvent {
    pub event_id: String,
    /// Append order; assigned by the store.
    #[serde(default)]
    pub seq: i64,
    pub session_id: SessionId,
    pub query_text: String,
    pub predicted_response_type: ResponseType,
    /// Operator correction. Set exactly once.
    pub actual_response_type: Option<ResponseType>,
    pub intent_alignment: f64,
    pub memory_alignment: f64,
    pub grounding_score: f64,
    pub contradiction_severity: ContradictionSeverity,
    pub gates_passed: bool,
    pub timestamp: DateTime<Utc>,
    pub corrected_at: Option<DateTime<Utc>>,
}

/// Metadata of a trained classifier version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierModelInfo {
    pub version: i64,
    pub trained_at: DateTime<Utc>,
    pub training_example_count: usize,
    pub held_out_accuracy: f64,
    /// Highest gate-event sequence number included in training.
    pub trained_through_seq: i64,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_type_index_round_trip() {
        for rt in ResponseType::ALL {
            assert_eq!(ResponseType::from_index(rt.index()), Some(rt));
            assert_eq!(ResponseType::parse(rt.as_str()), Some(rt));
        }
        assert_eq!(ResponseType::from_index(3), None);
    }

    #[test]
    fn severity_orders_by_strength() {
        assert!(ContradictionSeverity::Blocking > ContradictionSeverity::Note);
        assert!(ContradictionSeverity::Note > ContradictionSeverity::None);
    }

    #[test]
    fn gate_reason_display() {
        let r = GateReason::GroundingBelowThreshold { score: 0.1, threshold: 0.4 };
        assert_eq!(r.to_string(), "grounding 0.10 < 0.40");
    }
}
