// trustmem Engine — Configuration
//
// `EngineConfig` is the full set of tunables, grouped by component. Every
// section has `#[serde(default)]`, so a TOML file only needs the keys it
// overrides:
//
//   [gate.factual]
//   grounding = 0.45
//
//   [learning]
//   retrain_min_corrections = 80
//
// Values that must survive restarts but change at runtime (classifier
// precedence) are persisted separately in the `engine_config` table — see
// `sessions::config`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::atoms::constants::*;
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::gate_types::{Precedence, ResponseType};
use crate::atoms::types::{Lane, MemorySource};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub trust: TrustConfig,
    pub retrieval: RetrievalConfig,
    pub ledger: LedgerConfig,
    pub gate: GateThresholds,
    pub classifier: ClassifierConfig,
    pub learning: LearningConfig,
    pub scheduler: SchedulerConfig,
}

impl EngineConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(s: &str) -> EngineResult<Self> {
        let cfg: EngineConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a TOML file on disk.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Reject settings that would break an invariant (negative half-lives,
    /// probabilities outside [0, 1], a zero top-k…).
    pub fn validate(&self) -> EngineResult<()> {
        let t = &self.trust;
        if t.belief_half_life_days <= 0.0 || t.speech_half_life_days <= 0.0 {
            return Err(EngineError::Config("trust half-lives must be positive".into()));
        }
        if t.belief_half_life_days < t.speech_half_life_days {
            return Err(EngineError::Config(
                "BELIEF must decay slower than SPEECH (belief_half_life_days < speech_half_life_days)"
                    .into(),
            ));
        }
        for (name, v) in [
            ("trust.user", t.initial_user),
            ("trust.system", t.initial_system),
            ("trust.inferred", t.initial_inferred),
            ("trust.speech_cap", t.speech_cap),
            ("retrieval.min_similarity", self.retrieval.min_similarity),
            ("retrieval.recency_floor", self.retrieval.recency_floor),
            ("ledger.confidence_floor", self.ledger.confidence_floor),
            ("ledger.sentiment_confidence", self.ledger.sentiment_confidence),
            ("classifier.min_model_confidence", self.classifier.min_model_confidence),
            ("learning.accuracy_target", self.learning.accuracy_target),
            ("gate.min_citation_coverage", self.gate.min_citation_coverage),
        ] {
            check_unit(name, v)?;
        }
        for rt in ResponseType::ALL {
            let row = self.gate.row(rt);
            check_unit("gate.intent", row.intent)?;
            check_unit("gate.memory", row.memory)?;
            check_unit("gate.grounding", row.grounding)?;
        }
        if self.retrieval.top_k == 0 || self.retrieval.synthesis_multiplier == 0 {
            return Err(EngineError::Config("retrieval.top_k and synthesis_multiplier must be >= 1".into()));
        }
        if self.learning.held_out_percent == 0 || self.learning.held_out_percent >= 100 {
            return Err(EngineError::Config("learning.held_out_percent must be in 1..100".into()));
        }
        Ok(())
    }
}

fn check_unit(name: &str, v: f64) -> EngineResult<()> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(EngineError::Config(format!("{name} must be within [0, 1], got {v}")))
    }
}

// ── Trust ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrustConfig {
    pub belief_half_life_days: f64,
    pub speech_half_life_days: f64,
    pub initial_user: f64,
    pub initial_system: f64,
    pub initial_inferred: f64,
    pub speech_cap: f64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            belief_half_life_days: BELIEF_HALF_LIFE_DAYS,
            speech_half_life_days: SPEECH_HALF_LIFE_DAYS,
            initial_user: TRUST_INITIAL_USER,
            initial_system: TRUST_INITIAL_SYSTEM,
            initial_inferred: TRUST_INITIAL_INFERRED,
            speech_cap: SPEECH_TRUST_CAP,
        }
    }
}

impl TrustConfig {
    pub fn half_life_days(&self, lane: Lane) -> f64 {
        match lane {
            Lane::Belief => self.belief_half_life_days,
            Lane::Speech => self.speech_half_life_days,
        }
    }

    /// Decay rate λ (per day) for a lane.
    pub fn lambda(&self, lane: Lane) -> f64 {
        std::f64::consts::LN_2 / self.half_life_days(lane)
    }

    pub fn initial_trust(&self, source: MemorySource, lane: Lane) -> f64 {
        let base = match source {
            MemorySource::User => self.initial_user,
            MemorySource::System => self.initial_system,
            MemorySource::Inferred => self.initial_inferred,
        };
        match lane {
            Lane::Belief => base,
            Lane::Speech => base.min(self.speech_cap),
        }
    }
}

// ── Retrieval ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub synthesis_multiplier: usize,
    pub min_similarity: f64,
    pub recency_half_life_days: f64,
    pub recency_floor: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            synthesis_multiplier: SYNTHESIS_K_MULTIPLIER,
            min_similarity: MIN_SIMILARITY,
            recency_half_life_days: RECENCY_HALF_LIFE_DAYS,
            recency_floor: RECENCY_FLOOR,
        }
    }
}

// ── Ledger ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    pub confidence_floor: f64,
    pub sentiment_confidence: f64,
    pub sentiment_uncertain_confidence: f64,
    pub denied_trust_factor: f64,
    pub superseded_trust_factor: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            confidence_floor: LEDGER_CONFIDENCE_FLOOR,
            sentiment_confidence: SENTIMENT_CONFIDENCE,
            sentiment_uncertain_confidence: SENTIMENT_UNCERTAIN_CONFIDENCE,
            denied_trust_factor: DENIED_TRUST_FACTOR,
            superseded_trust_factor: SUPERSEDED_TRUST_FACTOR,
        }
    }
}

// ── Gate ───────────────────────────────────────────────────────────────────

/// One row of the threshold table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ThresholdRow {
    pub intent: f64,
    pub memory: f64,
    pub grounding: f64,
}

/// Response-type-dependent thresholds. Question-form inputs score lower on
/// raw vector alignment than declarative ones, so a single global cutoff
/// rejects legitimate queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateThresholds {
    pub factual: ThresholdRow,
    pub explanatory: ThresholdRow,
    pub conversational: ThresholdRow,
    /// Synthesis answers are gated on this instead of memory alignment.
    pub min_citation_coverage: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            factual: ThresholdRow { intent: 0.35, memory: 0.35, grounding: 0.40 },
            explanatory: ThresholdRow { intent: 0.40, memory: 0.25, grounding: 0.25 },
            conversational: ThresholdRow { intent: 0.30, memory: 0.20, grounding: 0.00 },
            min_citation_coverage: MIN_CITATION_COVERAGE,
        }
    }
}

impl GateThresholds {
    pub fn row(&self, response_type: ResponseType) -> ThresholdRow {
        match response_type {
            ResponseType::Factual => self.factual,
            ResponseType::Explanatory => self.explanatory,
            ResponseType::Conversational => self.conversational,
        }
    }
}

// ── Classifier ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Initial stage order. A value persisted in `engine_config` wins.
    pub precedence: Precedence,
    /// Model predictions below this posterior fall through to the next stage.
    pub min_model_confidence: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            precedence: Precedence::RulesFirst,
            min_model_confidence: MIN_MODEL_CONFIDENCE,
        }
    }
}

// ── Learning ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LearningConfig {
    pub retrain_min_corrections: usize,
    pub accuracy_target: f64,
    pub held_out_percent: u8,
    /// Flip to `ModelFirst` once this many corrections exist… (None disables)
    pub flip_precedence_at: Option<usize>,
    /// …and the freshly trained model reaches this held-out accuracy.
    pub flip_min_accuracy: f64,
    /// Store gate-passed answers on the SPEECH lane (source = system).
    pub store_confirmed_answers: bool,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            retrain_min_corrections: RETRAIN_MIN_CORRECTIONS,
            accuracy_target: ACCURACY_TARGET,
            held_out_percent: HELD_OUT_PERCENT,
            flip_precedence_at: Some(FLIP_PRECEDENCE_AT),
            flip_min_accuracy: FLIP_MIN_ACCURACY,
            store_confirmed_answers: false,
        }
    }
}

// ── Scheduler ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_ms: u64,
    /// Request-path quiet time before background work may run.
    pub idle_after_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: SCHEDULER_TICK_MS,
            idle_after_ms: SCHEDULER_IDLE_AFTER_MS,
        }
    }
}
