// ── trustmem Atoms: Constants ───────────────────────────────────────────────
// Default values for every tunable. `engine::config::EngineConfig` starts from
// these; nothing else should hard-code the numbers.

// ── Trust decay ────────────────────────────────────────────────────────────
// trust = trust_initial · exp(-λ·Δt), λ = ln2 / half_life.
pub(crate) const BELIEF_HALF_LIFE_DAYS: f64 = 180.0;
pub(crate) const SPEECH_HALF_LIFE_DAYS: f64 = 7.0;

// Initial trust by source. SPEECH records are capped regardless of source.
pub(crate) const TRUST_INITIAL_USER: f64 = 0.90;
pub(crate) const TRUST_INITIAL_SYSTEM: f64 = 0.75;
pub(crate) const TRUST_INITIAL_INFERRED: f64 = 0.55;
pub(crate) const SPEECH_TRUST_CAP: f64 = 0.60;

// ── Retrieval ──────────────────────────────────────────────────────────────
pub(crate) const DEFAULT_TOP_K: usize = 5;
pub(crate) const SYNTHESIS_K_MULTIPLIER: usize = 3;
pub(crate) const MIN_SIMILARITY: f64 = 0.20;
pub(crate) const RECENCY_HALF_LIFE_DAYS: f64 = 30.0;
pub(crate) const RECENCY_FLOOR: f64 = 0.5;

// ── Ledger ─────────────────────────────────────────────────────────────────
pub(crate) const LEDGER_CONFIDENCE_FLOOR: f64 = 0.50;
pub(crate) const EXPLICIT_CORRECTION_CONFIDENCE: f64 = 0.95;
pub(crate) const DENIAL_CONFIDENCE: f64 = 0.90;
/// Tier-2 confidence never reaches tier-1 territory.
pub(crate) const MISMATCH_CONFIDENCE_CAP: f64 = 0.89;
pub(crate) const MISMATCH_CONFIDENCE_BASE: f64 = 0.40;
pub(crate) const SENTIMENT_CONFIDENCE: f64 = 0.60;
pub(crate) const SENTIMENT_UNCERTAIN_CONFIDENCE: f64 = 0.50;
/// Trust multiplier for a record while a denial is in force.
pub(crate) const DENIED_TRUST_FACTOR: f64 = 0.15;
/// Trust multiplier for the older side of an open value conflict.
pub(crate) const SUPERSEDED_TRUST_FACTOR: f64 = 0.60;

// ── Gate ───────────────────────────────────────────────────────────────────
/// Answers with at most this many content words count as "short".
pub(crate) const SHORT_ANSWER_WORDS: usize = 8;
/// Score for a short answer found verbatim in memory.
pub(crate) const VERBATIM_GROUNDING_SCORE: f64 = 0.95;
/// How many top-ranked records feed the content-word grounding measure.
pub(crate) const GROUNDING_TOP_RECORDS: usize = 3;
/// Share of a record's content words that counts as citing it.
pub(crate) const CITATION_WORD_SHARE: f64 = 0.60;
pub(crate) const MIN_CITATION_COVERAGE: f64 = 0.50;

// ── Classifier ─────────────────────────────────────────────────────────────
pub(crate) const MIN_MODEL_CONFIDENCE: f64 = 0.55;
pub(crate) const NB_LAPLACE_ALPHA: f64 = 1.0;

// ── Active learning ────────────────────────────────────────────────────────
pub(crate) const RETRAIN_MIN_CORRECTIONS: usize = 50;
pub(crate) const ACCURACY_TARGET: f64 = 0.80;
pub(crate) const HELD_OUT_PERCENT: u8 = 20;
pub(crate) const FLIP_PRECEDENCE_AT: usize = 300;
pub(crate) const FLIP_MIN_ACCURACY: f64 = 0.85;

// ── Scheduler ──────────────────────────────────────────────────────────────
pub(crate) const SCHEDULER_TICK_MS: u64 = 30_000;
pub(crate) const SCHEDULER_IDLE_AFTER_MS: u64 = 60_000;

// ── engine_config keys ─────────────────────────────────────────────────────
// Stable identifiers; renaming one orphans the persisted value.
pub(crate) const CONFIG_KEY_PRECEDENCE: &str = "classifier.precedence";
