// ── trustmem Atoms: Memory & Ledger Types ───────────────────────────────────
// Plain data types for the memory store and the contradiction ledger.
// Atoms layer rule: no I/O, no side effects, no imports from engine/.
//
// Every enum that is persisted has an `as_str()` / `parse()` pair. The string
// forms are the column values in SQLite and must stay stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 1: Sessions
// ═══════════════════════════════════════════════════════════════════════════

/// Identifier of the conversation/thread that owns a set of memories.
/// All store and ledger operations are scoped by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 2: Memory Records
// ═══════════════════════════════════════════════════════════════════════════

/// BELIEF is durable and high-trust; SPEECH is provisional and decays fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Belief,
    Speech,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Belief => "belief",
            Lane::Speech => "speech",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "belief" => Some(Lane::Belief),
            "speech" => Some(Lane::Speech),
            _ => None,
        }
    }
}

/// Who asserted a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    /// Stated by the user.
    User,
    /// Confirmed synthesis produced by the system.
    System,
    /// Inferred from context, never stated outright.
    Inferred,
}

impl MemorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemorySource::User => "user",
            MemorySource::System => "system",
            MemorySource::Inferred => "inferred",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MemorySource::User),
            "system" => Some(MemorySource::System),
            "inferred" => Some(MemorySource::Inferred),
            _ => None,
        }
    }
}

/// Closed set of fact slots. Extend by adding a variant (and its patterns in
/// `engine::memory::slots`), never by ad hoc string checks at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Name,
    Employer,
    JobTitle,
    Location,
    Age,
    FavoriteColor,
    PetName,
    Partner,
    School,
}

impl SlotKind {
    pub const ALL: [SlotKind; 9] = [
        SlotKind::Name,
        SlotKind::Employer,
        SlotKind::JobTitle,
        SlotKind::Location,
        SlotKind::Age,
        SlotKind::FavoriteColor,
        SlotKind::PetName,
        SlotKind::Partner,
        SlotKind::School,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Name => "name",
            SlotKind::Employer => "employer",
            SlotKind::JobTitle => "job_title",
            SlotKind::Location => "location",
            SlotKind::Age => "age",
            SlotKind::FavoriteColor => "favorite_color",
            SlotKind::PetName => "pet_name",
            SlotKind::Partner => "partner",
            SlotKind::School => "school",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// The broader subject this slot is about. Sentiment statements carry no
    /// slot value, so they are matched against records by topic.
    pub fn topic(&self) -> Topic {
        match self {
            SlotKind::Name | SlotKind::Age => Topic::Identity,
            SlotKind::Employer | SlotKind::JobTitle => Topic::Work,
            SlotKind::Location => Topic::Home,
            SlotKind::FavoriteColor => Topic::Preferences,
            SlotKind::PetName | SlotKind::Partner => Topic::Relationships,
            SlotKind::School => Topic::Education,
        }
    }

    /// Values that compare numerically (tier-2 numeric delta).
    pub fn is_numeric(&self) -> bool {
        matches!(self, SlotKind::Age)
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse subject of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Identity,
    Work,
    Home,
    Preferences,
    Relationships,
    Education,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Identity => "identity",
            Topic::Work => "work",
            Topic::Home => "home",
            Topic::Preferences => "preferences",
            Topic::Relationships => "relationships",
            Topic::Education => "education",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "identity" => Some(Topic::Identity),
            "work" => Some(Topic::Work),
            "home" => Some(Topic::Home),
            "preferences" => Some(Topic::Preferences),
            "relationships" => Some(Topic::Relationships),
            "education" => Some(Topic::Education),
            _ => None,
        }
    }
}

/// A slot value extracted from a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotFact {
    pub kind: SlotKind,
    /// Normalized value (lowercase, punctuation and corporate suffixes stripped).
    pub value: String,
    /// `true` when the statement denies the value ("I don't work at Acme").
    #[serde(default)]
    pub negated: bool,
}

impl SlotFact {
    pub fn affirmed(kind: SlotKind, value: impl Into<String>) -> Self {
        Self { kind, value: value.into(), negated: false }
    }

    pub fn denied(kind: SlotKind, value: impl Into<String>) -> Self {
        Self { kind, value: value.into(), negated: true }
    }

    /// Same kind, same value, same polarity.
    pub fn same_claim(&self, other: &SlotFact) -> bool {
        self.kind == other.kind && self.value == other.value && self.negated == other.negated
    }
}

/// Affective polarity of a statement about its topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    /// Doubt or wavering ("not sure I want to stay").
    Uncertain,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Uncertain => "uncertain",
            Sentiment::Neutral => "neutral",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "uncertain" => Some(Sentiment::Uncertain),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }

    /// Negative and uncertain both oppose a positive state.
    pub fn opposes(&self, other: Sentiment) -> bool {
        matches!(
            (self, other),
            (Sentiment::Positive, Sentiment::Negative | Sentiment::Uncertain)
                | (Sentiment::Negative | Sentiment::Uncertain, Sentiment::Positive)
        )
    }
}

/// A stored, trust-scored statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub session_id: SessionId,
    pub text: String,
    pub vector: Vec<f32>,
    pub lane: Lane,
    /// Trust at the last reinforcement; current trust decays from here.
    pub trust_initial: f64,
    pub confidence: f64,
    pub slot: Option<SlotFact>,
    pub topic: Option<Topic>,
    #[serde(default)]
    pub sentiment: Sentiment,
    pub source: MemorySource,
    pub created_at: DateTime<Utc>,
    pub last_reinforced_at: DateTime<Utc>,
    #[serde(default)]
    pub reinforcement_count: u32,
    /// Monotonic insertion sequence; final tie-break in ranking.
    #[serde(default)]
    pub seq: i64,
}

impl MemoryRecord {
    /// Display value of the slot, if any ("acme", "not acme").
    pub fn slot_value_label(&self) -> Option<String> {
        self.slot.as_ref().map(|s| {
            if s.negated {
                format!("not {}", s.value)
            } else {
                s.value.clone()
            }
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 3: Contradiction Ledger
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionType {
    ValueConflict,
    SentimentConflict,
    Denial,
    RetractionOfDenial,
}

impl ContradictionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContradictionType::ValueConflict => "value_conflict",
            ContradictionType::SentimentConflict => "sentiment_conflict",
            ContradictionType::Denial => "denial",
            ContradictionType::RetractionOfDenial => "retraction_of_denial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "value_conflict" => Some(ContradictionType::ValueConflict),
            "sentiment_conflict" => Some(ContradictionType::SentimentConflict),
            "denial" => Some(ContradictionType::Denial),
            "retraction_of_denial" => Some(ContradictionType::RetractionOfDenial),
            _ => None,
        }
    }
}

impl fmt::Display for ContradictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Open,
    Resolved,
    Dismissed,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Open => "open",
            LedgerStatus::Resolved => "resolved",
            LedgerStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(LedgerStatus::Open),
            "resolved" => Some(LedgerStatus::Resolved),
            "dismissed" => Some(LedgerStatus::Dismissed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LedgerStatus::Open)
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected conflict between two records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub ledger_id: String,
    pub session_id: SessionId,
    /// Slot kind name, or `topic:<topic>` for sentiment conflicts without a slot.
    pub slot: String,
    pub old_memory_id: String,
    pub new_memory_id: String,
    pub old_value: String,
    pub new_value: String,
    pub contradiction_type: ContradictionType,
    pub confidence: f64,
    pub status: LedgerStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_method: Option<String>,
    pub chosen_value: Option<String>,
    pub audit_note: Option<String>,
}

impl LedgerEntry {
    pub fn is_open(&self) -> bool {
        self.status == LedgerStatus::Open
    }
}
