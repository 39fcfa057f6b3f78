// trustmem Engine — Memory Store
//
// Trust-weighted storage and retrieval of user facts on two lanes:
//   BELIEF — durable, high-trust (half-life in months)
//   SPEECH — provisional, decays within days
//
// Records are append-only. Restating a fact reinforces the existing record
// (clock reset + counter bump) instead of inserting a duplicate. Retrieval is
// read-only: it never touches trust.
//
// Module layout:
//   trust.rs — decay and recency math
//   slots.rs — SlotExtractor (slot / topic / sentiment / correction markers)
//   mod.rs   — MemoryStore: insert, retrieve, reinforce, listings

pub mod slots;
pub mod trust;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::atoms::error::EngineResult;
use crate::atoms::types::{
    Lane, MemoryRecord, MemorySource, Sentiment, SessionId, SlotFact, SlotKind, Topic,
};
use crate::engine::config::{RetrievalConfig, TrustConfig};
use crate::engine::sessions::{cosine_similarity, SessionStore};
use crate::engine::text::normalize_text;

pub use slots::{Extraction, SlotExtractor};

// ── Inputs & outputs ───────────────────────────────────────────────────────

/// A statement to store. `trust_initial` is derived from `source` and `lane`.
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub text: String,
    pub vector: Vec<f32>,
    pub lane: Lane,
    pub slot: Option<SlotFact>,
    pub topic: Option<Topic>,
    pub sentiment: Sentiment,
    pub source: MemorySource,
    pub confidence: f64,
}

impl NewMemory {
    pub fn new(text: impl Into<String>, vector: Vec<f32>, lane: Lane, source: MemorySource) -> Self {
        Self {
            text: text.into(),
            vector,
            lane,
            slot: None,
            topic: None,
            sentiment: Sentiment::Neutral,
            source,
            confidence: 1.0,
        }
    }

    /// Attach what the extractor read from the text.
    pub fn with_extraction(mut self, ex: &Extraction) -> Self {
        self.slot = ex.slot.clone();
        self.topic = ex.topic;
        self.sentiment = ex.sentiment;
        self
    }

    pub fn with_slot(mut self, slot: SlotFact) -> Self {
        self.topic = Some(slot.kind.topic());
        self.slot = Some(slot);
        self
    }
}

#[derive(Debug, Clone)]
pub struct InsertOutcome {
    pub record: MemoryRecord,
    /// `true` when an existing record making the same claim was reinforced.
    pub reinforced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    #[default]
    Single,
    /// Aggregation query: k is widened by the synthesis multiplier.
    Synthesis,
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalQuery {
    pub vector: Vec<f32>,
    /// `None` uses the configured default.
    pub k: Option<usize>,
    pub slot_filter: Option<SlotKind>,
    pub mode: RetrievalMode,
    /// Per-record trust multipliers from the ledger (denied, superseded).
    pub trust_factors: HashMap<String, f64>,
}

impl RetrievalQuery {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector, ..Default::default() }
    }
}

/// One ranked hit with the components of its score.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub record: MemoryRecord,
    pub similarity: f64,
    /// Decayed trust × ledger factor.
    pub effective_trust: f64,
    pub recency: f64,
    pub score: f64,
}

/// Result of a retrieval. Empty is a valid answer, not an error.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub hits: Vec<ScoredMemory>,
}

impl Retrieval {
    pub fn is_insufficient(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn texts(&self) -> Vec<String> {
        self.hits.iter().map(|h| h.record.text.clone()).collect()
    }

    pub fn records(&self) -> Vec<MemoryRecord> {
        self.hits.iter().map(|h| h.record.clone()).collect()
    }
}

// ── Store ──────────────────────────────────────────────────────────────────

pub struct MemoryStore {
    db: Arc<SessionStore>,
    trust: TrustConfig,
    retrieval: RetrievalConfig,
}

impl MemoryStore {
    pub fn new(db: Arc<SessionStore>, trust: TrustConfig, retrieval: RetrievalConfig) -> Self {
        Self { db, trust, retrieval }
    }

    pub fn insert(&self, session: &SessionId, new: NewMemory) -> EngineResult<InsertOutcome> {
        self.insert_at(session, new, Utc::now())
    }

    /// Insert, or reinforce the record that already makes this claim.
    /// With a slot, "same claim" is same kind + normalized value + polarity;
    /// without one, it is the same normalized text.
    pub fn insert_at(&self, session: &SessionId, new: NewMemory, now: DateTime<Utc>) -> EngineResult<InsertOutcome> {
        let normalized = normalize_text(&new.text);

        let existing = match &new.slot {
            Some(fact) => self.db.find_slot_claim(session, fact)?,
            None => self.db.find_by_normalized_text(session, &normalized)?,
        };
        if let Some(rec) = existing {
            let record = self.db.reinforce_memory(session, &rec.id, now)?;
            info!(
                "[trustmem:store] Reinforced {} ({}) count={}",
                record.id,
                record.slot_value_label().unwrap_or_else(|| "no slot".into()),
                record.reinforcement_count
            );
            return Ok(InsertOutcome { record, reinforced: true });
        }

        let mut record = MemoryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.clone(),
            text: new.text,
            vector: new.vector,
            lane: new.lane,
            trust_initial: self.trust.initial_trust(new.source, new.lane),
            confidence: new.confidence.clamp(0.0, 1.0),
            topic: new.topic.or_else(|| new.slot.as_ref().map(|s| s.kind.topic())),
            slot: new.slot,
            sentiment: new.sentiment,
            source: new.source,
            created_at: now,
            last_reinforced_at: now,
            reinforcement_count: 0,
            seq: 0,
        };
        record.seq = self.db.insert_memory(&record, &normalized)?;
        info!(
            "[trustmem:store] Stored {} lane={} source={} slot={:?}",
            record.id,
            record.lane.as_str(),
            record.source.as_str(),
            record.slot_value_label()
        );
        Ok(InsertOutcome { record, reinforced: false })
    }

    pub fn retrieve(&self, session: &SessionId, query: &RetrievalQuery) -> EngineResult<Retrieval> {
        self.retrieve_at(session, query, Utc::now())
    }

    /// Rank the session's records by `similarity × effective_trust × recency`.
    /// Ties go to the more recently reinforced record, then the later insert.
    pub fn retrieve_at(&self, session: &SessionId, query: &RetrievalQuery, now: DateTime<Utc>) -> EngineResult<Retrieval> {
        let candidates = match query.slot_filter {
            Some(kind) => self.db.list_memories_by_slot(session, kind)?,
            None => self.db.list_memories(session)?,
        };

        let mut hits: Vec<ScoredMemory> = candidates
            .into_iter()
            .filter_map(|record| {
                let similarity = cosine_similarity(&query.vector, &record.vector);
                if similarity < self.retrieval.min_similarity {
                    return None;
                }
                let factor = query.trust_factors.get(&record.id).copied().unwrap_or(1.0);
                let effective_trust = trust::current_trust(&record, now, &self.trust) * factor;
                let recency = trust::recency_weight(&record, now, &self.retrieval);
                Some(ScoredMemory {
                    score: similarity * effective_trust * recency,
                    record,
                    similarity,
                    effective_trust,
                    recency,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.record.last_reinforced_at.cmp(&a.record.last_reinforced_at))
                .then_with(|| b.record.seq.cmp(&a.record.seq))
        });
        hits.truncate(self.effective_k(query));

        debug!(
            "[trustmem:store] Retrieved {} hits for session {} (mode={:?})",
            hits.len(),
            session,
            query.mode
        );
        Ok(Retrieval { hits })
    }

    fn effective_k(&self, query: &RetrievalQuery) -> usize {
        let k = query.k.unwrap_or(self.retrieval.top_k).max(1);
        match query.mode {
            RetrievalMode::Single => k,
            RetrievalMode::Synthesis => k * self.retrieval.synthesis_multiplier,
        }
    }

    pub fn get(&self, session: &SessionId, id: &str) -> EngineResult<MemoryRecord> {
        self.db.get_memory(session, id)
    }

    pub fn reinforce(&self, session: &SessionId, id: &str) -> EngineResult<MemoryRecord> {
        self.db.reinforce_memory(session, id, Utc::now())
    }

    pub fn list_slot(&self, session: &SessionId, kind: SlotKind) -> EngineResult<Vec<MemoryRecord>> {
        self.db.list_memories_by_slot(session, kind)
    }

    pub fn list_topic(&self, session: &SessionId, topic: Topic) -> EngineResult<Vec<MemoryRecord>> {
        self.db.list_memories_by_topic(session, topic)
    }

    pub fn list_all(&self, session: &SessionId) -> EngineResult<Vec<MemoryRecord>> {
        self.db.list_memories(session)
    }

    /// Decayed trust of `record` at `now` (before any ledger factor).
    pub fn current_trust(&self, record: &MemoryRecord, now: DateTime<Utc>) -> f64 {
        trust::current_trust(record, now, &self.trust)
    }
}
