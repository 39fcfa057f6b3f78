// trustmem Engine — Turn Pipeline
//
// `Engine` wires the components together and routes each user turn:
//
//   greeting   → generator → gate (conversational row)
//   question   → classify → retrieve (ledger trust factors) → generator
//                → ledger severity → gate → event log
//   statement  → slot extraction → store (insert or reinforce) → ledger
//
// Collaborators (embedder, generator) are passed per turn and never stored.
// Training is not on this path; the coordinator's scheduler runs it when
// turns stop arriving.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::atoms::error::EngineResult;
use crate::atoms::gate_types::{
    ContradictionSeverity, GateDecision, GateEvent, GateReason, Precedence, Prediction, ResponseType,
};
use crate::atoms::traits::{Embedder, Generator};
use crate::atoms::types::{Lane, LedgerEntry, MemoryRecord, MemorySource, SessionId, SlotFact, SlotKind};
use crate::engine::classifier::{detect_synthesis, rules, Classifier, ModelSlot};
use crate::engine::config::EngineConfig;
use crate::engine::gate::{alignment, citation_coverage, grounding_score, GateEvaluator};
use crate::engine::learning::{ActiveLearningCoordinator, Scheduler, SchedulerHandle};
use crate::engine::ledger::ContradictionLedger;
use crate::engine::memory::{Extraction, MemoryStore, NewMemory, Retrieval, RetrievalMode, RetrievalQuery, SlotExtractor};
use crate::engine::sessions::SessionStore;
use crate::engine::text::normalize_text;

const ACK_STORED: &str = "Noted.";
const NOT_ENOUGH_INFO: &str = "I don't have enough information to answer that.";
const WITHHELD: &str = "I'm not confident enough in what I remember to answer that.";
const CONFLICTED: &str = "I have conflicting information about that, so I'd rather not guess.";

/// Leading words that make a turn a query rather than a statement.
const QUESTION_OPENERS: &[&str] = &[
    "what", "what's", "whats", "where", "where's", "who", "who's", "whom", "whose", "when", "why",
    "how", "which", "do", "does", "did", "is", "are", "am", "can", "could", "would", "will",
    "should", "tell", "list", "summarize", "summarise", "explain", "describe", "remind",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    /// A statement was stored or reinforced.
    Stored,
    /// A candidate answer passed the gate.
    Answered,
    /// The gate rejected the candidate.
    Withheld,
    /// Nothing relevant was retrieved and the candidate did not pass.
    Insufficient,
    /// The generator produced nothing. No event is logged.
    NoCandidate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReply {
    pub answer: String,
    pub kind: ReplyKind,
    /// BELIEF when the gate released the answer, SPEECH for hedged or
    /// withheld replies. Stored turns report the lane they were written to.
    pub lane: Lane,
    pub gates_passed: bool,
    pub ledger_entries_touched: Vec<String>,
    pub event_id: Option<String>,
    /// Must be shown alongside `answer` when present.
    pub disclosure: Option<String>,
    pub response_type: Option<ResponseType>,
    pub decision: Option<GateDecision>,
}

impl TurnReply {
    fn stored(entries: &[LedgerEntry]) -> Self {
        Self {
            answer: ACK_STORED.to_string(),
            kind: ReplyKind::Stored,
            lane: Lane::Belief,
            gates_passed: false,
            ledger_entries_touched: entries.iter().map(|e| e.ledger_id.clone()).collect(),
            event_id: None,
            disclosure: None,
            response_type: None,
            decision: None,
        }
    }

    fn no_candidate(response_type: ResponseType) -> Self {
        Self {
            answer: NOT_ENOUGH_INFO.to_string(),
            kind: ReplyKind::NoCandidate,
            lane: Lane::Speech,
            gates_passed: false,
            ledger_entries_touched: Vec::new(),
            event_id: None,
            disclosure: None,
            response_type: Some(response_type),
            decision: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub belief_records: usize,
    pub speech_records: usize,
    pub open_ledger_entries: usize,
    pub gate_events: usize,
    pub corrections: usize,
    pub active_model: Option<i64>,
    pub precedence: Precedence,
}

/// `true` for turns phrased as a query ("where do I work?", "list all my…").
pub fn is_question(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.ends_with('?') || detect_synthesis(trimmed) {
        return true;
    }
    normalize_text(trimmed)
        .split(' ')
        .next()
        .is_some_and(|w| QUESTION_OPENERS.contains(&w))
}

pub struct Engine {
    db: Arc<SessionStore>,
    config: EngineConfig,
    extractor: SlotExtractor,
    memory: MemoryStore,
    ledger: ContradictionLedger,
    classifier: Arc<Classifier>,
    gate: GateEvaluator,
    coordinator: Arc<ActiveLearningCoordinator>,
}

impl Engine {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Self::with_store(Arc::new(SessionStore::open(path)?), config)
    }

    pub fn in_memory(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Self::with_store(Arc::new(SessionStore::open_in_memory()?), config)
    }

    fn with_store(db: Arc<SessionStore>, config: EngineConfig) -> EngineResult<Self> {
        let classifier = Arc::new(Classifier::with_store(
            db.clone(),
            Arc::new(ModelSlot::new()),
            &config.classifier,
        )?);
        let scheduler = Arc::new(Scheduler::new(&config.scheduler));
        let coordinator = Arc::new(ActiveLearningCoordinator::new(
            db.clone(),
            classifier.clone(),
            scheduler,
            config.learning.clone(),
        ));
        let active = coordinator.load_active()?;
        info!(
            "[trustmem:engine] Ready (model={:?}, precedence={})",
            active,
            classifier.precedence().as_str()
        );
        Ok(Self {
            memory: MemoryStore::new(db.clone(), config.trust.clone(), config.retrieval.clone()),
            ledger: ContradictionLedger::new(db.clone(), config.ledger.clone()),
            gate: GateEvaluator::new(config.gate.clone()),
            extractor: SlotExtractor::new(),
            db,
            config,
            classifier,
            coordinator,
        })
    }

    /// Start the idle retrain loop on the current tokio runtime.
    pub fn start_scheduler(&self) -> EngineResult<SchedulerHandle> {
        self.coordinator.scheduler().spawn(self.coordinator.clone())
    }

    // ── Turns ──────────────────────────────────────────────────────────────

    pub fn handle_turn(
        &self,
        session: &SessionId,
        text: &str,
        embedder: &dyn Embedder,
        generator: &dyn Generator,
    ) -> EngineResult<TurnReply> {
        self.coordinator.scheduler().touch();
        let extraction = self.extractor.extract(text);
        let greeting =
            extraction.slot.is_none() && rules::rule_verdict(text) == Some(ResponseType::Conversational);

        if greeting {
            self.converse(session, text, embedder, generator)
        } else if is_question(text) {
            self.answer(session, text, embedder, generator)
        } else {
            self.remember(session, text, extraction, embedder)
        }
    }

    /// Store path: insert or reinforce, then let the ledger compare.
    fn remember(
        &self,
        session: &SessionId,
        text: &str,
        extraction: Extraction,
        embedder: &dyn Embedder,
    ) -> EngineResult<TurnReply> {
        let vector = embedder.embed(text)?;
        let mut new = NewMemory::new(text, vector, Lane::Belief, MemorySource::User).with_extraction(&extraction);
        if new.slot.is_none() {
            if let Some(slot) = self.resolve_bare_correction(session, &extraction)? {
                new = new.with_slot(slot);
            }
        }

        let outcome = self.memory.insert(session, new)?;
        let entries = if outcome.reinforced {
            self.ledger.check_reinforcement(&outcome.record)?
        } else {
            self.ledger.check(&outcome.record)?
        };
        Ok(TurnReply::stored(&entries))
    }

    /// "not Acme, it's Globex": find the slot that currently holds "acme".
    fn resolve_bare_correction(&self, session: &SessionId, ex: &Extraction) -> EngineResult<Option<SlotFact>> {
        let Some((old, new)) = &ex.bare_correction else {
            return Ok(None);
        };
        for kind in SlotKind::ALL {
            let holds_old = self
                .memory
                .list_slot(session, kind)?
                .iter()
                .any(|r| r.slot.as_ref().is_some_and(|s| !s.negated && &s.value == old));
            if holds_old {
                debug!("[trustmem:engine] Bare correction {} -> {} applies to {}", old, new, kind);
                return Ok(Some(SlotFact::affirmed(kind, new.clone())));
            }
        }
        Ok(None)
    }

    /// Greeting path: no retrieval; the conversational row applies and the
    /// query itself stands in for memory context.
    fn converse(
        &self,
        session: &SessionId,
        text: &str,
        embedder: &dyn Embedder,
        generator: &dyn Generator,
    ) -> EngineResult<TurnReply> {
        let response_type = ResponseType::Conversational;
        let Some(candidate) = candidate(generator.generate(text, &[])) else {
            return Ok(TurnReply::no_candidate(response_type));
        };
        let query_vec = embedder.embed(text)?;
        let answer_vec = embedder.embed(&candidate)?;
        let intent = alignment(&query_vec, &answer_vec);
        let decision = self.gate.evaluate(response_type, intent, intent, 0.0, ContradictionSeverity::None);
        let event = self.log_event(session, text, response_type, intent, intent, 0.0, ContradictionSeverity::None, &decision)?;

        Ok(TurnReply {
            answer: if decision.passed { candidate } else { WITHHELD.to_string() },
            kind: if decision.passed { ReplyKind::Answered } else { ReplyKind::Withheld },
            lane: reply_lane(&decision),
            gates_passed: decision.passed,
            ledger_entries_touched: Vec::new(),
            event_id: Some(event.event_id),
            disclosure: None,
            response_type: Some(response_type),
            decision: Some(decision),
        })
    }

    /// Query path.
    fn answer(
        &self,
        session: &SessionId,
        text: &str,
        embedder: &dyn Embedder,
        generator: &dyn Generator,
    ) -> EngineResult<TurnReply> {
        let prediction: Prediction = self.classifier.classify(text);
        let response_type = prediction.response_type;
        let synthesis = detect_synthesis(text);
        let query_vec = embedder.embed(text)?;

        let retrieval: Retrieval = self.memory.retrieve(
            session,
            &RetrievalQuery {
                vector: query_vec.clone(),
                mode: if synthesis { RetrievalMode::Synthesis } else { RetrievalMode::Single },
                trust_factors: self.ledger.trust_factors(session)?,
                ..Default::default()
            },
        )?;
        let records: Vec<MemoryRecord> = retrieval.records();
        debug!(
            "[trustmem:engine] {} via {:?} (synthesis={}) retrieved {}",
            response_type,
            prediction.source,
            synthesis,
            records.len()
        );

        let Some(candidate) = candidate(generator.generate(text, &retrieval.texts())) else {
            return Ok(TurnReply::no_candidate(response_type));
        };
        let answer_vec = embedder.embed(&candidate)?;
        let intent = alignment(&query_vec, &answer_vec);
        let memory_alignment = records
            .iter()
            .map(|r| alignment(&answer_vec, &r.vector))
            .fold(0.0, f64::max);
        let grounding = grounding_score(&candidate, &records);
        let report = self.ledger.severity_for(session, &candidate, &records)?;

        let decision = if synthesis {
            let coverage = citation_coverage(&candidate, &records);
            self.gate.evaluate_synthesis(response_type, intent, coverage, report.severity)
        } else {
            self.gate.evaluate(response_type, intent, memory_alignment, grounding, report.severity)
        };
        let event = self.log_event(
            session,
            text,
            response_type,
            intent,
            memory_alignment,
            grounding,
            report.severity,
            &decision,
        )?;

        if decision.passed && self.config.learning.store_confirmed_answers {
            self.store_confirmed_answer(session, &candidate, answer_vec)?;
        }

        let (answer, kind) = match (&decision.reason, decision.passed) {
            (_, true) => (candidate, ReplyKind::Answered),
            (GateReason::BlockingContradiction, false) => (CONFLICTED.to_string(), ReplyKind::Withheld),
            (_, false) if retrieval.is_insufficient() => (NOT_ENOUGH_INFO.to_string(), ReplyKind::Insufficient),
            (_, false) => (WITHHELD.to_string(), ReplyKind::Withheld),
        };
        let show_disclosure = decision.requires_disclosure
            || (decision.reason == GateReason::BlockingContradiction && report.disclosure.is_some());

        Ok(TurnReply {
            answer,
            kind,
            lane: reply_lane(&decision),
            gates_passed: decision.passed,
            ledger_entries_touched: report.entry_ids,
            event_id: Some(event.event_id),
            disclosure: if show_disclosure { report.disclosure } else { None },
            response_type: Some(response_type),
            decision: Some(decision),
        })
    }

    /// A released answer goes on the SPEECH lane as a system record. It
    /// carries topic and sentiment but never a slot, so it cannot reinforce
    /// or contradict the user's own facts.
    fn store_confirmed_answer(&self, session: &SessionId, answer: &str, vector: Vec<f32>) -> EngineResult<()> {
        let ex = self.extractor.extract(answer);
        let mut new = NewMemory::new(answer, vector, Lane::Speech, MemorySource::System);
        new.topic = ex.topic;
        new.sentiment = ex.sentiment;
        let outcome = self.memory.insert(session, new)?;
        if !outcome.reinforced {
            self.ledger.check(&outcome.record)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn log_event(
        &self,
        session: &SessionId,
        query: &str,
        response_type: ResponseType,
        intent: f64,
        memory: f64,
        grounding: f64,
        severity: ContradictionSeverity,
        decision: &GateDecision,
    ) -> EngineResult<GateEvent> {
        let mut event = GateEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            seq: 0,
            session_id: session.clone(),
            query_text: query.to_string(),
            predicted_response_type: response_type,
            actual_response_type: None,
            intent_alignment: intent,
            memory_alignment: memory,
            grounding_score: grounding,
            contradiction_severity: severity,
            gates_passed: decision.passed,
            timestamp: Utc::now(),
            corrected_at: None,
        };
        event.seq = self.coordinator.record(&event)?;
        Ok(event)
    }

    // ── Operator surface ───────────────────────────────────────────────────

    pub fn submit_correction(&self, event_id: &str, actual: ResponseType) -> EngineResult<GateEvent> {
        self.coordinator.submit_correction(event_id, actual)
    }

    pub fn stats(&self, session: &SessionId) -> EngineResult<EngineStats> {
        let (belief_records, speech_records) = self.db.memory_lane_counts(session)?;
        let (gate_events, corrections) = self.db.gate_event_counts()?;
        Ok(EngineStats {
            belief_records,
            speech_records,
            open_ledger_entries: self.db.count_open_ledger_entries(session)?,
            gate_events,
            corrections,
            active_model: self.coordinator.active_version(),
            precedence: self.classifier.precedence(),
        })
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn ledger(&self) -> &ContradictionLedger {
        &self.ledger
    }

    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }

    pub fn gate(&self) -> &GateEvaluator {
        &self.gate
    }

    pub fn coordinator(&self) -> &Arc<ActiveLearningCoordinator> {
        &self.coordinator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.db
    }
}

fn reply_lane(decision: &GateDecision) -> Lane {
    if decision.passed {
        Lane::Belief
    } else {
        Lane::Speech
    }
}

/// Blank generator output counts as no candidate.
fn candidate(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn questions_and_statements() {
        assert!(is_question("Where do I work?"));
        assert!(is_question("where do i work"));
        assert!(is_question("List everything you know about me"));
        assert!(is_question("tell me about my job"));
        assert!(!is_question("I work at Acme"));
        assert!(!is_question("Actually, I work at Globex now."));
    }

    #[test]
    fn blank_generator_output_is_no_candidate() {
        assert_eq!(candidate(None), None);
        assert_eq!(candidate(Some("   ".into())), None);
        assert_eq!(candidate(Some(" Globex ".into())), Some("Globex".to_string()));
    }

    #[test]
    fn invalid_config_is_rejected_at_open() {
        let mut cfg = EngineConfig::default();
        cfg.retrieval.top_k = 0;
        assert!(Engine::in_memory(cfg).is_err());
    }
}
