// trustmem Engine — Contradiction Ledger
//
// Records every detected conflict between two memories instead of letting the
// newer statement silently overwrite the older one. Entries are append-only:
// the status only moves open → resolved or open → dismissed, and after that
// only the audit note may change.
//
// The ledger never edits memory records. It influences ranking through
// `trust_factors` (a multiplier per record id) and answers through
// `severity_for` (none / note / blocking, plus a disclosure text).
//
// Module layout:
//   detect.rs — tier scoring for candidate pairs
//   mod.rs    — ContradictionLedger: check, retraction, transitions, read side

pub(crate) mod detect;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::atoms::constants::{DENIAL_CONFIDENCE, EXPLICIT_CORRECTION_CONFIDENCE};
use crate::atoms::error::EngineResult;
use crate::atoms::gate_types::ContradictionSeverity;
use crate::atoms::types::{
    ContradictionType, LedgerEntry, LedgerStatus, MemoryRecord, Sentiment, SessionId, SlotKind, Topic,
};
use crate::engine::config::LedgerConfig;
use crate::engine::memory::SlotExtractor;
use crate::engine::sessions::SessionStore;
use crate::engine::text::{contains_phrase, normalize_text, tokens};

/// Resolution method recorded when a user reaffirms a value they had denied.
pub const RETRACTED: &str = "retracted";

const NEGATION_WORDS: &[&str] = &["not", "don't", "doesn't", "isn't", "aren't", "no", "never", "longer"];

/// Ledger key for a topic-level (sentiment) entry.
pub fn topic_key(topic: Topic) -> String {
    format!("topic:{}", topic.as_str())
}

/// What the ledger says about an answer built from some records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeverityReport {
    pub severity: ContradictionSeverity,
    /// Human-readable summary of the open conflicts involved.
    pub disclosure: Option<String>,
    /// Ids of the open entries that were relevant.
    pub entry_ids: Vec<String>,
}

pub struct ContradictionLedger {
    db: Arc<SessionStore>,
    cfg: LedgerConfig,
}

impl ContradictionLedger {
    pub fn new(db: Arc<SessionStore>, cfg: LedgerConfig) -> Self {
        Self { db, cfg }
    }

    // ── Detection ──────────────────────────────────────────────────────────

    pub fn check(&self, record: &MemoryRecord) -> EngineResult<Vec<LedgerEntry>> {
        self.check_at(record, Utc::now())
    }

    /// Compare a freshly inserted record with the session's other records in
    /// the same slot (and, for sentiment, the same topic). Returns the
    /// entries it created; an identical restatement never reaches here
    /// because the store reinforces instead of inserting.
    pub fn check_at(&self, record: &MemoryRecord, now: DateTime<Utc>) -> EngineResult<Vec<LedgerEntry>> {
        let session = &record.session_id;
        let mut created = Vec::new();

        if let Some(fact) = &record.slot {
            let others: Vec<MemoryRecord> = self
                .db
                .list_memories_by_slot(session, fact.kind)?
                .into_iter()
                .filter(|o| o.id != record.id)
                .collect();

            if fact.negated {
                for affirmed in others.iter().filter(|o| is_affirmed_value(o, &fact.value)) {
                    if let Some(e) = self.open_denial_if_absent(affirmed, record, now)? {
                        created.push(e);
                    }
                }
            } else {
                let explicit = SlotExtractor::new().extract(&record.text).is_correction;
                for old in latest_per_value(&others, &fact.value) {
                    let Some(old_fact) = &old.slot else { continue };
                    let Some(confidence) =
                        detect::value_conflict_confidence(fact.kind, &old_fact.value, &fact.value, explicit)
                    else {
                        continue;
                    };
                    if confidence < self.cfg.confidence_floor {
                        debug!(
                            "[trustmem:ledger] {} vs {} below floor ({:.2})",
                            old_fact.value, fact.value, confidence
                        );
                        continue;
                    }
                    let entry = self.new_entry(
                        record,
                        fact.kind.as_str().to_string(),
                        old,
                        old_fact.value.clone(),
                        fact.value.clone(),
                        ContradictionType::ValueConflict,
                        confidence,
                        now,
                    );
                    created.push(self.append(entry)?);
                }
            }
        }

        if let (Some(topic), true) = (record.topic, record.sentiment != Sentiment::Neutral) {
            let opposing = self
                .db
                .list_memories_by_topic(session, topic)?
                .into_iter()
                .filter(|o| o.id != record.id && o.sentiment.opposes(record.sentiment))
                .max_by_key(|o| o.seq);
            if let Some(old) = opposing {
                if let Some(confidence) =
                    detect::sentiment_conflict_confidence(old.sentiment, record.sentiment, &self.cfg)
                {
                    if confidence >= self.cfg.confidence_floor {
                        let entry = self.new_entry(
                            record,
                            topic_key(topic),
                            &old,
                            old.sentiment.as_str().to_string(),
                            record.sentiment.as_str().to_string(),
                            ContradictionType::SentimentConflict,
                            confidence,
                            now,
                        );
                        created.push(self.append(entry)?);
                    }
                }
            }
        }

        Ok(created)
    }

    pub fn check_reinforcement(&self, record: &MemoryRecord) -> EngineResult<Vec<LedgerEntry>> {
        self.check_reinforcement_at(record, Utc::now())
    }

    /// A restated claim was reinforced rather than inserted.
    ///   • affirmed value under an open denial → the denial is resolved as
    ///     `retracted` and one `RetractionOfDenial` entry is appended
    ///   • restated denial → re-opens a denial if none is in force
    pub fn check_reinforcement_at(&self, record: &MemoryRecord, now: DateTime<Utc>) -> EngineResult<Vec<LedgerEntry>> {
        let Some(fact) = &record.slot else {
            return Ok(Vec::new());
        };
        let session = &record.session_id;
        let mut touched = Vec::new();

        if fact.negated {
            for affirmed in self
                .db
                .list_memories_by_slot(session, fact.kind)?
                .iter()
                .filter(|o| is_affirmed_value(o, &fact.value))
            {
                if let Some(e) = self.open_denial_if_absent(affirmed, record, now)? {
                    touched.push(e);
                }
            }
            return Ok(touched);
        }

        let denials: Vec<LedgerEntry> = self
            .db
            .list_open_ledger_entries(session)?
            .into_iter()
            .filter(|e| e.contradiction_type == ContradictionType::Denial && e.old_memory_id == record.id)
            .collect();

        for denial in denials {
            let closed = self.db.close_ledger_entry(
                session,
                &denial.ledger_id,
                LedgerStatus::Resolved,
                now,
                Some(RETRACTED),
                Some(&fact.value),
            )?;
            let retraction = LedgerEntry {
                ledger_id: uuid::Uuid::new_v4().to_string(),
                session_id: session.clone(),
                slot: denial.slot.clone(),
                old_memory_id: denial.new_memory_id.clone(),
                new_memory_id: record.id.clone(),
                old_value: denial.new_value.clone(),
                new_value: fact.value.clone(),
                contradiction_type: ContradictionType::RetractionOfDenial,
                confidence: EXPLICIT_CORRECTION_CONFIDENCE,
                status: LedgerStatus::Resolved,
                created_at: now,
                resolved_at: Some(now),
                resolution_method: Some(RETRACTED.to_string()),
                chosen_value: Some(fact.value.clone()),
                audit_note: None,
            };
            self.db.insert_ledger_entry(&retraction)?;
            info!(
                "[trustmem:ledger] Denial {} retracted; {} = {} restored",
                closed.ledger_id, closed.slot, fact.value
            );
            touched.push(closed);
            touched.push(retraction);
        }
        Ok(touched)
    }

    fn open_denial_if_absent(
        &self,
        affirmed: &MemoryRecord,
        denial: &MemoryRecord,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<LedgerEntry>> {
        let in_force = self.db.list_open_ledger_entries(&denial.session_id)?.into_iter().any(|e| {
            e.contradiction_type == ContradictionType::Denial && e.old_memory_id == affirmed.id
        });
        if in_force {
            return Ok(None);
        }
        let Some(fact) = &affirmed.slot else {
            return Ok(None);
        };
        let entry = self.new_entry(
            denial,
            fact.kind.as_str().to_string(),
            affirmed,
            fact.value.clone(),
            format!("not {}", fact.value),
            ContradictionType::Denial,
            DENIAL_CONFIDENCE,
            now,
        );
        Ok(Some(self.append(entry)?))
    }

    #[allow(clippy::too_many_arguments)]
    fn new_entry(
        &self,
        new: &MemoryRecord,
        slot: String,
        old: &MemoryRecord,
        old_value: String,
        new_value: String,
        contradiction_type: ContradictionType,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> LedgerEntry {
        LedgerEntry {
            ledger_id: uuid::Uuid::new_v4().to_string(),
            session_id: new.session_id.clone(),
            slot,
            old_memory_id: old.id.clone(),
            new_memory_id: new.id.clone(),
            old_value,
            new_value,
            contradiction_type,
            confidence,
            status: LedgerStatus::Open,
            created_at: now,
            resolved_at: None,
            resolution_method: None,
            chosen_value: None,
            audit_note: None,
        }
    }

    fn append(&self, entry: LedgerEntry) -> EngineResult<LedgerEntry> {
        self.db.insert_ledger_entry(&entry)?;
        info!(
            "[trustmem:ledger] Opened {} {} on {}: {} -> {} (conf={:.2})",
            entry.contradiction_type, entry.ledger_id, entry.slot, entry.old_value, entry.new_value, entry.confidence
        );
        Ok(entry)
    }

    // ── Transitions ────────────────────────────────────────────────────────

    pub fn resolve(
        &self,
        session: &SessionId,
        ledger_id: &str,
        chosen_value: Option<&str>,
        method: &str,
    ) -> EngineResult<LedgerEntry> {
        let entry = self.db.close_ledger_entry(
            session,
            ledger_id,
            LedgerStatus::Resolved,
            Utc::now(),
            Some(method),
            chosen_value,
        )?;
        info!("[trustmem:ledger] Resolved {} via {} (chosen={:?})", ledger_id, method, chosen_value);
        Ok(entry)
    }

    /// Close without a verdict. Trust is unaffected.
    pub fn dismiss(&self, session: &SessionId, ledger_id: &str) -> EngineResult<LedgerEntry> {
        let entry = self
            .db
            .close_ledger_entry(session, ledger_id, LedgerStatus::Dismissed, Utc::now(), None, None)?;
        info!("[trustmem:ledger] Dismissed {}", ledger_id);
        Ok(entry)
    }

    pub fn annotate(&self, session: &SessionId, ledger_id: &str, note: &str) -> EngineResult<LedgerEntry> {
        self.db.set_ledger_audit_note(session, ledger_id, note)
    }

    // ── Read side ──────────────────────────────────────────────────────────

    pub fn get(&self, session: &SessionId, ledger_id: &str) -> EngineResult<LedgerEntry> {
        self.db.get_ledger_entry(session, ledger_id)
    }

    pub fn entries(&self, session: &SessionId) -> EngineResult<Vec<LedgerEntry>> {
        self.db.list_ledger_entries(session)
    }

    pub fn entries_for_slot(&self, session: &SessionId, slot: &str) -> EngineResult<Vec<LedgerEntry>> {
        self.db.list_ledger_entries_for_slot(session, slot)
    }

    pub fn open_entries(&self, session: &SessionId) -> EngineResult<Vec<LedgerEntry>> {
        self.db.list_open_ledger_entries(session)
    }

    /// The value the user currently holds for a slot: the most recently
    /// reinforced affirmed value that is neither under an open denial nor the
    /// losing side of a resolved conflict.
    pub fn effective_value(&self, session: &SessionId, kind: SlotKind) -> EngineResult<Option<String>> {
        let entries = self.db.list_ledger_entries_for_slot(session, kind.as_str())?;
        let denied: HashSet<&str> = entries
            .iter()
            .filter(|e| e.is_open() && e.contradiction_type == ContradictionType::Denial)
            .map(|e| e.old_memory_id.as_str())
            .collect();

        let records = self.db.list_memories_by_slot(session, kind)?;
        let best = records
            .iter()
            .filter(|r| r.slot.as_ref().is_some_and(|s| !s.negated))
            .filter(|r| !denied.contains(r.id.as_str()))
            .filter(|r| !lost_resolution(r, &entries))
            .max_by(|a, b| recency_order(a, b));
        Ok(best.and_then(|r| r.slot.as_ref().map(|s| s.value.clone())))
    }

    /// Per-record trust multipliers for retrieval:
    ///   • record under an open denial            → denied factor
    ///   • older side of an open value conflict    → superseded factor
    ///   • losing side of a resolved value conflict → superseded factor
    pub fn trust_factors(&self, session: &SessionId) -> EngineResult<HashMap<String, f64>> {
        let mut factors: HashMap<String, f64> = HashMap::new();
        let mut demote = |id: &str, f: f64| {
            let slot = factors.entry(id.to_string()).or_insert(1.0);
            *slot = slot.min(f);
        };

        for e in self.db.list_ledger_entries(session)? {
            match (e.contradiction_type, e.status) {
                (ContradictionType::Denial, LedgerStatus::Open) => {
                    demote(&e.old_memory_id, self.cfg.denied_trust_factor);
                }
                (ContradictionType::ValueConflict, LedgerStatus::Open) => {
                    let old = self.db.get_memory(session, &e.old_memory_id)?;
                    let new = self.db.get_memory(session, &e.new_memory_id)?;
                    let older = match recency_order(&old, &new) {
                        Ordering::Greater => &new,
                        _ => &old,
                    };
                    demote(&older.id, self.cfg.superseded_trust_factor);
                }
                (ContradictionType::ValueConflict, LedgerStatus::Resolved) => {
                    let Some(chosen) = e.chosen_value.as_deref() else { continue };
                    for (id, value) in [(&e.old_memory_id, &e.old_value), (&e.new_memory_id, &e.new_value)] {
                        if value == chosen {
                            continue;
                        }
                        let rec = self.db.get_memory(session, id)?;
                        if e.resolved_at.is_some_and(|at| rec.last_reinforced_at <= at) {
                            demote(id, self.cfg.superseded_trust_factor);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(factors)
    }

    /// Severity of the open conflicts an answer touches.
    ///   blocking — the answer asserts a superseded value of an open value
    ///              conflict (without the current one), or affirms a value
    ///              under an open denial
    ///   note     — any other open entry on a touched slot, topic or record
    pub fn severity_for(
        &self,
        session: &SessionId,
        answer: &str,
        touched: &[MemoryRecord],
    ) -> EngineResult<SeverityReport> {
        let ids: HashSet<&str> = touched.iter().map(|r| r.id.as_str()).collect();
        let mut keys: HashSet<String> = HashSet::new();
        for r in touched {
            if let Some(s) = &r.slot {
                keys.insert(s.kind.as_str().to_string());
            }
            if let Some(t) = r.topic {
                keys.insert(topic_key(t));
            }
        }

        let relevant: Vec<LedgerEntry> = self
            .db
            .list_open_ledger_entries(session)?
            .into_iter()
            .filter(|e| {
                keys.contains(&e.slot)
                    || ids.contains(e.old_memory_id.as_str())
                    || ids.contains(e.new_memory_id.as_str())
            })
            .collect();
        if relevant.is_empty() {
            return Ok(SeverityReport::default());
        }

        let norm_answer = normalize_text(answer);
        let negated_answer = tokens(answer).iter().any(|t| NEGATION_WORDS.contains(&t.as_str()));
        let mentions = |value: &str| contains_phrase(&norm_answer, value);

        let mut severity = ContradictionSeverity::Note;
        let mut lines = Vec::new();
        for e in &relevant {
            match e.contradiction_type {
                ContradictionType::ValueConflict => {
                    let current = match SlotKind::parse(&e.slot) {
                        Some(kind) => self.effective_value(session, kind)?,
                        None => None,
                    };
                    if let Some(current) = &current {
                        let stale = [&e.old_value, &e.new_value]
                            .into_iter()
                            .any(|v| v != current && mentions(v.as_str()));
                        if stale && !mentions(current.as_str()) {
                            severity = ContradictionSeverity::Blocking;
                        }
                        lines.push(format!(
                            "You've told me both \"{}\" and \"{}\" for {}; going with the most recent, \"{}\".",
                            e.old_value, e.new_value, e.slot, current
                        ));
                    } else {
                        lines.push(format!(
                            "You've told me both \"{}\" and \"{}\" for {}.",
                            e.old_value, e.new_value, e.slot
                        ));
                    }
                }
                ContradictionType::Denial => {
                    if mentions(e.old_value.as_str()) && !negated_answer {
                        severity = ContradictionSeverity::Blocking;
                    }
                    lines.push(format!("You said {} is not \"{}\".", e.slot, e.old_value));
                }
                ContradictionType::SentimentConflict => {
                    let old = self.db.get_memory(session, &e.old_memory_id)?;
                    let new = self.db.get_memory(session, &e.new_memory_id)?;
                    let topic = e.slot.trim_start_matches("topic:");
                    lines.push(format!(
                        "You've expressed mixed feelings about {}: \"{}\" and \"{}\".",
                        topic, old.text, new.text
                    ));
                }
                ContradictionType::RetractionOfDenial => {}
            }
        }

        debug!(
            "[trustmem:ledger] Severity {} across {} open entries",
            severity.as_str(),
            relevant.len()
        );
        Ok(SeverityReport {
            severity,
            disclosure: (!lines.is_empty()).then(|| lines.join(" ")),
            entry_ids: relevant.into_iter().map(|e| e.ledger_id).collect(),
        })
    }
}

fn is_affirmed_value(record: &MemoryRecord, value: &str) -> bool {
    record.slot.as_ref().is_some_and(|s| !s.negated && s.value == value)
}

/// Most recently reinforced affirmed record per distinct value, excluding
/// `skip_value`, in insertion order.
fn latest_per_value<'a>(records: &'a [MemoryRecord], skip_value: &str) -> Vec<&'a MemoryRecord> {
    let mut latest: HashMap<&str, &MemoryRecord> = HashMap::new();
    for r in records {
        let Some(s) = &r.slot else { continue };
        if s.negated || s.value == skip_value {
            continue;
        }
        latest
            .entry(s.value.as_str())
            .and_modify(|cur| {
                if recency_order(r, cur) == Ordering::Greater {
                    *cur = r;
                }
            })
            .or_insert(r);
    }
    let mut out: Vec<&MemoryRecord> = latest.into_values().collect();
    out.sort_by_key(|r| r.seq);
    out
}

/// Order by last reinforcement, then insertion sequence.
fn recency_order(a: &MemoryRecord, b: &MemoryRecord) -> Ordering {
    a.last_reinforced_at
        .cmp(&b.last_reinforced_at)
        .then_with(|| a.seq.cmp(&b.seq))
}

/// `true` when a resolved value conflict chose another value and the record
/// has not been reaffirmed since.
fn lost_resolution(record: &MemoryRecord, entries: &[LedgerEntry]) -> bool {
    let Some(value) = record.slot.as_ref().map(|s| s.value.as_str()) else {
        return false;
    };
    entries.iter().any(|e| {
        e.contradiction_type == ContradictionType::ValueConflict
            && e.status == LedgerStatus::Resolved
            && (e.old_memory_id == record.id || e.new_memory_id == record.id)
            && e.chosen_value.as_deref().is_some_and(|c| c != value)
            && e.resolved_at.is_some_and(|at| record.last_reinforced_at <= at)
    })
}
