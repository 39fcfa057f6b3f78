// ── Memory records: SessionStore DB layer ───────────────────────────────────
//
// Low-level CRUD for `memories`. Ranking and trust live in engine/memory; this
// file only moves rows. Records are never deleted (a trigger enforces it) and
// the only UPDATE is reinforcement.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::vectors::{decode_vector, encode_vector};
use super::{bad_enum, fmt_ts, parse_ts, SessionStore};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{
    Lane, MemoryRecord, MemorySource, Sentiment, SessionId, SlotFact, SlotKind, Topic,
};

const MEMORY_COLUMNS: &str = "seq, id, session_id, text, vector, lane, trust_initial, confidence,
    slot_kind, slot_value, slot_negated, topic, sentiment, source, created_at,
    last_reinforced_at, reinforcement_count";

impl MemoryRecord {
    /// Map a row selected with MEMORY_COLUMNS → MemoryRecord.
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let lane: String = row.get(5)?;
        let slot_kind: Option<String> = row.get(8)?;
        let slot_value: Option<String> = row.get(9)?;
        let slot_negated: bool = row.get(10)?;
        let topic: Option<String> = row.get(11)?;
        let sentiment: String = row.get(12)?;
        let source: String = row.get(13)?;
        let created_at: String = row.get(14)?;
        let reinforced_at: String = row.get(15)?;
        let blob: Vec<u8> = row.get(4)?;

        let slot = match (slot_kind, slot_value) {
            (Some(k), Some(v)) => Some(SlotFact {
                kind: SlotKind::parse(&k).ok_or_else(|| bad_enum(8, &k))?,
                value: v,
                negated: slot_negated,
            }),
            _ => None,
        };

        Ok(MemoryRecord {
            seq: row.get(0)?,
            id: row.get(1)?,
            session_id: SessionId::new(row.get::<_, String>(2)?),
            text: row.get(3)?,
            vector: decode_vector(4, &blob)?,
            lane: Lane::parse(&lane).ok_or_else(|| bad_enum(5, &lane))?,
            trust_initial: row.get(6)?,
            confidence: row.get(7)?,
            slot,
            topic: match topic {
                Some(t) => Some(Topic::parse(&t).ok_or_else(|| bad_enum(11, &t))?),
                None => None,
            },
            sentiment: Sentiment::parse(&sentiment).ok_or_else(|| bad_enum(12, &sentiment))?,
            source: MemorySource::parse(&source).ok_or_else(|| bad_enum(13, &source))?,
            created_at: parse_ts(&created_at)?,
            last_reinforced_at: parse_ts(&reinforced_at)?,
            reinforcement_count: row.get(16)?,
        })
    }
}

impl SessionStore {
    /// Insert a new record. Returns the assigned insertion sequence.
    pub(crate) fn insert_memory(&self, rec: &MemoryRecord, normalized_text: &str) -> EngineResult<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO memories (
                id, session_id, text, normalized_text, vector, lane, trust_initial, confidence,
                slot_kind, slot_value, slot_negated, topic, sentiment, source,
                created_at, last_reinforced_at, reinforcement_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                rec.id,
                rec.session_id.as_str(),
                rec.text,
                normalized_text,
                encode_vector(&rec.vector),
                rec.lane.as_str(),
                rec.trust_initial,
                rec.confidence,
                rec.slot.as_ref().map(|s| s.kind.as_str()),
                rec.slot.as_ref().map(|s| s.value.as_str()),
                rec.slot.as_ref().map(|s| s.negated).unwrap_or(false),
                rec.topic.map(|t| t.as_str()),
                rec.sentiment.as_str(),
                rec.source.as_str(),
                fmt_ts(&rec.created_at),
                fmt_ts(&rec.last_reinforced_at),
                rec.reinforcement_count,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Fetch a record owned by `session`. A record that exists under another
    /// session is a `CrossSession` error, not a miss.
    pub fn get_memory(&self, session: &SessionId, id: &str) -> EngineResult<MemoryRecord> {
        let conn = self.conn.lock();
        let rec = conn
            .query_row(
                &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"),
                params![id],
                MemoryRecord::from_row,
            )
            .optional()?;
        match rec {
            Some(r) if &r.session_id == session => Ok(r),
            Some(_) => Err(EngineError::cross_session("memory", id)),
            None => Err(EngineError::not_found("memory", id)),
        }
    }

    /// All records of a session, oldest first.
    pub fn list_memories(&self, session: &SessionId) -> EngineResult<Vec<MemoryRecord>> {
        self.query_memories(
            &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE session_id = ?1 ORDER BY seq"),
            params![session.as_str()],
        )
    }

    pub fn list_memories_by_slot(&self, session: &SessionId, kind: SlotKind) -> EngineResult<Vec<MemoryRecord>> {
        self.query_memories(
            &format!(
                "SELECT {MEMORY_COLUMNS} FROM memories
                 WHERE session_id = ?1 AND slot_kind = ?2 ORDER BY seq"
            ),
            params![session.as_str(), kind.as_str()],
        )
    }

    pub fn list_memories_by_topic(&self, session: &SessionId, topic: Topic) -> EngineResult<Vec<MemoryRecord>> {
        self.query_memories(
            &format!(
                "SELECT {MEMORY_COLUMNS} FROM memories
                 WHERE session_id = ?1 AND topic = ?2 ORDER BY seq"
            ),
            params![session.as_str(), topic.as_str()],
        )
    }

    /// Latest record in the session making exactly this slot claim.
    pub(crate) fn find_slot_claim(&self, session: &SessionId, fact: &SlotFact) -> EngineResult<Option<MemoryRecord>> {
        let conn = self.conn.lock();
        let rec = conn
            .query_row(
                &format!(
                    "SELECT {MEMORY_COLUMNS} FROM memories
                     WHERE session_id = ?1 AND slot_kind = ?2 AND slot_value = ?3 AND slot_negated = ?4
                     ORDER BY seq DESC LIMIT 1"
                ),
                params![session.as_str(), fact.kind.as_str(), fact.value, fact.negated],
                MemoryRecord::from_row,
            )
            .optional()?;
        Ok(rec)
    }

    /// Latest slot-less record in the session with the same normalized text.
    pub(crate) fn find_by_normalized_text(&self, session: &SessionId, normalized: &str) -> EngineResult<Option<MemoryRecord>> {
        let conn = self.conn.lock();
        let rec = conn
            .query_row(
                &format!(
                    "SELECT {MEMORY_COLUMNS} FROM memories
                     WHERE session_id = ?1 AND slot_kind IS NULL AND normalized_text = ?2
                     ORDER BY seq DESC LIMIT 1"
                ),
                params![session.as_str(), normalized],
                MemoryRecord::from_row,
            )
            .optional()?;
        Ok(rec)
    }

    /// Reinforcement: the only mutation a record ever sees.
    pub(crate) fn reinforce_memory(&self, session: &SessionId, id: &str, at: DateTime<Utc>) -> EngineResult<MemoryRecord> {
        {
            let conn = self.conn.lock();
            let changed = conn.execute(
                "UPDATE memories
                 SET last_reinforced_at = ?3, reinforcement_count = reinforcement_count + 1
                 WHERE id = ?1 AND session_id = ?2",
                params![id, session.as_str(), fmt_ts(&at)],
            )?;
            if changed == 0 {
                drop(conn);
                // Distinguish a foreign record from a missing one.
                return self.get_memory(session, id).and_then(|_| Err(EngineError::not_found("memory", id)));
            }
        }
        self.get_memory(session, id)
    }

    /// (belief, speech) record counts for a session.
    pub fn memory_lane_counts(&self, session: &SessionId) -> EngineResult<(usize, usize)> {
        let conn = self.conn.lock();
        let (belief, speech): (i64, i64) = conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN lane = 'belief' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN lane = 'speech' THEN 1 ELSE 0 END), 0)
             FROM memories WHERE session_id = ?1",
            params![session.as_str()],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok((belief as usize, speech as usize))
    }

    fn query_memories(&self, sql: &str, p: impl rusqlite::Params) -> EngineResult<Vec<MemoryRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(p, MemoryRecord::from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, session: &str, slot: Option<SlotFact>) -> MemoryRecord {
        let now = Utc::now();
        MemoryRecord {
            id: id.into(),
            session_id: SessionId::new(session),
            text: format!("text {id}"),
            vector: vec![1.0, 0.0, 0.5],
            lane: Lane::Belief,
            trust_initial: 0.9,
            confidence: 1.0,
            topic: slot.as_ref().map(|s| s.kind.topic()),
            slot,
            sentiment: Sentiment::Neutral,
            source: MemorySource::User,
            created_at: now,
            last_reinforced_at: now,
            reinforcement_count: 0,
            seq: 0,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let store = SessionStore::open_in_memory().unwrap();
        let s = SessionId::new("s1");
        let rec = record("m1", "s1", Some(SlotFact::affirmed(SlotKind::Employer, "acme")));
        let seq = store.insert_memory(&rec, "text m1").unwrap();
        assert!(seq > 0);

        let got = store.get_memory(&s, "m1").unwrap();
        assert_eq!(got.text, "text m1");
        assert_eq!(got.vector, vec![1.0, 0.0, 0.5]);
        assert_eq!(got.slot, rec.slot);
        assert_eq!(got.topic, Some(Topic::Work));
        assert_eq!(got.seq, seq);
    }

    #[test]
    fn cross_session_get_is_rejected() {
        let store = SessionStore::open_in_memory().unwrap();
        store.insert_memory(&record("m1", "alice", None), "t").unwrap();

        let err = store.get_memory(&SessionId::new("bob"), "m1").unwrap_err();
        assert!(matches!(err, EngineError::CrossSession { .. }));

        let err = store.get_memory(&SessionId::new("bob"), "missing").unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn cross_session_reinforce_is_rejected() {
        let store = SessionStore::open_in_memory().unwrap();
        store.insert_memory(&record("m1", "alice", None), "t").unwrap();
        let err = store
            .reinforce_memory(&SessionId::new("bob"), "m1", Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::CrossSession { .. }));
    }

    #[test]
    fn reinforce_bumps_count_and_timestamp() {
        let store = SessionStore::open_in_memory().unwrap();
        let s = SessionId::new("s1");
        let rec = record("m1", "s1", None);
        store.insert_memory(&rec, "t").unwrap();

        let later = rec.last_reinforced_at + chrono::Duration::days(3);
        let got = store.reinforce_memory(&s, "m1", later).unwrap();
        assert_eq!(got.reinforcement_count, 1);
        assert_eq!(got.last_reinforced_at.timestamp_micros(), later.timestamp_micros());
        assert_eq!(got.created_at.timestamp_micros(), rec.created_at.timestamp_micros());
    }

    #[test]
    fn slot_claim_lookup_respects_polarity() {
        let store = SessionStore::open_in_memory().unwrap();
        let s = SessionId::new("s1");
        store
            .insert_memory(&record("m1", "s1", Some(SlotFact::affirmed(SlotKind::Employer, "acme"))), "a")
            .unwrap();

        assert!(store
            .find_slot_claim(&s, &SlotFact::affirmed(SlotKind::Employer, "acme"))
            .unwrap()
            .is_some());
        assert!(store
            .find_slot_claim(&s, &SlotFact::denied(SlotKind::Employer, "acme"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn memories_cannot_be_deleted() {
        let store = SessionStore::open_in_memory().unwrap();
        store.insert_memory(&record("m1", "s1", None), "t").unwrap();
        let conn = store.conn.lock();
        assert!(conn.execute("DELETE FROM memories", []).is_err());
    }

    #[test]
    fn lane_counts() {
        let store = SessionStore::open_in_memory().unwrap();
        let mut speech = record("m2", "s1", None);
        speech.lane = Lane::Speech;
        store.insert_memory(&record("m1", "s1", None), "a").unwrap();
        store.insert_memory(&speech, "b").unwrap();
        store.insert_memory(&record("m3", "other", None), "c").unwrap();
        assert_eq!(store.memory_lane_counts(&SessionId::new("s1")).unwrap(), (1, 1));
    }
}
