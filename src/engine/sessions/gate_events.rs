// ── Gate events: SessionStore DB layer ──────────────────────────────────────
//
// Append-only log. The single permitted UPDATE writes the operator correction
// and is guarded by `actual_response_type IS NULL`, so concurrent submissions
// race safely: the first one wins and the rest see `AlreadyCorrected`.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{bad_enum, fmt_ts, parse_opt_ts, parse_ts, SessionStore};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::gate_types::{ContradictionSeverity, GateEvent, ResponseType};
use crate::atoms::types::SessionId;

const EVENT_COLUMNS: &str = "seq, event_id, session_id, query_text, predicted_response_type,
    actual_response_type, intent_alignment, memory_alignment, grounding_score,
    contradiction_severity, gates_passed, timestamp, corrected_at";

/// One labelled training example taken from a corrected event.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedExample {
    pub seq: i64,
    pub query_text: String,
    pub actual: ResponseType,
}

impl GateEvent {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let predicted: String = row.get(4)?;
        let actual: Option<String> = row.get(5)?;
        let severity: String = row.get(9)?;
        let timestamp: String = row.get(11)?;
        Ok(GateEvent {
            seq: row.get(0)?,
            event_id: row.get(1)?,
            session_id: SessionId::new(row.get::<_, String>(2)?),
            query_text: row.get(3)?,
            predicted_response_type: ResponseType::parse(&predicted).ok_or_else(|| bad_enum(4, &predicted))?,
            actual_response_type: match actual {
                Some(a) => Some(ResponseType::parse(&a).ok_or_else(|| bad_enum(5, &a))?),
                None => None,
            },
            intent_alignment: row.get(6)?,
            memory_alignment: row.get(7)?,
            grounding_score: row.get(8)?,
            contradiction_severity: ContradictionSeverity::parse(&severity)
                .ok_or_else(|| bad_enum(9, &severity))?,
            gates_passed: row.get(10)?,
            timestamp: parse_ts(&timestamp)?,
            corrected_at: parse_opt_ts(row.get(12)?)?,
        })
    }
}

impl SessionStore {
    /// Append an event. Returns its sequence number.
    pub(crate) fn append_gate_event(&self, ev: &GateEvent) -> EngineResult<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO gate_events (
                event_id, session_id, query_text, predicted_response_type, actual_response_type,
                intent_alignment, memory_alignment, grounding_score, contradiction_severity,
                gates_passed, timestamp, corrected_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                ev.event_id,
                ev.session_id.as_str(),
                ev.query_text,
                ev.predicted_response_type.as_str(),
                ev.actual_response_type.map(|t| t.as_str()),
                ev.intent_alignment,
                ev.memory_alignment,
                ev.grounding_score,
                ev.contradiction_severity.as_str(),
                ev.gates_passed,
                fmt_ts(&ev.timestamp),
                ev.corrected_at.as_ref().map(fmt_ts),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_gate_event(&self, event_id: &str) -> EngineResult<GateEvent> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM gate_events WHERE event_id = ?1"),
            params![event_id],
            GateEvent::from_row,
        )
        .optional()?
        .ok_or_else(|| EngineError::not_found("gate event", event_id))
    }

    pub fn list_gate_events(&self, session: &SessionId) -> EngineResult<Vec<GateEvent>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM gate_events WHERE session_id = ?1 ORDER BY seq"
        ))?;
        let rows = stmt.query_map(params![session.as_str()], GateEvent::from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Write the correction once. A second write is `AlreadyCorrected`.
    pub(crate) fn set_gate_event_correction(
        &self,
        event_id: &str,
        actual: ResponseType,
        at: DateTime<Utc>,
    ) -> EngineResult<GateEvent> {
        let changed = {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE gate_events SET actual_response_type = ?2, corrected_at = ?3
                 WHERE event_id = ?1 AND actual_response_type IS NULL",
                params![event_id, actual.as_str(), fmt_ts(&at)],
            )?
        };
        if changed == 0 {
            // Either unknown or already corrected; get_gate_event tells which.
            self.get_gate_event(event_id)?;
            return Err(EngineError::AlreadyCorrected(event_id.to_string()));
        }
        self.get_gate_event(event_id)
    }

    /// Consistent snapshot of every corrected event, in append order.
    pub(crate) fn corrected_examples(&self) -> EngineResult<Vec<CorrectedExample>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT seq, query_text, actual_response_type FROM gate_events
             WHERE actual_response_type IS NOT NULL ORDER BY seq",
        )?;
        let rows = stmt.query_map([], |row| {
            let actual: String = row.get(2)?;
            Ok(CorrectedExample {
                seq: row.get(0)?,
                query_text: row.get(1)?,
                actual: ResponseType::parse(&actual).ok_or_else(|| bad_enum(2, &actual))?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Corrected events appended after `seq`.
    pub(crate) fn count_corrections_after(&self, seq: i64) -> EngineResult<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM gate_events WHERE actual_response_type IS NOT NULL AND seq > ?1",
            params![seq],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    /// (total events, corrected events) across all sessions.
    pub fn gate_event_counts(&self) -> EngineResult<(usize, usize)> {
        let conn = self.conn.lock();
        let (total, corrected): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(actual_response_type) FROM gate_events",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok((total as usize, corrected as usize))
    }
}
