// ── Contradiction ledger: SessionStore DB layer ─────────────────────────────
//
// Rows are appended by the ledger engine and only ever move open → resolved or
// open → dismissed. The status checks here mirror the SQL trigger so callers
// get a typed `InvalidTransition` instead of a raw constraint failure.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{bad_enum, fmt_ts, parse_opt_ts, parse_ts, SessionStore};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{ContradictionType, LedgerEntry, LedgerStatus, SessionId};

const LEDGER_COLUMNS: &str = "ledger_id, session_id, slot, old_memory_id, new_memory_id,
    old_value, new_value, contradiction_type, confidence, status, created_at,
    resolved_at, resolution_method, chosen_value, audit_note";

impl LedgerEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let ctype: String = row.get(7)?;
        let status: String = row.get(9)?;
        let created_at: String = row.get(10)?;
        Ok(LedgerEntry {
            ledger_id: row.get(0)?,
            session_id: SessionId::new(row.get::<_, String>(1)?),
            slot: row.get(2)?,
            old_memory_id: row.get(3)?,
            new_memory_id: row.get(4)?,
            old_value: row.get(5)?,
            new_value: row.get(6)?,
            contradiction_type: ContradictionType::parse(&ctype).ok_or_else(|| bad_enum(7, &ctype))?,
            confidence: row.get(8)?,
            status: LedgerStatus::parse(&status).ok_or_else(|| bad_enum(9, &status))?,
            created_at: parse_ts(&created_at)?,
            resolved_at: parse_opt_ts(row.get(11)?)?,
            resolution_method: row.get(12)?,
            chosen_value: row.get(13)?,
            audit_note: row.get(14)?,
        })
    }
}

impl SessionStore {
    pub(crate) fn insert_ledger_entry(&self, e: &LedgerEntry) -> EngineResult<()> {
        let conn = self.conn.lock();
        let next_seq: i64 = conn.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM ledger", [], |r| r.get(0))?;
        conn.execute(
            "INSERT INTO ledger (
                ledger_id, seq, session_id, slot, old_memory_id, new_memory_id, old_value, new_value,
                contradiction_type, confidence, status, created_at, resolved_at,
                resolution_method, chosen_value, audit_note
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                e.ledger_id,
                next_seq,
                e.session_id.as_str(),
                e.slot,
                e.old_memory_id,
                e.new_memory_id,
                e.old_value,
                e.new_value,
                e.contradiction_type.as_str(),
                e.confidence,
                e.status.as_str(),
                fmt_ts(&e.created_at),
                e.resolved_at.as_ref().map(fmt_ts),
                e.resolution_method,
                e.chosen_value,
                e.audit_note,
            ],
        )?;
        Ok(())
    }

    /// Fetch an entry owned by `session`.
    pub fn get_ledger_entry(&self, session: &SessionId, ledger_id: &str) -> EngineResult<LedgerEntry> {
        let conn = self.conn.lock();
        let entry = conn
            .query_row(
                &format!("SELECT {LEDGER_COLUMNS} FROM ledger WHERE ledger_id = ?1"),
                params![ledger_id],
                LedgerEntry::from_row,
            )
            .optional()?;
        match entry {
            Some(e) if &e.session_id == session => Ok(e),
            Some(_) => Err(EngineError::cross_session("ledger entry", ledger_id)),
            None => Err(EngineError::not_found("ledger entry", ledger_id)),
        }
    }

    /// All entries of a session in creation order.
    pub fn list_ledger_entries(&self, session: &SessionId) -> EngineResult<Vec<LedgerEntry>> {
        self.query_ledger(
            &format!("SELECT {LEDGER_COLUMNS} FROM ledger WHERE session_id = ?1 ORDER BY seq"),
            params![session.as_str()],
        )
    }

    pub fn list_ledger_entries_for_slot(&self, session: &SessionId, slot: &str) -> EngineResult<Vec<LedgerEntry>> {
        self.query_ledger(
            &format!("SELECT {LEDGER_COLUMNS} FROM ledger WHERE session_id = ?1 AND slot = ?2 ORDER BY seq"),
            params![session.as_str(), slot],
        )
    }

    pub fn list_open_ledger_entries(&self, session: &SessionId) -> EngineResult<Vec<LedgerEntry>> {
        self.query_ledger(
            &format!(
                "SELECT {LEDGER_COLUMNS} FROM ledger WHERE session_id = ?1 AND status = 'open' ORDER BY seq"
            ),
            params![session.as_str()],
        )
    }

    /// Move an open entry to a terminal status. Terminal entries are rejected
    /// with `InvalidTransition`; `to` must itself be terminal.
    pub(crate) fn close_ledger_entry(
        &self,
        session: &SessionId,
        ledger_id: &str,
        to: LedgerStatus,
        at: DateTime<Utc>,
        method: Option<&str>,
        chosen_value: Option<&str>,
    ) -> EngineResult<LedgerEntry> {
        let current = self.get_ledger_entry(session, ledger_id)?;
        if current.status.is_terminal() || !to.is_terminal() {
            return Err(EngineError::InvalidTransition {
                ledger_id: ledger_id.to_string(),
                from: current.status,
            });
        }
        {
            let conn = self.conn.lock();
            let changed = conn.execute(
                "UPDATE ledger
                 SET status = ?2, resolved_at = ?3, resolution_method = ?4, chosen_value = ?5
                 WHERE ledger_id = ?1 AND status = 'open'",
                params![ledger_id, to.as_str(), fmt_ts(&at), method, chosen_value],
            )?;
            if changed == 0 {
                // Lost a race with another closer; report what it left behind.
                drop(conn);
                let now = self.get_ledger_entry(session, ledger_id)?;
                return Err(EngineError::InvalidTransition {
                    ledger_id: ledger_id.to_string(),
                    from: now.status,
                });
            }
        }
        self.get_ledger_entry(session, ledger_id)
    }

    /// Write the audit note. Allowed in every status.
    pub(crate) fn set_ledger_audit_note(&self, session: &SessionId, ledger_id: &str, note: &str) -> EngineResult<LedgerEntry> {
        self.get_ledger_entry(session, ledger_id)?;
        {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE ledger SET audit_note = ?2 WHERE ledger_id = ?1",
                params![ledger_id, note],
            )?;
        }
        self.get_ledger_entry(session, ledger_id)
    }

    pub fn count_open_ledger_entries(&self, session: &SessionId) -> EngineResult<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM ledger WHERE session_id = ?1 AND status = 'open'",
            params![session.as_str()],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    fn query_ledger(&self, sql: &str, p: impl rusqlite::Params) -> EngineResult<Vec<LedgerEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(p, LedgerEntry::from_row)?;
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

    fn entry(id: &str, session: &str) -> LedgerEntry {
        LedgerEntry {
            ledger_id: id.into(),
            session_id: SessionId::new(session),
            slot: "employer".into(),
            old_memory_id: "m1".into(),
            new_memory_id: "m2".into(),
            old_value: "acme".into(),
            new_value: "globex".into(),
            contradiction_type: ContradictionType::ValueConflict,
            confidence: 0.8,
            status: LedgerStatus::Open,
            created_at: Utc::now(),
            resolved_at: None,
            resolution_method: None,
            chosen_value: None,
            audit_note: None,
        }
    }

    #[test]
    fn resolve_then_reopen_fails() {
        let store = SessionStore::open_in_memory().unwrap();
        let s = SessionId::new("s1");
        store.insert_ledger_entry(&entry("l1", "s1")).unwrap();

        let closed = store
            .close_ledger_entry(&s, "l1", LedgerStatus::Resolved, Utc::now(), Some("user"), Some("globex"))
            .unwrap();
        assert_eq!(closed.status, LedgerStatus::Resolved);
        assert_eq!(closed.chosen_value.as_deref(), Some("globex"));
        assert!(closed.resolved_at.is_some());

        let err = store
            .close_ledger_entry(&s, "l1", LedgerStatus::Dismissed, Utc::now(), None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition { from: LedgerStatus::Resolved, .. }
        ));
    }

    #[test]
    fn closing_to_open_is_rejected() {
        let store = SessionStore::open_in_memory().unwrap();
        let s = SessionId::new("s1");
        store.insert_ledger_entry(&entry("l1", "s1")).unwrap();
        let err = store
            .close_ledger_entry(&s, "l1", LedgerStatus::Open, Utc::now(), None, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn audit_note_allowed_after_close() {
        let store = SessionStore::open_in_memory().unwrap();
        let s = SessionId::new("s1");
        store.insert_ledger_entry(&entry("l1", "s1")).unwrap();
        store
            .close_ledger_entry(&s, "l1", LedgerStatus::Dismissed, Utc::now(), None, None)
            .unwrap();
        let noted = store.set_ledger_audit_note(&s, "l1", "reviewed by operator").unwrap();
        assert_eq!(noted.audit_note.as_deref(), Some("reviewed by operator"));
        assert_eq!(noted.status, LedgerStatus::Dismissed);
    }

    #[test]
    fn entries_are_session_scoped() {
        let store = SessionStore::open_in_memory().unwrap();
        store.insert_ledger_entry(&entry("l1", "alice")).unwrap();
        store.insert_ledger_entry(&entry("l2", "bob")).unwrap();

        let alice = SessionId::new("alice");
        assert_eq!(store.list_ledger_entries(&alice).unwrap().len(), 1);
        assert_eq!(store.list_ledger_entries_for_slot(&alice, "employer").unwrap().len(), 1);
        assert!(matches!(
            store.get_ledger_entry(&alice, "l2").unwrap_err(),
            EngineError::CrossSession { .. }
        ));
        assert_eq!(store.count_open_ledger_entries(&alice).unwrap(), 1);
    }
}
