// trustmem Engine — Session Store
// Durable state for the whole core in SQLite via rusqlite: memories, the
// contradiction ledger, the gate-event log, classifier artifacts and persisted
// config. Every row that belongs to a conversation carries its `session_id`;
// reads that cross sessions are rejected, not filtered.
//
// Module layout:
//   schema       — tables, indexes, append-only triggers
//   memories     — memory record CRUD + reinforcement
//   ledger       — ledger entry CRUD + status transitions
//   gate_events  — append-only event log + one-shot corrections
//   models       — classifier artifacts, active marker
//   config       — key/value engine config store
//   vectors      — vector BLOB codec, cosine similarity

use crate::atoms::error::{EngineError, EngineResult};
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

mod config;
mod gate_events;
mod ledger;
mod memories;
mod models;
mod schema;
mod vectors;

pub use gate_events::CorrectedExample;
pub use models::StoredModel;
pub use vectors::cosine_similarity;

/// Thread-safe database wrapper.
pub struct SessionStore {
    /// The SQLite connection, protected by a Mutex.
    pub(crate) conn: Mutex<Connection>,
}

impl SessionStore {
    /// Open (or create) a database file and initialize tables.
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        info!("[trustmem:store] Opening store at {:?}", path);

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.execute_batch("PRAGMA synchronous=NORMAL;").ok();

        schema::run_migrations(&conn)?;
        Ok(SessionStore { conn: Mutex::new(conn) })
    }

    /// Fresh in-memory database (tests, ephemeral sessions).
    pub fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(SessionStore { conn: Mutex::new(conn) })
    }
}

// ── Timestamp helpers ──────────────────────────────────────────────────────
// RFC 3339 with microseconds, always UTC, so lexical order matches time order.

pub(crate) fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

pub(crate) fn parse_opt_ts(s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

/// Map an unknown enum string in a row to a conversion error.
pub(crate) fn bad_enum(column: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(EngineError::Other(format!("unknown enum value '{value}'"))),
    )
}
