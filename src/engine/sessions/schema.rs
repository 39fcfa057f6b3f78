// Database schema and migrations for the trustmem store.
// Called once by SessionStore::open()/open_in_memory().
// Adding a table or column: append an idempotent CREATE TABLE IF NOT EXISTS or
// ALTER TABLE … ADD COLUMN (errors swallowed) at the end of run_migrations().
// Never modify existing SQL, so upgrade paths stay clean.
//
// Tables:
//   - memories:          trust-scored records, keyed by (session_id, id)
//   - ledger:            contradiction entries, slot secondary index
//   - gate_events:       append-only gate decision log
//   - classifier_models: versioned model artifacts with one active marker
//   - engine_config:     persisted runtime overrides (key/value)

use crate::atoms::error::EngineResult;
use log::info;
use rusqlite::Connection;

pub(crate) fn run_migrations(conn: &Connection) -> EngineResult<()> {
    conn.execute_batch(CORE_SCHEMA)?;
    conn.execute_batch(APPEND_ONLY_TRIGGERS)?;
    info!("[trustmem:store] Schema migrations complete");
    Ok(())
}

const CORE_SCHEMA: &str = "
    -- ═══════════════════════════════════════════════════════════════
    -- Memories: never hard-deleted, mutated only by reinforcement.
    -- ═══════════════════════════════════════════════════════════════
    CREATE TABLE IF NOT EXISTS memories (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        session_id TEXT NOT NULL,
        text TEXT NOT NULL,
        normalized_text TEXT NOT NULL,
        vector BLOB NOT NULL,
        lane TEXT NOT NULL,
        trust_initial REAL NOT NULL,
        confidence REAL NOT NULL DEFAULT 1.0,
        slot_kind TEXT,
        slot_value TEXT,
        slot_negated INTEGER NOT NULL DEFAULT 0,
        topic TEXT,
        sentiment TEXT NOT NULL DEFAULT 'neutral',
        source TEXT NOT NULL,
        created_at TEXT NOT NULL,
        last_reinforced_at TEXT NOT NULL,
        reinforcement_count INTEGER NOT NULL DEFAULT 0
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_memories_session_id
        ON memories(session_id, id);
    CREATE INDEX IF NOT EXISTS idx_memories_slot
        ON memories(session_id, slot_kind);
    CREATE INDEX IF NOT EXISTS idx_memories_topic
        ON memories(session_id, topic);

    -- ═══════════════════════════════════════════════════════════════
    -- Contradiction ledger
    -- ═══════════════════════════════════════════════════════════════
    CREATE TABLE IF NOT EXISTS ledger (
        ledger_id TEXT PRIMARY KEY,
        seq INTEGER NOT NULL,
        session_id TEXT NOT NULL,
        slot TEXT NOT NULL,
        old_memory_id TEXT NOT NULL,
        new_memory_id TEXT NOT NULL,
        old_value TEXT NOT NULL,
        new_value TEXT NOT NULL,
        contradiction_type TEXT NOT NULL CHECK (contradiction_type IN (
            'value_conflict', 'sentiment_conflict', 'denial', 'retraction_of_denial'
        )),
        confidence REAL NOT NULL CHECK (confidence BETWEEN 0.0 AND 1.0),
        status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'resolved', 'dismissed')),
        created_at TEXT NOT NULL,
        resolved_at TEXT,
        resolution_method TEXT,
        chosen_value TEXT,
        audit_note TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_ledger_slot
        ON ledger(session_id, slot);
    CREATE INDEX IF NOT EXISTS idx_ledger_status
        ON ledger(session_id, status);

    -- ═══════════════════════════════════════════════════════════════
    -- Gate events (active learning log)
    -- ═══════════════════════════════════════════════════════════════
    CREATE TABLE IF NOT EXISTS gate_events (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        event_id TEXT NOT NULL UNIQUE,
        session_id TEXT NOT NULL,
        query_text TEXT NOT NULL,
        predicted_response_type TEXT NOT NULL,
        actual_response_type TEXT,
        intent_alignment REAL NOT NULL,
        memory_alignment REAL NOT NULL,
        grounding_score REAL NOT NULL,
        contradiction_severity TEXT NOT NULL,
        gates_passed INTEGER NOT NULL,
        timestamp TEXT NOT NULL,
        corrected_at TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_gate_events_corrected
        ON gate_events(actual_response_type, seq);

    -- ═══════════════════════════════════════════════════════════════
    -- Classifier models
    -- ═══════════════════════════════════════════════════════════════
    CREATE TABLE IF NOT EXISTS classifier_models (
        version INTEGER PRIMARY KEY AUTOINCREMENT,
        trained_at TEXT NOT NULL,
        training_example_count INTEGER NOT NULL,
        held_out_accuracy REAL NOT NULL,
        trained_through_seq INTEGER NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 0,
        artifact TEXT NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_models_single_active
        ON classifier_models(is_active) WHERE is_active = 1;

    CREATE TABLE IF NOT EXISTS engine_config (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

const APPEND_ONLY_TRIGGERS: &str = "
    CREATE TRIGGER IF NOT EXISTS trg_memories_no_delete
    BEFORE DELETE ON memories
    BEGIN
        SELECT RAISE(FAIL, 'memories are never hard-deleted');
    END;

    CREATE TRIGGER IF NOT EXISTS trg_ledger_no_delete
    BEFORE DELETE ON ledger
    BEGIN
        SELECT RAISE(FAIL, 'ledger is append-only');
    END;

    -- Closed entries: only audit_note may change.
    CREATE TRIGGER IF NOT EXISTS trg_ledger_closed_immutable
    BEFORE UPDATE ON ledger
    WHEN OLD.status != 'open' AND (
        NEW.status IS NOT OLD.status
        OR NEW.resolved_at IS NOT OLD.resolved_at
        OR NEW.resolution_method IS NOT OLD.resolution_method
        OR NEW.chosen_value IS NOT OLD.chosen_value
        OR NEW.confidence IS NOT OLD.confidence
        OR NEW.old_value IS NOT OLD.old_value
        OR NEW.new_value IS NOT OLD.new_value
    )
    BEGIN
        SELECT RAISE(FAIL, 'ledger entry is closed');
    END;

    CREATE TRIGGER IF NOT EXISTS trg_gate_events_no_delete
    BEFORE DELETE ON gate_events
    BEGIN
        SELECT RAISE(FAIL, 'gate_events is append-only');
    END;

    -- The correction is the one mutable field, written once.
    CREATE TRIGGER IF NOT EXISTS trg_gate_events_correct_once
    BEFORE UPDATE ON gate_events
    WHEN OLD.actual_response_type IS NOT NULL
        OR NEW.query_text IS NOT OLD.query_text
        OR NEW.predicted_response_type IS NOT OLD.predicted_response_type
        OR NEW.gates_passed IS NOT OLD.gates_passed
        OR NEW.grounding_score IS NOT OLD.grounding_score
    BEGIN
        SELECT RAISE(FAIL, 'gate_events is append-only');
    END;
";
