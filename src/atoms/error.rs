// ── trustmem Atoms: Error Types ─────────────────────────────────────────────
// Single canonical error enum for the engine, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (I/O, DB, config, ledger, learning…).
//   • The `#[from]` attribute wires std/external error conversions automatically.
//   • An empty retrieval is NOT an error — see `engine::memory::Retrieval`.
//   • `EngineError` → `String` conversion is provided via `Display` so that
//     transport boundaries can call `.map_err(String::from)`.

use thiserror::Error;

use super::types::LedgerStatus;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure (model artifacts).
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite / rusqlite database failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// TOML configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Engine configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A record, ledger entry, event or model does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The requested row belongs to a different session.
    #[error("{kind} {id} belongs to another session")]
    CrossSession { kind: &'static str, id: String },

    /// A correction was already recorded for this gate event; first write wins.
    #[error("Gate event {0} already corrected")]
    AlreadyCorrected(String),

    /// Ledger entries never leave a terminal state.
    #[error("Ledger entry {ledger_id} is {from} and cannot transition")]
    InvalidTransition { ledger_id: String, from: LedgerStatus },

    /// Classifier training pipeline failure (degenerate data, empty split…).
    #[error("Training error: {0}")]
    Training(String),

    /// Catch-all for errors that do not yet have a dedicated variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub fn cross_session(kind: &'static str, id: impl Into<String>) -> Self {
        Self::CrossSession { kind, id: id.into() }
    }

    pub fn training(message: impl Into<String>) -> Self {
        Self::Training(message.into())
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All engine operations return this type.
pub type EngineResult<T> = Result<T, EngineError>;

// ── Conversion: EngineError → String ──────────────────────────────────────

impl From<EngineError> for String {
    fn from(e: EngineError) -> Self {
        e.to_string()
    }
}
