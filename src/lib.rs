// trustmem — trust-weighted personal memory engine.
//
// Two layers, as in the engine's dependency rule:
//   atoms  — pure types, constants, traits and the error enum
//   engine — everything with state or I/O
//
// The library never installs a logger; binaries and tests pick one.

pub mod atoms;
pub mod engine;

pub use atoms::error::{EngineError, EngineResult};
pub use atoms::gate_types::{
    ClassifierModelInfo, ContradictionSeverity, GateDecision, GateEvent, GateReason, Precedence, Prediction,
    PredictionSource, ResponseType,
};
pub use atoms::traits::{Embedder, Generator};
pub use atoms::types::{
    ContradictionType, Lane, LedgerEntry, LedgerStatus, MemoryRecord, MemorySource, Sentiment, SessionId, SlotFact,
    SlotKind, Topic,
};
pub use engine::config::EngineConfig;
pub use engine::learning::{RetrainOutcome, SchedulerHandle};
pub use engine::pipeline::{Engine, EngineStats, ReplyKind, TurnReply};
