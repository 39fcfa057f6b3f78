// trustmem Engine — trust-weighted personal memory and answer gating
// Stores what a user says on two lanes with different trust decay, records
// contradictions instead of overwriting, and gates every candidate answer on
// response-type-aware thresholds. Operator corrections retrain the
// response-type classifier in the background.
//
// Module layout:
//   config      — EngineConfig (TOML) and per-component sections
//   text        — normalization shared by extraction, ledger, gate, classifier
//   sessions    — SessionStore: SQLite persistence for everything below
//   memory      — MemoryStore, SlotExtractor, trust decay
//   ledger      — ContradictionLedger
//   classifier  — rules + learned model behind a precedence
//   gate        — GateEvaluator, grounding and alignment scores
//   learning    — ActiveLearningCoordinator, idle Scheduler
//   pipeline    — Engine facade: handle_turn and the operator surface

pub mod classifier;
pub mod config;
pub mod gate;
pub mod learning;
pub mod ledger;
pub mod memory;
pub mod pipeline;
pub mod sessions;
pub mod text;
