// trustmem Engine — Active Learning Coordinator
//
// Closes the loop between operator corrections and the classifier:
//
//   request path   record(event)            append only, touch scheduler
//   operator       submit_correction(id)    first write wins
//   idle worker    maybe_retrain()          snapshot → split → train → swap
//
// Training never runs on the request path. The only state shared with the
// request path is the model slot, swapped atomically. A failed run leaves the
// active model untouched.
//
// Module layout:
//   scheduler.rs — Scheduler (idle detection), IdleTask, SchedulerHandle

pub mod scheduler;

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::atoms::constants::NB_LAPLACE_ALPHA;
use crate::atoms::error::EngineResult;
use crate::atoms::gate_types::{ClassifierModelInfo, GateEvent, Precedence, ResponseType};
use crate::engine::classifier::training::train_and_evaluate;
use crate::engine::classifier::{Classifier, LoadedModel};
use crate::engine::config::LearningConfig;
use crate::engine::sessions::SessionStore;

pub use scheduler::{IdleTask, Scheduler, SchedulerHandle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RetrainOutcome {
    Skipped { reason: String },
    /// `model.is_active` is false when the candidate did not beat the
    /// active model; it is kept for rollback but not served.
    Trained { model: ClassifierModelInfo },
    Failed { reason: String },
}

pub struct ActiveLearningCoordinator {
    db: Arc<SessionStore>,
    classifier: Arc<Classifier>,
    scheduler: Arc<Scheduler>,
    cfg: LearningConfig,
    /// Serializes training runs; a second caller skips instead of waiting.
    retrain_lock: Mutex<()>,
}

impl ActiveLearningCoordinator {
    pub fn new(
        db: Arc<SessionStore>,
        classifier: Arc<Classifier>,
        scheduler: Arc<Scheduler>,
        cfg: LearningConfig,
    ) -> Self {
        Self { db, classifier, scheduler, cfg, retrain_lock: Mutex::new(()) }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Serve the stored active model, if any. A corrupt artifact is logged
    /// and skipped; the classifier then runs on rules alone.
    pub fn load_active(&self) -> EngineResult<Option<i64>> {
        let Some(stored) = self.db.active_model()? else {
            return Ok(None);
        };
        match LoadedModel::from_stored(&stored) {
            Ok(loaded) => {
                let version = loaded.version();
                self.hot_swap(Arc::new(loaded));
                Ok(Some(version))
            }
            Err(e) => {
                warn!(
                    "[trustmem:learning] Active model v{} is unreadable, serving rules only: {}",
                    stored.info.version, e
                );
                Ok(None)
            }
        }
    }

    /// Append a gate event. Returns its sequence number.
    pub fn record(&self, event: &GateEvent) -> EngineResult<i64> {
        self.scheduler.touch();
        let seq = self.db.append_gate_event(event)?;
        debug!(
            "[trustmem:learning] Event {} #{} predicted={} passed={}",
            event.event_id, seq, event.predicted_response_type, event.gates_passed
        );
        Ok(seq)
    }

    /// Record the operator's label for an event. First write wins.
    pub fn submit_correction(&self, event_id: &str, actual: ResponseType) -> EngineResult<GateEvent> {
        let event = self.db.set_gate_event_correction(event_id, actual, Utc::now())?;
        info!(
            "[trustmem:learning] Event {} corrected: {} → {}",
            event_id, event.predicted_response_type, actual
        );
        Ok(event)
    }

    pub fn get_event(&self, event_id: &str) -> EngineResult<GateEvent> {
        self.db.get_gate_event(event_id)
    }

    /// Retrain if enough new corrections exist and the active model is
    /// missing or below target.
    pub fn maybe_retrain(&self) -> RetrainOutcome {
        let Some(_guard) = self.retrain_lock.try_lock() else {
            return RetrainOutcome::Skipped { reason: "a training run is already in progress".into() };
        };
        match self.retrain() {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("[trustmem:learning] Retrain failed, keeping current model: {}", e);
                RetrainOutcome::Failed { reason: e.to_string() }
            }
        }
    }

    fn retrain(&self) -> EngineResult<RetrainOutcome> {
        let since = self.db.last_trained_seq()?;
        let fresh = self.db.count_corrections_after(since)?;
        if fresh < self.cfg.retrain_min_corrections {
            return Ok(RetrainOutcome::Skipped {
                reason: format!(
                    "{} new corrections since #{}, need {}",
                    fresh, since, self.cfg.retrain_min_corrections
                ),
            });
        }
        let active = self.classifier.model_slot().current();
        if let Some(m) = &active {
            if m.info.held_out_accuracy >= self.cfg.accuracy_target {
                return Ok(RetrainOutcome::Skipped {
                    reason: format!(
                        "active model v{} at {:.3} meets target {:.3}",
                        m.version(),
                        m.info.held_out_accuracy,
                        self.cfg.accuracy_target
                    ),
                });
            }
        }

        let examples = self.db.corrected_examples()?;
        let trained = train_and_evaluate(&examples, self.cfg.held_out_percent, NB_LAPLACE_ALPHA)?;
        let activate = active
            .as_ref()
            .map_or(true, |m| trained.held_out_accuracy >= m.info.held_out_accuracy);

        let artifact = trained.model.to_artifact()?;
        let info = self.db.insert_model(
            trained.training_example_count,
            trained.held_out_accuracy,
            trained.trained_through_seq,
            &artifact,
            activate,
        )?;
        info!(
            "[trustmem:learning] Trained v{} on {} examples ({} held out): accuracy {:.3}{}",
            info.version,
            trained.training_example_count,
            trained.held_out_count,
            info.held_out_accuracy,
            if activate { "" } else { ", not activated" }
        );

        if activate {
            self.hot_swap(Arc::new(LoadedModel { info: info.clone(), model: trained.model }));
            self.maybe_flip_precedence(examples.len(), &info)?;
        }
        Ok(RetrainOutcome::Trained { model: info })
    }

    fn maybe_flip_precedence(&self, corrections: usize, info: &ClassifierModelInfo) -> EngineResult<()> {
        let Some(at) = self.cfg.flip_precedence_at else {
            return Ok(());
        };
        if corrections >= at
            && info.held_out_accuracy >= self.cfg.flip_min_accuracy
            && self.classifier.precedence() == Precedence::RulesFirst
        {
            self.classifier.set_precedence(Precedence::ModelFirst)?;
            info!(
                "[trustmem:learning] {} corrections and v{} at {:.3}: model now takes precedence",
                corrections, info.version, info.held_out_accuracy
            );
        }
        Ok(())
    }

    /// Replace the served model. Returns the one it replaced.
    pub fn hot_swap(&self, model: Arc<LoadedModel>) -> Option<Arc<LoadedModel>> {
        let version = model.version();
        let prev = self.classifier.model_slot().swap(Some(model));
        info!(
            "[trustmem:learning] Serving model v{} (was {})",
            version,
            prev.as_ref().map_or("none".to_string(), |m| format!("v{}", m.version()))
        );
        prev
    }

    /// Re-activate a retained version. The current model stays if the
    /// stored artifact cannot be loaded.
    pub fn rollback(&self, version: i64) -> EngineResult<ClassifierModelInfo> {
        let stored = self.db.get_model(version)?;
        let mut loaded = LoadedModel::from_stored(&stored)?;
        let activated = self.db.activate_model(version)?;
        loaded.info = activated.info.clone();
        self.hot_swap(Arc::new(loaded));
        info!("[trustmem:learning] Rolled back to v{}", version);
        Ok(activated.info)
    }

    pub fn list_models(&self) -> EngineResult<Vec<ClassifierModelInfo>> {
        self.db.list_models()
    }

    pub fn active_version(&self) -> Option<i64> {
        self.classifier.model_slot().version()
    }
}

impl IdleTask for ActiveLearningCoordinator {
    fn name(&self) -> &'static str {
        "retrain"
    }

    fn run_idle(&self) {
        match self.maybe_retrain() {
            RetrainOutcome::Skipped { reason } => debug!("[trustmem:learning] Idle retrain skipped: {}", reason),
            RetrainOutcome::Trained { model } => {
                debug!("[trustmem:learning] Idle retrain produced v{}", model.version)
            }
            RetrainOutcome::Failed { .. } => {}
        }
    }
}
