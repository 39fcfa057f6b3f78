// trustmem Engine — Response-Type Classifier
//
// Predicts whether a query wants a factual, explanatory or conversational
// answer; the gate picks its threshold row from that.
//
// Two stages behind one trait:
//   RuleStage  — keyword heuristics, fires only on clear patterns
//   ModelStage — the active learned model, answers only above a confidence
// The order is a `Precedence` value injected at construction and changeable
// at runtime. When a store is attached, the order is persisted in
// `engine_config` so a flip survives a restart. If neither stage answers the
// prediction defaults to Factual.
//
// Module layout:
//   rules.rs    — rule verdicts + synthesis detection
//   model.rs    — Naive Bayes model, LoadedModel, ModelSlot (hot-swap pointer)
//   training.rs — hash split, training, held-out accuracy

pub mod model;
pub mod rules;
pub mod training;

use std::sync::Arc;

use log::{info, warn};
use parking_lot::RwLock;

use crate::atoms::constants::CONFIG_KEY_PRECEDENCE;
use crate::atoms::error::EngineResult;
use crate::atoms::gate_types::{Precedence, Prediction, PredictionSource, ResponseType};
use crate::engine::config::ClassifierConfig;
use crate::engine::sessions::SessionStore;

pub use model::{LoadedModel, ModelSlot, NaiveBayesModel};
pub use rules::detect_synthesis;

/// One classifier stage. `None` means "no opinion, ask the next stage".
pub trait ClassifierStage: Send + Sync {
    fn name(&self) -> &'static str;
    fn predict(&self, query: &str) -> Option<Prediction>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleStage;

impl ClassifierStage for RuleStage {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn predict(&self, query: &str) -> Option<Prediction> {
        rules::rule_verdict(query).map(|response_type| Prediction {
            response_type,
            source: PredictionSource::Rules,
            confidence: 1.0,
        })
    }
}

pub struct ModelStage {
    slot: Arc<ModelSlot>,
    min_confidence: f64,
}

impl ModelStage {
    pub fn new(slot: Arc<ModelSlot>, min_confidence: f64) -> Self {
        Self { slot, min_confidence }
    }
}

impl ClassifierStage for ModelStage {
    fn name(&self) -> &'static str {
        "model"
    }

    fn predict(&self, query: &str) -> Option<Prediction> {
        // Hold our own Arc: a concurrent swap cannot pull the model away mid-call.
        let loaded = self.slot.current()?;
        let (response_type, confidence) = loaded.model.predict(query)?;
        if confidence < self.min_confidence {
            return None;
        }
        Some(Prediction {
            response_type,
            source: PredictionSource::Model { version: loaded.version() },
            confidence,
        })
    }
}

pub struct Classifier {
    rules: RuleStage,
    model: ModelStage,
    slot: Arc<ModelSlot>,
    precedence: RwLock<Precedence>,
    db: Option<Arc<SessionStore>>,
}

impl Classifier {
    /// In-memory precedence only.
    pub fn new(slot: Arc<ModelSlot>, cfg: &ClassifierConfig) -> Self {
        Self {
            rules: RuleStage,
            model: ModelStage::new(slot.clone(), cfg.min_model_confidence),
            slot,
            precedence: RwLock::new(cfg.precedence),
            db: None,
        }
    }

    /// Precedence persisted in `engine_config` wins over the configured one.
    pub fn with_store(db: Arc<SessionStore>, slot: Arc<ModelSlot>, cfg: &ClassifierConfig) -> EngineResult<Self> {
        let precedence = match db.get_config(CONFIG_KEY_PRECEDENCE)? {
            Some(raw) => Precedence::parse(&raw).unwrap_or_else(|| {
                warn!(
                    "[trustmem:classifier] Unknown persisted precedence '{}', using {}",
                    raw,
                    cfg.precedence.as_str()
                );
                cfg.precedence
            }),
            None => cfg.precedence,
        };
        let mut classifier = Self::new(slot, cfg);
        *classifier.precedence.get_mut() = precedence;
        classifier.db = Some(db);
        Ok(classifier)
    }

    pub fn classify(&self, query: &str) -> Prediction {
        let order: [&dyn ClassifierStage; 2] = match self.precedence() {
            Precedence::RulesFirst => [&self.rules, &self.model],
            Precedence::ModelFirst => [&self.model, &self.rules],
        };
        order
            .iter()
            .find_map(|stage| stage.predict(query))
            .unwrap_or(Prediction {
                response_type: ResponseType::Factual,
                source: PredictionSource::Default,
                confidence: 1.0,
            })
    }

    pub fn precedence(&self) -> Precedence {
        *self.precedence.read()
    }

    /// Change the stage order, persisting it when a store is attached.
    pub fn set_precedence(&self, precedence: Precedence) -> EngineResult<()> {
        if let Some(db) = &self.db {
            db.set_config(CONFIG_KEY_PRECEDENCE, precedence.as_str())?;
        }
        let prev = std::mem::replace(&mut *self.precedence.write(), precedence);
        if prev != precedence {
            info!(
                "[trustmem:classifier] Precedence {} -> {}",
                prev.as_str(),
                precedence.as_str()
            );
        }
        Ok(())
    }

    pub fn model_slot(&self) -> &Arc<ModelSlot> {
        &self.slot
    }

    pub fn stage_names(&self) -> [&'static str; 2] {
        match self.precedence() {
            Precedence::RulesFirst => [self.rules.name(), self.model.name()],
            Precedence::ModelFirst => [self.model.name(), self.rules.name()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::gate_types::ClassifierModelInfo;
    use chrono::Utc;

    /// A model that calls everything conversational.
    fn chatty_model(version: i64) -> Arc<LoadedModel> {
        let model = NaiveBayesModel::train(
            vec![
                ("where do i work", ResponseType::Conversational),
                ("where do i live", ResponseType::Conversational),
                ("tell me a joke", ResponseType::Conversational),
                ("zzz", ResponseType::Factual),
            ],
            1.0,
        );
        Arc::new(LoadedModel {
            info: ClassifierModelInfo {
                version,
                trained_at: Utc::now(),
                training_example_count: 4,
                held_out_accuracy: 0.9,
                trained_through_seq: 4,
                is_active: true,
            },
            model,
        })
    }

    #[test]
    fn default_is_factual_without_rules_or_model() {
        let c = Classifier::new(Arc::new(ModelSlot::new()), &ClassifierConfig::default());
        let p = c.classify("tell me a joke about databases");
        assert_eq!(p.response_type, ResponseType::Factual);
        assert_eq!(p.source, PredictionSource::Default);
    }

    #[test]
    fn rules_first_then_model() {
        let slot = Arc::new(ModelSlot::new());
        slot.swap(Some(chatty_model(3)));
        let c = Classifier::new(slot, &ClassifierConfig::default());

        let p = c.classify("where do I work?");
        assert_eq!(p.response_type, ResponseType::Factual);
        assert_eq!(p.source, PredictionSource::Rules);

        let p = c.classify("tell me a joke");
        assert_eq!(p.response_type, ResponseType::Conversational);
        assert_eq!(p.source, PredictionSource::Model { version: 3 });
    }

    #[test]
    fn model_first_overrides_rules() {
        let slot = Arc::new(ModelSlot::new());
        slot.swap(Some(chatty_model(1)));
        let c = Classifier::new(slot, &ClassifierConfig::default());
        c.set_precedence(Precedence::ModelFirst).unwrap();
        assert_eq!(c.stage_names(), ["model", "rules"]);
        let p = c.classify("where do I work?");
        assert_eq!(p.response_type, ResponseType::Conversational);
    }

    #[test]
    fn low_confidence_model_defers() {
        let slot = Arc::new(ModelSlot::new());
        slot.swap(Some(chatty_model(1)));
        let cfg = ClassifierConfig { min_model_confidence: 0.999_999, ..Default::default() };
        let c = Classifier::new(slot, &cfg);
        assert_eq!(c.classify("tell me a story").source, PredictionSource::Default);
    }

    #[test]
    fn precedence_persists_across_instances() {
        let db = Arc::new(SessionStore::open_in_memory().unwrap());
        let cfg = ClassifierConfig::default();
        let c = Classifier::with_store(db.clone(), Arc::new(ModelSlot::new()), &cfg).unwrap();
        assert_eq!(c.precedence(), Precedence::RulesFirst);
        c.set_precedence(Precedence::ModelFirst).unwrap();

        let reopened = Classifier::with_store(db, Arc::new(ModelSlot::new()), &cfg).unwrap();
        assert_eq!(reopened.precedence(), Precedence::ModelFirst);
    }
}
