// ── Learned response-type model ─────────────────────────────────────────────
//
// Multinomial Naive Bayes over unigram + bigram tokens with Laplace smoothing.
// Small, deterministic, trains in milliseconds on a few hundred corrections,
// and serializes to a JSON artifact stored in `classifier_models`.
//
// `ModelSlot` holds the active model behind `RwLock<Option<Arc<_>>>`. Readers
// clone the `Arc` and release the lock immediately, so a swap never blocks on
// a classification in progress, and an in-flight classification keeps using
// the model it started with until it drops its `Arc`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::gate_types::{ClassifierModelInfo, ResponseType};
use crate::engine::sessions::StoredModel;
use crate::engine::text::tokens;

const CLASS_COUNT: usize = ResponseType::ALL.len();

/// Unigrams plus adjacent-pair bigrams ("where", "do", "where_do", …).
/// Stop words stay in: "why" and "how" carry most of the signal.
pub fn features(text: &str) -> Vec<String> {
    let toks = tokens(text);
    let mut out = toks.clone();
    out.extend(toks.windows(2).map(|w| format!("{}_{}", w[0], w[1])));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayesModel {
    /// Documents per class, indexed by `ResponseType::index`.
    pub class_docs: Vec<u64>,
    /// Feature counts per class.
    pub feature_counts: Vec<HashMap<String, u64>>,
    /// Total feature occurrences per class.
    pub class_totals: Vec<u64>,
    pub vocab_size: usize,
    pub alpha: f64,
}

impl NaiveBayesModel {
    pub fn train<'a>(examples: impl IntoIterator<Item = (&'a str, ResponseType)>, alpha: f64) -> Self {
        let mut class_docs = vec![0u64; CLASS_COUNT];
        let mut feature_counts: Vec<HashMap<String, u64>> = vec![HashMap::new(); CLASS_COUNT];
        let mut class_totals = vec![0u64; CLASS_COUNT];
        let mut vocab: HashSet<String> = HashSet::new();

        for (text, label) in examples {
            let c = label.index();
            class_docs[c] += 1;
            for f in features(text) {
                *feature_counts[c].entry(f.clone()).or_insert(0) += 1;
                class_totals[c] += 1;
                vocab.insert(f);
            }
        }

        Self { class_docs, feature_counts, class_totals, vocab_size: vocab.len(), alpha }
    }

    /// Reject artifacts whose shape does not match the class set.
    pub fn validate(&self) -> EngineResult<()> {
        if self.class_docs.len() != CLASS_COUNT
            || self.feature_counts.len() != CLASS_COUNT
            || self.class_totals.len() != CLASS_COUNT
        {
            return Err(EngineError::training("artifact class layout does not match response types"));
        }
        if self.class_docs.iter().all(|&n| n == 0) || self.alpha.is_nan() || self.alpha <= 0.0 {
            return Err(EngineError::training("artifact has no training documents or a bad alpha"));
        }
        Ok(())
    }

    /// Normalized posteriors per class. Classes never seen in training get 0.
    pub fn posteriors(&self, text: &str) -> [f64; CLASS_COUNT] {
        let feats = features(text);
        let total_docs: u64 = self.class_docs.iter().sum();
        let vocab = self.vocab_size.max(1) as f64;

        let mut log_scores = [f64::NEG_INFINITY; CLASS_COUNT];
        for c in 0..CLASS_COUNT {
            if self.class_docs[c] == 0 {
                continue;
            }
            let denom = self.class_totals[c] as f64 + self.alpha * vocab;
            let mut score = (self.class_docs[c] as f64 / total_docs as f64).ln();
            for f in &feats {
                let count = self.feature_counts[c].get(f).copied().unwrap_or(0) as f64;
                score += ((count + self.alpha) / denom).ln();
            }
            log_scores[c] = score;
        }

        let max = log_scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut probs = [0.0; CLASS_COUNT];
        if max == f64::NEG_INFINITY {
            return probs;
        }
        let mut sum = 0.0;
        for c in 0..CLASS_COUNT {
            probs[c] = (log_scores[c] - max).exp();
            sum += probs[c];
        }
        for p in &mut probs {
            *p /= sum;
        }
        probs
    }

    /// Most probable class and its posterior.
    pub fn predict(&self, text: &str) -> Option<(ResponseType, f64)> {
        let probs = self.posteriors(text);
        let (best, p) = probs
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
        if p <= 0.0 {
            return None;
        }
        ResponseType::from_index(best).map(|rt| (rt, p))
    }

    pub fn to_artifact(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_artifact(artifact: &str) -> EngineResult<Self> {
        let model: NaiveBayesModel = serde_json::from_str(artifact)?;
        model.validate()?;
        Ok(model)
    }
}

/// A model ready to serve, with the metadata of its stored version.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub info: ClassifierModelInfo,
    pub model: NaiveBayesModel,
}

impl LoadedModel {
    pub fn from_stored(stored: &StoredModel) -> EngineResult<Self> {
        Ok(Self {
            info: stored.info.clone(),
            model: NaiveBayesModel::from_artifact(&stored.artifact)?,
        })
    }

    pub fn version(&self) -> i64 {
        self.info.version
    }
}

/// The active-model pointer shared by the request path and the retrain worker.
#[derive(Debug, Default)]
pub struct ModelSlot {
    inner: RwLock<Option<Arc<LoadedModel>>>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the active model; the read lock is held only for the clone.
    pub fn current(&self) -> Option<Arc<LoadedModel>> {
        self.inner.read().clone()
    }

    /// Install `next` and return what it replaced.
    pub fn swap(&self, next: Option<Arc<LoadedModel>>) -> Option<Arc<LoadedModel>> {
        std::mem::replace(&mut *self.inner.write(), next)
    }

    pub fn version(&self) -> Option<i64> {
        self.inner.read().as_ref().map(|m| m.version())
    }
}
