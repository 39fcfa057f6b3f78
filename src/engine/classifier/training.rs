// ── Classifier training pipeline ────────────────────────────────────────────
//
// corrected events → deterministic hash split → Naive Bayes → held-out accuracy
//
// The split hashes the query text (SHA-256), so the same query always lands
// on the same side and repeated queries never leak across the split.
// Degenerate sets are rejected before training: no examples, a single class,
// or a split that leaves either side empty.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::gate_types::ResponseType;
use crate::engine::classifier::model::NaiveBayesModel;
use crate::engine::sessions::CorrectedExample;
use crate::engine::text::normalize_text;

/// A trained, evaluated candidate. Not yet persisted or active.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: NaiveBayesModel,
    pub held_out_accuracy: f64,
    pub training_example_count: usize,
    pub held_out_count: usize,
    /// Highest event sequence included in the snapshot.
    pub trained_through_seq: i64,
}

/// Bucket in [0, 100) for a query.
pub fn split_bucket(query: &str) -> u8 {
    let digest = Sha256::digest(normalize_text(query).as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % 100) as u8
}

/// Partition examples into (train, held_out).
pub fn split(
    examples: &[CorrectedExample],
    held_out_percent: u8,
) -> (Vec<&CorrectedExample>, Vec<&CorrectedExample>) {
    examples.iter().partition(|e| split_bucket(&e.query_text) >= held_out_percent)
}

fn class_count(examples: &[&CorrectedExample]) -> usize {
    examples.iter().map(|e| e.actual).collect::<HashSet<ResponseType>>().len()
}

/// Fraction of `examples` the model labels correctly.
pub fn accuracy(model: &NaiveBayesModel, examples: &[&CorrectedExample]) -> f64 {
    if examples.is_empty() {
        return 0.0;
    }
    let correct = examples
        .iter()
        .filter(|e| model.predict(&e.query_text).map(|(rt, _)| rt) == Some(e.actual))
        .count();
    correct as f64 / examples.len() as f64
}

/// Train on one consistent snapshot of corrected events.
pub fn train_and_evaluate(
    examples: &[CorrectedExample],
    held_out_percent: u8,
    alpha: f64,
) -> EngineResult<TrainedModel> {
    if examples.is_empty() {
        return Err(EngineError::training("no corrected examples"));
    }
    let (train, held_out) = split(examples, held_out_percent);
    if train.is_empty() || held_out.is_empty() {
        return Err(EngineError::training(format!(
            "empty split: {} train / {} held-out",
            train.len(),
            held_out.len()
        )));
    }
    if class_count(&train) < 2 {
        return Err(EngineError::training("training split has a single class"));
    }

    let model = NaiveBayesModel::train(train.iter().map(|e| (e.query_text.as_str(), e.actual)), alpha);
    let held_out_accuracy = accuracy(&model, &held_out);

    Ok(TrainedModel {
        model,
        held_out_accuracy,
        training_example_count: train.len(),
        held_out_count: held_out.len(),
        trained_through_seq: examples.iter().map(|e| e.seq).max().unwrap_or(0),
    })
}
