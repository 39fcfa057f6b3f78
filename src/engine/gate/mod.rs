// trustmem Engine — Gradient Gate Evaluator
//
// Decides whether a candidate answer may be released. Thresholds depend on
// the response type: a factual lookup must be well grounded, small talk
// needs no grounding at all.
//
//   blocking contradiction → fail, regardless of scores
//   intent  ≥ row.intent
//   memory  ≥ row.memory      (synthesis: citation coverage ≥ min instead)
//   grounding ≥ row.grounding
//   note severity          → pass with requires_disclosure
//
// The first failing check is the reported reason.

pub mod grounding;

use log::debug;

use crate::atoms::gate_types::{ContradictionSeverity, GateDecision, GateReason, ResponseType};
use crate::engine::config::GateThresholds;

pub use grounding::{alignment, citation_coverage, grounding_score};

/// Scores fed to one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GateScores {
    pub intent_alignment: f64,
    pub memory_alignment: f64,
    pub grounding_score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct GateEvaluator {
    thresholds: GateThresholds,
}

impl GateEvaluator {
    pub fn new(thresholds: GateThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &GateThresholds {
        &self.thresholds
    }

    pub fn evaluate(
        &self,
        response_type: ResponseType,
        intent_alignment: f64,
        memory_alignment: f64,
        grounding_score: f64,
        severity: ContradictionSeverity,
    ) -> GateDecision {
        let row = self.thresholds.row(response_type);
        let failure = check(intent_alignment, row.intent, |score, threshold| {
            GateReason::IntentBelowThreshold { score, threshold }
        })
        .or_else(|| {
            check(memory_alignment, row.memory, |score, threshold| {
                GateReason::MemoryBelowThreshold { score, threshold }
            })
        })
        .or_else(|| {
            check(grounding_score, row.grounding, |score, threshold| {
                GateReason::GroundingBelowThreshold { score, threshold }
            })
        });
        let decision = decide(severity, failure);
        debug!(
            "[trustmem:gate] {} intent={:.3} memory={:.3} grounding={:.3} severity={} → {}",
            response_type,
            intent_alignment,
            memory_alignment,
            grounding_score,
            severity.as_str(),
            decision.reason
        );
        decision
    }

    pub fn evaluate_scores(
        &self,
        response_type: ResponseType,
        scores: GateScores,
        severity: ContradictionSeverity,
    ) -> GateDecision {
        self.evaluate(
            response_type,
            scores.intent_alignment,
            scores.memory_alignment,
            scores.grounding_score,
            severity,
        )
    }

    /// Aggregation answers are judged on citation coverage instead of memory
    /// alignment and grounding.
    pub fn evaluate_synthesis(
        &self,
        response_type: ResponseType,
        intent_alignment: f64,
        citation_coverage: f64,
        severity: ContradictionSeverity,
    ) -> GateDecision {
        let row = self.thresholds.row(response_type);
        let failure = check(intent_alignment, row.intent, |score, threshold| {
            GateReason::IntentBelowThreshold { score, threshold }
        })
        .or_else(|| {
            check(citation_coverage, self.thresholds.min_citation_coverage, |score, threshold| {
                GateReason::CitationBelowThreshold { score, threshold }
            })
        });
        let decision = decide(severity, failure);
        debug!(
            "[trustmem:gate] synthesis/{} intent={:.3} coverage={:.3} severity={} → {}",
            response_type,
            intent_alignment,
            citation_coverage,
            severity.as_str(),
            decision.reason
        );
        decision
    }
}

fn check(score: f64, threshold: f64, reason: impl FnOnce(f64, f64) -> GateReason) -> Option<GateReason> {
    (score < threshold).then(|| reason(score, threshold))
}

fn decide(severity: ContradictionSeverity, failure: Option<GateReason>) -> GateDecision {
    if severity == ContradictionSeverity::Blocking {
        return GateDecision {
            passed: false,
            reason: GateReason::BlockingContradiction,
            requires_disclosure: false,
        };
    }
    match failure {
        Some(reason) => GateDecision { passed: false, reason, requires_disclosure: false },
        None => GateDecision {
            passed: true,
            reason: GateReason::Passed,
            requires_disclosure: severity == ContradictionSeverity::Note,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> GateEvaluator {
        GateEvaluator::default()
    }

    #[test]
    fn threshold_table_rows() {
        let g = gate();
        // Exactly at threshold passes.
        assert!(g.evaluate(ResponseType::Factual, 0.35, 0.35, 0.40, ContradictionSeverity::None).passed);
        assert!(g.evaluate(ResponseType::Explanatory, 0.40, 0.25, 0.25, ContradictionSeverity::None).passed);
        assert!(g.evaluate(ResponseType::Conversational, 0.30, 0.20, 0.0, ContradictionSeverity::None).passed);

        // Scores that pass explanatory fail factual on grounding.
        let d = g.evaluate(ResponseType::Factual, 0.5, 0.5, 0.3, ContradictionSeverity::None);
        assert!(!d.passed);
        assert_eq!(d.reason, GateReason::GroundingBelowThreshold { score: 0.3, threshold: 0.40 });
        assert!(g.evaluate(ResponseType::Explanatory, 0.5, 0.5, 0.3, ContradictionSeverity::None).passed);
    }

    #[test]
    fn first_failing_check_is_reported() {
        let d = gate().evaluate(ResponseType::Factual, 0.1, 0.1, 0.1, ContradictionSeverity::None);
        assert!(matches!(d.reason, GateReason::IntentBelowThreshold { .. }));
        let d = gate().evaluate(ResponseType::Factual, 0.9, 0.1, 0.1, ContradictionSeverity::None);
        assert!(matches!(d.reason, GateReason::MemoryBelowThreshold { .. }));
    }

    #[test]
    fn blocking_dominates_every_score() {
        for rt in ResponseType::ALL {
            let d = gate().evaluate(rt, 1.0, 1.0, 1.0, ContradictionSeverity::Blocking);
            assert!(!d.passed);
            assert_eq!(d.reason, GateReason::BlockingContradiction);
            let d = gate().evaluate_synthesis(rt, 1.0, 1.0, ContradictionSeverity::Blocking);
            assert!(!d.passed);
        }
    }

    #[test]
    fn note_passes_with_disclosure() {
        let d = gate().evaluate(ResponseType::Factual, 0.9, 0.9, 0.9, ContradictionSeverity::Note);
        assert!(d.passed && d.requires_disclosure);
        let d = gate().evaluate(ResponseType::Factual, 0.9, 0.9, 0.1, ContradictionSeverity::Note);
        assert!(!d.passed && !d.requires_disclosure);
    }

    #[test]
    fn synthesis_uses_citation_coverage() {
        let g = gate();
        assert!(g.evaluate_synthesis(ResponseType::Factual, 0.5, 0.5, ContradictionSeverity::None).passed);
        let d = g.evaluate_synthesis(ResponseType::Factual, 0.5, 0.25, ContradictionSeverity::None);
        assert_eq!(d.reason, GateReason::CitationBelowThreshold { score: 0.25, threshold: 0.5 });
    }

    #[test]
    fn custom_thresholds_apply() {
        let mut t = GateThresholds::default();
        t.factual.grounding = 0.1;
        let g = GateEvaluator::new(t);
        assert!(g.evaluate_scores(
            ResponseType::Factual,
            GateScores { intent_alignment: 0.5, memory_alignment: 0.5, grounding_score: 0.2 },
            ContradictionSeverity::None,
        )
        .passed);
    }
}
