// ── trustmem: Trust Decay & Recency ─────────────────────────────────────────
//
// Trust is never stored in its decayed form. `trust_initial` is written once,
// and the current value is derived at read time from the time elapsed since
// the last reinforcement:
//
//   trust(t) = trust_initial · exp(-λ_lane · Δt_days),  λ = ln 2 / half_life
//
// So trust is non-increasing between reinforcements, and a reinforcement only
// moves the clock, never the baseline.

use chrono::{DateTime, Utc};

use crate::atoms::types::MemoryRecord;
use crate::engine::config::{RetrievalConfig, TrustConfig};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Days from `from` to `to`, clamped at zero (clock skew never raises trust).
pub fn elapsed_days(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let secs = (to - from).num_milliseconds() as f64 / 1000.0;
    (secs / SECONDS_PER_DAY).max(0.0)
}

/// Decayed trust of a record at `now`.
pub fn current_trust(record: &MemoryRecord, now: DateTime<Utc>, cfg: &TrustConfig) -> f64 {
    let dt = elapsed_days(record.last_reinforced_at, now);
    (record.trust_initial * (-cfg.lambda(record.lane) * dt).exp()).clamp(0.0, 1.0)
}

/// Recency multiplier in [floor, 1]: 1 right after reinforcement, halving its
/// distance to the floor every `recency_half_life_days`.
pub fn recency_weight(record: &MemoryRecord, now: DateTime<Utc>, cfg: &RetrievalConfig) -> f64 {
    let dt = elapsed_days(record.last_reinforced_at, now);
    let decay = (-std::f64::consts::LN_2 * dt / cfg.recency_half_life_days).exp();
    cfg.recency_floor + (1.0 - cfg.recency_floor) * decay
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::{Lane, MemorySource, Sentiment, SessionId};
    use chrono::Duration;

    fn record(lane: Lane, trust: f64, reinforced: DateTime<Utc>) -> MemoryRecord {
        MemoryRecord {
            id: "m".into(),
            session_id: SessionId::new("s"),
            text: "t".into(),
            vector: vec![1.0],
            lane,
            trust_initial: trust,
            confidence: 1.0,
            slot: None,
            topic: None,
            sentiment: Sentiment::Neutral,
            source: MemorySource::User,
            created_at: reinforced,
            last_reinforced_at: reinforced,
            reinforcement_count: 0,
            seq: 1,
        }
    }

    #[test]
    fn trust_is_non_increasing_without_reinforcement() {
        let cfg = TrustConfig::default();
        let t0 = Utc::now();
        let rec = record(Lane::Belief, 0.9, t0);
        let mut last = current_trust(&rec, t0, &cfg);
        assert!((last - 0.9).abs() < 1e-9);
        for day in 1..400 {
            let now = t0 + Duration::days(day);
            let t = current_trust(&rec, now, &cfg);
            assert!(t <= last);
            last = t;
        }
    }

    #[test]
    fn belief_decays_slower_than_speech() {
        let cfg = TrustConfig::default();
        let t0 = Utc::now();
        let later = t0 + Duration::days(14);
        let belief = current_trust(&record(Lane::Belief, 0.6, t0), later, &cfg);
        let speech = current_trust(&record(Lane::Speech, 0.6, t0), later, &cfg);
        assert!(belief > speech);
        // Two speech half-lives.
        assert!((speech - 0.15).abs() < 1e-6);
    }

    #[test]
    fn future_timestamps_do_not_inflate_trust() {
        let cfg = TrustConfig::default();
        let now = Utc::now();
        let rec = record(Lane::Belief, 0.9, now + Duration::days(5));
        assert!((current_trust(&rec, now, &cfg) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn recency_weight_stays_within_floor_and_one() {
        let cfg = RetrievalConfig::default();
        let t0 = Utc::now();
        let rec = record(Lane::Belief, 0.9, t0);
        assert!((recency_weight(&rec, t0, &cfg) - 1.0).abs() < 1e-9);
        let month = recency_weight(&rec, t0 + Duration::days(30), &cfg);
        assert!((month - 0.75).abs() < 1e-6);
        let ancient = recency_weight(&rec, t0 + Duration::days(3650), &cfg);
        assert!(ancient >= cfg.recency_floor);
    }
}
