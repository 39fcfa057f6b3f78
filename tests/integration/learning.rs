use std::time::Duration;

use trustmem::{
    Engine, EngineConfig, EngineError, Precedence, PredictionSource, ResponseType, RetrainOutcome, SessionId,
};

use crate::support::{say, session, Parrot};

const TEMPLATES: [(&str, ResponseType); 3] = [
    ("office detail number {}?", ResponseType::Factual),
    ("elaborate reasoning behind choice {}?", ResponseType::Explanatory),
    ("banter with buddy round {}?", ResponseType::Conversational),
];

fn small_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.learning.retrain_min_corrections = 30;
    cfg.learning.flip_precedence_at = Some(60);
    cfg
}

/// Ask `n` template queries and label each one.
fn ask_and_correct(e: &Engine, s: &SessionId, start: usize, n: usize) {
    for i in start..start + n {
        let (t, actual) = TEMPLATES[i % 3];
        let r = say(e, s, &t.replace("{}", &i.to_string()), &Parrot);
        let id = r.event_id.expect("every answered query is logged");
        e.submit_correction(&id, actual).unwrap();
    }
}

#[test]
fn corrections_train_and_serve_a_model() {
    let e = Engine::in_memory(small_config()).unwrap();
    let s = session("op");
    ask_and_correct(&e, &s, 0, 20);
    assert!(matches!(e.coordinator().maybe_retrain(), RetrainOutcome::Skipped { .. }));

    ask_and_correct(&e, &s, 20, 25);
    let RetrainOutcome::Trained { model } = e.coordinator().maybe_retrain() else {
        panic!("expected training to run");
    };
    assert!(model.is_active);
    assert!(model.held_out_accuracy >= 0.8);

    let p = e.classifier().classify("office detail number 9999?");
    assert_eq!(p.response_type, ResponseType::Factual);
    assert_eq!(p.source, PredictionSource::Model { version: model.version });

    let stats = e.stats(&s).unwrap();
    assert_eq!(stats.corrections, 45);
    assert_eq!(stats.active_model, Some(model.version));
}

#[test]
fn duplicate_correction_is_rejected() {
    let e = Engine::in_memory(small_config()).unwrap();
    let s = session("op");
    let r = say(&e, &s, "office detail number 1?", &Parrot);
    let id = r.event_id.unwrap();
    e.submit_correction(&id, ResponseType::Factual).unwrap();
    assert!(matches!(
        e.submit_correction(&id, ResponseType::Explanatory),
        Err(EngineError::AlreadyCorrected(_))
    ));
    assert!(matches!(
        e.submit_correction("missing", ResponseType::Factual),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn enough_corrections_flip_precedence() {
    let mut cfg = small_config();
    cfg.learning.flip_precedence_at = Some(45);
    cfg.learning.flip_min_accuracy = 0.8;
    let e = Engine::in_memory(cfg).unwrap();
    let s = session("op");
    assert_eq!(e.classifier().precedence(), Precedence::RulesFirst);

    ask_and_correct(&e, &s, 0, 45);
    let outcome = e.coordinator().maybe_retrain();
    assert!(matches!(outcome, RetrainOutcome::Trained { .. }), "{outcome:?}");
    assert_eq!(e.classifier().precedence(), Precedence::ModelFirst);
    assert_eq!(e.stats(&s).unwrap().precedence, Precedence::ModelFirst);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idle_scheduler_retrains_in_the_background() {
    let mut cfg = small_config();
    cfg.scheduler.tick_ms = 10;
    cfg.scheduler.idle_after_ms = 20;
    let e = Engine::in_memory(cfg).unwrap();
    let s = session("op");
    ask_and_correct(&e, &s, 0, 45);

    let handle = e.start_scheduler().unwrap();
    let mut waited = 0;
    while e.coordinator().active_version().is_none() && waited < 3_000 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += 20;
    }
    handle.shutdown().await;
    assert!(e.coordinator().active_version().is_some(), "no model after {waited}ms");
    assert_eq!(e.coordinator().list_models().unwrap().len(), 1);
}
