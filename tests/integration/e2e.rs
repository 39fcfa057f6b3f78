use trustmem::{ContradictionSeverity, ContradictionType, Lane, LedgerStatus, ReplyKind, ResponseType, SlotKind};

use crate::support::{engine, say, session, EchoTop, Fixed, Parrot};

#[test]
fn acme_then_globex() {
    let e = engine();
    let s = session("user-1");

    let r = say(&e, &s, "I work at Acme", &Parrot);
    assert_eq!(r.kind, ReplyKind::Stored);
    assert!(r.ledger_entries_touched.is_empty());

    let r = say(&e, &s, "Actually, I work at Globex now.", &Parrot);
    assert_eq!(r.kind, ReplyKind::Stored);
    assert_eq!(r.ledger_entries_touched.len(), 1);

    let entries = e.ledger().entries_for_slot(&s, "employer").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].contradiction_type, ContradictionType::ValueConflict);
    assert_eq!(entries[0].status, LedgerStatus::Open);
    assert_eq!((entries[0].old_value.as_str(), entries[0].new_value.as_str()), ("acme", "globex"));
    assert!(entries[0].confidence >= 0.89);
    assert_eq!(e.ledger().effective_value(&s, SlotKind::Employer).unwrap().as_deref(), Some("globex"));

    let r = say(&e, &s, "Where do I work?", &Parrot);
    assert_eq!(r.kind, ReplyKind::Answered, "{:?}", r.decision);
    assert!(r.gates_passed);
    assert_eq!(r.response_type, Some(ResponseType::Factual));
    assert!(r.answer.contains("Globex"), "answer: {}", r.answer);
    assert_eq!(r.lane, Lane::Belief);
    let disclosure = r.disclosure.expect("open conflict must be disclosed");
    assert!(disclosure.contains("acme") && disclosure.contains("globex"));
    assert_eq!(r.ledger_entries_touched, vec![entries[0].ledger_id.clone()]);
    assert!(r.event_id.is_some());
}

#[test]
fn plain_restatement_of_a_new_employer() {
    let e = engine();
    let s = session("user-1");
    let r = say(&e, &s, "I work at Acme", &Parrot);
    assert_eq!(r.lane, Lane::Belief);
    let r = say(&e, &s, "I work at Globex", &Parrot);
    assert_eq!(r.ledger_entries_touched.len(), 1);

    let entry = e.ledger().get(&s, &r.ledger_entries_touched[0]).unwrap();
    assert_eq!(entry.contradiction_type, ContradictionType::ValueConflict);
    assert_eq!((entry.old_value.as_str(), entry.new_value.as_str()), ("acme", "globex"));
    assert!(entry.is_open());

    let r = say(&e, &s, "Where do I work?", &Parrot);
    assert_eq!(r.kind, ReplyKind::Answered, "{:?}", r.decision);
    assert_eq!(r.response_type, Some(ResponseType::Factual));
    assert_eq!(r.lane, Lane::Belief);
    assert!(r.answer.contains("Globex"), "answer: {}", r.answer);
    let decision = r.decision.expect("answered turns carry a decision");
    assert!(decision.passed && decision.requires_disclosure);
    let ev = e.coordinator().get_event(r.event_id.as_deref().unwrap()).unwrap();
    assert_eq!(ev.contradiction_severity, ContradictionSeverity::Note);
    let disclosure = r.disclosure.expect("open conflict must be disclosed");
    assert!(disclosure.contains("acme") && disclosure.contains("globex"));
}

#[test]
fn stale_value_in_answer_is_blocked() {
    let e = engine();
    let s = session("user-1");
    say(&e, &s, "I work at Acme", &Parrot);
    say(&e, &s, "I work at Globex", &Parrot);

    let r = say(&e, &s, "Where do I work?", &Fixed("You work at Acme."));
    assert_eq!(r.kind, ReplyKind::Withheld);
    assert!(!r.gates_passed);
    assert_eq!(r.lane, Lane::Speech);
    assert!(!r.answer.contains("Acme"));
    assert!(r.disclosure.is_some());
}

#[test]
fn restatement_is_idempotent() {
    let e = engine();
    let s = session("user-1");
    say(&e, &s, "I work at Acme", &Parrot);
    let r = say(&e, &s, "I work at ACME Inc.", &Parrot);
    assert!(r.ledger_entries_touched.is_empty());

    let records = e.memory().list_slot(&s, SlotKind::Employer).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reinforcement_count, 1);
    assert!(e.ledger().entries(&s).unwrap().is_empty());
}

#[test]
fn bare_correction_finds_its_slot() {
    let e = engine();
    let s = session("user-1");
    say(&e, &s, "I live in Lisbon", &Parrot);
    let r = say(&e, &s, "not Lisbon, it's Porto", &Parrot);
    assert_eq!(r.ledger_entries_touched.len(), 1);
    assert_eq!(e.ledger().effective_value(&s, SlotKind::Location).unwrap().as_deref(), Some("porto"));
}

#[test]
fn greeting_goes_straight_to_the_generator() {
    let e = engine();
    let s = session("user-1");
    let r = say(&e, &s, "Hello there!", &Fixed("hello there, nice to see you"));
    assert_eq!(r.kind, ReplyKind::Answered);
    assert_eq!(r.lane, Lane::Belief);
    assert_eq!(r.response_type, Some(ResponseType::Conversational));
    let ev = e.coordinator().get_event(r.event_id.as_deref().unwrap()).unwrap();
    assert_eq!(ev.predicted_response_type, ResponseType::Conversational);
    assert_eq!(ev.grounding_score, 0.0);
}

#[test]
fn empty_memory_gives_insufficient_not_error() {
    let e = engine();
    let s = session("fresh");
    let r = say(&e, &s, "Where do I work?", &Parrot);
    assert_eq!(r.kind, ReplyKind::Insufficient);
    assert!(!r.gates_passed);
    assert_eq!(r.lane, Lane::Speech);
    assert!(r.event_id.is_some());
}

#[test]
fn no_candidate_logs_no_event() {
    let e = engine();
    let s = session("fresh");
    let r = say(&e, &s, "Where do I work?", &EchoTop);
    assert_eq!(r.kind, ReplyKind::NoCandidate);
    assert!(r.event_id.is_none());
    assert_eq!(e.stats(&s).unwrap().gate_events, 0);
}

#[test]
fn synthesis_is_gated_on_citations() {
    let e = engine();
    let s = session("user-1");
    say(&e, &s, "I work at Globex", &Parrot);
    say(&e, &s, "I live in Lisbon", &Parrot);
    say(&e, &s, "My favorite color is teal", &Parrot);

    let q = "Summarize what I told you about my work and where I live";
    let r = say(&e, &s, q, &Fixed("I work at Globex and I live in Lisbon"));
    assert_eq!(r.kind, ReplyKind::Answered, "{:?}", r.decision);

    let r = say(&e, &s, q, &Fixed("I like my work a lot"));
    assert_eq!(r.kind, ReplyKind::Withheld, "{:?}", r.decision);
}

#[test]
fn cross_session_reads_are_rejected() {
    let e = engine();
    let a = session("alice");
    let b = session("bob");
    say(&e, &a, "I work at Acme", &Parrot);
    let id = e.memory().list_all(&a).unwrap()[0].id.clone();

    assert!(matches!(e.memory().get(&b, &id), Err(trustmem::EngineError::CrossSession { .. })));
    let r = say(&e, &b, "Where do I work?", &Parrot);
    assert_eq!(r.kind, ReplyKind::Insufficient);
}

#[test]
fn confirmed_answers_land_on_the_speech_lane() {
    let mut cfg = trustmem::EngineConfig::default();
    cfg.learning.store_confirmed_answers = true;
    let e = trustmem::Engine::in_memory(cfg).unwrap();
    let s = session("user-1");
    say(&e, &s, "I work at Globex", &Parrot);
    let r = say(&e, &s, "Where do I work?", &Fixed("Yes, I work at Globex"));
    assert!(r.gates_passed, "{:?}", r.decision);

    let stats = e.stats(&s).unwrap();
    assert_eq!((stats.belief_records, stats.speech_records), (1, 1));
}
