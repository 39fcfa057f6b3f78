use trustmem::{ContradictionType, EngineError, LedgerStatus, ReplyKind, SlotKind};

use crate::support::{engine, say, session, Parrot};

#[test]
fn denial_then_retraction() {
    let e = engine();
    let s = session("user-1");
    say(&e, &s, "I work at Acme", &Parrot);
    let acme = e.memory().list_slot(&s, SlotKind::Employer).unwrap()[0].clone();

    let r = say(&e, &s, "I don't work at Acme", &Parrot);
    assert_eq!(r.ledger_entries_touched.len(), 1);
    let denial = e.ledger().get(&s, &r.ledger_entries_touched[0]).unwrap();
    assert_eq!(denial.contradiction_type, ContradictionType::Denial);
    assert_eq!(denial.old_memory_id, acme.id);
    assert_eq!(e.ledger().trust_factors(&s).unwrap().get(&acme.id).copied(), Some(0.15));
    assert_eq!(e.ledger().effective_value(&s, SlotKind::Employer).unwrap(), None);

    let r = say(&e, &s, "I work at Acme", &Parrot);
    assert_eq!(r.kind, ReplyKind::Stored);
    assert_eq!(r.ledger_entries_touched.len(), 2);

    let entries = e.ledger().entries_for_slot(&s, "employer").unwrap();
    let closed = entries.iter().find(|x| x.ledger_id == denial.ledger_id).unwrap();
    assert_eq!(closed.status, LedgerStatus::Resolved);
    assert_eq!(closed.resolution_method.as_deref(), Some("retracted"));
    let retractions: Vec<_> = entries
        .iter()
        .filter(|x| x.contradiction_type == ContradictionType::RetractionOfDenial)
        .collect();
    assert_eq!(retractions.len(), 1);

    // The original record was reinforced; no third value appeared.
    let records = e.memory().list_slot(&s, SlotKind::Employer).unwrap();
    assert_eq!(records.len(), 2);
    let restored = e.memory().get(&s, &acme.id).unwrap();
    assert_eq!(restored.reinforcement_count, 1);
    assert!(!e.ledger().trust_factors(&s).unwrap().contains_key(&acme.id));
    assert_eq!(e.ledger().effective_value(&s, SlotKind::Employer).unwrap().as_deref(), Some("acme"));
}

#[test]
fn resolution_demotes_the_loser_until_reaffirmed() {
    let e = engine();
    let s = session("user-1");
    say(&e, &s, "I work at Acme", &Parrot);
    let r = say(&e, &s, "I work at Globex", &Parrot);
    let id = r.ledger_entries_touched[0].clone();
    let acme = e.memory().list_slot(&s, SlotKind::Employer).unwrap()[0].id.clone();

    let resolved = e.ledger().resolve(&s, &id, Some("globex"), "user_confirmed").unwrap();
    assert_eq!(resolved.status, LedgerStatus::Resolved);
    assert_eq!(e.ledger().trust_factors(&s).unwrap().get(&acme).copied(), Some(0.6));

    // Terminal entries never move again; only the audit note may change.
    assert!(matches!(e.ledger().dismiss(&s, &id), Err(EngineError::InvalidTransition { .. })));
    let noted = e.ledger().annotate(&s, &id, "confirmed by phone").unwrap();
    assert_eq!(noted.audit_note.as_deref(), Some("confirmed by phone"));
    assert_eq!(noted.status, LedgerStatus::Resolved);

    std::thread::sleep(std::time::Duration::from_millis(5));
    say(&e, &s, "I work at Acme", &Parrot);
    assert!(!e.ledger().trust_factors(&s).unwrap().contains_key(&acme));
    assert_eq!(e.ledger().effective_value(&s, SlotKind::Employer).unwrap().as_deref(), Some("acme"));
}

#[test]
fn mixed_feelings_are_disclosed_not_resolved() {
    let e = engine();
    let s = session("user-1");
    say(&e, &s, "I love my job", &Parrot);
    let r = say(&e, &s, "I hate my job", &Parrot);
    assert_eq!(r.ledger_entries_touched.len(), 1);
    let entry = e.ledger().get(&s, &r.ledger_entries_touched[0]).unwrap();
    assert_eq!(entry.contradiction_type, ContradictionType::SentimentConflict);
    assert_eq!(entry.slot, "topic:work");

    let r = say(&e, &s, "How do I feel about my job?", &Parrot);
    assert!(r.gates_passed, "{:?}", r.decision);
    assert!(r.disclosure.unwrap().contains("mixed feelings about work"));
    assert_eq!(e.ledger().open_entries(&s).unwrap().len(), 1);
}

#[test]
fn dismissal_leaves_trust_alone() {
    let e = engine();
    let s = session("user-1");
    say(&e, &s, "I live in Lisbon", &Parrot);
    let r = say(&e, &s, "I live in Porto", &Parrot);
    let id = r.ledger_entries_touched[0].clone();
    let dismissed = e.ledger().dismiss(&s, &id).unwrap();
    assert_eq!(dismissed.status, LedgerStatus::Dismissed);
    assert!(e.ledger().trust_factors(&s).unwrap().is_empty());
    assert!(e.ledger().open_entries(&s).unwrap().is_empty());
}
