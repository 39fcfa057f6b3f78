use trustmem::{Engine, EngineConfig, LedgerStatus, Precedence, ReplyKind, ResponseType, RetrainOutcome, SlotKind};

use crate::support::{say, session, Parrot};

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trustmem.db");
    let s = session("user-1");

    let mut cfg = EngineConfig::default();
    cfg.learning.retrain_min_corrections = 30;
    cfg.learning.flip_precedence_at = None;

    let trained_version = {
        let e = Engine::open(&path, cfg.clone()).unwrap();
        say(&e, &s, "I work at Acme", &Parrot);
        say(&e, &s, "I work at Globex", &Parrot);

        let labels = [
            ("office detail number {}?", ResponseType::Factual),
            ("elaborate reasoning behind choice {}?", ResponseType::Explanatory),
            ("banter with buddy round {}?", ResponseType::Conversational),
        ];
        for i in 0..45 {
            let (t, actual) = labels[i % 3];
            let r = say(&e, &s, &t.replace("{}", &i.to_string()), &Parrot);
            e.submit_correction(&r.event_id.unwrap(), actual).unwrap();
        }
        let RetrainOutcome::Trained { model } = e.coordinator().maybe_retrain() else {
            panic!("expected training to run");
        };
        e.classifier().set_precedence(Precedence::ModelFirst).unwrap();
        model.version
    };

    let e = Engine::open(&path, cfg).unwrap();
    let records = e.memory().list_slot(&s, SlotKind::Employer).unwrap();
    assert_eq!(records.len(), 2);
    let open = e.ledger().open_entries(&s).unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].status, LedgerStatus::Open);
    assert_eq!(e.ledger().effective_value(&s, SlotKind::Employer).unwrap().as_deref(), Some("globex"));

    assert_eq!(e.coordinator().active_version(), Some(trained_version));
    assert_eq!(e.classifier().precedence(), Precedence::ModelFirst);

    let r = say(&e, &s, "Where do I work?", &Parrot);
    assert_eq!(r.kind, ReplyKind::Answered, "{:?}", r.decision);
    assert!(r.answer.contains("Globex"));
}

#[test]
fn config_file_drives_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("trustmem.toml");
    std::fs::write(&cfg_path, "[gate.factual]\nintent = 0.9\nmemory = 0.9\ngrounding = 0.9\n").unwrap();
    let cfg = EngineConfig::load(&cfg_path).unwrap();

    let e = Engine::open(dir.path().join("db.sqlite"), cfg).unwrap();
    let s = session("user-1");
    say(&e, &s, "I work at Globex", &Parrot);
    let r = say(&e, &s, "Where do I work?", &Parrot);
    assert_eq!(r.kind, ReplyKind::Withheld);
    assert!(!r.gates_passed);
}
