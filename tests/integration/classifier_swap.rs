use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use trustmem::engine::classifier::{Classifier, LoadedModel, ModelSlot, NaiveBayesModel};
use trustmem::engine::config::ClassifierConfig;
use trustmem::{ClassifierModelInfo, PredictionSource, ResponseType};

fn model(version: i64, label: ResponseType) -> Arc<LoadedModel> {
    let other = if label == ResponseType::Factual { ResponseType::Explanatory } else { ResponseType::Factual };
    let model = NaiveBayesModel::train(
        vec![
            ("banana split recipe", label),
            ("banana bread please", label),
            ("banana smoothie idea", label),
            ("zebra", other),
        ],
        1.0,
    );
    Arc::new(LoadedModel {
        info: ClassifierModelInfo {
            version,
            trained_at: Utc::now(),
            training_example_count: 4,
            held_out_accuracy: 0.9,
            trained_through_seq: version,
            is_active: true,
        },
        model,
    })
}

#[test]
fn readers_always_see_a_whole_model() {
    let slot = Arc::new(ModelSlot::new());
    slot.swap(Some(model(1, ResponseType::Factual)));
    let classifier = Arc::new(Classifier::new(slot.clone(), &ClassifierConfig::default()));
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let c = classifier.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut seen = 0usize;
                loop {
                    let p = c.classify("banana split");
                    // Version and label always come from the same model.
                    match p.source {
                        PredictionSource::Model { version: 1 } => assert_eq!(p.response_type, ResponseType::Factual),
                        PredictionSource::Model { version: 2 } => {
                            assert_eq!(p.response_type, ResponseType::Explanatory)
                        }
                        other => panic!("unexpected source {other:?}"),
                    }
                    seen += 1;
                    if stop.load(Ordering::Relaxed) {
                        break seen;
                    }
                }
            })
        })
        .collect();

    for i in 0..200 {
        let next = if i % 2 == 0 { model(2, ResponseType::Explanatory) } else { model(1, ResponseType::Factual) };
        let prev = slot.swap(Some(next));
        assert!(prev.is_some());
    }
    stop.store(true, Ordering::Relaxed);
    for r in readers {
        assert!(r.join().unwrap() > 0);
    }
}

#[test]
fn in_flight_reference_survives_a_swap() {
    let slot = ModelSlot::new();
    slot.swap(Some(model(1, ResponseType::Factual)));
    let held = slot.current().unwrap();
    slot.swap(Some(model(2, ResponseType::Explanatory)));
    assert_eq!(held.version(), 1);
    assert_eq!(held.model.predict("banana split").map(|p| p.0), Some(ResponseType::Factual));
    assert_eq!(slot.version(), Some(2));
}
