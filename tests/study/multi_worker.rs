//! Several clients driving one stored study.

use std::sync::Arc;

use optsync::prelude::*;
use optsync::sampler::tpe::N_TRIALS_ATTR;

fn shared(storage: &Arc<dyn Storage>, seed: u64) -> Study {
    Study::builder()
        .study_id("shared")
        .target(Target::minimize("y"))
        .sampler(
            TpeSampler::builder()
                .seed(seed)
                .n_startup_trials(4)
                .build()
                .unwrap(),
        )
        .shared_storage(Arc::clone(storage))
        .load_if_exists(true)
        .build()
        .unwrap()
}

#[test]
fn test_clients_see_each_others_trials() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let mut a = shared(&storage, 1);
    let mut b = shared(&storage, 2);

    for _ in 0..3 {
        for study in [&mut a, &mut b] {
            let mut trial = study.ask().unwrap();
            let x = trial.suggest_float("x", 0.0, 1.0).unwrap();
            study.tell(trial, Ok::<_, Error>(x)).unwrap();
        }
    }

    // Six finished trials from two clients inform the next draw.
    let trial = a.ask().unwrap();
    assert_eq!(trial.system_attrs()[N_TRIALS_ATTR], AttrValue::Int(6));
    assert_eq!(b.trials().unwrap().len(), 7);
}

#[test]
fn test_running_trials_of_other_clients_are_not_claimed() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let mut a = shared(&storage, 1);
    let mut b = shared(&storage, 2);

    let held = a.ask().unwrap();
    let other = b.ask().unwrap();
    assert_ne!(held.id(), other.id());
    b.tell(other, Ok::<_, Error>(1.0)).unwrap();
    a.tell(held, Ok::<_, Error>(2.0)).unwrap();

    let trials = a.trials().unwrap();
    assert_eq!(trials.len(), 2);
    assert!(trials.iter().all(|t| t.state == TrialState::Completed));
}

#[test]
fn test_enqueued_trials_stay_with_their_client() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let a = shared(&storage, 1);
    let mut b = shared(&storage, 2);

    let queued = a
        .enqueue_trial(std::collections::BTreeMap::from([(
            "x".to_owned(),
            ParameterValue::from(0.5),
        )]))
        .unwrap();

    let trial = b.ask().unwrap();
    assert_ne!(trial.id(), queued);
}

#[test]
fn test_incompatible_distributions_surface_on_ask() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let mut a = shared(&storage, 1);
    let mut b = shared(&storage, 2);

    let mut trial = a.ask().unwrap();
    trial.suggest_float("x", 0.0, 1.0).unwrap();
    a.tell(trial, Ok::<_, Error>(0.0)).unwrap();

    let mut trial = b.ask().unwrap();
    trial.suggest_int("x", 0, 10).unwrap();
    b.tell(trial, Ok::<_, Error>(0.0)).unwrap();

    assert!(matches!(
        a.ask(),
        Err(Error::IncompatibleSearchSpace { .. })
    ));
}
