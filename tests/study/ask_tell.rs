use optsync::prelude::*;
use optsync::{FAIL_REASON_ATTR, TrialPruned};

fn study() -> Study {
    Study::builder()
        .target(Target::minimize("y"))
        .sampler(RandomSampler::with_seed(42))
        .build()
        .unwrap()
}

#[test]
fn test_ask_and_tell_basic() {
    let mut study = study();

    for _ in 0..10 {
        let mut trial = study.ask().unwrap();
        let x = trial.suggest_float("x", 0.0, 10.0).unwrap();
        study.tell(trial, Ok::<_, Error>(x * x)).unwrap();
    }

    let trials = study.trials().unwrap();
    assert_eq!(trials.len(), 10);
    assert!(trials.iter().all(|t| t.state == TrialState::Completed));
    assert!(study.best_trial().unwrap().values[0].valid().unwrap() >= 0.0);
}

#[test]
fn test_asked_trial_is_running_in_storage() {
    let mut study = study();
    let trial = study.ask().unwrap();

    let stored = study.trials().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].trial_id, trial.id());
    assert_eq!(stored[0].state, TrialState::Running);
    assert_eq!(stored[0].worker_id.client_id, study.client_id());
}

#[test]
fn test_tell_with_failures_records_reason() {
    let mut study = study();

    for i in 0..10 {
        let mut trial = study.ask().unwrap();
        let x = trial.suggest_float("x", -5.0, 5.0).unwrap();
        if i % 2 == 0 {
            study.tell(trial, Ok::<_, &str>(x * x)).unwrap();
        } else {
            let record = study
                .tell(trial, Err::<f64, _>("simulated failure"))
                .unwrap();
            assert_eq!(record.state, TrialState::Failed);
        }
    }

    let trials = study.trials().unwrap();
    let failed: Vec<_> = trials
        .iter()
        .filter(|t| t.state == TrialState::Failed)
        .collect();
    assert_eq!(failed.len(), 5);
    for trial in failed {
        assert_eq!(
            trial.system_attrs[FAIL_REASON_ATTR],
            AttrValue::String("simulated failure".into())
        );
        assert!(trial.values.is_empty());
    }
}

#[test]
fn test_tell_pruned() {
    let mut study = study();
    let trial = study.ask().unwrap();
    let record = study.tell(trial, Err::<f64, _>(TrialPruned)).unwrap();
    assert_eq!(record.state, TrialState::Pruned);

    let trial = study.ask().unwrap();
    let record = study
        .tell(trial, Err::<f64, Error>(Error::TrialPruned))
        .unwrap();
    assert_eq!(record.state, TrialState::Pruned);
}

#[test]
fn test_tell_infers_state_from_values() {
    let mut study = study();

    let trial = study.ask().unwrap();
    let record = study.tell(trial, Ok::<_, Error>(f64::NAN)).unwrap();
    assert_eq!(record.state, TrialState::PartiallyFailed);
    assert_eq!(record.values[0].status, ObjectiveStatus::Nan);

    let trial = study.ask().unwrap();
    let record = study.tell(trial, Ok::<_, Error>(f64::INFINITY)).unwrap();
    assert_eq!(record.state, TrialState::PartiallyFailed);

    let trial = study.ask().unwrap();
    let skipped = ObjectiveValue::with_status(ObjectiveStatus::Skipped);
    let record = study.tell(trial, Ok::<_, Error>(skipped)).unwrap();
    assert_eq!(record.state, TrialState::PartiallyCompleted);

    let trial = study.ask().unwrap();
    let unknown = ObjectiveValue::with_status(ObjectiveStatus::Unknown);
    let record = study.tell(trial, Ok::<_, Error>(unknown)).unwrap();
    assert_eq!(record.state, TrialState::Unknown);
}

#[test]
fn test_tell_dimension_mismatch_fails_trial() {
    let mut study = study();
    let trial = study.ask().unwrap();
    let id = trial.id().to_owned();

    let err = study
        .tell(trial, Ok::<_, Error>(vec![1.0, 2.0]))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ObjectiveDimensionMismatch {
            expected: 1,
            got: 2
        }
    ));

    let stored = study
        .trials()
        .unwrap()
        .into_iter()
        .find(|t| t.trial_id == id)
        .unwrap();
    assert_eq!(stored.state, TrialState::Failed);
}

#[test]
fn test_user_attrs_persist() {
    let mut study = study();
    let mut trial = study.ask().unwrap();
    trial.set_user_attr("epochs", 12_i64);
    trial.set_user_attr("note", "baseline");
    study.tell(trial, Ok::<_, Error>(0.5)).unwrap();

    let stored = &study.trials().unwrap()[0];
    assert_eq!(stored.user_attrs["epochs"], AttrValue::Int(12));
    assert_eq!(stored.user_attrs["note"], AttrValue::String("baseline".into()));
}

#[test]
fn test_multi_target_best_trials() {
    let mut study = Study::builder()
        .targets([Target::minimize("loss"), Target::maximize("speed")])
        .build()
        .unwrap();

    for (loss, speed) in [(1.0, 1.0), (2.0, 3.0), (3.0, 2.0), (0.5, 0.5)] {
        let trial = study.ask().unwrap();
        study.tell(trial, Ok::<_, Error>([loss, speed])).unwrap();
    }

    let mut front: Vec<(f64, f64)> = study
        .best_trials()
        .unwrap()
        .iter()
        .map(|t| {
            let v = t.valid_values().unwrap();
            (v[0], v[1])
        })
        .collect();
    front.sort_by(|a, b| a.0.total_cmp(&b.0));
    assert_eq!(front, vec![(0.5, 0.5), (1.0, 1.0), (2.0, 3.0)]);
    assert!(matches!(study.best_trial(), Err(Error::InvalidConfig(_))));
}

#[test]
fn test_best_trial_without_completed_trials() {
    let mut study = study();
    let trial = study.ask().unwrap();
    study.tell(trial, Err::<f64, _>("boom")).unwrap();
    assert!(matches!(study.best_trial(), Err(Error::NoCompletedTrials)));
}
