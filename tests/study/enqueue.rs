use core::sync::atomic::{AtomicBool, Ordering};
use std::collections::BTreeMap;
use std::sync::Arc;

use optsync::prelude::*;
use optsync::{StudyInfo, Timestamp};

/// Memory storage that can be told to refuse the next trial write.
#[derive(Clone, Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    fail_next_write: Arc<AtomicBool>,
}

impl StorageClient for FlakyStorage {
    fn get_current_timestamp(&self) -> Result<Option<Timestamp>> {
        self.inner.get_current_timestamp()
    }

    fn get_studies(&self, since: Option<Timestamp>) -> Result<Vec<StudyInfo>> {
        self.inner.get_studies(since)
    }

    fn get_trials(
        &self,
        study_id: Option<&str>,
        since: Option<Timestamp>,
    ) -> Result<Vec<TrialRecord>> {
        self.inner.get_trials(study_id, since)
    }

    fn get_trial(&self, trial_id: &str, study_id: Option<&str>) -> Result<TrialRecord> {
        self.inner.get_trial(trial_id, study_id)
    }

    fn write_study(&self, study: &StudyInfo) -> Result<()> {
        self.inner.write_study(study)
    }

    fn write_trial(&self, trial: &TrialRecord) -> Result<()> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(Error::Internal("write refused"));
        }
        self.inner.write_trial(trial)
    }
}

impl Storage for FlakyStorage {
    fn create_client(&self, _thread_id: u32) -> Result<Box<dyn StorageClient>> {
        Ok(Box::new(self.clone()))
    }
}

fn study() -> Study {
    Study::builder()
        .target(Target::minimize("y"))
        .sampler(RandomSampler::with_seed(1))
        .build()
        .unwrap()
}

#[test]
fn test_enqueued_trial_is_asked_first() {
    let mut study = study();
    let id = study
        .enqueue_trial(BTreeMap::from([
            ("x".to_owned(), ParameterValue::from(0.25)),
            ("act".to_owned(), ParameterValue::from("relu")),
        ]))
        .unwrap();
    assert_eq!(study.trials().unwrap()[0].state, TrialState::Waiting);

    let mut trial = study.ask().unwrap();
    assert_eq!(trial.id(), id);
    assert_eq!(trial.suggest_float("x", 0.0, 1.0).unwrap(), 0.25);
    assert_eq!(
        trial.suggest_categorical("act", ["relu", "tanh"]).unwrap(),
        ParameterValue::from("relu")
    );
    // Parameters not enqueued are sampled.
    let n = trial.suggest_int("n", 1, 5).unwrap();
    assert!((1..=5).contains(&n));
    study.tell(trial, Ok::<_, Error>(1.0)).unwrap();

    let next = study.ask().unwrap();
    assert_ne!(next.id(), id);
}

#[test]
fn test_enqueued_value_outside_range_is_kept() {
    let mut study = study();
    study
        .enqueue_trial(BTreeMap::from([("x".to_owned(), ParameterValue::from(5.0))]))
        .unwrap();

    let mut trial = study.ask().unwrap();
    assert_eq!(trial.suggest_float("x", 0.0, 1.0).unwrap(), 5.0);
    assert!(trial.params()["x"].distribution.is_none());
}

#[test]
fn test_enqueued_trials_run_in_optimize() {
    let mut study = study();
    for x in [0.1, 0.2, 0.3] {
        study
            .enqueue_trial(BTreeMap::from([("x".to_owned(), ParameterValue::from(x))]))
            .unwrap();
    }

    study
        .optimize(
            |trial: &mut Trial| {
                let x = trial.suggest_float("x", 0.0, 1.0)?;
                Ok::<_, Error>(x)
            },
            OptimizeOptions::new().n_trials(3),
        )
        .unwrap();

    let mut xs: Vec<f64> = study
        .trials()
        .unwrap()
        .iter()
        .map(|t| {
            assert_eq!(t.state, TrialState::Completed);
            t.value("x").unwrap().as_double().unwrap()
        })
        .collect();
    xs.sort_by(f64::total_cmp);
    assert_eq!(xs, vec![0.1, 0.2, 0.3]);
}

#[test]
fn test_enqueued_trials_spread_over_parallel_workers() {
    let mut study = study();
    for i in 0..8 {
        study
            .enqueue_trial(BTreeMap::from([
                ("n".to_owned(), ParameterValue::from(i64::from(i))),
                ("tag".to_owned(), ParameterValue::from("queued")),
            ]))
            .unwrap();
    }

    study
        .optimize(
            |trial: &mut Trial| {
                let n = trial.suggest_int("n", 0, 100)?;
                std::thread::sleep(std::time::Duration::from_millis(5));
                Ok::<_, Error>(n as f64)
            },
            OptimizeOptions::new().n_trials(40).n_jobs(4),
        )
        .unwrap();

    let trials = study.trials().unwrap();
    assert_eq!(trials.len(), 40);
    assert!(trials.iter().all(|t| t.state == TrialState::Completed));

    let enqueued: Vec<&TrialRecord> = trials
        .iter()
        .filter(|t| t.value("tag").is_some())
        .collect();
    assert_eq!(enqueued.len(), 8);
    let mut ns: Vec<i64> = enqueued
        .iter()
        .map(|t| t.value("n").unwrap().as_int().unwrap())
        .collect();
    ns.sort_unstable();
    assert_eq!(ns, (0..8).collect::<Vec<_>>());
    for trial in enqueued {
        assert!((1..=4).contains(&trial.worker_id.thread_id));
        assert_eq!(trial.worker_id.client_id, study.client_id());
    }
}

#[test]
fn test_failed_ask_keeps_enqueued_trial() {
    let storage = FlakyStorage::default();
    let fail_next_write = Arc::clone(&storage.fail_next_write);
    let mut study = Study::builder()
        .target(Target::minimize("y"))
        .sampler(RandomSampler::with_seed(2))
        .storage(storage)
        .build()
        .unwrap();
    let id = study
        .enqueue_trial(BTreeMap::from([("x".to_owned(), ParameterValue::from(0.5))]))
        .unwrap();

    fail_next_write.store(true, Ordering::SeqCst);
    assert!(matches!(study.ask(), Err(Error::Internal(_))));
    assert_eq!(study.trials().unwrap()[0].state, TrialState::Waiting);

    let mut trial = study.ask().unwrap();
    assert_eq!(trial.id(), id);
    assert_eq!(trial.suggest_float("x", 0.0, 1.0).unwrap(), 0.5);
    study.tell(trial, Ok::<_, Error>(1.0)).unwrap();

    let stored = study.trials().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].state, TrialState::Completed);
}
