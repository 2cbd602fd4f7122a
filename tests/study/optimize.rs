use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use optsync::FAIL_REASON_ATTR;
use optsync::prelude::*;
use std::result::Result;

#[derive(Debug)]
struct Diverged;

impl core::fmt::Display for Diverged {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "training diverged")
    }
}

impl std::error::Error for Diverged {}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn study(seed: u64) -> Study {
    Study::builder()
        .target(Target::minimize("y"))
        .sampler(RandomSampler::with_seed(seed))
        .build()
        .unwrap()
}

#[test]
fn test_optimize_runs_n_trials() {
    let mut study = study(1);
    study
        .optimize(
            |trial: &mut Trial| {
                let x = trial.suggest_float("x", -5.0, 5.0)?;
                Ok::<_, Error>(x * x)
            },
            OptimizeOptions::new().n_trials(25),
        )
        .unwrap();
    assert_eq!(study.trials().unwrap().len(), 25);
}

#[test]
fn test_optimize_rejects_zero_jobs() {
    let mut study = study(1);
    let result = study.optimize(
        |_: &mut Trial| Ok::<_, Error>(0.0),
        OptimizeOptions::new().n_trials(1).n_jobs(0),
    );
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_uncaught_error_stops_optimization() {
    let mut study = study(2);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let result = study.optimize(
        move |_: &mut Trial| {
            if counter.fetch_add(1, Ordering::SeqCst) == 2 {
                Err::<f64, _>(Diverged)
            } else {
                Ok(1.0)
            }
        },
        OptimizeOptions::new().n_trials(10),
    );

    let Err(Error::Objective { trial_id, message }) = result else {
        panic!("expected an objective error, got {result:?}");
    };
    assert_eq!(message, "training diverged");
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let trials = study.trials().unwrap();
    assert_eq!(trials.len(), 3);
    let failed = trials.iter().find(|t| t.trial_id == trial_id).unwrap();
    assert_eq!(failed.state, TrialState::Failed);
}

#[test]
fn test_caught_error_type_continues() {
    let mut study = study(3);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    study
        .optimize(
            move |_: &mut Trial| -> Result<f64, BoxError> {
                if counter.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                    Err(Box::new(Diverged))
                } else {
                    Ok(1.0)
                }
            },
            OptimizeOptions::new()
                .n_trials(10)
                .catch(Catch::none().of::<Diverged>()),
        )
        .unwrap();

    let trials = study.trials().unwrap();
    let failed = trials
        .iter()
        .filter(|t| t.state == TrialState::Failed)
        .count();
    assert_eq!(trials.len(), 10);
    assert_eq!(failed, 5);
}

#[test]
fn test_catch_of_other_type_does_not_match() {
    let mut study = study(4);
    let result = study.optimize(
        |_: &mut Trial| -> Result<f64, BoxError> { Err("plain message".into()) },
        OptimizeOptions::new()
            .n_trials(5)
            .catch(Catch::none().of::<Diverged>()),
    );
    assert!(matches!(result, Err(Error::Objective { .. })));
    assert_eq!(study.trials().unwrap().len(), 1);
}

#[test]
fn test_pruned_trials_never_stop_optimization() {
    let mut study = study(5);
    study
        .optimize(
            |trial: &mut Trial| -> Result<f64, Error> {
                let x = trial.suggest_float("x", 0.0, 1.0)?;
                if x > 0.5 {
                    return Err(TrialPruned.into());
                }
                Ok(x)
            },
            OptimizeOptions::new().n_trials(30),
        )
        .unwrap();

    let trials = study.trials().unwrap();
    assert_eq!(trials.len(), 30);
    for trial in trials {
        let x = trial.value("x").unwrap().as_double().unwrap();
        let expected = if x > 0.5 {
            TrialState::Pruned
        } else {
            TrialState::Completed
        };
        assert_eq!(trial.state, expected);
    }
}

#[test]
fn test_callbacks_see_final_state() {
    let mut study = study(6);
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    study
        .optimize(
            |trial: &mut Trial| {
                let x = trial.suggest_float("x", 0.0, 1.0)?;
                Ok::<_, Error>(x)
            },
            OptimizeOptions::new()
                .n_trials(4)
                .callback(move |trial| sink.lock().push(trial.state)),
        )
        .unwrap();

    assert_eq!(*seen.lock(), vec![TrialState::Completed; 4]);
}

#[test]
fn test_timeout_without_trial_limit() {
    let mut study = study(7);
    let start = Instant::now();
    study
        .optimize(
            |trial: &mut Trial| {
                let x = trial.suggest_float("x", 0.0, 1.0)?;
                std::thread::sleep(Duration::from_millis(10));
                Ok::<_, Error>(x)
            },
            OptimizeOptions::new().timeout(Duration::from_millis(200)),
        )
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(2));
    let n = study.trials().unwrap().len();
    assert!(n >= 2, "only {n} trials ran before the timeout");
}

#[test]
fn test_parallel_timeout_does_not_wait_for_running_trials() {
    let mut study = study(8);
    let start = Instant::now();
    study
        .optimize(
            |_: &mut Trial| {
                std::thread::sleep(Duration::from_millis(500));
                Ok::<_, Error>(1.0)
            },
            OptimizeOptions::new()
                .timeout(Duration::from_millis(50))
                .n_jobs(2),
        )
        .unwrap();

    assert!(start.elapsed() < Duration::from_millis(400));
    let trials = study.trials().unwrap();
    assert!(trials.iter().any(|t| t.state == TrialState::Running));
}

#[test]
fn test_parallel_optimize_runs_exact_budget() {
    let mut study = study(9);
    study
        .optimize(
            |trial: &mut Trial| {
                let x = trial.suggest_float("x", -1.0, 1.0)?;
                Ok::<_, Error>(x * x)
            },
            OptimizeOptions::new().n_trials(50).n_jobs(4),
        )
        .unwrap();

    let trials = study.trials().unwrap();
    assert_eq!(trials.len(), 50);
    assert!(trials.iter().all(|t| t.state == TrialState::Completed));
    let threads: std::collections::BTreeSet<u32> =
        trials.iter().map(|t| t.worker_id.thread_id).collect();
    assert!(threads.iter().all(|id| (1..=4).contains(id)));
}

#[test]
fn test_parallel_uncaught_error_is_returned() {
    let mut study = study(10);
    let result = study.optimize(
        |trial: &mut Trial| -> Result<f64, Error> {
            let x = trial.suggest_float("x", 0.0, 1.0)?;
            if x > 0.8 {
                return Err(Error::Internal("objective blew up"));
            }
            Ok(x)
        },
        OptimizeOptions::new().n_trials(200).n_jobs(3),
    );
    assert!(matches!(result, Err(Error::Objective { .. })));
    assert!(study.trials().unwrap().len() < 200);
}

#[test]
fn test_parallel_worker_panic_is_reported() {
    let mut study = study(11);
    let result = study.optimize(
        |_: &mut Trial| -> Result<f64, Error> { panic!("objective panicked") },
        OptimizeOptions::new().n_trials(4).n_jobs(2),
    );
    assert!(matches!(result, Err(Error::WorkerPanicked(1 | 2))));
    let trials = study.trials().unwrap();
    assert!(!trials.is_empty());
    assert!(trials.iter().all(|t| t.state == TrialState::Failed));
}

#[test]
fn test_panicking_objective_fails_its_trial() {
    let mut study = study(12);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        study.optimize(
            |_: &mut Trial| -> Result<f64, Error> { panic!("boom") },
            OptimizeOptions::new().n_trials(1),
        )
    }));
    assert!(outcome.is_err());

    let trials = study.trials().unwrap();
    assert_eq!(trials.len(), 1);
    assert_eq!(trials[0].state, TrialState::Failed);
    assert_eq!(
        trials[0].system_attrs[FAIL_REASON_ATTR],
        AttrValue::String("panic: boom".into())
    );
}
