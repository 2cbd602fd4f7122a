use optsync::prelude::*;
use optsync::sampler::tpe::N_TRIALS_ATTR;

fn tpe_study(seed: u64, n_startup_trials: usize) -> Study {
    let sampler = TpeSampler::builder()
        .seed(seed)
        .n_startup_trials(n_startup_trials)
        .build()
        .unwrap();
    Study::builder()
        .target(Target::minimize("y"))
        .sampler(sampler)
        .build()
        .unwrap()
}

fn in_order(study: &Study) -> Vec<TrialRecord> {
    let mut trials = study.trials().unwrap();
    trials.sort_by_key(|t| t.create_time);
    trials
}

#[test]
fn test_tpe_finds_quadratic_minimum() {
    let mut study = tpe_study(42, 10);
    study
        .optimize(
            |trial: &mut Trial| {
                let x = trial.suggest_float("x", -10.0, 10.0)?;
                Ok::<_, Error>((x - 2.0).powi(2))
            },
            OptimizeOptions::new().n_trials(60),
        )
        .unwrap();

    let best = study.best_trial().unwrap();
    let value = best.values[0].valid().unwrap();
    assert!(value < 1.0, "best value {value} should be below 1.0");
}

#[test]
fn test_tpe_records_history_size_after_startup() {
    let mut study = tpe_study(1, 5);
    study
        .optimize(
            |trial: &mut Trial| {
                let x = trial.suggest_float("x", 0.0, 1.0)?;
                Ok::<_, Error>(x)
            },
            OptimizeOptions::new().n_trials(12),
        )
        .unwrap();

    let trials = in_order(&study);
    for trial in &trials[..5] {
        assert!(!trial.system_attrs.contains_key(N_TRIALS_ATTR));
    }
    for (i, trial) in trials.iter().enumerate().skip(5) {
        assert_eq!(
            trial.system_attrs.get(N_TRIALS_ATTR),
            Some(&AttrValue::Int(i as i64)),
            "trial {i} should have seen {i} finished trials"
        );
    }
}

#[test]
fn test_tpe_prefers_good_category() {
    let mut study = tpe_study(3, 10);
    study
        .optimize(
            |trial: &mut Trial| {
                let choice = trial.suggest_categorical("opt", ["sgd", "adam", "rmsprop"])?;
                Ok::<_, Error>(if choice.as_str() == Some("adam") { 0.0 } else { 1.0 })
            },
            OptimizeOptions::new().n_trials(80),
        )
        .unwrap();

    let trials = in_order(&study);
    let late_adam = trials[50..]
        .iter()
        .filter(|t| t.value("opt").and_then(ParameterValue::as_str) == Some("adam"))
        .count();
    assert!(
        late_adam >= 15,
        "adam picked {late_adam} of the last 30 trials"
    );
}

#[test]
fn test_tpe_mixed_space_stays_in_bounds() {
    let mut study = tpe_study(9, 5);
    study
        .optimize(
            |trial: &mut Trial| {
                let lr = trial.suggest_float_log("lr", 1e-5, 1e-1)?;
                let layers = trial.suggest_int("layers", 1, 8)?;
                let units = trial.suggest_int_log("units", 16, 512)?;
                Ok::<_, Error>(lr.log10().abs() + layers as f64 + (units as f64).ln())
            },
            OptimizeOptions::new().n_trials(40),
        )
        .unwrap();

    for trial in study.trials().unwrap() {
        assert_eq!(trial.state, TrialState::Completed);
        let lr = trial.value("lr").unwrap().as_double().unwrap();
        let layers = trial.value("layers").unwrap().as_int().unwrap();
        let units = trial.value("units").unwrap().as_int().unwrap();
        assert!((1e-5..=1e-1).contains(&lr));
        assert!((1..=8).contains(&layers));
        assert!((16..=512).contains(&units));
    }
}

#[test]
fn test_tpe_builder_rejects_zero_candidates() {
    assert!(matches!(
        TpeSampler::builder().n_ei_candidates(0).build(),
        Err(Error::InvalidConfig(_))
    ));
}
