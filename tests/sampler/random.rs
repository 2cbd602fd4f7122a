use optsync::prelude::*;

fn study(seed: u64) -> Study {
    Study::builder()
        .target(Target::minimize("y"))
        .sampler(RandomSampler::with_seed(seed))
        .build()
        .unwrap()
}

fn values(study: &Study, name: &str) -> Vec<ParameterValue> {
    study
        .trials()
        .unwrap()
        .iter()
        .filter_map(|t| t.value(name).cloned())
        .collect()
}

#[test]
fn test_random_sampler_uniform_float_distribution() {
    let mut study = study(42);
    let n_samples = 1000;

    study
        .optimize(
            |trial: &mut Trial| {
                let x = trial.suggest_float("x", 0.0, 1.0)?;
                Ok::<_, Error>(x)
            },
            OptimizeOptions::new().n_trials(n_samples),
        )
        .unwrap();

    let mut samples: Vec<f64> = values(&study, "x")
        .iter()
        .map(|v| v.as_double().unwrap())
        .collect();
    assert_eq!(samples.len(), n_samples);
    for &s in &samples {
        assert!((0.0..=1.0).contains(&s), "sample {s} out of range [0, 1]");
    }

    samples.sort_by(f64::total_cmp);
    let q1 = samples[n_samples / 4];
    let q2 = samples[n_samples / 2];
    let q3 = samples[3 * n_samples / 4];
    assert!((q1 - 0.25).abs() < 0.1, "Q1 {q1} should be close to 0.25");
    assert!((q2 - 0.5).abs() < 0.1, "Q2 {q2} should be close to 0.5");
    assert!((q3 - 0.75).abs() < 0.1, "Q3 {q3} should be close to 0.75");
}

#[test]
fn test_random_sampler_log_scale_is_uniform_in_log_space() {
    let mut study = study(7);
    study
        .optimize(
            |trial: &mut Trial| {
                let lr = trial.suggest_float_log("lr", 1e-4, 1.0)?;
                Ok::<_, Error>(lr)
            },
            OptimizeOptions::new().n_trials(500),
        )
        .unwrap();

    let mut samples: Vec<f64> = values(&study, "lr")
        .iter()
        .map(|v| v.as_double().unwrap())
        .collect();
    samples.sort_by(f64::total_cmp);
    assert!(samples.iter().all(|s| (1e-4..=1.0).contains(s)));

    // The geometric middle of [1e-4, 1] is 1e-2.
    let median = samples[samples.len() / 2];
    assert!(
        (median.log10() + 2.0).abs() < 0.5,
        "median {median} should be near 1e-2"
    );
}

#[test]
fn test_random_sampler_int_bounds_are_inclusive() {
    let mut study = study(3);
    study
        .optimize(
            |trial: &mut Trial| {
                let n = trial.suggest_int("n", 1, 3)?;
                let k = trial.suggest_int_log("k", 1, 64)?;
                Ok::<_, Error>((n + k) as f64)
            },
            OptimizeOptions::new().n_trials(200),
        )
        .unwrap();

    let ns: Vec<i64> = values(&study, "n")
        .iter()
        .map(|v| v.as_int().unwrap())
        .collect();
    for expected in 1..=3 {
        assert!(ns.contains(&expected), "{expected} never sampled");
    }
    assert!(
        values(&study, "k")
            .iter()
            .all(|v| (1..=64).contains(&v.as_int().unwrap()))
    );
}

#[test]
fn test_random_sampler_covers_categorical_choices() {
    let mut study = study(11);
    study
        .optimize(
            |trial: &mut Trial| {
                let act = trial.suggest_categorical("activation", ["relu", "tanh", "gelu"])?;
                Ok::<_, Error>(if act.as_str() == Some("relu") { 0.0 } else { 1.0 })
            },
            OptimizeOptions::new().n_trials(60),
        )
        .unwrap();

    let seen = values(&study, "activation");
    for choice in ["relu", "tanh", "gelu"] {
        assert!(seen.contains(&ParameterValue::from(choice)), "{choice} never sampled");
    }
}

#[test]
fn test_random_sampler_same_seed_same_sequence() {
    let run = |seed| {
        let mut study = study(seed);
        study
            .optimize(
                |trial: &mut Trial| {
                    let x = trial.suggest_float("x", -1.0, 1.0)?;
                    Ok::<_, Error>(x)
                },
                OptimizeOptions::new().n_trials(10),
            )
            .unwrap();
        let mut trials = study.trials().unwrap();
        trials.sort_by_key(|t| t.create_time);
        trials
            .iter()
            .map(|t| t.value("x").unwrap().as_double().unwrap())
            .collect::<Vec<_>>()
    };
    assert_eq!(run(5), run(5));
    assert_ne!(run(5), run(6));
}
