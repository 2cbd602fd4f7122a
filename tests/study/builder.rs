use std::sync::Arc;

use optsync::prelude::*;

#[test]
fn test_builder_defaults() {
    let study = Study::builder()
        .target(Target::minimize("y"))
        .build()
        .unwrap();
    assert!(!study.study_id().is_empty());
    assert!(study.trials().unwrap().is_empty());
    assert!(matches!(
        study.sampler_config(),
        optsync::sampler::SamplerConfig::Random(_)
    ));
}

#[test]
fn test_builder_requires_targets() {
    assert!(matches!(
        Study::builder().build(),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn test_builder_declared_search_space_reaches_sampler() {
    let space = SearchSpace::new()
        .with("x", Distribution::float(0.0, 1.0, false).unwrap())
        .with("n", Distribution::int(1, 3, false).unwrap());
    let mut study = Study::builder()
        .target(Target::minimize("y"))
        .search_space(space.clone())
        .build()
        .unwrap();
    assert_eq!(study.info().search_space.as_ref(), Some(&space));

    // The declared space is sampled jointly, so suggestions reuse the proposals.
    let mut trial = study.ask().unwrap();
    let x = trial.suggest_float("x", 0.0, 1.0).unwrap();
    assert!((0.0..=1.0).contains(&x));
    study.tell(trial, Ok::<_, Error>(x)).unwrap();
}

#[test]
fn test_create_and_load_share_storage() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let info = optsync::StudyInfo::new("shared", vec![Target::maximize("acc")]);

    let mut first = Study::create(info.clone(), Arc::clone(&storage), RandomSampler::new()).unwrap();
    assert!(matches!(
        Study::create(info, Arc::clone(&storage), RandomSampler::new()),
        Err(Error::AlreadyExists(_))
    ));
    assert!(matches!(
        Study::load("missing", Arc::clone(&storage), RandomSampler::new()),
        Err(Error::NotFound(_))
    ));

    let trial = first.ask().unwrap();
    first.tell(trial, Ok::<_, Error>(0.9)).unwrap();

    let second = Study::load("shared", storage, RandomSampler::new()).unwrap();
    assert_eq!(second.trials().unwrap().len(), 1);
    assert_eq!(second.best_trial().unwrap().values[0].valid(), Some(0.9));
}
