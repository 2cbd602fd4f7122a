//! Study implementation: the ask/tell protocol and optimization loops.

use core::any::Any;
use core::fmt::Display;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::objective::ObjectiveOutput;
use crate::param::ParameterValue;
use crate::pareto::{ParetoComparator, pareto_front};
use crate::record::{Parameter, StudyInfo, TrialRecord, WorkerId};
use crate::sampler::{Sampler, SamplerConfig};
use crate::search_space::SearchSpace;
use crate::storage::Storage;
use crate::trial::Trial;
use crate::types::TrialState;

mod builder;
mod optimize;
mod worker;

#[cfg(feature = "async")]
mod async_impl;

pub use builder::StudyBuilder;
pub use optimize::{Callback, Catch, OptimizeOptions};
pub(crate) use worker::Worker;

/// System attribute holding the rendered error of a failed trial.
pub const FAIL_REASON_ATTR: &str = "fail_reason";

/// A study coordinates one optimization session against shared storage.
///
/// Several studies, in this or other processes, may drive the same stored
/// study concurrently. Each `Study` value is one client: it owns a worker
/// (sampler, storage client, trial queue) for [`ask`](Self::ask) and
/// [`tell`](Self::tell), and spins up further workers for parallel
/// [`optimize`](Self::optimize).
///
/// # Examples
///
/// ```
/// use optsync::prelude::*;
///
/// let mut study = Study::builder()
///     .study_id("quadratic")
///     .target(Target::minimize("loss"))
///     .sampler(RandomSampler::with_seed(42))
///     .build()
///     .unwrap();
///
/// study
///     .optimize(
///         |trial: &mut Trial| {
///             let x = trial.suggest_float("x", -10.0, 10.0)?;
///             Ok::<_, Error>((x - 3.0).powi(2))
///         },
///         OptimizeOptions::new().n_trials(20),
///     )
///     .unwrap();
///
/// assert_eq!(study.trials().unwrap().len(), 20);
/// assert!(study.best_trial().unwrap().values[0].valid().unwrap() >= 0.0);
/// ```
pub struct Study {
    info: StudyInfo,
    storage: Arc<dyn Storage>,
    sampler_config: SamplerConfig,
    client_id: String,
    worker: Worker,
}

impl Study {
    /// Return a [`StudyBuilder`] for constructing a study with a fluent API.
    #[must_use]
    pub fn builder() -> StudyBuilder {
        StudyBuilder::new()
    }

    /// Writes a new study to `storage` and opens it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if the study id is taken, or any
    /// storage or sampler setup error.
    pub fn create(
        info: StudyInfo,
        storage: Arc<dyn Storage>,
        sampler: impl Sampler + 'static,
    ) -> Result<Self> {
        if storage
            .get_studies(None)?
            .iter()
            .any(|s| s.study_id == info.study_id)
        {
            return Err(Error::AlreadyExists(format!("study {}", info.study_id)));
        }
        storage.write_study(&info)?;
        trace_info!(study_id = %info.study_id, "study created");
        Self::open(info, storage, Box::new(sampler))
    }

    /// Opens a study that already exists in `storage`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if there is no such study.
    pub fn load(
        study_id: &str,
        storage: Arc<dyn Storage>,
        sampler: impl Sampler + 'static,
    ) -> Result<Self> {
        let info = storage
            .get_studies(None)?
            .into_iter()
            .find(|s| s.study_id == study_id)
            .ok_or_else(|| Error::NotFound(format!("study {study_id}")))?;
        Self::open(info, storage, Box::new(sampler))
    }

    fn open(info: StudyInfo, storage: Arc<dyn Storage>, sampler: Box<dyn Sampler>) -> Result<Self> {
        let client_id = format!("{:016x}", fastrand::u64(..));
        let sampler_config = sampler.config();
        let worker = Worker::new(
            &info,
            WorkerId::new(client_id.clone(), 0),
            sampler,
            storage.create_client(0)?,
        )?;
        Ok(Self {
            info,
            storage,
            sampler_config,
            client_id,
            worker,
        })
    }

    /// The study's metadata as loaded.
    #[must_use]
    pub fn info(&self) -> &StudyInfo {
        &self.info
    }

    /// The study id.
    #[must_use]
    pub fn study_id(&self) -> &str {
        &self.info.study_id
    }

    /// The id identifying this client's trials in storage.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The configuration parallel workers build their samplers from.
    #[must_use]
    pub fn sampler_config(&self) -> &SamplerConfig {
        &self.sampler_config
    }

    /// Replaces the search space of this client's sampler.
    ///
    /// The sampler forgets its history and resyncs on the next ask.
    pub fn set_search_space(&mut self, search_space: SearchSpace) {
        self.worker.sampler().lock().set_search_space(search_space);
    }

    /// Starts a trial.
    ///
    /// Claims a waiting trial owned by this client if there is one,
    /// otherwise creates a new trial. Either way the trial is written as
    /// running before it is returned.
    ///
    /// # Errors
    ///
    /// Propagates storage and sampler errors.
    pub fn ask(&mut self) -> Result<Trial> {
        self.worker.ask(&self.info)
    }

    /// Finishes a trial with the objective's result.
    ///
    /// A pruning error marks the trial pruned; any other error marks it
    /// failed. The trial is written exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ObjectiveDimensionMismatch`] if the result does not
    /// have one value per target (the trial is still written as failed),
    /// or a storage error.
    pub fn tell<O, E>(
        &mut self,
        trial: Trial,
        result: core::result::Result<O, E>,
    ) -> Result<TrialRecord>
    where
        O: ObjectiveOutput,
        E: Display + 'static,
    {
        finish_trial(&self.info, trial, result, &Catch::all(), &[])
    }

    /// Runs one `ask → objective → tell` cycle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Objective`] if the objective fails with an error
    /// that `catch` does not match; the trial has been written as failed.
    pub fn run_trial<F, O, E>(
        &mut self,
        objective: &F,
        catch: &Catch<E>,
        callbacks: &[Callback],
    ) -> Result<TrialRecord>
    where
        F: Fn(&mut Trial) -> core::result::Result<O, E>,
        O: ObjectiveOutput,
        E: Display + 'static,
    {
        run_trial(&mut self.worker, &self.info, objective, catch, callbacks)
    }

    /// Queues a trial with fixed parameters for this client to evaluate.
    ///
    /// The trial is written as waiting and owned by this client's thread
    /// `0`, which may claim any of the client's trials. Parallel
    /// [`optimize`](Self::optimize) hands such trials out to its workers.
    /// Parameters not given here are sampled as usual.
    ///
    /// # Errors
    ///
    /// Propagates the storage error.
    pub fn enqueue_trial(&self, parameters: BTreeMap<String, ParameterValue>) -> Result<String> {
        let mut record = TrialRecord::new(
            worker::new_trial_id(),
            self.info.study_id.clone(),
            self.worker.worker_id().clone(),
            TrialState::Waiting,
        );
        record.parameters = parameters
            .into_iter()
            .map(|(name, value)| (name, Parameter::fixed(value)))
            .collect();
        self.storage.write_trial(&record)?;
        trace_debug!(trial_id = %record.trial_id, "trial enqueued");
        Ok(record.trial_id)
    }

    /// Imports a finished trial, for example from an earlier study.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the trial is not in a terminal
    /// state, or a storage error.
    pub fn add_trial(&self, mut record: TrialRecord) -> Result<()> {
        if !record.state.is_terminal() {
            return Err(Error::InvalidConfig("added trials must be finished"));
        }
        record.study_id.clone_from(&self.info.study_id);
        self.storage.write_trial(&record)
    }

    /// All trials of the study, in their latest written form.
    ///
    /// # Errors
    ///
    /// Propagates the storage error.
    pub fn trials(&self) -> Result<Vec<TrialRecord>> {
        self.storage.get_trials(Some(&self.info.study_id), None)
    }

    /// Completed trials no other completed trial dominates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCompletedTrials`] if no trial completed.
    pub fn best_trials(&self) -> Result<Vec<TrialRecord>> {
        let completed: Vec<TrialRecord> = self
            .trials()?
            .into_iter()
            .filter(|t| t.state == TrialState::Completed)
            .collect();
        let comparator = ParetoComparator::new(&self.info.targets);
        let front: Vec<TrialRecord> = pareto_front(&completed, &comparator)
            .into_iter()
            .cloned()
            .collect();
        if front.is_empty() {
            return Err(Error::NoCompletedTrials);
        }
        Ok(front)
    }

    /// The best completed trial of a single-target study.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for multi-target studies (use
    /// [`best_trials`](Self::best_trials)) and [`Error::NoCompletedTrials`]
    /// if no trial completed.
    pub fn best_trial(&self) -> Result<TrialRecord> {
        if self.info.targets.len() != 1 {
            return Err(Error::InvalidConfig(
                "best_trial needs exactly one target; use best_trials",
            ));
        }
        self.best_trials()?
            .into_iter()
            .next()
            .ok_or(Error::NoCompletedTrials)
    }
}

/// Runs one `ask → objective → tell` cycle on `worker`.
pub(crate) fn run_trial<F, O, E>(
    worker: &mut Worker,
    info: &StudyInfo,
    objective: &F,
    catch: &Catch<E>,
    callbacks: &[Callback],
) -> Result<TrialRecord>
where
    F: Fn(&mut Trial) -> core::result::Result<O, E>,
    O: ObjectiveOutput,
    E: Display + 'static,
{
    let mut trial = worker.ask(info)?;
    match panic::catch_unwind(AssertUnwindSafe(|| objective(&mut trial))) {
        Ok(result) => finish_trial(info, trial, result, catch, callbacks),
        Err(payload) => {
            fail_panicked(trial, payload.as_ref());
            panic::resume_unwind(payload)
        }
    }
}

/// Writes a trial whose objective panicked as failed.
fn fail_panicked(mut trial: Trial, payload: &(dyn Any + Send)) {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown payload".to_owned());
    trial.set_system_attr(FAIL_REASON_ATTR, format!("panic: {message}"));
    trial.record_mut().state = TrialState::Failed;
    if trial.flush().is_err() {
        trace_warn!(trial_id = %trial.id(), "could not record panicked trial");
    }
}

/// Turns an objective result into the trial's final state and writes it.
pub(crate) fn finish_trial<O, E>(
    info: &StudyInfo,
    mut trial: Trial,
    result: core::result::Result<O, E>,
    catch: &Catch<E>,
    callbacks: &[Callback],
) -> Result<TrialRecord>
where
    O: ObjectiveOutput,
    E: Display + 'static,
{
    let mut failure = None;
    let state = match result {
        Ok(output) => {
            let values = output.into_objective_values();
            if values.len() == info.targets.len() {
                let state = TrialState::from_objective_values(&values);
                trial.record_mut().values = values;
                state
            } else {
                let err = Error::ObjectiveDimensionMismatch {
                    expected: info.targets.len(),
                    got: values.len(),
                };
                trial.set_system_attr(FAIL_REASON_ATTR, err.to_string());
                failure = Some(err);
                TrialState::Failed
            }
        }
        Err(e) if is_trial_pruned(&e) => TrialState::Pruned,
        Err(e) => {
            let message = e.to_string();
            if catch.matches(&e) {
                trace_warn!(trial_id = %trial.id(), error = %message, "trial failed");
            } else {
                failure = Some(Error::Objective {
                    trial_id: trial.id().to_owned(),
                    message: message.clone(),
                });
            }
            trial.set_system_attr(FAIL_REASON_ATTR, message);
            TrialState::Failed
        }
    };
    trial.record_mut().state = state;

    for callback in callbacks {
        callback(trial.record());
    }
    trial.flush()?;
    trace_info!(trial_id = %trial.id(), state = ?state, "trial finished");

    match failure {
        Some(err) => Err(err),
        None => Ok(trial.into_record()),
    }
}

/// Check if an error value represents a pruned trial.
///
/// Sees through boxed errors.
pub(super) fn is_trial_pruned<E: 'static>(e: &E) -> bool {
    let any: &dyn Any = e;
    if let Some(err) = any.downcast_ref::<Error>() {
        return matches!(err, Error::TrialPruned);
    }
    if any.is::<crate::error::TrialPruned>() {
        return true;
    }
    boxed_error(any).is_some_and(|b| {
        b.is::<crate::error::TrialPruned>()
            || b.downcast_ref::<Error>()
                .is_some_and(|err| matches!(err, Error::TrialPruned))
    })
}

/// The trait object inside a boxed error, if `any` is one.
pub(super) fn boxed_error(any: &dyn Any) -> Option<&(dyn core::error::Error + 'static)> {
    if let Some(b) = any.downcast_ref::<Box<dyn core::error::Error + Send + Sync>>() {
        return Some(&**b);
    }
    any.downcast_ref::<Box<dyn core::error::Error>>()
        .map(|b| &**b)
}
