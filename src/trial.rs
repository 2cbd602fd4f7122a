//! The trial handle passed to objective functions.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::distribution::Distribution;
use crate::error::{Error, Result};
use crate::param::ParameterValue;
use crate::record::{AttrValue, Parameter, TrialRecord};
use crate::sampler::Sampler;
use crate::storage::StorageClient;
use crate::types::TrialState;

/// A worker's sampler, shared with the trials it hands out.
pub(crate) type SharedSampler = Arc<Mutex<Box<dyn Sampler>>>;

/// A worker's storage client, shared with the trials it hands out.
pub(crate) type SharedClient = Arc<Mutex<Box<dyn StorageClient>>>;

/// A trial represents a single evaluation of the objective function.
///
/// A trial is handed out by [`Study::ask`](crate::Study::ask). It shares
/// the asking worker's sampler, for values the joint sample did not
/// provide, and its storage client, for [`flush`](Trial::flush).
///
/// Suggesting the same name twice returns the first value without drawing
/// again, as long as the distribution is the same.
pub struct Trial {
    record: TrialRecord,
    /// Values proposed by the sampler's joint sample, not yet suggested.
    proposals: BTreeMap<String, Parameter>,
    sampler: SharedSampler,
    storage: SharedClient,
}

impl core::fmt::Debug for Trial {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Trial")
            .field("record", &self.record)
            .field("proposals", &self.proposals)
            .finish_non_exhaustive()
    }
}

impl Trial {
    pub(crate) fn new(
        record: TrialRecord,
        proposals: BTreeMap<String, Parameter>,
        sampler: SharedSampler,
        storage: SharedClient,
    ) -> Self {
        Self {
            record,
            proposals,
            sampler,
            storage,
        }
    }

    /// Returns the unique ID of this trial.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.record.trial_id
    }

    /// Returns the current state of this trial.
    #[must_use]
    pub fn state(&self) -> TrialState {
        self.record.state
    }

    /// Returns the parameters suggested or set so far.
    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, Parameter> {
        &self.record.parameters
    }

    /// Returns the user attributes.
    #[must_use]
    pub fn user_attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.record.user_attrs
    }

    /// Returns the system attributes.
    #[must_use]
    pub fn system_attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.record.system_attrs
    }

    /// Returns the record as it would be written now.
    #[must_use]
    pub fn record(&self) -> &TrialRecord {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut TrialRecord {
        &mut self.record
    }

    pub(crate) fn into_record(self) -> TrialRecord {
        self.record
    }

    /// Suggests a value for `name` from `distribution`.
    ///
    /// Resolution order: a value already on the trial, then a value
    /// proposed by the joint sample if `distribution` contains it, then a
    /// fresh draw from the sampler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParameterConflict`] if `name` was already suggested
    /// with a different distribution, or a sampling error.
    pub fn suggest_parameter(
        &mut self,
        name: &str,
        distribution: Distribution,
    ) -> Result<ParameterValue> {
        if let Some(existing) = self.record.parameters.get_mut(name) {
            return match &existing.distribution {
                Some(d) if d.is_identical(&distribution) => Ok(existing.value.clone()),
                Some(d) => Err(Error::ParameterConflict {
                    name: name.to_owned(),
                    reason: format!("already suggested from {d:?}"),
                }),
                None => {
                    // A set value adopts the distribution when it fits.
                    if distribution.contains(&existing.value) {
                        existing.distribution = Some(distribution);
                    }
                    Ok(existing.value.clone())
                }
            };
        }

        let value = match self.proposals.remove(name) {
            Some(p) if distribution.contains(&p.value) => p.value,
            _ => self.sampler.lock().sample(&distribution)?,
        };
        self.record
            .parameters
            .insert(name.to_owned(), Parameter::sampled(value.clone(), distribution));
        Ok(value)
    }

    /// Suggests an integer in `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `low > high`, or any error of
    /// [`suggest_parameter`](Self::suggest_parameter).
    ///
    /// # Examples
    ///
    /// ```
    /// use optsync::prelude::*;
    ///
    /// let mut study = Study::builder()
    ///     .target(Target::minimize("loss"))
    ///     .build()
    ///     .unwrap();
    /// let mut trial = study.ask().unwrap();
    /// let n = trial.suggest_int("n_layers", 1, 4).unwrap();
    /// assert!((1..=4).contains(&n));
    /// assert_eq!(trial.suggest_int("n_layers", 1, 4).unwrap(), n);
    /// ```
    pub fn suggest_int(&mut self, name: &str, low: i64, high: i64) -> Result<i64> {
        let value = self.suggest_parameter(name, Distribution::int(low, high, false)?)?;
        value.as_int().ok_or(Error::Internal("int distribution yielded a non-int"))
    }

    /// Suggests an integer in `[low, high]`, sampled on a log scale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLogBounds`] if `low < 1`.
    pub fn suggest_int_log(&mut self, name: &str, low: i64, high: i64) -> Result<i64> {
        let value = self.suggest_parameter(name, Distribution::int(low, high, true)?)?;
        value.as_int().ok_or(Error::Internal("int distribution yielded a non-int"))
    }

    /// Suggests a float in `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if the bounds are not finite or
    /// `low > high`.
    pub fn suggest_float(&mut self, name: &str, low: f64, high: f64) -> Result<f64> {
        let value = self.suggest_parameter(name, Distribution::float(low, high, false)?)?;
        value
            .as_double()
            .ok_or(Error::Internal("float distribution yielded a non-float"))
    }

    /// Suggests a float in `[low, high]`, sampled on a log scale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLogBounds`] if `low <= 0`.
    pub fn suggest_float_log(&mut self, name: &str, low: f64, high: f64) -> Result<f64> {
        let value = self.suggest_parameter(name, Distribution::float(low, high, true)?)?;
        value
            .as_double()
            .ok_or(Error::Internal("float distribution yielded a non-float"))
    }

    /// Suggests one of `choices`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyChoices`] if there are no choices.
    pub fn suggest_categorical<T: Into<ParameterValue>>(
        &mut self,
        name: &str,
        choices: impl IntoIterator<Item = T>,
    ) -> Result<ParameterValue> {
        self.suggest_parameter(name, Distribution::categorical(choices)?)
    }

    /// Forces `name` to `value`, replacing anything suggested before.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParameterValue>) {
        self.proposals.remove(name);
        self.record
            .parameters
            .insert(name.to_owned(), Parameter::fixed(value.into()));
    }

    /// Forces `name` to an integer.
    pub fn set_int(&mut self, name: &str, value: i64) {
        self.set_parameter(name, value);
    }

    /// Forces `name` to a float.
    pub fn set_float(&mut self, name: &str, value: f64) {
        self.set_parameter(name, value);
    }

    /// Forces `name` to a categorical value.
    pub fn set_categorical(&mut self, name: &str, value: impl Into<ParameterValue>) {
        self.set_parameter(name, value);
    }

    /// Removes `name` so the next suggestion draws it afresh.
    pub fn clear_parameter(&mut self, name: &str) -> Option<Parameter> {
        self.proposals.remove(name);
        self.record.parameters.remove(name)
    }

    /// Sets a user attribute.
    pub fn set_user_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.record.user_attrs.insert(key.into(), value.into());
    }

    /// Sets a system attribute.
    pub fn set_system_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.record.system_attrs.insert(key.into(), value.into());
    }

    /// Writes the trial's current state to storage.
    ///
    /// # Errors
    ///
    /// Propagates the storage error.
    pub fn flush(&self) -> Result<()> {
        self.storage.lock().write_trial(&self.record)
    }
}
