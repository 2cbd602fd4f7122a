use core::any::Any;
use core::fmt::Display;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use core::time::Duration;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::objective::ObjectiveOutput;
use crate::record::{TrialRecord, WorkerId};
use crate::trial::Trial;
use crate::types::TrialState;

use super::{Study, Worker, boxed_error, run_trial};

/// Called with every finished trial before it is written.
pub type Callback = Arc<dyn Fn(&TrialRecord) + Send + Sync>;

/// Which objective errors turn into a failed trial instead of stopping the
/// optimization.
///
/// An empty catch list lets every error propagate. Pruning errors are
/// always handled, whatever the list says.
///
/// # Examples
///
/// ```
/// use optsync::Catch;
///
/// #[derive(Debug)]
/// struct Diverged;
///
/// impl std::fmt::Display for Diverged {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         write!(f, "training diverged")
///     }
/// }
///
/// impl std::error::Error for Diverged {}
///
/// let catch = Catch::<Box<dyn std::error::Error + Send + Sync>>::none().of::<Diverged>();
/// assert!(catch.matches(&Box::new(Diverged).into()));
/// assert!(!catch.matches(&"other".into()));
/// ```
pub struct Catch<E> {
    filters: Vec<Arc<dyn Fn(&E) -> bool + Send + Sync>>,
}

impl<E> Clone for Catch<E> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
        }
    }
}

impl<E> Default for Catch<E> {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
        }
    }
}

impl<E: 'static> Catch<E> {
    /// Catches nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Catches every error.
    #[must_use]
    pub fn all() -> Self {
        Self::none().when(|_| true)
    }

    /// Also catches errors matching `filter`.
    #[must_use]
    pub fn when(mut self, filter: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Also catches errors of type `T`, directly or inside a boxed error.
    #[must_use]
    pub fn of<T: core::error::Error + 'static>(self) -> Self {
        self.when(|e| {
            let any: &dyn Any = e;
            any.is::<T>() || boxed_error(any).is_some_and(|b| b.is::<T>())
        })
    }

    /// Whether `error` should be caught.
    #[must_use]
    pub fn matches(&self, error: &E) -> bool {
        self.filters.iter().any(|f| f(error))
    }
}

/// Settings for [`Study::optimize`].
///
/// # Examples
///
/// ```
/// use core::time::Duration;
///
/// use optsync::{Catch, Error, OptimizeOptions};
///
/// let options = OptimizeOptions::<Error>::new()
///     .n_trials(100)
///     .timeout(Duration::from_secs(60))
///     .n_jobs(4)
///     .catch(Catch::all())
///     .callback(|trial| println!("{} finished", trial.trial_id));
/// ```
pub struct OptimizeOptions<E = Error> {
    /// Total trials to run across all workers; `None` runs until timeout.
    pub n_trials: Option<usize>,
    /// Wall-clock bound for the whole batch.
    pub timeout: Option<Duration>,
    /// Number of concurrent workers.
    pub n_jobs: usize,
    /// Objective errors recorded as failed trials.
    pub catch: Catch<E>,
    /// Called with every finished trial.
    pub callbacks: Vec<Callback>,
}

impl<E> Default for OptimizeOptions<E> {
    fn default() -> Self {
        Self {
            n_trials: None,
            timeout: None,
            n_jobs: 1,
            catch: Catch::default(),
            callbacks: Vec::new(),
        }
    }
}

impl<E> OptimizeOptions<E> {
    /// One worker, no trial limit, no timeout, nothing caught.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total number of trials.
    #[must_use]
    pub fn n_trials(mut self, n: usize) -> Self {
        self.n_trials = Some(n);
        self
    }

    /// Sets the wall-clock bound.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the number of concurrent workers.
    #[must_use]
    pub fn n_jobs(mut self, n: usize) -> Self {
        self.n_jobs = n;
        self
    }

    /// Sets which objective errors are recorded instead of propagated.
    #[must_use]
    pub fn catch(mut self, catch: Catch<E>) -> Self {
        self.catch = catch;
        self
    }

    /// Adds a callback.
    #[must_use]
    pub fn callback(mut self, callback: impl Fn(&TrialRecord) + Send + Sync + 'static) -> Self {
        self.callbacks.push(Arc::new(callback));
        self
    }
}

/// Shared trial budget and stop signal of one `optimize` call.
pub(super) struct Budget {
    limit: Option<usize>,
    started: AtomicUsize,
    pub(super) deadline: Option<Instant>,
    pub(super) stop: AtomicBool,
}

impl Budget {
    pub(super) fn new(limit: Option<usize>, timeout: Option<Duration>) -> Self {
        Self {
            limit,
            started: AtomicUsize::new(0),
            deadline: timeout.map(|t| Instant::now() + t),
            stop: AtomicBool::new(false),
        }
    }

    /// Reserves the next trial, or `false` when the batch is over.
    pub(super) fn claim(&self) -> bool {
        if self.stop.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d) {
            return false;
        }
        match self.limit {
            None => true,
            Some(limit) => self
                .started
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < limit).then_some(n + 1))
                .is_ok(),
        }
    }
}

impl Study {
    /// Runs `ask → objective → tell` until the trial budget or the timeout
    /// is used up.
    ///
    /// With `n_jobs > 1` every worker runs on its own thread with its own
    /// storage client and a sampler built from the study's
    /// [`SamplerConfig`](crate::sampler::SamplerConfig). The timeout bounds
    /// the whole batch: when it expires, running trials are not waited for
    /// and `Ok(())` is returned. Their results are still written when they
    /// finish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `n_jobs` is zero,
    /// [`Error::Objective`] for the first objective error not matched by
    /// `catch`, [`Error::WorkerPanicked`] if a worker thread panicked, and
    /// propagates storage and sampler errors.
    #[allow(clippy::needless_pass_by_value)]
    pub fn optimize<F, O, E>(&mut self, objective: F, options: OptimizeOptions<E>) -> Result<()>
    where
        F: Fn(&mut Trial) -> core::result::Result<O, E> + Send + Sync + 'static,
        O: ObjectiveOutput + 'static,
        E: Display + 'static,
    {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "optimize",
            n_trials = ?options.n_trials,
            n_jobs = options.n_jobs
        )
        .entered();

        if options.n_jobs == 0 {
            return Err(Error::InvalidConfig("n_jobs must be at least 1"));
        }

        let budget = Budget::new(options.n_trials, options.timeout);
        if options.n_jobs == 1 {
            while budget.claim() {
                run_trial(
                    &mut self.worker,
                    &self.info,
                    &objective,
                    &options.catch,
                    &options.callbacks,
                )?;
            }
            trace_info!("optimize finished");
            return Ok(());
        }

        self.run_pool(Arc::new(objective), &options, Arc::new(budget))
    }

    fn run_pool<F, O, E>(
        &self,
        objective: Arc<F>,
        options: &OptimizeOptions<E>,
        budget: Arc<Budget>,
    ) -> Result<()>
    where
        F: Fn(&mut Trial) -> core::result::Result<O, E> + Send + Sync + 'static,
        O: ObjectiveOutput + 'static,
        E: Display + 'static,
    {
        let (tx, rx) = mpsc::channel::<(u32, Result<()>)>();
        let mut handles = Vec::new();
        for (thread_id, mut worker) in self.pool_workers(options.n_jobs)? {
            let info = self.info.clone();
            let objective = Arc::clone(&objective);
            let catch = options.catch.clone();
            let callbacks = options.callbacks.clone();
            let budget = Arc::clone(&budget);
            let tx = tx.clone();

            let handle = thread::spawn(move || {
                trace_debug!(thread_id, "worker started");
                let mut result = Ok(());
                while budget.claim() {
                    if let Err(e) = run_trial(&mut worker, &info, &*objective, &catch, &callbacks) {
                        budget.stop.store(true, Ordering::SeqCst);
                        result = Err(e);
                        break;
                    }
                }
                trace_debug!(thread_id, "worker stopped");
                // The receiver may be gone after a timeout.
                let _ = tx.send((thread_id, result));
            });
            handles.push((thread_id, handle));
        }
        drop(tx);

        let mut first_error = None;
        let mut reported = 0;
        while reported < handles.len() {
            let message = match budget.deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    rx.recv_timeout(remaining)
                }
                None => rx.recv().map_err(|_| mpsc::RecvTimeoutError::Disconnected),
            };
            match message {
                Ok((_, result)) => {
                    reported += 1;
                    if let Err(e) = result {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    budget.stop.store(true, Ordering::SeqCst);
                    trace_info!(reported, "optimize timed out; not waiting for running trials");
                    break;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    for (thread_id, handle) in handles {
                        if handle.join().is_err() {
                            return Err(Error::WorkerPanicked(thread_id));
                        }
                    }
                    return Err(Error::Internal("worker exited without reporting"));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                trace_info!("optimize finished");
                Ok(())
            }
        }
    }

    /// Builds workers `1..=n_jobs`, each with its own storage client and a
    /// sampler rebuilt from the study's configuration, after handing them
    /// this client's waiting trials.
    pub(super) fn pool_workers(&self, n_jobs: usize) -> Result<Vec<(u32, Worker)>> {
        let n_jobs = u32::try_from(n_jobs)
            .map_err(|_| Error::InvalidConfig("n_jobs does not fit in a thread id"))?;
        self.distribute_waiting(n_jobs)?;

        (1..=n_jobs)
            .map(|thread_id| {
                let sampler = self
                    .sampler_config
                    .for_worker(u64::from(thread_id))
                    .build()?;
                let worker = Worker::new(
                    &self.info,
                    WorkerId::new(self.client_id.clone(), thread_id),
                    sampler,
                    self.storage.create_client(thread_id)?,
                )?;
                Ok((thread_id, worker))
            })
            .collect()
    }

    /// Hands this client's waiting, thread-`0` trials to the pool workers
    /// round-robin.
    fn distribute_waiting(&self, n_jobs: u32) -> Result<()> {
        let main = WorkerId::new(self.client_id.clone(), 0);
        let waiting = self
            .storage
            .get_trials(Some(&self.info.study_id), None)?
            .into_iter()
            .filter(|t| t.state == TrialState::Waiting && t.worker_id == main);
        for (i, mut trial) in (0..).zip(waiting) {
            trial.worker_id = WorkerId::new(self.client_id.clone(), i % n_jobs + 1);
            self.storage.write_trial(&trial)?;
        }
        Ok(())
    }
}
