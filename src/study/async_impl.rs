use core::fmt::Display;
use core::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::objective::ObjectiveOutput;
use crate::trial::Trial;

use super::optimize::Budget;
use super::{OptimizeOptions, Study, Worker, run_trial};

impl Study {
    /// Run optimization from async code.
    ///
    /// Each trial runs `ask → objective → tell` inside
    /// [`spawn_blocking`](tokio::task::spawn_blocking), keeping the async
    /// runtime responsive for CPU-bound objectives. Up to `n_jobs` trials
    /// run at once, each on one of `n_jobs` workers with its own storage
    /// client and sampler, built the same way as for [`Study::optimize`].
    /// A worker is only handed a new trial once its previous one finished.
    ///
    /// When the timeout expires, running evaluations are not awaited. They
    /// still write their trials when they finish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `n_jobs` is zero,
    /// [`Error::Objective`] for the first objective error not matched by
    /// `catch`, and [`Error::TaskError`] if a blocking task panics.
    ///
    /// # Examples
    ///
    /// ```
    /// use optsync::prelude::*;
    ///
    /// # #[cfg(feature = "async")]
    /// # async fn example() -> optsync::Result<()> {
    /// let mut study = Study::builder()
    ///     .target(Target::minimize("loss"))
    ///     .sampler(RandomSampler::with_seed(42))
    ///     .build()?;
    ///
    /// study
    ///     .optimize_async(
    ///         |trial: &mut Trial| {
    ///             let x = trial.suggest_float("x", -10.0, 10.0)?;
    ///             Ok::<_, Error>(x * x)
    ///         },
    ///         OptimizeOptions::new().n_trials(10).n_jobs(2),
    ///     )
    ///     .await?;
    ///
    /// assert_eq!(study.trials()?.len(), 10);
    /// # Ok(())
    /// # }
    /// ```
    #[allow(clippy::needless_pass_by_value)]
    pub async fn optimize_async<F, O, E>(
        &mut self,
        objective: F,
        options: OptimizeOptions<E>,
    ) -> Result<()>
    where
        F: Fn(&mut Trial) -> core::result::Result<O, E> + Send + Sync + 'static,
        O: ObjectiveOutput + 'static,
        E: Display + 'static,
    {
        if options.n_jobs == 0 {
            return Err(Error::InvalidConfig("n_jobs must be at least 1"));
        }
        trace_info!(n_trials = ?options.n_trials, n_jobs = options.n_jobs, "optimize_async started");

        let objective = Arc::new(objective);
        let budget = Budget::new(options.n_trials, options.timeout);
        let mut idle: Vec<Worker> = self
            .pool_workers(options.n_jobs)?
            .into_iter()
            .map(|(_, worker)| worker)
            .collect();
        let mut tasks = JoinSet::new();
        let mut first_error = None;

        loop {
            while first_error.is_none() && !idle.is_empty() && budget.claim() {
                let Some(mut worker) = idle.pop() else {
                    break;
                };
                let info = self.info.clone();
                let objective = Arc::clone(&objective);
                let catch = options.catch.clone();
                let callbacks = options.callbacks.clone();
                tasks.spawn_blocking(move || {
                    let result = run_trial(&mut worker, &info, &*objective, &catch, &callbacks);
                    (worker, result)
                });
            }

            let next = match budget.deadline {
                Some(deadline) => {
                    let deadline = tokio::time::Instant::from_std(deadline);
                    if let Ok(next) = tokio::time::timeout_at(deadline, tasks.join_next()).await {
                        next
                    } else {
                        budget.stop.store(true, Ordering::SeqCst);
                        trace_info!(running = tasks.len(), "optimize_async timed out");
                        tasks.detach_all();
                        return Ok(());
                    }
                }
                None => tasks.join_next().await,
            };

            match next {
                None => break,
                Some(Ok((worker, Ok(_)))) => idle.push(worker),
                Some(Ok((worker, Err(e)))) => {
                    idle.push(worker);
                    budget.stop.store(true, Ordering::SeqCst);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Some(Err(e)) => return Err(Error::TaskError(e.to_string())),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                trace_info!("optimize_async finished");
                Ok(())
            }
        }
    }
}
