use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::record::{Parameter, StudyInfo, TrialRecord, WorkerId};
use crate::sampler::Sampler;
use crate::storage::StorageClient;
use crate::trial::{SharedClient, SharedSampler, Trial};
use crate::trial_queue::TrialQueue;
use crate::types::{Timestamp, TrialState};

/// Everything one ask/tell loop owns.
///
/// Never shared between threads: every worker has its own sampler cache,
/// storage client and queue.
pub(crate) struct Worker {
    worker_id: WorkerId,
    sampler: SharedSampler,
    client: SharedClient,
    queue: TrialQueue,
}

impl Worker {
    pub(crate) fn new(
        study: &StudyInfo,
        worker_id: WorkerId,
        mut sampler: Box<dyn Sampler>,
        client: Box<dyn StorageClient>,
    ) -> Result<Self> {
        sampler.init(study)?;
        Ok(Self {
            queue: TrialQueue::new(worker_id.clone(), &[TrialState::Waiting]),
            worker_id,
            sampler: Arc::new(Mutex::new(sampler)),
            client: Arc::new(Mutex::new(client)),
        })
    }

    pub(crate) fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub(crate) fn sampler(&self) -> &SharedSampler {
        &self.sampler
    }

    /// Starts the next trial: a waiting trial this worker owns, or a new one.
    ///
    /// The storage timestamp is fetched once, before any read. The trial
    /// read that syncs the queue is reused for the sampler when both were
    /// last synced at the same point. A claimed waiting trial goes back to
    /// the queue if the trial cannot be started.
    pub(crate) fn ask(&mut self, study: &StudyInfo) -> Result<Trial> {
        let shared_client = Arc::clone(&self.client);
        let client = shared_client.lock();
        let now = client.get_current_timestamp()?;
        let queue_since = self.queue.last_update_time();
        let trials = client.get_trials(Some(&study.study_id), queue_since)?;
        self.queue.sync(&trials);
        self.queue.update_timestamp(now);

        let claimed = self.queue.get_trial(TrialState::Waiting);
        let mut record = if let Some(waiting) = &claimed {
            trace_debug!(trial_id = %waiting.trial_id, "claimed waiting trial");
            let mut record = waiting.clone();
            record.worker_id = self.worker_id.clone();
            record
        } else {
            TrialRecord::new(
                new_trial_id(),
                study.study_id.clone(),
                self.worker_id.clone(),
                TrialState::Created,
            )
        };

        let proposals = match self.start(study, &**client, &mut record, now, queue_since, &trials) {
            Ok(proposals) => proposals,
            Err(e) => {
                if let Some(waiting) = claimed {
                    trace_debug!(trial_id = %waiting.trial_id, "returning trial to queue");
                    self.queue.requeue(waiting);
                }
                return Err(e);
            }
        };
        drop(client);
        trace_debug!(trial_id = %record.trial_id, "trial started");

        Ok(Trial::new(
            record,
            proposals,
            Arc::clone(&self.sampler),
            Arc::clone(&self.client),
        ))
    }

    /// Syncs the sampler, draws the joint sample and writes `record` as
    /// running. Returns the proposals not yet on the record.
    fn start(
        &self,
        study: &StudyInfo,
        client: &dyn StorageClient,
        record: &mut TrialRecord,
        now: Option<Timestamp>,
        queue_since: Option<Timestamp>,
        trials: &[TrialRecord],
    ) -> Result<BTreeMap<String, Parameter>> {
        let mut sampler = self.sampler.lock();
        let sampler_since = sampler.last_update_time();
        if now.is_none() || sampler_since != now {
            if sampler_since == queue_since {
                sampler.sync(trials)?;
            } else {
                trace_debug!(since = ?sampler_since, "separate sampler read");
                let fresh = client.get_trials(Some(&study.study_id), sampler_since)?;
                sampler.sync(&fresh)?;
            }
            sampler.update_timestamp(now);
        }
        let draw = sampler.joint_sample(&record.parameters)?;
        drop(sampler);

        record.system_attrs.extend(draw.system_attrs);
        record.state = TrialState::Running;
        client.write_trial(record)?;

        Ok(draw
            .parameters
            .into_iter()
            .filter(|(name, _)| !record.parameters.contains_key(name))
            .collect())
    }
}

/// A random 128-bit trial id.
pub(crate) fn new_trial_id() -> String {
    format!("{:016x}{:016x}", fastrand::u64(..), fastrand::u64(..))
}
