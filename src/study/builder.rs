use std::sync::Arc;

use crate::error::{Error, Result};
use crate::record::StudyInfo;
use crate::sampler::Sampler;
use crate::sampler::random::RandomSampler;
use crate::search_space::SearchSpace;
use crate::storage::{MemoryStorage, Storage};
use crate::types::Target;

use super::Study;

/// A builder for constructing [`Study`] instances with a fluent API.
///
/// Created via [`Study::builder()`]. Collects the study id, targets,
/// sampler and storage before creating or loading the study.
///
/// # Defaults
///
/// - Study id: random
/// - Sampler: [`RandomSampler`]
/// - Storage: a fresh [`MemoryStorage`]
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use optsync::prelude::*;
///
/// let storage = Arc::new(MemoryStorage::new());
/// let first = Study::builder()
///     .study_id("shared")
///     .target(Target::maximize("accuracy"))
///     .sampler(TpeSampler::builder().seed(7).build().unwrap())
///     .shared_storage(storage.clone())
///     .build()
///     .unwrap();
///
/// // A second client joins the same study.
/// let second = Study::builder()
///     .study_id("shared")
///     .shared_storage(storage)
///     .load_if_exists(true)
///     .build()
///     .unwrap();
///
/// assert_eq!(second.info().targets, first.info().targets);
/// assert_ne!(second.client_id(), first.client_id());
/// ```
pub struct StudyBuilder {
    study_id: Option<String>,
    targets: Vec<Target>,
    search_space: Option<SearchSpace>,
    sampler: Option<Box<dyn Sampler>>,
    storage: Option<Arc<dyn Storage>>,
    load_if_exists: bool,
}

impl StudyBuilder {
    /// Create a new builder with default settings.
    pub(super) fn new() -> Self {
        Self {
            study_id: None,
            targets: Vec::new(),
            search_space: None,
            sampler: None,
            storage: None,
            load_if_exists: false,
        }
    }

    /// Set the study id.
    #[must_use]
    pub fn study_id(mut self, study_id: impl Into<String>) -> Self {
        self.study_id = Some(study_id.into());
        self
    }

    /// Add a target. Objective values are reported in the order targets
    /// are added.
    #[must_use]
    pub fn target(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    /// Replace all targets.
    #[must_use]
    pub fn targets(mut self, targets: impl IntoIterator<Item = Target>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    /// Declare the search space up front.
    #[must_use]
    pub fn search_space(mut self, search_space: SearchSpace) -> Self {
        self.search_space = Some(search_space);
        self
    }

    /// Set the sampler used for parameter suggestions.
    #[must_use]
    pub fn sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.sampler = Some(Box::new(sampler));
        self
    }

    /// Set the storage backend.
    #[must_use]
    pub fn storage(self, storage: impl Storage + 'static) -> Self {
        self.shared_storage(Arc::new(storage))
    }

    /// Set a storage backend that other studies share.
    #[must_use]
    pub fn shared_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Open the stored study instead of failing when the id is taken.
    #[must_use]
    pub fn load_if_exists(mut self, load: bool) -> Self {
        self.load_if_exists = load;
        self
    }

    /// Create or load the study.
    ///
    /// When loading, the stored targets and search space win over the ones
    /// given to the builder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a new study has no targets,
    /// [`Error::AlreadyExists`] if the id is taken and `load_if_exists` is
    /// off, or any storage or sampler setup error.
    pub fn build(self) -> Result<Study> {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let sampler = self
            .sampler
            .unwrap_or_else(|| Box::new(RandomSampler::new()));
        let study_id = self
            .study_id
            .unwrap_or_else(|| format!("study-{:016x}", fastrand::u64(..)));

        let existing = storage
            .get_studies(None)?
            .into_iter()
            .find(|s| s.study_id == study_id);
        let info = match existing {
            Some(info) if self.load_if_exists => {
                trace_debug!(study_id = %info.study_id, "loading existing study");
                info
            }
            Some(_) => return Err(Error::AlreadyExists(format!("study {study_id}"))),
            None => {
                if self.targets.is_empty() {
                    return Err(Error::InvalidConfig("a study needs at least one target"));
                }
                let mut info = StudyInfo::new(study_id, self.targets);
                info.search_space = self.search_space;
                storage.write_study(&info)?;
                trace_info!(study_id = %info.study_id, "study created");
                info
            }
        };
        Study::open(info, storage, sampler)
    }
}
