//! In-memory job catalog.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::core::executor::{JobCatalog, JobProfile};
use crate::util::serde::JobProfileId;

/// Catalog backed by a map of registered profiles.
///
/// Profiles are eligible unless explicitly disabled, which models a device
/// profile whose port is currently unconfigured.
#[derive(Debug, Default)]
pub struct InMemoryJobCatalog {
    profiles: RwLock<HashMap<JobProfileId, JobProfile>>,
    disabled: RwLock<HashSet<JobProfileId>>,
}

impl InMemoryJobCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a profile.
    pub fn insert(&self, profile: JobProfile) {
        self.profiles.write().insert(profile.id.clone(), profile);
    }

    /// Remove a profile. Returns it if it was registered.
    pub fn remove(&self, id: &JobProfileId) -> Option<JobProfile> {
        self.profiles.write().remove(id)
    }

    /// Toggle whether a profile may run.
    pub fn set_eligible(&self, id: &JobProfileId, eligible: bool) {
        let mut disabled = self.disabled.write();
        if eligible {
            disabled.remove(id);
        } else {
            disabled.insert(id.clone());
        }
    }

    /// Number of registered profiles.
    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    /// Whether no profiles are registered.
    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}

impl JobCatalog for InMemoryJobCatalog {
    fn resolve(&self, id: &JobProfileId) -> Option<JobProfile> {
        self.profiles.read().get(id).cloned()
    }

    fn is_eligible(&self, id: &JobProfileId) -> bool {
        self.profiles.read().contains_key(id) && !self.disabled.read().contains(id)
    }
}
