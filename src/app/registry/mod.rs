// Job registry - Shared, injectable store of job records

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::errors::*;
use crate::domain::job::*;

/// In-memory store of job records keyed by id.
///
/// Records are replaced whole: `update` builds the next record from the
/// current one under the write lock, so readers never see a torn record.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, RenderJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking writer cannot leave a half-written record behind, so a
    // poisoned lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, RenderJob>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, RenderJob>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, job: RenderJob) {
        self.write().insert(job.id.clone(), job);
    }

    pub fn get(&self, id: &JobId) -> Result<RenderJob, DomainError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::JobNotFound(id.to_string()))
    }

    /// Replace a record with the result of `transition` and return the new record
    pub fn update<F>(&self, id: &JobId, transition: F) -> Result<RenderJob, DomainError>
    where
        F: FnOnce(&RenderJob) -> RenderJob,
    {
        let mut jobs = self.write();
        let current = jobs
            .get(id)
            .ok_or_else(|| DomainError::JobNotFound(id.to_string()))?;
        let next = transition(current);
        jobs.insert(id.clone(), next.clone());
        Ok(next)
    }

    /// Snapshot of all records, oldest first
    pub fn list(&self) -> Vec<RenderJob> {
        let mut jobs: Vec<RenderJob> = self.read().values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.as_str().cmp(b.id.as_str())));
        jobs
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
