//! Job persistence abstraction.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::types::{EncodingJob, JobId};

/// Stores job snapshots. The dispatcher writes a snapshot after every
/// state change; readers never see a partially applied update.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn save(&self, job: EncodingJob);

    async fn get(&self, id: JobId) -> Option<EncodingJob>;

    /// All jobs, oldest first.
    async fn list(&self) -> Vec<EncodingJob>;

    async fn remove(&self, id: JobId) -> bool;
}

/// In-memory [`JobStore`].
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, EncodingJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn save(&self, job: EncodingJob) {
        self.jobs.write().await.insert(job.id, job);
    }

    async fn get(&self, id: JobId) -> Option<EncodingJob> {
        self.jobs.read().await.get(&id).cloned()
    }

    async fn list(&self) -> Vec<EncodingJob> {
        let mut jobs: Vec<EncodingJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    async fn remove(&self, id: JobId) -> bool {
        self.jobs.write().await.remove(&id).is_some()
    }
}
