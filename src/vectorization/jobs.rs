//! Vectorization job tracking: live progress in memory, durable rows in the
//! metadata store

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::Database;
use crate::types::{JobStatus, VectorizationJob};

pub struct JobTracker {
    db: Arc<Database>,
    live: DashMap<Uuid, VectorizationJob>,
}

impl JobTracker {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            live: DashMap::new(),
        }
    }

    /// Create a job in the processing state
    pub fn begin(&self, document_id: Uuid, organization_id: Uuid) -> VectorizationJob {
        let job = VectorizationJob::processing(document_id, organization_id);
        if let Err(e) = self.db.insert_job(&job) {
            tracing::error!("Failed to persist job {}: {}", job.id, e);
        }
        self.live.insert(job.id, job.clone());
        job
    }

    /// Push updated counters for a running job
    pub fn update(&self, job: &VectorizationJob) {
        if let Err(e) = self.db.update_job(job) {
            tracing::error!("Failed to update job {}: {}", job.id, e);
        }
        self.live.insert(job.id, job.clone());
    }

    /// Mark a job completed. `chunks_processed < chunks_total` flags
    /// partial success; the failure note carries the failed batch ranges.
    pub fn finish(
        &self,
        job: &mut VectorizationJob,
        chunks_total: u32,
        chunks_processed: u32,
        partial_failure_note: Option<String>,
    ) {
        job.status = JobStatus::Completed;
        job.chunks_total = chunks_total;
        job.chunks_processed = chunks_processed;
        job.error = partial_failure_note;
        job.completed_at = Some(Utc::now());
        self.update(job);
    }

    /// Mark a job failed
    pub fn fail(&self, job: &mut VectorizationJob, error: &str) {
        job.status = JobStatus::Failed;
        job.error = Some(error.to_string());
        job.completed_at = Some(Utc::now());
        self.update(job);
    }

    /// Look up a job, preferring live state over the persisted row
    pub fn get(&self, job_id: Uuid) -> Result<Option<VectorizationJob>> {
        if let Some(job) = self.live.get(&job_id) {
            return Ok(Some(job.clone()));
        }
        self.db.get_job(job_id)
    }
}
