use crate::{
    error::UploadError,
    executor::{RunMode, UploadExecutor, UploadOutcome},
};
use ingest_core::{
    sink::BulkWriter,
    state::{
        JobLedger, ScratchStore,
        models::{JobStatus, UploadJob},
    },
};
use ingest_processing::{chunk::build_plan, dedup::dedup_records, transform::transform_rows};
use model::records::{plan::DEFAULT_CHUNK_SIZE, raw::RawRow};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};
use tracing::{error, info, warn};

/// How many resumable jobs a listing returns.
const INCOMPLETE_LIMIT: usize = 5;

/// Result of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The intent flag was set; the running executor stops at the next
    /// chunk boundary.
    Requested,
    /// No executor was in flight, so the job was finalized immediately.
    Cancelled,
    /// The job was already terminal; nothing to do.
    NotActive,
}

/// Public entry points for uploads: start, start in background, resume,
/// cancel and query. Composes the transform/dedup/chunk pipeline with the
/// ledger, scratch store and bulk writer, and confines concurrency to one
/// executor per job id.
pub struct JobController {
    ledger: Arc<dyn JobLedger>,
    scratch: Arc<dyn ScratchStore>,
    writer: Arc<dyn BulkWriter>,
    active: Arc<Mutex<HashSet<String>>>,
    chunk_size: usize,
}

impl JobController {
    pub fn new(
        ledger: Arc<dyn JobLedger>,
        scratch: Arc<dyn ScratchStore>,
        writer: Arc<dyn BulkWriter>,
    ) -> Self {
        Self {
            ledger,
            scratch,
            writer,
            active: Arc::new(Mutex::new(HashSet::new())),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Transform, deduplicate, plan and run to completion in the caller's
    /// flow. The terminal error, if any, propagates after the ledger has
    /// been marked.
    pub async fn start(
        &self,
        rows: &[RawRow],
        source_name: &str,
    ) -> Result<UploadOutcome, UploadError> {
        let job_id = self.prepare(rows, source_name).await?;
        self.claim(&job_id)?;
        let result = self.executor().run(&job_id, RunMode::Foreground).await;
        self.release(&job_id);
        result
    }

    /// Identical setup to `start`, but the executor runs on a spawned task.
    /// The returned job id may not have progressed at all by the time this
    /// returns; failures land in the ledger and are discoverable only
    /// through `status`/`list_incomplete`.
    pub async fn start_in_background(
        &self,
        rows: &[RawRow],
        source_name: &str,
    ) -> Result<String, UploadError> {
        let job_id = self.prepare(rows, source_name).await?;
        self.claim(&job_id)?;

        let executor = self.executor();
        let active = self.active.clone();
        let spawned_id = job_id.clone();
        tokio::spawn(async move {
            if let Err(err) = executor.run(&spawned_id, RunMode::Background).await {
                error!(job_id = %spawned_id, error = %err, "Background upload failed");
            }
            if let Ok(mut active) = active.lock() {
                active.remove(&spawned_id);
            }
        });

        Ok(job_id)
    }

    /// Restart an interrupted or failed job from its first unfinished
    /// chunk. The persisted chunk plan is trusted exclusively; callers do
    /// not re-supply rows, so the resumed boundaries are exactly the
    /// original ones. A missing plan surfaces as an error and the job keeps
    /// its last known status.
    pub async fn resume(&self, job_id: &str) -> Result<UploadOutcome, UploadError> {
        let job = self.require_job(job_id).await?;
        if matches!(job.status, JobStatus::Complete | JobStatus::Cancelled) {
            return Err(UploadError::NotResumable {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }

        self.claim(job_id)?;
        let result = self.executor().run(job_id, RunMode::Foreground).await;
        self.release(job_id);
        result
    }

    /// Set the cancellation intent for an active job. If an executor is in
    /// flight it finishes the current chunk first and then stops; without
    /// one the job is finalized here. Cancelling a terminal job is a no-op,
    /// not an error.
    pub async fn cancel(&self, job_id: &str) -> Result<CancelOutcome, UploadError> {
        let job = self.require_job(job_id).await?;
        if job.status.is_terminal() {
            return Ok(CancelOutcome::NotActive);
        }

        if !self.ledger.request_cancel(job_id).await? {
            return Ok(CancelOutcome::NotActive);
        }

        if self.is_running(job_id) {
            info!(job_id = %job_id, "Cancellation requested, executor stops at next chunk boundary");
            return Ok(CancelOutcome::Requested);
        }

        self.ledger
            .set_status(job_id, JobStatus::Cancelled, None)
            .await?;
        if let Err(err) = self.writer.tag_cancelled(job_id).await {
            warn!(job_id = %job_id, error = %err, "Failed to tag cancelled records");
        }
        info!(job_id = %job_id, "Job cancelled");
        Ok(CancelOutcome::Cancelled)
    }

    /// Read-only ledger snapshot.
    pub async fn status(&self, job_id: &str) -> Result<UploadJob, UploadError> {
        self.require_job(job_id).await
    }

    /// Resumable jobs, most recent first.
    pub async fn list_incomplete(
        &self,
        source_name: Option<&str>,
    ) -> Result<Vec<UploadJob>, UploadError> {
        Ok(self
            .ledger
            .list_incomplete(source_name, INCOMPLETE_LIMIT)
            .await?)
    }

    /// Job ids currently claimed by an in-process executor.
    pub fn active_jobs(&self) -> Vec<String> {
        self.active
            .lock()
            .map(|active| active.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Transform -> dedup -> plan, then persist ledger row and chunk plan
    /// together, leaving the job `queued`.
    async fn prepare(&self, rows: &[RawRow], source_name: &str) -> Result<String, UploadError> {
        let records = dedup_records(transform_rows(rows));
        let plan = build_plan(records, self.chunk_size, source_name);

        let job = UploadJob::new(source_name, plan.record_count() as u64, plan.total_chunks);
        info!(
            job_id = %job.id,
            source = %source_name,
            records = plan.record_count(),
            total_chunks = plan.total_chunks,
            "Prepared upload job"
        );

        self.ledger.create_job(&job).await?;
        if let Err(err) = self.scratch.put_plan(&job.id, &plan).await {
            // The ledger row exists but the plan does not; mark the job so
            // the inconsistency is visible rather than silent.
            let message = err.to_string();
            if let Err(ledger_err) = self
                .ledger
                .set_status(&job.id, JobStatus::Error, Some(&message))
                .await
            {
                error!(job_id = %job.id, error = %ledger_err, "Failed to record plan write failure");
            }
            return Err(err.into());
        }
        self.ledger
            .set_status(&job.id, JobStatus::Queued, None)
            .await?;

        Ok(job.id)
    }

    fn executor(&self) -> UploadExecutor {
        UploadExecutor::new(
            self.ledger.clone(),
            self.scratch.clone(),
            self.writer.clone(),
        )
    }

    async fn require_job(&self, job_id: &str) -> Result<UploadJob, UploadError> {
        self.ledger
            .get_job(job_id)
            .await?
            .ok_or_else(|| UploadError::JobNotFound(job_id.to_string()))
    }

    fn claim(&self, job_id: &str) -> Result<(), UploadError> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| UploadError::JobAlreadyActive(job_id.to_string()))?;
        if !active.insert(job_id.to_string()) {
            return Err(UploadError::JobAlreadyActive(job_id.to_string()));
        }
        Ok(())
    }

    fn release(&self, job_id: &str) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(job_id);
        }
    }

    fn is_running(&self, job_id: &str) -> bool {
        self.active
            .lock()
            .map(|active| active.contains(job_id))
            .unwrap_or(false)
    }
}
