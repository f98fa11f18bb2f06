use crate::error::UploadError;
use ingest_core::{
    sink::BulkWriter,
    state::{JobLedger, ScratchStore, models::JobStatus},
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Whether the executor runs in the caller's flow or decoupled from it.
/// Both drive the identical loop; only the active ledger status differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Foreground,
    Background,
}

impl RunMode {
    fn active_status(&self) -> JobStatus {
        match self {
            RunMode::Foreground => JobStatus::Uploading,
            RunMode::Background => JobStatus::Processing,
        }
    }
}

/// Terminal result of one executor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Complete {
        job_id: String,
        records_processed: u64,
        resumed: bool,
    },
    Cancelled {
        job_id: String,
        chunks_completed: u32,
    },
}

/// Drives one job's chunk plan through the bulk writer, strictly in index
/// order, advancing the ledger after every chunk. Exactly one executor may
/// be in flight per job id; the controller enforces that.
pub struct UploadExecutor {
    ledger: Arc<dyn JobLedger>,
    scratch: Arc<dyn ScratchStore>,
    writer: Arc<dyn BulkWriter>,
}

impl UploadExecutor {
    pub fn new(
        ledger: Arc<dyn JobLedger>,
        scratch: Arc<dyn ScratchStore>,
        writer: Arc<dyn BulkWriter>,
    ) -> Self {
        Self {
            ledger,
            scratch,
            writer,
        }
    }

    pub async fn run(&self, job_id: &str, mode: RunMode) -> Result<UploadOutcome, UploadError> {
        let job = self
            .ledger
            .get_job(job_id)
            .await?
            .ok_or_else(|| UploadError::JobNotFound(job_id.to_string()))?;

        // A missing plan is fatal for this run and leaves the job in its
        // last known ledger status.
        let plan = self.scratch.get_plan(job_id).await?;

        let resumed = job.chunks_completed > 0;
        let mut chunks_completed = job.chunks_completed;
        let mut records_processed = job.records_processed;

        self.ledger
            .set_status(job_id, mode.active_status(), None)
            .await?;
        info!(
            job_id = %job_id,
            source = %plan.source_name,
            total_chunks = plan.total_chunks,
            starting_at = chunks_completed,
            resumed,
            "Executor claimed job"
        );

        for index in chunks_completed..plan.total_chunks {
            // Cancellation is cooperative: intent is re-read from the
            // ledger before every chunk, never mid-chunk.
            let current = self
                .ledger
                .get_job(job_id)
                .await?
                .ok_or_else(|| UploadError::JobNotFound(job_id.to_string()))?;
            if current.cancel_requested {
                info!(
                    job_id = %job_id,
                    chunk = index,
                    "Cancellation observed at chunk boundary, stopping"
                );
                self.ledger
                    .set_status(job_id, JobStatus::Cancelled, None)
                    .await?;
                self.tag_cancelled(job_id).await;
                return Ok(UploadOutcome::Cancelled {
                    job_id: job_id.to_string(),
                    chunks_completed,
                });
            }

            let chunk = plan.chunk(index);
            if let Err(err) = self.writer.upsert(job_id, chunk).await {
                let message = err.to_string();
                error!(
                    job_id = %job_id,
                    chunk = index,
                    error = %message,
                    "Chunk write failed, stopping job"
                );
                // The ledger is the authoritative record of the failure,
                // whether or not a caller observes this error.
                if let Err(ledger_err) = self
                    .ledger
                    .set_status(job_id, JobStatus::Error, Some(&message))
                    .await
                {
                    error!(job_id = %job_id, error = %ledger_err, "Failed to record job error");
                }
                return Err(UploadError::ChunkWrite {
                    job_id: job_id.to_string(),
                    chunk: index,
                    message,
                });
            }

            chunks_completed = index + 1;
            records_processed += chunk.len() as u64;

            // A progress-write failure never aborts a chunk that was
            // already written; the worst case is an idempotent re-send of
            // this chunk on a later resume.
            if let Err(err) = self
                .ledger
                .update_progress(job_id, chunks_completed, records_processed)
                .await
            {
                warn!(
                    job_id = %job_id,
                    chunk = index,
                    error = %err,
                    "Failed to persist progress, continuing"
                );
            }
            info!(
                job_id = %job_id,
                chunk = chunks_completed,
                total = plan.total_chunks,
                records = records_processed,
                "Chunk written"
            );
        }

        self.ledger
            .set_status(job_id, JobStatus::Complete, None)
            .await?;
        if let Err(err) = self.scratch.delete_plan(job_id).await {
            warn!(job_id = %job_id, error = %err, "Failed to delete scratch plan");
        }
        info!(
            job_id = %job_id,
            records = records_processed,
            "Upload complete"
        );

        Ok(UploadOutcome::Complete {
            job_id: job_id.to_string(),
            records_processed,
            resumed,
        })
    }

    /// Best-effort compensation: tag already-written rows of a cancelled
    /// job. Failures are logged and never escalate.
    async fn tag_cancelled(&self, job_id: &str) {
        if let Err(err) = self.writer.tag_cancelled(job_id).await {
            warn!(job_id = %job_id, error = %err, "Failed to tag cancelled records");
        }
    }
}
