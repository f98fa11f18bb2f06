use crate::{
    error::{LedgerError, ScratchError},
    state::models::{JobStatus, UploadJob},
};
use async_trait::async_trait;
use model::records::plan::ChunkPlan;

pub mod models;
pub mod sled_store;

/// Durable record of job identity, progress and status. All operations are
/// addressed by job id; there is no ambient "current job".
#[async_trait]
pub trait JobLedger: Send + Sync {
    async fn create_job(&self, job: &UploadJob) -> Result<(), LedgerError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<UploadJob>, LedgerError>;

    /// Advance progress counters after a successfully written chunk.
    /// Counters are monotonic: a write that would move either counter
    /// backwards is skipped, not an error.
    async fn update_progress(
        &self,
        job_id: &str,
        chunks_completed: u32,
        records_processed: u64,
    ) -> Result<(), LedgerError>;

    /// Apply a status transition, guarded by the job state machine.
    /// Setting the current status again is a no-op.
    async fn set_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), LedgerError>;

    /// Set the cancellation intent on an active job. Returns whether the
    /// flag was set; `false` means the job was already terminal and the
    /// cancel is a no-op.
    async fn request_cancel(&self, job_id: &str) -> Result<bool, LedgerError>;

    /// Jobs in `created` or `uploading` status, most recent first.
    async fn list_incomplete(
        &self,
        source_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<UploadJob>, LedgerError>;
}

/// Durable side-channel holding the serialized chunk plan for one job, so a
/// resumed or background run never needs the original source file again.
#[async_trait]
pub trait ScratchStore: Send + Sync {
    async fn put_plan(&self, job_id: &str, plan: &ChunkPlan) -> Result<(), ScratchError>;

    /// Absence of a plan is an error condition (`MissingPlan`), never a
    /// silent empty result.
    async fn get_plan(&self, job_id: &str) -> Result<ChunkPlan, ScratchError>;

    async fn delete_plan(&self, job_id: &str) -> Result<(), ScratchError>;
}
