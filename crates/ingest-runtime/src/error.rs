use ingest_core::{
    error::{LedgerError, ScratchError},
    state::models::JobStatus,
};
use thiserror::Error;

/// Top-level errors for the upload orchestration layer.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// The controller refuses a second executor for a job that already has
    /// one in flight.
    #[error("Job {0} is already being driven by an executor")]
    JobAlreadyActive(String),

    #[error("Job {job_id} cannot be resumed from status {status}")]
    NotResumable { job_id: String, status: JobStatus },

    /// A chunk write failed after the bulk writer exhausted its own retry
    /// policy. The failure is recorded in the ledger before this surfaces.
    #[error("Chunk {chunk} of job {job_id} failed: {message}")]
    ChunkWrite {
        job_id: String,
        chunk: u32,
        message: String,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Scratch store error: {0}")]
    Scratch(#[from] ScratchError),
}
