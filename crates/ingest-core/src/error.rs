use crate::state::models::JobStatus;
use thiserror::Error;

/// Errors from the durable job ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job already exists: {0}")]
    DuplicateJob(String),

    /// The requested status change is not allowed by the job state machine.
    /// Terminal statuses (`complete`, `cancelled`) are never left; `error`
    /// is left only through an explicit resume.
    #[error("Invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Errors from the scratch payload store holding persisted chunk plans.
#[derive(Debug, Error)]
pub enum ScratchError {
    /// No persisted chunk plan for this job id. Fatal for the run that
    /// expected it; the job is left in its last known ledger status.
    #[error("No chunk plan found for job {0}")]
    MissingPlan(String),

    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Errors from the bulk writer boundary.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Write failed: {0}")]
    Write(String),
}
