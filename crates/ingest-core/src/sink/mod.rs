use crate::error::SinkError;
use async_trait::async_trait;
use model::records::site::SiteRecord;

pub mod postgres;

/// The external bulk-write boundary the executor delegates chunk
/// persistence to.
#[async_trait]
pub trait BulkWriter: Send + Sync {
    /// Upsert one chunk of records, idempotent on the natural key:
    /// re-submitting the same record must not create duplicates or clobber
    /// previously written, non-overridden fields. `job_id` tags the rows so
    /// a later cancellation can find them.
    async fn upsert(&self, job_id: &str, records: &[SiteRecord]) -> Result<(), SinkError>;

    /// Mark rows written by a cancelled job. Best-effort compensation, not
    /// a rollback; callers log failures and never escalate them to job
    /// failure.
    async fn tag_cancelled(&self, job_id: &str) -> Result<(), SinkError>;
}
