use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Job lifecycle: `created -> queued -> uploading/processing ->
/// {complete | error | cancelled}`.
///
/// `Uploading` and `Processing` are both "chunk N of total in flight" and
/// carry identical invariants; the former is used by synchronous runs, the
/// latter by background runs. `Complete` and `Cancelled` are strictly
/// terminal. `Error` is terminal for the executor but can be re-entered
/// into an active status by an explicit resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Created,
    Queued,
    Uploading,
    Processing,
    Complete,
    Error,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Queued => "queued",
            JobStatus::Uploading => "uploading",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Error | JobStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether the state machine allows moving from `self` to `next`.
    /// Same-status writes are handled as no-ops by the store, not here.
    pub fn can_transition(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Created, Queued) => true,
            (Created | Queued, Uploading | Processing) => true,
            (Uploading | Processing, Uploading | Processing) => true,
            (Uploading | Processing, Complete) => true,
            // An explicit resume re-claims a failed job.
            (Error, Uploading | Processing) => true,
            (from, Error | Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One job ledger entry: identity, progress counters and status. The single
/// source of truth for resume and cancel decisions, keyed by job id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadJob {
    pub id: String,
    pub source_name: String,
    pub record_count: u64,
    pub total_chunks: u32,
    pub chunks_completed: u32,
    pub records_processed: u64,
    pub status: JobStatus,
    /// Cancellation intent, set by the controller and polled by the
    /// executor between chunks. The flag on this row is the token the
    /// executor actually observes.
    pub cancel_requested: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadJob {
    pub fn new(source_name: &str, record_count: u64, total_chunks: u32) -> Self {
        let now = Utc::now();
        UploadJob {
            id: Uuid::new_v4().to_string(),
            source_name: source_name.to_string(),
            record_count,
            total_chunks,
            chunks_completed: 0,
            records_processed: 0,
            status: JobStatus::Created,
            cancel_requested: false,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn progress_percent(&self) -> u32 {
        if self.total_chunks == 0 {
            return 100;
        }
        (self.chunks_completed * 100) / self.total_chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_reject_all_transitions() {
        for terminal in [JobStatus::Complete, JobStatus::Cancelled] {
            for next in [
                JobStatus::Created,
                JobStatus::Queued,
                JobStatus::Uploading,
                JobStatus::Processing,
                JobStatus::Complete,
                JobStatus::Error,
                JobStatus::Cancelled,
            ] {
                assert!(
                    !terminal.can_transition(next),
                    "{terminal} -> {next} should be rejected"
                );
            }
        }
    }

    #[test]
    fn error_is_resumable_only_into_active_statuses() {
        assert!(JobStatus::Error.can_transition(JobStatus::Uploading));
        assert!(JobStatus::Error.can_transition(JobStatus::Processing));
        assert!(!JobStatus::Error.can_transition(JobStatus::Complete));
        assert!(!JobStatus::Error.can_transition(JobStatus::Cancelled));
    }

    #[test]
    fn active_statuses_can_fail_or_cancel() {
        for active in [
            JobStatus::Created,
            JobStatus::Queued,
            JobStatus::Uploading,
            JobStatus::Processing,
        ] {
            assert!(active.can_transition(JobStatus::Error));
            assert!(active.can_transition(JobStatus::Cancelled));
        }
    }

    #[test]
    fn created_cannot_jump_to_complete() {
        assert!(!JobStatus::Created.can_transition(JobStatus::Complete));
        assert!(!JobStatus::Queued.can_transition(JobStatus::Complete));
    }

    #[test]
    fn progress_percent_handles_zero_chunks() {
        let job = UploadJob::new("empty.csv", 0, 0);
        assert_eq!(job.progress_percent(), 100);
    }
}
