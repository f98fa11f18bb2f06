use crate::{
    error::{LedgerError, ScratchError},
    state::{
        JobLedger, ScratchStore,
        models::{JobStatus, UploadJob},
    },
};
use async_trait::async_trait;
use chrono::Utc;
use model::records::plan::ChunkPlan;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use std::path::Path;

/// Job ledger and scratch payload store over a single sled database.
/// Ledger rows live under `job:{id}`, chunk plans under `plan:{id}`; the
/// two are correlated by job id and accessed independently.
pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn job_key(job_id: &str) -> String {
        format!("job:{job_id}")
    }

    #[inline]
    fn plan_key(job_id: &str) -> String {
        format!("plan:{job_id}")
    }

    fn read_job(
        tx: &TransactionalTree,
        key: &str,
    ) -> Result<Option<UploadJob>, ConflictableTransactionError<LedgerError>> {
        match tx.get(key)? {
            Some(bytes) => {
                let job = bincode::deserialize(&bytes).map_err(|e| {
                    ConflictableTransactionError::Abort(LedgerError::Serialization(e))
                })?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    fn write_job(
        tx: &TransactionalTree,
        key: &str,
        job: &UploadJob,
    ) -> Result<(), ConflictableTransactionError<LedgerError>> {
        let bytes = bincode::serialize(job)
            .map_err(|e| ConflictableTransactionError::Abort(LedgerError::Serialization(e)))?;
        tx.insert(key, bytes.as_slice())?;
        Ok(())
    }

    fn unwrap_txn<T>(result: Result<T, TransactionError<LedgerError>>) -> Result<T, LedgerError> {
        match result {
            Ok(value) => Ok(value),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(LedgerError::Sled(e)),
        }
    }
}

#[async_trait]
impl JobLedger for SledStateStore {
    async fn create_job(&self, job: &UploadJob) -> Result<(), LedgerError> {
        let key = Self::job_key(&job.id);
        let result = self.db.transaction::<_, _, LedgerError>(|tx| {
            if tx.get(&*key)?.is_some() {
                return Err(ConflictableTransactionError::Abort(
                    LedgerError::DuplicateJob(job.id.clone()),
                ));
            }
            Self::write_job(tx, &key, job)?;
            Ok(())
        });
        Self::unwrap_txn(result)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<UploadJob>, LedgerError> {
        match self.db.get(Self::job_key(job_id))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn update_progress(
        &self,
        job_id: &str,
        chunks_completed: u32,
        records_processed: u64,
    ) -> Result<(), LedgerError> {
        let key = Self::job_key(job_id);
        let result = self.db.transaction::<_, _, LedgerError>(|tx| {
            let mut job = Self::read_job(tx, &key)?.ok_or_else(|| {
                ConflictableTransactionError::Abort(LedgerError::JobNotFound(job_id.to_string()))
            })?;

            // Counters never decrease, and a terminal job never moves.
            // A stale or out-of-order write is skipped, not an error.
            if job.status.is_terminal()
                || chunks_completed < job.chunks_completed
                || records_processed < job.records_processed
            {
                return Ok(());
            }

            job.chunks_completed = chunks_completed.min(job.total_chunks);
            job.records_processed = records_processed.min(job.record_count);
            job.updated_at = Utc::now();
            Self::write_job(tx, &key, &job)
        });
        Self::unwrap_txn(result)
    }

    async fn set_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), LedgerError> {
        let key = Self::job_key(job_id);
        let result = self.db.transaction::<_, _, LedgerError>(|tx| {
            let mut job = Self::read_job(tx, &key)?.ok_or_else(|| {
                ConflictableTransactionError::Abort(LedgerError::JobNotFound(job_id.to_string()))
            })?;

            if job.status == status {
                return Ok(());
            }
            if !job.status.can_transition(status) {
                return Err(ConflictableTransactionError::Abort(
                    LedgerError::InvalidTransition {
                        job_id: job_id.to_string(),
                        from: job.status,
                        to: status,
                    },
                ));
            }

            // Re-claiming a failed job through resume starts from a clean
            // slate: the old failure and any stale cancel intent are gone.
            if job.status == JobStatus::Error && status.is_active() {
                job.error_message = None;
                job.cancel_requested = false;
            }

            job.status = status;
            job.updated_at = Utc::now();
            match status {
                JobStatus::Error => job.error_message = error_message.map(str::to_string),
                JobStatus::Complete => job.completed_at = Some(Utc::now()),
                _ => {}
            }
            Self::write_job(tx, &key, &job)
        });
        Self::unwrap_txn(result)
    }

    async fn request_cancel(&self, job_id: &str) -> Result<bool, LedgerError> {
        let key = Self::job_key(job_id);
        let result = self.db.transaction::<_, _, LedgerError>(|tx| {
            let mut job = Self::read_job(tx, &key)?.ok_or_else(|| {
                ConflictableTransactionError::Abort(LedgerError::JobNotFound(job_id.to_string()))
            })?;

            if job.status.is_terminal() {
                return Ok(false);
            }

            job.cancel_requested = true;
            job.updated_at = Utc::now();
            Self::write_job(tx, &key, &job)?;
            Ok(true)
        });
        Self::unwrap_txn(result)
    }

    async fn list_incomplete(
        &self,
        source_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<UploadJob>, LedgerError> {
        let mut jobs = Vec::new();
        for item in self.db.scan_prefix("job:") {
            let (_key, bytes) = item?;
            let job: UploadJob = bincode::deserialize(&bytes)?;
            let resumable = matches!(job.status, JobStatus::Created | JobStatus::Uploading);
            let matches_source = source_name.is_none_or(|name| job.source_name == name);
            if resumable && matches_source {
                jobs.push(job);
            }
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        Ok(jobs)
    }
}

#[async_trait]
impl ScratchStore for SledStateStore {
    async fn put_plan(&self, job_id: &str, plan: &ChunkPlan) -> Result<(), ScratchError> {
        let bytes = bincode::serialize(plan)?;
        self.db.insert(Self::plan_key(job_id), bytes)?;
        Ok(())
    }

    async fn get_plan(&self, job_id: &str) -> Result<ChunkPlan, ScratchError> {
        match self.db.get(Self::plan_key(job_id))? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Err(ScratchError::MissingPlan(job_id.to_string())),
        }
    }

    async fn delete_plan(&self, job_id: &str) -> Result<(), ScratchError> {
        self.db.remove(Self::plan_key(job_id))?;
        Ok(())
    }
}
