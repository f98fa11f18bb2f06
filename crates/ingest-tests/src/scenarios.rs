#[cfg(test)]
mod tests {
    use crate::{
        controller_with, sample_rows, site_row,
        utils::MemoryBulkWriter,
    };
    use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
    use ingest_core::{
        error::ScratchError,
        sink::BulkWriter,
        state::{
            JobLedger, ScratchStore,
            models::{JobStatus, UploadJob},
            sled_store::SledStateStore,
        },
    };
    use ingest_processing::{chunk::build_plan, dedup::dedup_records, transform::transform_rows};
    use ingest_runtime::{
        controller::{CancelOutcome, JobController},
        error::UploadError,
        executor::UploadOutcome,
    };
    use std::{path::Path, sync::Arc, time::Duration};
    use tempfile::tempdir;

    fn setup(
        state_dir: &Path,
        chunk_size: usize,
        writer: Arc<MemoryBulkWriter>,
    ) -> (Arc<SledStateStore>, Arc<JobController>) {
        let store = Arc::new(SledStateStore::open(state_dir).expect("open sled store"));
        let controller = Arc::new(
            JobController::new(store.clone(), store.clone(), writer).with_chunk_size(chunk_size),
        );
        (store, controller)
    }

    async fn wait_terminal(controller: &JobController, job_id: &str) -> UploadJob {
        for _ in 0..250 {
            let job = controller.status(job_id).await.expect("status");
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {job_id} did not reach a terminal status");
    }

    #[tokio::test]
    async fn upload_completes_and_deletes_plan() {
        let dir = tempdir().expect("state dir");
        let writer = MemoryBulkWriter::new();
        let (store, controller) = setup(dir.path(), 250, writer.clone());

        let outcome = controller
            .start(&sample_rows(530), "sites.csv")
            .await
            .expect("upload");

        let job_id = match outcome {
            UploadOutcome::Complete {
                job_id,
                records_processed,
                resumed,
            } => {
                assert_eq!(records_processed, 530);
                assert!(!resumed);
                job_id
            }
            other => panic!("expected complete outcome, got {other:?}"),
        };

        let job = controller.status(&job_id).await.expect("status");
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.chunks_completed, 3);
        assert_eq!(job.records_processed, 530);
        assert!(job.completed_at.is_some());

        // Chunk boundaries follow the plan exactly, last chunk short.
        let sizes: Vec<usize> = writer.calls().iter().map(|c| c.record_count).collect();
        assert_eq!(sizes, vec![250, 250, 30]);
        assert_eq!(writer.stored_count(), 530);

        // Typed fields came through the transform layer.
        let record = writer.stored("SITE-3").expect("stored record");
        assert_eq!(record.total_rental, 2500.0);
        assert_eq!(record.total_payment_to_pay, 1200.0);
        assert_eq!(record.deposit, 500.0);
        assert_eq!(
            record.exp_date,
            NaiveDate::from_ymd_opt(2027, 3, 15)
        );
        assert_eq!(record.attributes.get("REGION").map(String::as_str), Some("North"));

        // The scratch plan is gone once the job is complete.
        match store.get_plan(&job_id).await {
            Err(ScratchError::MissingPlan(_)) => {}
            other => panic!("expected missing plan, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_input_completes_immediately() {
        let dir = tempdir().expect("state dir");
        let writer = MemoryBulkWriter::new();
        let controller = controller_with(writer.clone(), dir.path(), 250);

        let outcome = controller.start(&[], "empty.csv").await.expect("upload");
        match outcome {
            UploadOutcome::Complete {
                records_processed, ..
            } => assert_eq!(records_processed, 0),
            other => panic!("expected complete outcome, got {other:?}"),
        }
        assert!(writer.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_chunk_resumes_from_checkpoint() {
        let dir = tempdir().expect("state dir");
        let writer = MemoryBulkWriter::new();
        let (store, controller) = setup(dir.path(), 250, writer.clone());
        writer.fail_on_call(1);

        let err = controller
            .start(&sample_rows(530), "sites.csv")
            .await
            .expect_err("second chunk fails");
        let job_id = match err {
            UploadError::ChunkWrite { job_id, chunk, .. } => {
                assert_eq!(chunk, 1);
                job_id
            }
            other => panic!("expected chunk write error, got {other:?}"),
        };

        let job = controller.status(&job_id).await.expect("status");
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.chunks_completed, 1);
        assert_eq!(job.records_processed, 250);
        assert!(
            job.error_message
                .as_deref()
                .is_some_and(|m| m.contains("injected failure"))
        );

        // The plan survives the failure so the job can be resumed.
        store.get_plan(&job_id).await.expect("plan still present");

        let outcome = controller.resume(&job_id).await.expect("resume");
        match outcome {
            UploadOutcome::Complete {
                records_processed,
                resumed,
                ..
            } => {
                assert_eq!(records_processed, 530);
                assert!(resumed);
            }
            other => panic!("expected complete outcome, got {other:?}"),
        }

        let job = controller.status(&job_id).await.expect("status");
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.chunks_completed, 3);
        assert!(job.error_message.is_none());

        // One call per chunk plus the failed attempt; chunk 0 never re-sent.
        let sizes: Vec<usize> = writer.calls().iter().map(|c| c.record_count).collect();
        assert_eq!(sizes, vec![250, 250, 250, 30]);
        assert_eq!(writer.stored_count(), 530);
    }

    #[tokio::test]
    async fn crashed_chunk_is_redelivered_and_absorbed() {
        let dir = tempdir().expect("state dir");
        let writer = MemoryBulkWriter::new();
        let (store, controller) = setup(dir.path(), 250, writer.clone());

        // A job that crashed after chunk 0 reached the writer but before the
        // progress write landed: the ledger still says no chunks done.
        let records = dedup_records(transform_rows(&sample_rows(300)));
        let plan = build_plan(records, 250, "sites.csv");
        let job = UploadJob::new("sites.csv", plan.record_count() as u64, plan.total_chunks);
        store.create_job(&job).await.expect("create job");
        store.put_plan(&job.id, &plan).await.expect("put plan");
        writer
            .upsert(&job.id, plan.chunk(0))
            .await
            .expect("pre-crash write");

        let outcome = controller.resume(&job.id).await.expect("resume");
        match outcome {
            UploadOutcome::Complete {
                records_processed, ..
            } => assert_eq!(records_processed, 300),
            other => panic!("expected complete outcome, got {other:?}"),
        }

        // Chunk 0 went to the writer twice; the keyed upsert absorbs the
        // re-delivery, so the stored set is what one clean run produces.
        let sizes: Vec<usize> = writer.calls().iter().map(|c| c.record_count).collect();
        assert_eq!(sizes, vec![250, 250, 50]);
        assert_eq!(writer.stored_count(), 300);

        let job = controller.status(&job.id).await.expect("status");
        assert_eq!(job.chunks_completed, 2);
        assert_eq!(job.records_processed, 300);
    }

    #[tokio::test]
    async fn duplicate_keys_collapse_to_last_write() {
        let dir = tempdir().expect("state dir");
        let writer = MemoryBulkWriter::new();
        let controller = controller_with(writer.clone(), dir.path(), 250);

        let rows = vec![
            site_row("SITE-1", "100"),
            site_row("SITE-2", "200"),
            site_row("SITE-1", "300"),
        ];
        let outcome = controller.start(&rows, "sites.csv").await.expect("upload");
        match outcome {
            UploadOutcome::Complete {
                records_processed, ..
            } => assert_eq!(records_processed, 2),
            other => panic!("expected complete outcome, got {other:?}"),
        }

        assert_eq!(writer.stored_count(), 2);
        let record = writer.stored("SITE-1").expect("stored record");
        assert_eq!(record.total_rental, 300.0);
    }

    #[tokio::test]
    async fn cancel_stops_at_chunk_boundary() {
        let dir = tempdir().expect("state dir");
        let (writer, mut started, proceed) = MemoryBulkWriter::gated();
        let controller = controller_with(writer.clone(), dir.path(), 250);

        let job_id = controller
            .start_in_background(&sample_rows(300), "sites.csv")
            .await
            .expect("start in background");

        // Executor is now inside the first chunk write.
        assert_eq!(started.recv().await, Some(0));

        let outcome = controller.cancel(&job_id).await.expect("cancel");
        assert_eq!(outcome, CancelOutcome::Requested);

        // Let the in-flight chunk finish; the executor observes the flag
        // before starting chunk 1 and stops there.
        proceed.add_permits(1);
        let job = wait_terminal(&controller, &job_id).await;

        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.chunks_completed, 1);
        assert_eq!(job.records_processed, 250);
        assert_eq!(writer.calls().len(), 1);
        assert_eq!(writer.tagged_jobs(), vec![job_id]);
    }

    #[tokio::test]
    async fn cancel_without_executor_finalizes_immediately() {
        let dir = tempdir().expect("state dir");
        let writer = MemoryBulkWriter::new();
        let (store, controller) = setup(dir.path(), 250, writer.clone());

        // A job that was prepared but never claimed by an executor, as after
        // a process restart.
        let job = UploadJob::new("sites.csv", 300, 2);
        store.create_job(&job).await.expect("create job");

        let outcome = controller.cancel(&job.id).await.expect("cancel");
        assert_eq!(outcome, CancelOutcome::Cancelled);

        let job = controller.status(&job.id).await.expect("status");
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(writer.tagged_jobs(), vec![job.id.clone()]);
    }

    #[tokio::test]
    async fn cancel_terminal_job_is_not_active() {
        let dir = tempdir().expect("state dir");
        let writer = MemoryBulkWriter::new();
        let controller = controller_with(writer.clone(), dir.path(), 250);

        let outcome = controller
            .start(&sample_rows(10), "sites.csv")
            .await
            .expect("upload");
        let job_id = match outcome {
            UploadOutcome::Complete { job_id, .. } => job_id,
            other => panic!("expected complete outcome, got {other:?}"),
        };

        let outcome = controller.cancel(&job_id).await.expect("cancel");
        assert_eq!(outcome, CancelOutcome::NotActive);
        assert!(writer.tagged_jobs().is_empty());
    }

    #[tokio::test]
    async fn resume_rejects_terminal_job() {
        let dir = tempdir().expect("state dir");
        let writer = MemoryBulkWriter::new();
        let controller = controller_with(writer.clone(), dir.path(), 250);

        let outcome = controller
            .start(&sample_rows(10), "sites.csv")
            .await
            .expect("upload");
        let job_id = match outcome {
            UploadOutcome::Complete { job_id, .. } => job_id,
            other => panic!("expected complete outcome, got {other:?}"),
        };

        match controller.resume(&job_id).await {
            Err(UploadError::NotResumable { status, .. }) => {
                assert_eq!(status, JobStatus::Complete)
            }
            other => panic!("expected not-resumable error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resume_with_missing_plan_leaves_status_untouched() {
        let dir = tempdir().expect("state dir");
        let writer = MemoryBulkWriter::new();
        let (store, controller) = setup(dir.path(), 250, writer.clone());
        writer.fail_on_call(0);

        let err = controller
            .start(&sample_rows(10), "sites.csv")
            .await
            .expect_err("first chunk fails");
        let job_id = match err {
            UploadError::ChunkWrite { job_id, .. } => job_id,
            other => panic!("expected chunk write error, got {other:?}"),
        };

        store.delete_plan(&job_id).await.expect("delete plan");

        match controller.resume(&job_id).await {
            Err(UploadError::Scratch(ScratchError::MissingPlan(_))) => {}
            other => panic!("expected missing plan error, got {other:?}"),
        }

        // The failed run's ledger entry is untouched by the aborted resume.
        let job = controller.status(&job_id).await.expect("status");
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.chunks_completed, 0);
    }

    #[tokio::test]
    async fn second_executor_for_same_job_is_rejected() {
        let dir = tempdir().expect("state dir");
        let (writer, mut started, proceed) = MemoryBulkWriter::gated();
        let controller = controller_with(writer.clone(), dir.path(), 250);

        let job_id = controller
            .start_in_background(&sample_rows(300), "sites.csv")
            .await
            .expect("start in background");
        assert_eq!(started.recv().await, Some(0));

        match controller.resume(&job_id).await {
            Err(UploadError::JobAlreadyActive(id)) => assert_eq!(id, job_id),
            other => panic!("expected already-active error, got {other:?}"),
        }

        proceed.add_permits(8);
        let job = wait_terminal(&controller, &job_id).await;
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.records_processed, 300);
    }

    #[tokio::test]
    async fn background_upload_runs_to_completion() {
        let dir = tempdir().expect("state dir");
        let writer = MemoryBulkWriter::new();
        let (store, controller) = setup(dir.path(), 100, writer.clone());

        let job_id = controller
            .start_in_background(&sample_rows(250), "sites.csv")
            .await
            .expect("start in background");

        let job = wait_terminal(&controller, &job_id).await;
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.chunks_completed, 3);
        assert_eq!(job.records_processed, 250);
        assert_eq!(writer.stored_count(), 250);

        match store.get_plan(&job_id).await {
            Err(ScratchError::MissingPlan(_)) => {}
            other => panic!("expected missing plan, got {other:?}"),
        }
        assert!(controller.active_jobs().is_empty());
    }

    #[tokio::test]
    async fn list_incomplete_filters_and_limits() {
        let dir = tempdir().expect("state dir");
        let writer = MemoryBulkWriter::new();
        let (store, controller) = setup(dir.path(), 250, writer);

        // Seven resumable jobs with distinct ages, newest last.
        for n in 0..7u32 {
            let mut job = UploadJob::new("sites.csv", 100, 1);
            job.created_at = Utc::now() - ChronoDuration::seconds(60 - n as i64);
            store.create_job(&job).await.expect("create job");
            if n == 0 {
                store
                    .set_status(&job.id, JobStatus::Uploading, None)
                    .await
                    .expect("set status");
            }
        }

        // One job from another source and one terminal job.
        let mut other = UploadJob::new("other.csv", 100, 1);
        other.created_at = Utc::now() - ChronoDuration::seconds(120);
        store.create_job(&other).await.expect("create job");

        let cancelled = UploadJob::new("sites.csv", 100, 1);
        store.create_job(&cancelled).await.expect("create job");
        store
            .set_status(&cancelled.id, JobStatus::Cancelled, None)
            .await
            .expect("set status");

        let jobs = controller.list_incomplete(None).await.expect("list");
        assert_eq!(jobs.len(), 5);
        assert!(jobs.iter().all(|j| j.id != cancelled.id));
        // Newest first.
        for pair in jobs.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }

        let jobs = controller
            .list_incomplete(Some("other.csv"))
            .await
            .expect("list");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, other.id);
    }
}
