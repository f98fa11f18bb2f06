use ingest_core::state::models::UploadJob;
use ingest_runtime::executor::UploadOutcome;

pub fn print_job_table(job: &UploadJob) {
    println!("Job {}", job.id);
    println!("-----------------------------");
    println!("{:<18} {}", "Source", job.source_name);
    println!("{:<18} {}", "Status", job.status);
    println!(
        "{:<18} {}/{} ({}%)",
        "Chunks",
        job.chunks_completed,
        job.total_chunks,
        job.progress_percent()
    );
    println!(
        "{:<18} {}/{}",
        "Records", job.records_processed, job.record_count
    );
    if let Some(message) = &job.error_message {
        println!("{:<18} {}", "Error", message);
    }
    println!("{:<18} {}", "Created", job.created_at.to_rfc3339());
    println!("{:<18} {}", "Updated", job.updated_at.to_rfc3339());
    let completed = job
        .completed_at
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| "n/a".to_string());
    println!("{:<18} {}", "Completed", completed);
}

pub fn print_jobs_list(jobs: &[UploadJob]) {
    if jobs.is_empty() {
        println!("No resumable jobs");
        return;
    }
    println!(
        "{:<38} {:<24} {:<12} {:>8} {:>12}",
        "JOB", "SOURCE", "STATUS", "CHUNKS", "RECORDS"
    );
    for job in jobs {
        println!(
            "{:<38} {:<24} {:<12} {:>5}/{:<2} {:>12}",
            job.id,
            job.source_name,
            job.status.to_string(),
            job.chunks_completed,
            job.total_chunks,
            job.records_processed
        );
    }
}

pub fn print_outcome(outcome: &UploadOutcome) {
    match outcome {
        UploadOutcome::Complete {
            job_id,
            records_processed,
            resumed,
        } => {
            let verb = if *resumed { "Resumed upload" } else { "Upload" };
            println!("{verb} complete: job {job_id}, {records_processed} records processed");
        }
        UploadOutcome::Cancelled {
            job_id,
            chunks_completed,
        } => {
            println!(
                "Upload cancelled: job {job_id} stopped after chunk {chunks_completed}; \
                 written chunks were not rolled back"
            );
        }
    }
}
