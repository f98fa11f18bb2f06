use crate::{
    commands::Commands,
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use ingest_core::{
    sink::postgres::PostgresBulkWriter,
    state::{JobLedger, ScratchStore, models::JobStatus, sled_store::SledStateStore},
};
use ingest_runtime::{
    controller::{CancelOutcome, JobController},
    error::UploadError,
    executor::UploadOutcome,
};
use model::records::plan::DEFAULT_CHUNK_SIZE;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};

mod commands;
mod error;
mod input;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "siteload",
    version = "0.1.0",
    about = "Resumable chunked bulk upload of site records"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    // Initialize logger
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Upload {
            file,
            source_name,
            conn_str,
            chunk_size,
            background,
            state_dir,
        } => {
            let rows = input::read_rows(&file)?;
            let source = source_name.unwrap_or_else(|| file_label(&file));
            let controller = build_controller(&conn_str, state_dir, chunk_size).await?;

            let shutdown = ShutdownCoordinator::new(CancellationToken::new());
            shutdown.register_handlers();
            spawn_cancel_watcher(controller.clone(), shutdown.cancel_token());

            if background {
                let job_id = controller.start_in_background(&rows, &source).await?;
                println!("Started background upload job {job_id}");
                let job = poll_until_terminal(&controller, &job_id).await?;
                finish_from_ledger(&job, &shutdown);
            } else {
                let result = controller.start(&rows, &source).await;
                finish_foreground(result, &shutdown);
            }
        }
        Commands::Resume {
            job,
            conn_str,
            state_dir,
        } => {
            let controller = build_controller(&conn_str, state_dir, None).await?;

            let shutdown = ShutdownCoordinator::new(CancellationToken::new());
            shutdown.register_handlers();
            spawn_cancel_watcher(controller.clone(), shutdown.cancel_token());

            let result = controller.resume(&job).await;
            finish_foreground(result, &shutdown);
        }
        Commands::Cancel {
            job,
            conn_str,
            state_dir,
        } => {
            let controller = build_controller(&conn_str, state_dir, None).await?;
            match controller.cancel(&job).await? {
                CancelOutcome::Requested => {
                    println!("Cancellation requested; the executor stops at the next chunk boundary")
                }
                CancelOutcome::Cancelled => println!("Job {job} cancelled"),
                CancelOutcome::NotActive => println!("Job {job} is not active; nothing to cancel"),
            }
        }
        Commands::Status {
            job,
            json,
            state_dir,
        } => {
            let store = open_state_store(state_dir)?;
            let entry = store
                .get_job(&job)
                .await?
                .ok_or_else(|| CliError::Unexpected(format!("Job not found: {job}")))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                output::print_job_table(&entry);
            }
        }
        Commands::Jobs {
            source,
            json,
            state_dir,
        } => {
            let store = open_state_store(state_dir)?;
            let jobs = store.list_incomplete(source.as_deref(), 5).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
            } else {
                output::print_jobs_list(&jobs);
            }
        }
    }

    Ok(())
}

fn state_path(state_dir: Option<String>) -> Result<PathBuf, CliError> {
    match state_dir {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => {
            let home = dirs::home_dir()
                .ok_or_else(|| CliError::Unexpected("Could not determine home directory".into()))?;
            Ok(home.join(".siteload/state"))
        }
    }
}

fn open_state_store(state_dir: Option<String>) -> Result<Arc<SledStateStore>, CliError> {
    let path = state_path(state_dir)?;
    let store = SledStateStore::open(&path).map_err(|err| {
        CliError::Unexpected(format!(
            "Failed to open state store at {}: {err}",
            path.display()
        ))
    })?;
    Ok(Arc::new(store))
}

async fn build_controller(
    conn_str: &str,
    state_dir: Option<String>,
    chunk_size: Option<usize>,
) -> Result<Arc<JobController>, CliError> {
    let store = open_state_store(state_dir)?;
    let writer = PostgresBulkWriter::connect(conn_str).await?;
    writer.ensure_schema().await?;

    let ledger: Arc<dyn JobLedger> = store.clone();
    let scratch: Arc<dyn ScratchStore> = store;
    let controller = JobController::new(ledger, scratch, Arc::new(writer))
        .with_chunk_size(chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE));
    Ok(Arc::new(controller))
}

/// On SIGINT/SIGTERM, request a cooperative cancel of every job this
/// process is currently driving. The ledger flag is what the executor
/// observes at the next chunk boundary.
fn spawn_cancel_watcher(controller: Arc<JobController>, token: CancellationToken) {
    tokio::spawn(async move {
        token.cancelled().await;
        for job_id in controller.active_jobs() {
            match controller.cancel(&job_id).await {
                Ok(outcome) => info!(job_id = %job_id, ?outcome, "Cancel requested on shutdown"),
                Err(err) => warn!(job_id = %job_id, error = %err, "Failed to cancel on shutdown"),
            }
        }
    });
}

async fn poll_until_terminal(
    controller: &JobController,
    job_id: &str,
) -> Result<ingest_core::state::models::UploadJob, CliError> {
    let mut last_reported = None;
    loop {
        let job = controller.status(job_id).await?;
        if last_reported != Some(job.chunks_completed) {
            info!(
                job_id = %job.id,
                chunk = job.chunks_completed,
                total = job.total_chunks,
                records = job.records_processed,
                "Progress"
            );
            last_reported = Some(job.chunks_completed);
        }
        if job.status.is_terminal() {
            return Ok(job);
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
}

fn finish_foreground(result: Result<UploadOutcome, UploadError>, shutdown: &ShutdownCoordinator) {
    match result {
        Ok(outcome) => {
            output::print_outcome(&outcome);
            if matches!(outcome, UploadOutcome::Cancelled { .. })
                && shutdown.is_shutdown_requested()
            {
                std::process::exit(ExitCode::ShutdownRequested.as_i32());
            }
        }
        Err(UploadError::ChunkWrite {
            job_id,
            chunk,
            message,
        }) => {
            eprintln!("Chunk {chunk} failed: {message}");
            eprintln!("Run `siteload resume --job {job_id}` to retry from the first unfinished chunk");
            std::process::exit(ExitCode::GeneralError.as_i32());
        }
        Err(err) => {
            eprintln!("Upload failed: {err}");
            std::process::exit(ExitCode::GeneralError.as_i32());
        }
    }
}

fn finish_from_ledger(job: &ingest_core::state::models::UploadJob, shutdown: &ShutdownCoordinator) {
    output::print_job_table(job);
    match job.status {
        JobStatus::Error => std::process::exit(ExitCode::GeneralError.as_i32()),
        JobStatus::Cancelled if shutdown.is_shutdown_requested() => {
            std::process::exit(ExitCode::ShutdownRequested.as_i32())
        }
        _ => {}
    }
}

fn file_label(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
