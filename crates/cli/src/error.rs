use ingest_core::error::{LedgerError, SinkError};
use ingest_runtime::error::UploadError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Target store error: {0}")]
    Sink(#[from] SinkError),

    #[error("JSON serialization error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
