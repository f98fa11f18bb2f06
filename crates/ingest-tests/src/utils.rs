#![allow(dead_code)]

use async_trait::async_trait;
use ingest_core::{error::SinkError, sink::BulkWriter};
use model::records::site::SiteRecord;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::{Semaphore, mpsc};

/// One recorded `upsert` invocation.
#[derive(Debug, Clone)]
pub struct UpsertCall {
    pub job_id: String,
    pub record_count: usize,
}

#[derive(Default)]
struct MemoryState {
    stored: HashMap<String, SiteRecord>,
    calls: Vec<UpsertCall>,
    fail_on_call: Option<usize>,
    tagged_jobs: Vec<String>,
}

/// Pauses every `upsert` until the test hands out a permit, and reports the
/// call index the moment the writer is entered. Lets a test hold the
/// executor mid-chunk deterministically.
struct Gate {
    started: mpsc::UnboundedSender<usize>,
    proceed: Arc<Semaphore>,
}

/// In-memory stand-in for the Postgres bulk writer. Upserts are keyed by
/// `site_id`, so re-delivering a chunk leaves the stored set unchanged, the
/// same observable behavior the real conflict-target upsert gives.
pub struct MemoryBulkWriter {
    state: Mutex<MemoryState>,
    gate: Option<Gate>,
}

impl MemoryBulkWriter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MemoryState::default()),
            gate: None,
        })
    }

    /// A writer whose `upsert` blocks until a permit is added to the
    /// returned semaphore. Each call's index is sent on the channel as soon
    /// as the call starts.
    pub fn gated() -> (Arc<Self>, mpsc::UnboundedReceiver<usize>, Arc<Semaphore>) {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        let proceed = Arc::new(Semaphore::new(0));
        let writer = Arc::new(Self {
            state: Mutex::new(MemoryState::default()),
            gate: Some(Gate {
                started: started_tx,
                proceed: proceed.clone(),
            }),
        });
        (writer, started_rx, proceed)
    }

    /// Fail the upsert with the given zero-based call index, once.
    pub fn fail_on_call(&self, call_index: usize) {
        self.state.lock().expect("writer state").fail_on_call = Some(call_index);
    }

    pub fn calls(&self) -> Vec<UpsertCall> {
        self.state.lock().expect("writer state").calls.clone()
    }

    pub fn stored_count(&self) -> usize {
        self.state.lock().expect("writer state").stored.len()
    }

    pub fn stored(&self, site_id: &str) -> Option<SiteRecord> {
        self.state
            .lock()
            .expect("writer state")
            .stored
            .get(site_id)
            .cloned()
    }

    pub fn tagged_jobs(&self) -> Vec<String> {
        self.state.lock().expect("writer state").tagged_jobs.clone()
    }
}

#[async_trait]
impl BulkWriter for MemoryBulkWriter {
    async fn upsert(&self, job_id: &str, records: &[SiteRecord]) -> Result<(), SinkError> {
        if let Some(gate) = &self.gate {
            let index = self.state.lock().expect("writer state").calls.len();
            let _ = gate.started.send(index);
            let permit = gate
                .proceed
                .acquire()
                .await
                .map_err(|_| SinkError::Write("gate closed".to_string()))?;
            permit.forget();
        }

        let mut state = self.state.lock().expect("writer state");
        let index = state.calls.len();
        state.calls.push(UpsertCall {
            job_id: job_id.to_string(),
            record_count: records.len(),
        });

        if state.fail_on_call == Some(index) {
            state.fail_on_call = None;
            return Err(SinkError::Write(format!(
                "injected failure on call {index}"
            )));
        }

        for record in records {
            state.stored.insert(record.site_id.clone(), record.clone());
        }
        Ok(())
    }

    async fn tag_cancelled(&self, job_id: &str) -> Result<(), SinkError> {
        self.state
            .lock()
            .expect("writer state")
            .tagged_jobs
            .push(job_id.to_string());
        Ok(())
    }
}
