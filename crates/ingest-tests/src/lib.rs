#![allow(dead_code)]

use ingest_core::state::sled_store::SledStateStore;
use ingest_runtime::controller::JobController;
use model::records::raw::RawRow;
use std::{path::Path, sync::Arc};

pub mod scenarios;
pub mod utils;

use utils::MemoryBulkWriter;

/// Build a controller over a fresh sled store in `state_dir` and the given
/// in-memory writer.
pub fn controller_with(
    writer: Arc<MemoryBulkWriter>,
    state_dir: &Path,
    chunk_size: usize,
) -> Arc<JobController> {
    let store = Arc::new(SledStateStore::open(state_dir).expect("open sled store"));
    Arc::new(
        JobController::new(store.clone(), store, writer).with_chunk_size(chunk_size),
    )
}

/// One source row in the shape the transform layer expects. Unknown columns
/// like REGION ride along as attributes.
pub fn site_row(site_id: &str, rental: &str) -> RawRow {
    RawRow::from_pairs([
        ("SITE ID", site_id),
        ("EXP DATE", "15/03/2027"),
        ("TOTAL RENTAL (RM)", rental),
        ("TOTAL PAYMENT TO PAY (RM)", "RM 1,200.00"),
        ("DEPOSIT (RM)", "500"),
        ("REGION", "North"),
    ])
}

/// `count` rows with distinct site ids SITE-0..SITE-(count-1).
pub fn sample_rows(count: usize) -> Vec<RawRow> {
    (0..count)
        .map(|n| site_row(&format!("SITE-{n}"), "RM 2,500.00"))
        .collect()
}
