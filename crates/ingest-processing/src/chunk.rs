use model::records::{plan::ChunkPlan, site::SiteRecord};

/// `ceil(record_count / chunk_size)`.
pub fn chunk_count(record_count: usize, chunk_size: usize) -> u32 {
    record_count.div_ceil(chunk_size.max(1)) as u32
}

/// Fix the chunk geometry over a deduplicated record set. Pure and
/// deterministic: the same records and chunk size always produce identical
/// chunk boundaries, which is what makes resuming from a persisted plan
/// byte-identical to the original run.
pub fn build_plan(records: Vec<SiteRecord>, chunk_size: usize, source_name: &str) -> ChunkPlan {
    let chunk_size = chunk_size.max(1);
    ChunkPlan {
        source_name: source_name.to_string(),
        chunk_size,
        total_chunks: chunk_count(records.len(), chunk_size),
        records,
    }
}
