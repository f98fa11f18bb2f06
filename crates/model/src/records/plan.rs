use crate::records::site::SiteRecord;
use serde::{Deserialize, Serialize};

/// Default number of records per bulk write.
pub const DEFAULT_CHUNK_SIZE: usize = 250;

/// The persisted chunk plan for one upload job: the full deduplicated record
/// set plus the fixed chunk geometry. A resumed or background run reads this
/// back and reconstructs byte-identical chunk boundaries without re-parsing
/// or re-deduplicating the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub source_name: String,
    pub chunk_size: usize,
    pub total_chunks: u32,
    pub records: Vec<SiteRecord>,
}

impl ChunkPlan {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Contiguous slice for chunk `index`; the last chunk may be smaller.
    pub fn chunk(&self, index: u32) -> &[SiteRecord] {
        let start = (index as usize * self.chunk_size).min(self.records.len());
        let end = (start + self.chunk_size).min(self.records.len());
        &self.records[start..end]
    }
}
