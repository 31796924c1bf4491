use crate::errors::Result;
use crate::models::eod::HistoricalRecord;
use async_trait::async_trait;
use std::ops::AddAssign;

/// What a bulk write actually did. Rows rejected by the `(symbol, date)`
/// uniqueness constraint are counted, not reported as errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

impl AddAssign for WriteSummary {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
    }
}

/// Document collection of end-of-day records keyed by `(symbol, date)`.
#[async_trait]
pub trait RecordStore {
    /// Create the collection and its unique index if missing. Safe to call on every run.
    async fn ensure_schema(&self) -> Result<()>;

    /// Unordered bulk insert. Duplicate keys are skipped and counted; any other
    /// failure is an error.
    async fn write_batch(&self, records: &[HistoricalRecord]) -> Result<WriteSummary>;

    /// Every stored record. An empty collection is not an error.
    async fn read_all(&self) -> Result<Vec<HistoricalRecord>>;
}
