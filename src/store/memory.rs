use crate::errors::Result;
use crate::models::eod::HistoricalRecord;
use crate::store::base::{RecordStore, WriteSummary};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// In-process store with the same uniqueness semantics as the MongoDB collection.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<(String, NaiveDate), HistoricalRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn write_batch(&self, records: &[HistoricalRecord]) -> Result<WriteSummary> {
        let mut stored = self
            .records
            .lock()
            .map_err(|e| format!("memory store poisoned: {}", e))?;

        let mut summary = WriteSummary::default();
        for record in records {
            let (symbol, date) = record.key();
            let key = (symbol.to_string(), date);
            if stored.contains_key(&key) {
                summary.duplicates += 1;
            } else {
                stored.insert(key, record.clone());
                summary.inserted += 1;
            }
        }
        Ok(summary)
    }

    async fn read_all(&self) -> Result<Vec<HistoricalRecord>> {
        let stored = self
            .records
            .lock()
            .map_err(|e| format!("memory store poisoned: {}", e))?;
        Ok(stored.values().cloned().collect())
    }
}
