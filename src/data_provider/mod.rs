use crate::errors::Result;
use crate::models::eod::HistoricalRecord;
use crate::store::RecordStore;
use chrono::NaiveDate;
use log::info;
use std::collections::BTreeMap;
use std::path::Path;

/// Symbol and inclusive date-range filter over the stored dataset.
#[derive(Debug, Clone, Default)]
pub struct EodQuery {
    pub symbol: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl EodQuery {
    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            ..Self::default()
        }
    }

    pub fn with_start(mut self, start: Option<NaiveDate>) -> Self {
        self.start = start;
        self
    }

    pub fn with_end(mut self, end: Option<NaiveDate>) -> Self {
        self.end = end;
        self
    }

    fn matches(&self, record: &HistoricalRecord) -> bool {
        self.start.map_or(true, |start| record.date >= start)
            && self.end.map_or(true, |end| record.date <= end)
    }
}

/// Read-only view of every persisted end-of-day record, sorted by date.
pub struct EodDataProvider {
    data: Vec<HistoricalRecord>,
    // symbol -> positions in `data`, oldest first
    symbol_index: BTreeMap<String, Vec<usize>>,
}

impl EodDataProvider {
    /// Index `data`, sorting it by date.
    pub fn new_with_data(mut data: Vec<HistoricalRecord>) -> Self {
        data.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));

        let mut provider = Self {
            data,
            symbol_index: BTreeMap::new(),
        };
        provider.rebuild_indices();
        provider
    }

    /// Load the full collection from `store`.
    pub async fn load(store: &(dyn RecordStore + Send + Sync)) -> Result<Self> {
        let data = store.read_all().await?;
        info!("Loaded {} records from the store", data.len());
        Ok(Self::new_with_data(data))
    }

    /// True when nothing has been seeded yet. Callers must check this before
    /// querying; it is not an error.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of records loaded.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Every record, oldest first.
    pub fn get_all_records(&self) -> &[HistoricalRecord] {
        &self.data
    }

    /// Distinct symbols in sorted order.
    pub fn symbols(&self) -> Vec<&str> {
        self.symbol_index.keys().map(String::as_str).collect()
    }

    /// Records of `symbol`, oldest first. Empty for an unknown symbol.
    pub fn get_records_by_symbol(&self, symbol: &str) -> Vec<&HistoricalRecord> {
        self.symbol_index
            .get(symbol)
            .map(|indices| indices.iter().map(|&idx| &self.data[idx]).collect())
            .unwrap_or_default()
    }

    /// First and last stored date for `symbol`.
    pub fn date_bounds(&self, symbol: &str) -> Option<(NaiveDate, NaiveDate)> {
        let indices = self.symbol_index.get(symbol)?;
        let first = self.data[*indices.first()?].date;
        let last = self.data[*indices.last()?].date;
        Some((first, last))
    }

    /// Records matching `query`, oldest first.
    pub fn filter(&self, query: &EodQuery) -> Vec<&HistoricalRecord> {
        match &query.symbol {
            Some(symbol) => self
                .get_records_by_symbol(symbol)
                .into_iter()
                .filter(|r| query.matches(r))
                .collect(),
            None => self.data.iter().filter(|r| query.matches(r)).collect(),
        }
    }

    fn rebuild_indices(&mut self) {
        self.symbol_index.clear();
        for (i, record) in self.data.iter().enumerate() {
            self.symbol_index
                .entry(record.symbol.clone())
                .or_insert_with(Vec::new)
                .push(i);
        }
    }
}

/// Write `records` as CSV with a header row.
pub fn export_csv(records: &[&HistoricalRecord], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(CsvRow::from(*record))?;
    }
    writer.flush()?;
    Ok(())
}

// Fixed column set; `HistoricalRecord` itself omits empty optional fields.
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CsvRow<'a> {
    date: NaiveDate,
    symbol: &'a str,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    adj_close: Option<f64>,
    volume: i64,
    unadjusted_volume: Option<i64>,
    change: Option<f64>,
    change_percent: Option<f64>,
    vwap: Option<f64>,
    label: Option<&'a str>,
    change_over_time: Option<f64>,
}

impl<'a> From<&'a HistoricalRecord> for CsvRow<'a> {
    fn from(r: &'a HistoricalRecord) -> Self {
        Self {
            date: r.date,
            symbol: &r.symbol,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            adj_close: r.adj_close,
            volume: r.volume,
            unadjusted_volume: r.unadjusted_volume,
            change: r.change,
            change_percent: r.change_percent,
            vwap: r.vwap,
            label: r.label.as_deref(),
            change_over_time: r.change_over_time,
        }
    }
}
