use crate::config::Config;
use crate::data_provider::{export_csv, EodDataProvider, EodQuery};
use crate::errors::{DataHubError, Result};
use crate::market_data::MarketDataClient;
use crate::models::eod::HistoricalRecord;
use crate::models::market::{CompanyProfile, MarketHours, Quote};
use crate::store::RecordStore;
use crate::util;
use chrono::NaiveDate;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

const DESCRIPTION_CHARS: usize = 250;

/// Selections normally made in the dashboard sidebar.
#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub symbol: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub limit: usize,
    pub csv_path: Option<PathBuf>,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            symbol: None,
            start: None,
            end: None,
            limit: 10,
            csv_path: None,
        }
    }
}

/// Read-only report over the seeded dataset plus live provider snapshots.
pub struct DashboardService {
    client: Arc<dyn MarketDataClient + Send + Sync>,
    store: Arc<dyn RecordStore + Send + Sync>,
    exchange: String,
}

impl DashboardService {
    pub fn new(
        config: &Config,
        client: Arc<dyn MarketDataClient + Send + Sync>,
        store: Arc<dyn RecordStore + Send + Sync>,
    ) -> Self {
        Self {
            client,
            store,
            exchange: config.exchange.clone(),
        }
    }

    /// Build the text report for `options`. Fails when the store is empty or
    /// the symbol has no stored rows; live lookups never fail it.
    pub async fn render(&self, options: &DashboardOptions) -> Result<String> {
        let provider = EodDataProvider::load(self.store.as_ref()).await?;
        if provider.is_empty() {
            return Err(DataHubError::DataError("No data found in the database.".to_string()));
        }

        let symbol = match &options.symbol {
            Some(symbol) => symbol.clone(),
            None => provider
                .symbols()
                .first()
                .map(|s| s.to_string())
                .unwrap_or_default(),
        };
        let (first, last) = provider.date_bounds(&symbol).ok_or_else(|| {
            DataHubError::DataError(format!("Symbol {} not found in the database", symbol))
        })?;

        let start = options.start.unwrap_or(first).clamp(first, last);
        let end = options.end.unwrap_or(last).clamp(first, last);
        if start > end {
            return Err(DataHubError::DataError(format!(
                "Start date {} is after end date {}",
                start, end
            )));
        }

        let rows = provider.filter(&EodQuery::for_symbol(&symbol).with_start(Some(start)).with_end(Some(end)));
        info!("{}: {} rows between {} and {}", symbol, rows.len(), start, end);

        let mut out = Vec::new();
        let hours = self.live("market hours", self.client.market_hours(&self.exchange).await);
        market_status_section(&mut out, &self.exchange, hours.as_ref());

        if let Some(path) = &options.csv_path {
            export_csv(&rows, path)?;
            out.push(format!("Exported {} rows to {}", rows.len(), path.display()));
        }

        out.push(String::new());
        chart_section(&mut out, &symbol, &rows, options.limit);

        let profile = self.live("company profile", self.client.company_profile(&symbol).await);
        let quote = self.live("quote", self.client.quote(&symbol).await);
        let last_eod = self.live("last close", self.client.last_eod(&symbol).await);

        out.push(String::new());
        profile_section(&mut out, profile.as_ref());
        out.push(String::new());
        overview_section(&mut out, quote.as_ref(), profile.as_ref(), hours.as_ref());
        if let Some(point) = last_eod {
            out.push(format!("Last EOD close: {} ({})", point.close, point.date));
        }

        Ok(out.join("\n"))
    }

    /// Live lookups degrade to "unavailable" instead of failing the report.
    fn live<T>(&self, what: &str, result: Result<Option<T>>) -> Option<T> {
        match result {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to fetch {}: {}", what, e);
                None
            }
        }
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn fmt_round2(value: Option<f64>) -> String {
    fmt_opt(value.map(util::round2))
}

fn fmt_millified(value: Option<f64>) -> String {
    value.map(|v| util::millify(v, 0)).unwrap_or_else(|| "-".to_string())
}

fn fmt_text(value: Option<&String>) -> &str {
    value.map(String::as_str).unwrap_or("-")
}

fn market_status_section(out: &mut Vec<String>, exchange: &str, hours: Option<&MarketHours>) {
    out.push(format!("Exchange: {}", exchange));
    match hours {
        Some(hours) => {
            let status = if hours.is_market_open { "Open" } else { "Closed" };
            if let Some(name) = &hours.name {
                out.push(format!("Exchange Name: {}", name));
            }
            out.push(format!("Market Status: {}", status));
            out.push(format!(
                "Market Hours: {} - {} ({})",
                fmt_text(hours.opening_hour.as_ref()),
                fmt_text(hours.closing_hour.as_ref()),
                fmt_text(hours.timezone.as_ref())
            ));
        }
        None => out.push("Market Status: unavailable".to_string()),
    }
}

fn chart_section(out: &mut Vec<String>, symbol: &str, rows: &[&HistoricalRecord], limit: usize) {
    out.push(format!("{} Stock Chart", symbol));
    out.push(format!("{:-<72}", ""));
    out.push(format!(
        "{:<12} {:>10} {:>10} {:>10} {:>10} {:>15}",
        "Date", "Open", "High", "Low", "Close", "Volume"
    ));
    out.push(format!("{:-<72}", ""));

    if rows.is_empty() {
        out.push("No daily data available for this stock".to_string());
        return;
    }

    let shown = rows.len().min(limit);
    let hidden = rows.len() - shown;
    if hidden > 0 {
        out.push(format!("... and {} earlier records", hidden));
    }
    for r in &rows[hidden..] {
        out.push(format!(
            "{:<12} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>15}",
            r.date.format("%Y-%m-%d"),
            r.open,
            r.high,
            r.low,
            r.close,
            r.volume
        ));
    }
}

fn profile_section(out: &mut Vec<String>, profile: Option<&CompanyProfile>) {
    out.push("Company Profile".to_string());
    let Some(p) = profile else {
        out.push("Company profile unavailable".to_string());
        return;
    };

    out.push(format!("Symbol: {}", p.symbol));
    out.push(format!("Company Name: {}", fmt_text(p.company_name.as_ref())));
    out.push(format!("Industry: {}", fmt_text(p.industry.as_ref())));
    out.push(format!("Sector: {}", fmt_text(p.sector.as_ref())));
    out.push(format!("Website: {}", fmt_text(p.website.as_ref())));
    out.push(format!("CEO: {}", fmt_text(p.ceo.as_ref())));
    out.push(format!("Logo: {}", fmt_text(p.image.as_ref())));
    if let Some(description) = &p.description {
        out.push(format!("Description: {}", util::truncate_chars(description, DESCRIPTION_CHARS)));
    }
}

fn overview_section(
    out: &mut Vec<String>,
    quote: Option<&Quote>,
    profile: Option<&CompanyProfile>,
    hours: Option<&MarketHours>,
) {
    out.push("Stock Overview".to_string());
    let Some(q) = quote else {
        out.push("Quote unavailable".to_string());
        return;
    };

    let time = q.timestamp.and_then(util::riyadh_time);
    let market_open = hours.map_or(false, |h| h.is_market_open);
    let price_note = match time {
        Some(t) if !market_open => format!(" (At close at {} UTC+03:00)", t),
        Some(t) => format!(" ({})", t),
        None => String::new(),
    };

    out.push(format!(
        "{} ({}) on {}",
        fmt_text(q.name.as_ref()),
        q.symbol,
        fmt_text(q.exchange.as_ref())
    ));
    out.push(format!("Price: {}{}", fmt_opt(q.price), price_note));
    out.push(format!(
        "Change: {}  Change %: {}",
        fmt_round2(q.change),
        fmt_round2(q.changes_percentage)
    ));
    out.push(format!(
        "Open: {}  High: {}  Low: {}  Previous Close: {}",
        fmt_opt(q.open),
        fmt_opt(q.day_high),
        fmt_opt(q.day_low),
        fmt_opt(q.previous_close)
    ));
    out.push(format!(
        "Volume: {}  Avg. Volume: {}  Market Cap: {}",
        fmt_millified(q.volume),
        fmt_millified(q.avg_volume),
        fmt_millified(q.market_cap)
    ));
    out.push(format!(
        "52 Week Range: {} - {}",
        fmt_round2(q.year_low),
        fmt_round2(q.year_high)
    ));
    out.push(format!(
        "Avg. 50 Days Price: {}  Avg. 200 Days Price: {}",
        fmt_round2(q.price_avg50),
        fmt_round2(q.price_avg200)
    ));
    out.push(format!(
        "EPS: {}  Beta: {}  P/E: {}",
        fmt_opt(q.eps),
        fmt_opt(profile.and_then(|p| p.beta)),
        fmt_opt(q.pe)
    ));
    out.push(format!(
        "Shares Outstanding: {}  Earnings Announcement: {}",
        fmt_millified(q.shares_outstanding),
        fmt_text(q.earnings_announcement.as_ref())
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::eod::{HistoricalSeries, SymbolListing};
    use crate::models::market::LinePoint;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct SnapshotClient {
        market_open: bool,
        with_profile: bool,
    }

    #[async_trait]
    impl MarketDataClient for SnapshotClient {
        async fn list_symbols(&self, _exchange: &str) -> Result<Option<Vec<SymbolListing>>> {
            Ok(None)
        }

        async fn historical_series(
            &self,
            _symbol: &str,
            _from: NaiveDate,
            _to: Option<NaiveDate>,
        ) -> Result<Option<HistoricalSeries>> {
            Ok(None)
        }

        async fn quote(&self, symbol: &str) -> Result<Option<Quote>> {
            Ok(Some(Quote {
                symbol: symbol.to_string(),
                name: Some("Saudi Arabian Oil Company".to_string()),
                exchange: Some("SAU".to_string()),
                year_low: Some(26.104),
                year_high: Some(33.75),
                shares_outstanding: Some(242_000_000_000.0),
                price: Some(27.5),
                change: Some(0.456),
                changes_percentage: Some(1.6789),
                volume: Some(1_234_567.0),
                market_cap: Some(82_300_000_000.0),
                timestamp: Some(1_672_749_000),
                ..Quote::default()
            }))
        }

        async fn company_profile(&self, symbol: &str) -> Result<Option<CompanyProfile>> {
            if !self.with_profile {
                return Err(DataHubError::DataError("connection reset".to_string()));
            }
            Ok(Some(CompanyProfile {
                symbol: symbol.to_string(),
                company_name: Some("Saudi Arabian Oil Company".to_string()),
                ceo: Some("Amin H. Nasser".to_string()),
                description: Some("x".repeat(300)),
                image: Some("https://images.example/2222.SR.png".to_string()),
                beta: Some(0.18),
                ..CompanyProfile::default()
            }))
        }

        async fn market_hours(&self, exchange: &str) -> Result<Option<MarketHours>> {
            Ok(Some(MarketHours {
                exchange: exchange.to_string(),
                name: Some("Saudi Exchange".to_string()),
                timezone: Some("Asia/Riyadh".to_string()),
                opening_hour: Some("10:00 AM +03:00".to_string()),
                closing_hour: Some("03:00 PM +03:00".to_string()),
                is_market_open: self.market_open,
                ..MarketHours::default()
            }))
        }

        async fn last_eod(&self, _symbol: &str) -> Result<Option<LinePoint>> {
            Ok(None)
        }
    }

    fn record(symbol: &str, day: u32) -> HistoricalRecord {
        HistoricalRecord {
            symbol: symbol.to_string(),
            date: NaiveDate::from_ymd_opt(2023, 1, day).unwrap(),
            open: 27.0,
            high: 28.0,
            low: 26.5,
            close: 27.5,
            volume: 5000,
            adj_close: None,
            unadjusted_volume: None,
            change: None,
            change_percent: None,
            vwap: None,
            label: None,
            change_over_time: None,
        }
    }

    fn service(store: Arc<MemoryStore>, market_open: bool) -> DashboardService {
        service_with_profile(store, market_open, false)
    }

    fn service_with_profile(store: Arc<MemoryStore>, market_open: bool, with_profile: bool) -> DashboardService {
        let config = Config::new("mongodb://unused", "key", "http://unused/");
        let client = SnapshotClient {
            market_open,
            with_profile,
        };
        DashboardService::new(&config, Arc::new(client), store)
    }

    #[tokio::test]
    async fn test_empty_store_reports_no_data() {
        let service = service(Arc::new(MemoryStore::new()), false);
        let err = service.render(&DashboardOptions::default()).await.unwrap_err();
        assert!(err.to_string().contains("No data found in the database."));
    }

    #[tokio::test]
    async fn test_report_defaults_to_first_symbol_and_full_range() {
        let store = Arc::new(MemoryStore::new());
        let rows: Vec<HistoricalRecord> = (1..=12).map(|d| record("1010", d)).chain([record("2222", 4)]).collect();
        store.write_batch(&rows).await.unwrap();

        let report = service(store, false).render(&DashboardOptions::default()).await.unwrap();

        assert!(report.contains("Market Status: Closed"));
        assert!(report.contains("Exchange Name: Saudi Exchange"));
        assert!(report.contains("Market Hours: 10:00 AM +03:00 - 03:00 PM +03:00 (Asia/Riyadh)"));
        assert!(report.contains("1010 Stock Chart"));
        assert!(report.contains("... and 2 earlier records"));
        assert!(report.contains("2023-01-12"));
        assert!(!report.contains("2023-01-02 "));
        assert!(report.contains("Company profile unavailable"));
        assert!(report.contains("Price: 27.5 (At close at 03:30:00 PM UTC+03:00)"));
        assert!(report.contains("Change: 0.46  Change %: 1.68"));
        assert!(report.contains("Volume: 1M"));
        assert!(report.contains("Market Cap: 82B"));
    }

    #[tokio::test]
    async fn test_range_is_clamped_and_exported() {
        let store = Arc::new(MemoryStore::new());
        let rows: Vec<HistoricalRecord> = (1..=5).map(|d| record("2222", d)).collect();
        store.write_batch(&rows).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("filtered_stock_data.csv");
        let options = DashboardOptions {
            symbol: Some("2222".to_string()),
            start: Some(NaiveDate::from_ymd_opt(2023, 1, 3).unwrap()),
            end: Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            csv_path: Some(csv_path.clone()),
            ..DashboardOptions::default()
        };

        let report = service(store, true).render(&options).await.unwrap();
        assert!(report.contains("Exported 3 rows"));
        assert!(report.contains("Market Status: Open"));
        assert!(report.contains("Price: 27.5 (03:30:00 PM)"));
        assert_eq!(std::fs::read_to_string(&csv_path).unwrap().lines().count(), 4);
    }

    #[tokio::test]
    async fn test_profile_and_quote_details_rendered() {
        let store = Arc::new(MemoryStore::new());
        store.write_batch(&[record("2222", 1)]).await.unwrap();

        let report = service_with_profile(store, true, true)
            .render(&DashboardOptions::default())
            .await
            .unwrap();

        assert!(report.contains("CEO: Amin H. Nasser"));
        assert!(report.contains("Logo: https://images.example/2222.SR.png"));
        assert!(report.contains(&format!("Description: {}...", "x".repeat(250))));
        assert!(report.contains("Saudi Arabian Oil Company (2222) on SAU"));
        assert!(report.contains("52 Week Range: 26.1 - 33.75"));
        assert!(report.contains("Beta: 0.18"));
        assert!(report.contains("Shares Outstanding: 242B  Earnings Announcement: -"));
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_error() {
        let store = Arc::new(MemoryStore::new());
        store.write_batch(&[record("1010", 1)]).await.unwrap();
        let options = DashboardOptions {
            symbol: Some("9999".to_string()),
            ..DashboardOptions::default()
        };
        assert!(service(store, false).render(&options).await.is_err());
    }
}
