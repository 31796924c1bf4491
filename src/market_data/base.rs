use crate::errors::Result;
use crate::models::eod::{HistoricalSeries, SymbolListing};
use crate::models::market::{CompanyProfile, LinePoint, MarketHours, Quote};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Outbound calls to a market-data provider.
///
/// `Ok(None)` means the provider answered but had nothing for the request (or
/// answered with a non-success status, which is logged). `Err` is reserved for
/// transport failures and undecodable payloads.
#[async_trait]
pub trait MarketDataClient {
    /// All symbols listed on `exchange`.
    async fn list_symbols(&self, exchange: &str) -> Result<Option<Vec<SymbolListing>>>;

    /// Daily history for `symbol` starting at `from`, optionally ending at `to`.
    /// An empty history is reported as `None`.
    async fn historical_series(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: Option<NaiveDate>,
    ) -> Result<Option<HistoricalSeries>>;

    async fn quote(&self, symbol: &str) -> Result<Option<Quote>>;

    async fn company_profile(&self, symbol: &str) -> Result<Option<CompanyProfile>>;

    async fn market_hours(&self, exchange: &str) -> Result<Option<MarketHours>>;

    /// Most recent end-of-day close.
    async fn last_eod(&self, symbol: &str) -> Result<Option<LinePoint>>;
}
