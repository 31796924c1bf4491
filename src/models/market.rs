use serde::Deserialize;

/// Full quote snapshot for one symbol.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Quote {
    pub symbol: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub changes_percentage: Option<f64>,
    pub change: Option<f64>,
    pub day_low: Option<f64>,
    pub day_high: Option<f64>,
    pub year_high: Option<f64>,
    pub year_low: Option<f64>,
    pub market_cap: Option<f64>,
    pub price_avg50: Option<f64>,
    pub price_avg200: Option<f64>,
    pub exchange: Option<String>,
    pub volume: Option<f64>,
    pub avg_volume: Option<f64>,
    pub open: Option<f64>,
    pub previous_close: Option<f64>,
    pub eps: Option<f64>,
    pub pe: Option<f64>,
    pub earnings_announcement: Option<String>,
    pub shares_outstanding: Option<f64>,
    /// Unix seconds.
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyProfile {
    pub symbol: String,
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub sector: Option<String>,
    pub website: Option<String>,
    pub ceo: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub beta: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketHours {
    pub exchange: String,
    pub name: Option<String>,
    pub opening_hour: Option<String>,
    pub closing_hour: Option<String>,
    pub timezone: Option<String>,
    pub is_market_open: bool,
}

/// Point of the `serietype=line` history.
#[derive(Debug, Clone, Deserialize)]
pub struct LinePoint {
    pub date: String,
    pub close: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct LineSeries {
    #[serde(default)]
    pub historical: Vec<LinePoint>,
}
