use crate::errors::{DataHubError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// One entry of the exchange symbol listing.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolListing {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Raw daily bar as returned by the provider. The provider does not repeat the
/// symbol on each row.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalBar {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(deserialize_with = "volume_from_number")]
    pub volume: i64,
    #[serde(default)]
    pub adj_close: Option<f64>,
    #[serde(default, deserialize_with = "optional_volume_from_number")]
    pub unadjusted_volume: Option<i64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub vwap: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub change_over_time: Option<f64>,
}

/// Historical price response for one symbol. `{}` is what the provider sends
/// for an unknown symbol.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoricalSeries {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub historical: Vec<HistoricalBar>,
}

impl HistoricalSeries {
    pub fn is_empty(&self) -> bool {
        self.historical.is_empty()
    }

    /// Tag every bar with `symbol` and parse its date.
    pub fn into_records(self, symbol: &str) -> Result<Vec<HistoricalRecord>> {
        self.historical
            .into_iter()
            .map(|bar| HistoricalRecord::from_bar(symbol, bar))
            .collect()
    }
}

/// Persisted end-of-day row, unique on `(symbol, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adj_close: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unadjusted_volume: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vwap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_over_time: Option<f64>,
}

impl HistoricalRecord {
    pub fn from_bar(symbol: &str, bar: HistoricalBar) -> Result<Self> {
        Ok(Self {
            symbol: symbol.to_string(),
            date: parse_bar_date(&bar.date)?,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            adj_close: bar.adj_close,
            unadjusted_volume: bar.unadjusted_volume,
            change: bar.change,
            change_percent: bar.change_percent,
            vwap: bar.vwap,
            label: bar.label,
            change_over_time: bar.change_over_time,
        })
    }

    pub fn key(&self) -> (&str, NaiveDate) {
        (&self.symbol, self.date)
    }
}

/// Accepts `2023-01-03` as well as `2023-01-03 00:00:00`.
fn parse_bar_date(raw: &str) -> Result<NaiveDate> {
    let day = raw.trim().get(..10).ok_or_else(|| {
        DataHubError::DataError(format!("Invalid date format: {:?}", raw))
    })?;
    Ok(NaiveDate::parse_from_str(day, "%Y-%m-%d")?)
}

fn number_to_volume<E: serde::de::Error>(value: serde_json::Number) -> std::result::Result<i64, E> {
    if let Some(v) = value.as_i64() {
        return Ok(v);
    }
    value
        .as_f64()
        .map(|v| v.round() as i64)
        .ok_or_else(|| E::custom(format!("volume out of range: {}", value)))
}

fn volume_from_number<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    number_to_volume(serde_json::Number::deserialize(deserializer)?)
}

fn optional_volume_from_number<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<serde_json::Number>::deserialize(deserializer)?
        .map(number_to_volume)
        .transpose()
}
