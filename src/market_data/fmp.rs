use crate::config::Config;
use crate::errors::{DataHubError, Result};
use crate::market_data::base::MarketDataClient;
use crate::models::eod::{HistoricalSeries, SymbolListing};
use crate::models::market::{CompanyProfile, LinePoint, LineSeries, MarketHours, Quote};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, error};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Financial Modeling Prep REST client. One `reqwest::Client` is shared by
/// every call so connections are pooled.
pub struct FmpClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl FmpClient {
    /// Build a client for `base_url`, which is treated as a directory.
    /// An empty key or URL is a configuration error.
    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        if api_key.trim().is_empty() || base_url.trim().is_empty() {
            return Err(DataHubError::ConfigurationError(
                "API_KEY and BASE_URL must be set in environment variables".to_string(),
            ));
        }

        let mut base_url = Url::parse(base_url.trim()).map_err(|e| {
            DataHubError::ConfigurationError(format!("Invalid BASE_URL {:?}: {}", base_url, e))
        })?;
        // Relative paths are joined onto the base, so it has to look like a directory.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(DataHubError::TransportError)?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.trim().to_string(),
        })
    }

    /// Build a client from the provider settings in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_key, &config.base_url)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| DataHubError::DataError(format!("Invalid request path {:?}: {}", path, e)))
    }

    async fn do_request<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .query(&[("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        interpret_response(path, status, &body)
    }
}

/// Non-success statuses are logged and reported as absence.
fn interpret_response<T: DeserializeOwned>(path: &str, status: StatusCode, body: &str) -> Result<Option<T>> {
    if !status.is_success() {
        error!("HTTP Error: {} - {} ({})", status.as_u16(), body.trim(), path);
        return Ok(None);
    }
    if body.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(body)?))
}

fn first_of<T>(items: Option<Vec<T>>) -> Option<T> {
    items.and_then(|items| items.into_iter().next())
}

#[async_trait]
impl MarketDataClient for FmpClient {
    async fn list_symbols(&self, exchange: &str) -> Result<Option<Vec<SymbolListing>>> {
        self.do_request(&format!("/symbol/{}", exchange), &[]).await
    }

    async fn historical_series(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: Option<NaiveDate>,
    ) -> Result<Option<HistoricalSeries>> {
        let mut params = vec![("from", from.format("%Y-%m-%d").to_string())];
        if let Some(to) = to {
            params.push(("to", to.format("%Y-%m-%d").to_string()));
        }

        let series: Option<HistoricalSeries> = self
            .do_request(&format!("/historical-price-full/{}", symbol), &params)
            .await?;
        Ok(series.filter(|s| !s.is_empty()))
    }

    async fn quote(&self, symbol: &str) -> Result<Option<Quote>> {
        let quotes = self.do_request(&format!("/quote/{}", symbol), &[]).await?;
        Ok(first_of(quotes))
    }

    async fn company_profile(&self, symbol: &str) -> Result<Option<CompanyProfile>> {
        let profiles = self.do_request(&format!("/profile/{}", symbol), &[]).await?;
        Ok(first_of(profiles))
    }

    async fn market_hours(&self, exchange: &str) -> Result<Option<MarketHours>> {
        let exchanges: Option<Vec<MarketHours>> = self.do_request("/is-the-market-open-all", &[]).await?;
        Ok(exchanges.and_then(|all| all.into_iter().find(|e| e.exchange == exchange)))
    }

    async fn last_eod(&self, symbol: &str) -> Result<Option<LinePoint>> {
        let series: Option<LineSeries> = self
            .do_request(
                &format!("/historical-price-full/{}", symbol),
                &[("serietype", "line".to_string())],
            )
            .await?;
        // ISO dates order lexicographically.
        Ok(series.and_then(|s| s.historical.into_iter().max_by(|a, b| a.date.cmp(&b.date))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_missing_credentials() {
        assert!(matches!(
            FmpClient::new("", "https://example.com/api/v3/"),
            Err(DataHubError::ConfigurationError(_))
        ));
        assert!(matches!(
            FmpClient::new("key", "  "),
            Err(DataHubError::ConfigurationError(_))
        ));
        assert!(matches!(
            FmpClient::new("key", "not a url"),
            Err(DataHubError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_endpoint_resolves_against_base_directory() {
        let client = FmpClient::new("key", "https://example.com/api/v3").unwrap();
        assert_eq!(
            client.endpoint("/quote/2222.SR").unwrap().as_str(),
            "https://example.com/api/v3/quote/2222.SR"
        );

        let client = FmpClient::new("key", "https://example.com/api/v3/").unwrap();
        assert_eq!(
            client.endpoint("historical-price-full/1010").unwrap().as_str(),
            "https://example.com/api/v3/historical-price-full/1010"
        );
    }

    #[test]
    fn test_error_status_is_absence() {
        let result: Option<Vec<SymbolListing>> =
            interpret_response("/symbol/SAU", StatusCode::FORBIDDEN, "{\"Error Message\": \"bad key\"}").unwrap();
        assert!(result.is_none());

        let result: Option<Vec<SymbolListing>> =
            interpret_response("/symbol/SAU", StatusCode::INTERNAL_SERVER_ERROR, "").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_success_body_is_decoded() {
        let listing: Option<Vec<SymbolListing>> = interpret_response(
            "/symbol/SAU",
            StatusCode::OK,
            r#"[{"symbol": "1010.SR", "name": "Riyad Bank", "price": 27.5, "exchange": "Saudi"}]"#,
        )
        .unwrap();
        let listing = listing.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].symbol, "1010.SR");
    }

    #[test]
    fn test_empty_list_has_no_first_element() {
        let quotes: Option<Vec<Quote>> = interpret_response("/quote/X", StatusCode::OK, "[]").unwrap();
        assert!(first_of(quotes).is_none());
    }

    #[test]
    fn test_malformed_success_body_is_error() {
        let result: Result<Option<Vec<SymbolListing>>> =
            interpret_response("/symbol/SAU", StatusCode::OK, "<html>gateway</html>");
        assert!(matches!(result, Err(DataHubError::JsonError(_))));
    }
}
