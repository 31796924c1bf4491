use crate::errors::{DataHubError, Result};
use chrono::NaiveDate;
use std::path::PathBuf;

pub const DEFAULT_DATABASE: &str = "saudi_stocks";
pub const DEFAULT_COLLECTION: &str = "eod_data";
pub const DEFAULT_EXCHANGE: &str = "SAU";
pub const DEFAULT_MAX_WORKERS: usize = 3;
pub const DEFAULT_FAILURE_LOG: &str = "symbol_not_found.txt";

#[derive(Debug, Clone)]
pub struct Config {
    pub mongodb_uri: String,
    pub database: String,
    pub collection: String,
    pub api_key: String,
    pub base_url: String,
    pub exchange: String,
    pub max_workers: usize,
    pub history_from: NaiveDate,
    pub failure_log_path: PathBuf,
}

impl Config {
    /// Config with the required settings and defaults for everything else.
    pub fn new(mongodb_uri: &str, api_key: &str, base_url: &str) -> Self {
        Self {
            mongodb_uri: mongodb_uri.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            max_workers: DEFAULT_MAX_WORKERS,
            history_from: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default(),
            failure_log_path: PathBuf::from(DEFAULT_FAILURE_LOG),
        }
    }

    /// Load settings from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mongodb_uri = get("MONGODB_URI").ok_or_else(|| {
            DataHubError::ConfigurationError("MONGODB_URI environment variable not set".to_string())
        })?;
        let (api_key, base_url) = match (get("API_KEY"), get("BASE_URL")) {
            (Some(key), Some(url)) => (key, url),
            _ => {
                return Err(DataHubError::ConfigurationError(
                    "API_KEY and BASE_URL must be set in environment variables".to_string(),
                ))
            }
        };

        let mut config = Self::new(&mongodb_uri, &api_key, &base_url);

        if let Some(database) = get("MONGODB_DATABASE") {
            config = config.with_database(&database);
        }
        if let Some(collection) = get("MONGODB_COLLECTION") {
            config = config.with_collection(&collection);
        }
        if let Some(exchange) = get("EXCHANGE") {
            config = config.with_exchange(&exchange);
        }
        if let Some(workers) = get("SEED_MAX_WORKERS") {
            let workers = workers.parse::<usize>().ok().filter(|w| *w > 0).ok_or_else(|| {
                DataHubError::ConfigurationError(format!(
                    "SEED_MAX_WORKERS must be a positive integer, got {:?}",
                    workers
                ))
            })?;
            config = config.with_max_workers(workers);
        }
        if let Some(from) = get("SEED_FROM_DATE") {
            let date = NaiveDate::parse_from_str(&from, "%Y-%m-%d").map_err(|e| {
                DataHubError::ConfigurationError(format!("SEED_FROM_DATE {:?}: {}", from, e))
            })?;
            config = config.with_history_from(date);
        }
        if let Some(path) = get("FAILURE_LOG_PATH") {
            config = config.with_failure_log_path(&path);
        }

        Ok(config)
    }

    /// Set the MongoDB database name.
    pub fn with_database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    /// Set the collection holding end-of-day records.
    pub fn with_collection(mut self, collection: &str) -> Self {
        self.collection = collection.to_string();
        self
    }

    /// Set the exchange code whose listing is seeded.
    pub fn with_exchange(mut self, exchange: &str) -> Self {
        self.exchange = exchange.to_string();
        self
    }

    /// Set the number of symbols processed concurrently (at least 1).
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Set the first date requested from the provider.
    pub fn with_history_from(mut self, date: NaiveDate) -> Self {
        self.history_from = date;
        self
    }

    /// Set where symbols without history are recorded.
    pub fn with_failure_log_path(mut self, path: &str) -> Self {
        self.failure_log_path = PathBuf::from(path);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("MONGODB_URI", "mongodb://localhost:27017"),
        ("API_KEY", "secret"),
        ("BASE_URL", "https://financialmodelingprep.com/api/v3/"),
    ];

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.database, "saudi_stocks");
        assert_eq!(config.collection, "eod_data");
        assert_eq!(config.exchange, "SAU");
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.history_from, NaiveDate::from_ymd_opt(1990, 1, 1).unwrap());
        assert_eq!(config.failure_log_path, PathBuf::from("symbol_not_found.txt"));
    }

    #[test]
    fn test_missing_mongodb_uri_is_configuration_error() {
        let err = Config::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert!(matches!(err, DataHubError::ConfigurationError(msg) if msg.contains("MONGODB_URI")));
    }

    #[test]
    fn test_missing_or_blank_api_credentials() {
        let err = Config::from_lookup(lookup(&[REQUIRED[0], REQUIRED[2]])).unwrap_err();
        assert!(matches!(err, DataHubError::ConfigurationError(_)));

        let err = Config::from_lookup(lookup(&[REQUIRED[0], ("API_KEY", "  "), REQUIRED[2]])).unwrap_err();
        assert!(matches!(err, DataHubError::ConfigurationError(_)));
    }

    #[test]
    fn test_optional_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("SEED_MAX_WORKERS", "8"),
            ("SEED_FROM_DATE", "2020-06-01"),
            ("EXCHANGE", "NASDAQ"),
            ("FAILURE_LOG_PATH", "/tmp/missing.txt"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.history_from, NaiveDate::from_ymd_opt(2020, 6, 1).unwrap());
        assert_eq!(config.exchange, "NASDAQ");
        assert_eq!(config.failure_log_path, PathBuf::from("/tmp/missing.txt"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SEED_MAX_WORKERS", "0"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }
}
