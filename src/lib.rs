pub mod config;
pub mod data_provider;
pub mod errors;
pub mod market_data;
pub mod models;
pub mod services;
pub mod store;

#[doc(hidden)]
pub mod util;

// Commonly used types
pub use config::Config;
pub use data_provider::{EodDataProvider, EodQuery};
pub use errors::{DataHubError, Result};
pub use market_data::{FmpClient, MarketDataClient};
pub use models::eod::{HistoricalRecord, HistoricalSeries, SymbolListing};
pub use services::{DashboardService, SeedReport, SeedService, SymbolOutcome};
pub use store::{MemoryStore, MongoStore, RecordStore, WriteSummary};
