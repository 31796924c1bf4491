pub mod base;
pub mod fmp;

pub use base::MarketDataClient;
pub use fmp::FmpClient;
