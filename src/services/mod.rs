pub mod dashboard_service;
pub mod failure_log;
pub mod seed_service;

pub use dashboard_service::DashboardService;
pub use failure_log::FailureLog;
pub use seed_service::{SeedReport, SeedService, SymbolOutcome};
