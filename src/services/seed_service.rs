use crate::config::Config;
use crate::errors::{DataHubError, Result};
use crate::market_data::MarketDataClient;
use crate::services::failure_log::FailureLog;
use crate::store::{RecordStore, WriteSummary};
use chrono::NaiveDate;
use futures::FutureExt;
use log::{error, info, warn};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Terminal state of one symbol's unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Persisted(WriteSummary),
    /// The provider had no history; the symbol went to the failure log.
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SymbolResult {
    pub symbol: String,
    pub outcome: SymbolOutcome,
}

/// Reduction of every symbol outcome in a seeding run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub submitted: usize,
    pub persisted: usize,
    pub not_found: usize,
    pub failed: usize,
    pub written: WriteSummary,
    /// Symbols never submitted because the run was interrupted.
    pub skipped: usize,
    pub interrupted: bool,
}

impl SeedReport {
    fn observe(&mut self, result: &SymbolResult) {
        match &result.outcome {
            SymbolOutcome::Persisted(summary) => {
                self.persisted += 1;
                self.written += *summary;
            }
            SymbolOutcome::NotFound => self.not_found += 1,
            SymbolOutcome::Failed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for SeedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} symbols submitted: {} persisted, {} not found, {} failed; {} rows inserted, {} duplicates skipped",
            self.submitted,
            self.persisted,
            self.not_found,
            self.failed,
            self.written.inserted,
            self.written.duplicates
        )?;
        if self.interrupted {
            write!(f, "; interrupted with {} symbols not submitted", self.skipped)?;
        }
        Ok(())
    }
}

/// Everything one unit of work needs. Cloned into each spawned task.
#[derive(Clone)]
struct SymbolWorker {
    client: Arc<dyn MarketDataClient + Send + Sync>,
    store: Arc<dyn RecordStore + Send + Sync>,
    failure_log: Arc<FailureLog>,
    history_from: NaiveDate,
}

impl SymbolWorker {
    /// Fetch, transform and persist one symbol. Never fails; errors become `Failed`.
    async fn process(&self, symbol: &str) -> SymbolOutcome {
        match self.try_process(symbol).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("[{}] Failed: {}", symbol, e);
                SymbolOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_process(&self, symbol: &str) -> Result<SymbolOutcome> {
        info!("[{}] Extracting historical data", symbol);

        let series = match self.client.historical_series(symbol, self.history_from, None).await? {
            Some(series) if !series.is_empty() => series,
            _ => {
                warn!("[{}] No historical data found", symbol);
                self.failure_log.record(symbol).await?;
                return Ok(SymbolOutcome::NotFound);
            }
        };

        let records = series.into_records(symbol)?;
        let summary = self.store.write_batch(&records).await?;

        info!(
            "[{}] Loaded {} rows ({} new, {} already stored)",
            symbol,
            records.len(),
            summary.inserted,
            summary.duplicates
        );
        Ok(SymbolOutcome::Persisted(summary))
    }
}

/// Seeds the store with the full history of every symbol listed on an exchange.
pub struct SeedService {
    client: Arc<dyn MarketDataClient + Send + Sync>,
    store: Arc<dyn RecordStore + Send + Sync>,
    exchange: String,
    max_workers: usize,
    history_from: NaiveDate,
    failure_log_path: PathBuf,
}

impl SeedService {
    /// Service seeding `config.exchange` through `client` into `store`.
    pub fn new(
        config: &Config,
        client: Arc<dyn MarketDataClient + Send + Sync>,
        store: Arc<dyn RecordStore + Send + Sync>,
    ) -> Self {
        Self {
            client,
            store,
            exchange: config.exchange.clone(),
            max_workers: config.max_workers.max(1),
            history_from: config.history_from,
            failure_log_path: config.failure_log_path.clone(),
        }
    }

    /// Run to completion, stopping submission of new symbols on Ctrl-C.
    pub async fn run(&self) -> Result<SeedReport> {
        self.run_until(async {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("Unable to listen for interrupt signal");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until every submitted symbol has finished. Once `shutdown` resolves
    /// no further symbols are submitted; in-flight ones are awaited.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<SeedReport>
    where
        F: Future<Output = ()>,
    {
        info!("Starting database seeding process");

        self.store.ensure_schema().await?;
        let failure_log = Arc::new(FailureLog::open(&self.failure_log_path).await?);

        let listing = self.client.list_symbols(&self.exchange).await?.ok_or_else(|| {
            DataHubError::UpstreamError(format!("No symbol listing returned for exchange {}", self.exchange))
        })?;
        info!("Retrieved {} symbols list total of {}", self.exchange, listing.len());

        let worker = SymbolWorker {
            client: self.client.clone(),
            store: self.store.clone(),
            failure_log,
            history_from: self.history_from,
        };

        let mut pending = listing.into_iter().map(|l| l.symbol);
        let mut workers = JoinSet::new();
        let mut report = SeedReport::default();
        let mut accepting = true;
        tokio::pin!(shutdown);

        loop {
            while accepting && workers.len() < self.max_workers {
                let Some(symbol) = pending.next() else { break };
                report.submitted += 1;

                let worker = worker.clone();
                workers.spawn(async move {
                    let outcome = AssertUnwindSafe(worker.process(&symbol))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            error!("[{}] Worker panicked", symbol);
                            SymbolOutcome::Failed("worker panicked".to_string())
                        });
                    SymbolResult { symbol, outcome }
                });
            }

            if workers.is_empty() {
                break;
            }

            tokio::select! {
                _ = &mut shutdown, if accepting => {
                    warn!("Interrupt received, waiting for {} in-flight symbols", workers.len());
                    accepting = false;
                    report.interrupted = true;
                }
                joined = workers.join_next() => match joined {
                    Some(Ok(result)) => report.observe(&result),
                    Some(Err(e)) => {
                        error!("Worker task aborted: {}", e);
                        report.failed += 1;
                    }
                    None => break,
                },
            }
        }

        report.skipped = pending.count();
        if report.interrupted {
            warn!("Seeding interrupted: {}", report);
        } else {
            info!("Seeding has finished: {}", report);
        }
        Ok(report)
    }
}
