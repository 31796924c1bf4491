use tadawul_datahub::config::Config;
use tadawul_datahub::market_data::{FmpClient, MarketDataClient};
use tadawul_datahub::services::dashboard_service::{DashboardOptions, DashboardService};
use tadawul_datahub::services::seed_service::SeedService;
use tadawul_datahub::store::{MongoStore, RecordStore};
use tadawul_datahub::util;

use anyhow::Context;
use clap::{App, Arg, ArgMatches, SubCommand};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = App::new("Tadawul DataHub")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Saudi Stock Exchange (Tadawul) data seeding and dashboard")
        .subcommand_required(true)
        .subcommand(SubCommand::with_name("seed").about("Seed MongoDB with the full history of every listed symbol"))
        .subcommand(
            SubCommand::with_name("app")
                .about("Show the stock dashboard")
                .arg(
                    Arg::with_name("symbol")
                        .short('s')
                        .long("symbol")
                        .value_name("SYMBOL")
                        .help("Symbol to show (defaults to the first stored symbol)")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("start")
                        .long("start")
                        .value_name("DATE")
                        .help("Start date (YYYY-MM-DD)")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("end")
                        .long("end")
                        .value_name("DATE")
                        .help("End date (YYYY-MM-DD)")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("limit")
                        .short('l')
                        .long("limit")
                        .value_name("LIMIT")
                        .help("Number of most recent rows to display")
                        .takes_value(true)
                        .default_value("10"),
                )
                .arg(
                    Arg::with_name("csv")
                        .long("csv")
                        .value_name("PATH")
                        .help("Export the filtered rows as CSV")
                        .takes_value(true),
                ),
        )
        .get_matches();

    let config = Config::from_env().context("loading configuration")?;
    let client: Arc<dyn MarketDataClient + Send + Sync> = Arc::new(FmpClient::from_config(&config)?);
    let store: Arc<dyn RecordStore + Send + Sync> = Arc::new(MongoStore::from_config(&config).await?);

    match matches.subcommand() {
        Some(("seed", _)) => {
            let report = SeedService::new(&config, client, store).run().await?;
            if report.interrupted {
                info!("Exiting...");
            }
        }
        Some(("app", matches)) => {
            let options = dashboard_options(matches)?;
            let dashboard = DashboardService::new(&config, client, store);
            match dashboard.render(&options).await {
                Ok(report) => println!("{}", report),
                Err(e) => {
                    error!("{}", e);
                    return Err(e.into());
                }
            }
        }
        _ => info!("No command specified. Use --help for usage information."),
    }

    Ok(())
}

fn dashboard_options(matches: &ArgMatches) -> anyhow::Result<DashboardOptions> {
    let start = matches.value_of("start").map(util::parse_date).transpose()?;
    let end = matches.value_of("end").map(util::parse_date).transpose()?;
    let limit = matches
        .value_of("limit")
        .unwrap_or("10")
        .parse::<usize>()
        .context("--limit must be a non-negative integer")?;

    Ok(DashboardOptions {
        symbol: matches.value_of("symbol").map(str::to_string),
        start,
        end,
        limit,
        csv_path: matches.value_of("csv").map(PathBuf::from),
    })
}
