//! ca-analytics CLI
//!
//! Administrative front end for the pharmacy revenue analytics core:
//! compute reports, warm and purge the cache, inspect cache statistics.
//! Results are printed to stdout as JSON; logs go to stderr.

#![allow(clippy::print_stdout)]

mod bootstrap;

use anyhow::{Context, Result};
use application::CaKpiService;
use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand};
use domain::{DetailLevel, QueryParams};
use infrastructure::{AppConfig, init_telemetry};
use serde::Serialize;
use serde_json::json;

/// Pharmacy revenue analytics CLI
#[derive(Debug, Parser)]
#[command(name = "ca-analytics")]
#[command(author, version, about = "Pharmacy revenue (CA) analytics", long_about = None)]
struct Cli {
    /// Configuration file, extension optional
    #[arg(short, long, default_value = "config", env = "CA_ANALYTICS_CONFIG")]
    config: String,

    /// Verbosity level, overrides the configured log filter
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute a revenue report, serving it from cache when possible
    ///
    /// Example: ca-analytics calculate --detail pharmacy --start 2024-01-01 --end 2024-03-31
    Calculate(CalculateArgs),

    /// Precompute the most requested reports
    Warm,

    /// Purge cached reports affected by a data change
    ///
    /// Example: ca-analytics invalidate --period 2024-03-01 2024-03-31
    #[command(group(ArgGroup::new("target").required(true).args(["pharmacy", "product", "period"])))]
    Invalidate {
        /// Pharmacy whose data changed
        #[arg(long)]
        pharmacy: Option<String>,

        /// EAN13 code of the product whose data changed
        #[arg(long)]
        product: Option<String>,

        /// Inclusive date window whose data changed
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        period: Option<Vec<NaiveDate>>,
    },

    /// Purge every cached report
    InvalidateAll,

    /// Show cache statistics
    Stats,
}

#[derive(Debug, Args)]
struct CalculateArgs {
    /// summary, pharmacy, product or full
    #[arg(short, long)]
    detail: Option<DetailLevel>,

    /// First day of the window (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day of the window (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Pharmacy ids, comma separated or repeated
    #[arg(long = "pharmacy", value_delimiter = ',')]
    pharmacy_ids: Vec<String>,

    /// EAN13 product codes, comma separated or repeated
    #[arg(long = "ean13", value_delimiter = ',')]
    ean13s: Vec<String>,

    /// Product page size
    #[arg(short, long)]
    limit: Option<u32>,

    /// Product code after which the next page starts
    #[arg(long)]
    cursor: Option<String>,
}

impl CalculateArgs {
    fn into_params(self) -> QueryParams {
        QueryParams {
            pharmacy_ids: non_empty(self.pharmacy_ids),
            ean13s: non_empty(self.ean13s),
            start_date: self.start,
            end_date: self.end,
            detail: self.detail,
            limit: self.limit,
            cursor: self.cursor,
        }
    }
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(service: &CaKpiService, command: Commands) -> Result<()> {
    match command {
        Commands::Calculate(args) => {
            let envelope = service.calculate(args.into_params()).await?;
            print_json(&envelope)
        },

        Commands::Warm => {
            let report = service.warm_at(chrono::Utc::now().date_naive()).await;
            print_json(&json!({
                "warmed": report.warmed(),
                "computed": report.computed,
                "alreadyCached": report.already_cached,
                "failed": report.failed,
            }))
        },

        Commands::Invalidate {
            pharmacy,
            product,
            period,
        } => {
            let removed = if let Some(id) = pharmacy {
                service.invalidate_pharmacy(&id).await?
            } else if let Some(code) = product {
                service.invalidate_product(&code).await?
            } else if let Some([start, end]) = period.as_deref() {
                service.invalidate_period(*start, *end).await?
            } else {
                anyhow::bail!("one of --pharmacy, --product or --period is required");
            };
            print_json(&json!({ "removed": removed }))
        },

        Commands::InvalidateAll => {
            let removed = service.invalidate_all().await;
            print_json(&json!({ "removed": removed }))
        },

        Commands::Stats => print_json(&service.stats().await),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    if let Some(filter) = log_filter_from_verbosity(cli.verbose) {
        config.telemetry.log_filter = filter.to_string();
    }
    init_telemetry(&config.telemetry)?;

    let runtime = bootstrap::build(&config).await?;
    let outcome = run(&runtime.service, cli.command).await;
    runtime.shutdown().await;
    outcome
}
