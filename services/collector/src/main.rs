//! Collector CLI - Refreshes the CSV datasets under DATA_DIR
//!
//! Usage:
//!   # UN DESA immigrant/emigrant stocks (download, or a local file):
//!   cargo run --bin collector -- migration-inout
//!   cargo run --bin collector -- migration-inout --source ./undesa_pd_2020_ims_stock_by_sex_destination_and_origin.xlsx
//!
//!   # World Bank population series for every country in the seed:
//!   cargo run --bin collector -- worldbank --only PRT,ESP

use std::error::Error;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use collector::fetch::{HttpFetcher, RetryPolicy};
use collector::undesa::{self, MigrationOptions};
use collector::worldbank::{self, WorldBankOptions};
use collector::{Config, PipelineError};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit status of a run whose pipeline found nothing to write.
const EXIT_PIPELINE_FAILED: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "collector", about = "Fetches public datasets into the offline CSV store")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// UN DESA migrant stock by destination and origin → migration_inout(_m49).csv
    MigrationInout {
        /// Local xlsx/zip/csv instead of downloading
        #[arg(long)]
        source: Option<PathBuf>,

        /// Ignore the cached workbook
        #[arg(long, default_value = "false")]
        force: bool,

        /// Keep the downloaded workbook as migration_inout_source.xlsx
        #[arg(long, default_value = "false")]
        keep_xlsx: bool,

        /// Fail instead of crawling when no local workbook is available
        #[arg(long, default_value = "false")]
        no_download: bool,

        /// Crawl depth below the landing page
        #[arg(long, default_value_t = undesa::DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },

    /// World Bank population indicators → wb_timeseries.csv
    Worldbank {
        /// Re-fetch countries already in the output file
        #[arg(long, default_value = "false")]
        force: bool,

        /// Only these ISO3 codes (comma separated)
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
        .ok();
}

fn exit_on_pipeline_error(err: PipelineError) -> ! {
    eprintln!("  ✗ Failed: {}", err);
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("    caused by: {}", cause);
        source = cause.source();
    }
    std::process::exit(EXIT_PIPELINE_FAILED);
}

async fn migration_inout(config: &Config, opts: MigrationOptions) -> Result<()> {
    let fetcher = HttpFetcher::new(config)
        .context("Failed to build HTTP client")?
        .with_policy(RetryPolicy::download());

    println!("Landing page: {}", opts.base_url);
    let report = match undesa::run(&fetcher, &config.paths, &opts).await {
        Ok(report) => report,
        Err(e) => exit_on_pipeline_error(e),
    };

    println!("\n=== Migration In/Out Summary ===");
    println!("Source: {:?} ({})", report.source, report.container);
    if let Some(url) = &report.source_url {
        println!("URL: {}", url);
    }
    println!("Captured at: {}", report.captured_at.to_rfc3339());
    println!("M49 rows: {}", report.m49_rows);
    match report.iso3_rows {
        Some(rows) => {
            println!("ISO3 rows: {}", rows);
            println!("Unmapped M49 codes: {}", report.unmapped.len());
        }
        None => println!("ISO3 rows: skipped (no un_m49_iso.csv)"),
    }
    Ok(())
}

async fn worldbank_series(config: &Config, opts: WorldBankOptions) -> Result<()> {
    let fetcher = HttpFetcher::new(config)
        .context("Failed to build HTTP client")?
        .with_policy(RetryPolicy::api());

    let report = match worldbank::run(&fetcher, &config.paths, &config.worldbank_api_url, &opts).await {
        Ok(report) => report,
        Err(e) => exit_on_pipeline_error(e),
    };

    println!("\n=== World Bank Summary ===");
    println!("Countries fetched: {}", report.countries);
    println!("Already present: {}", report.skipped);
    println!("Rows appended: {}", report.rows_written);
    println!("Failed indicators: {}", report.failed_indicators);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing();
    let config = Config::from_env();

    println!("=== Geodata Collector ===");
    println!("Data dir: {}", config.paths.data_dir().display());
    println!("Rate limit: {}ms", config.rate_limit_ms);

    match args.command {
        Command::MigrationInout {
            source,
            force,
            keep_xlsx,
            no_download,
            max_depth,
        } => {
            let opts = MigrationOptions {
                source,
                force,
                keep_xlsx,
                no_download,
                base_url: config.undesa_base_url.clone(),
                max_depth,
            };
            migration_inout(&config, opts).await
        }
        Command::Worldbank { force, only } => worldbank_series(&config, WorldBankOptions { force, only }).await,
    }
}
