//! Cost Estimator
//!
//! Prices cloud usage specs against a SKU catalog and prints the resulting
//! estimate as JSON. Static machine and region data is built in; only the
//! catalog is loaded at startup.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::Environment;
use domain_pricing::{InMemoryCatalog, MachineFamilyTable};
use eyre::{Result, WrapErr};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

mod config;
mod inspect;
mod runner;

use runner::{EstimateRequest, EstimateRunner};

#[derive(Parser)]
#[command(name = "estimator")]
#[command(about = "Estimate monthly cloud costs from usage specs")]
struct Cli {
    /// Catalog document (overrides CATALOG_PATH)
    #[arg(short, long, global = true)]
    catalog: Option<PathBuf>,

    /// Single-line JSON output
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price a request document of usage specs and edit snapshots
    Estimate {
        /// Request document, or a bare array of usage specs (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Region for specs that leave theirs blank. Defaults to the request's, then DEFAULT_REGION.
        #[arg(short, long)]
        region: Option<String>,
    },

    /// Describe a machine series and the shape for a core count
    Machine {
        /// Series name (n1, n2, e2, ...)
        #[arg(short, long)]
        series: String,

        /// vCPUs; a custom shape is used when no predefined type offers the count
        #[arg(long)]
        cores: Option<u32>,

        /// List GPU types priced in this region
        #[arg(short, long)]
        region: Option<String>,
    },

    /// Show catalog version and coverage
    Catalog,
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", json);
    Ok(())
}

fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();

    match cli.command {
        Commands::Estimate { input, region } => {
            let config = config::load(cli.catalog)?;
            if config.metrics_enabled {
                observability::init_metrics()?;
            }

            let raw = std::fs::read_to_string(&input)
                .wrap_err_with(|| format!("Failed to read {}", input.display()))?;
            let mut request = EstimateRequest::from_json_str(&raw)
                .wrap_err_with(|| format!("Malformed estimate request {}", input.display()))?;
            if region.is_some() {
                request.region = region;
            }

            info!(
                specs = request.specs.len(),
                snapshots = request.snapshots.len(),
                "Starting estimate"
            );
            let runner = EstimateRunner::from_config(&config)?;
            let report = runner.run(request)?;
            print_json(&report, cli.compact)?;

            if config.metrics_enabled {
                eprintln!("{}", observability::render_metrics());
            }
        }

        Commands::Machine {
            series,
            cores,
            region,
        } => {
            let table = MachineFamilyTable::builtin()?;
            let mut summary = inspect::describe_series(&table, &series, cores)?;
            if let Some(region) = region {
                let config = config::load(cli.catalog)?;
                let runner = EstimateRunner::from_config(&config)?;
                summary = inspect::with_gpus(summary, runner.context(), &region)?;
            }
            print_json(&summary, cli.compact)?;
        }

        Commands::Catalog => {
            let config = config::load(cli.catalog)?;
            let catalog = InMemoryCatalog::from_path(&config.catalog_path).wrap_err_with(|| {
                format!("Failed to load catalog {}", config.catalog_path.display())
            })?;
            print_json(&inspect::describe_catalog(&catalog), cli.compact)?;
        }
    }

    Ok(())
}
