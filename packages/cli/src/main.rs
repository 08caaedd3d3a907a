#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the crash forecast tools.
//!
//! Trains region and city models, serves the HTTP API, and prints
//! forecasts or the region roster from the terminal.

mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crash_forecast_collision_models::{Mode, Scope};
use crash_forecast_config::AppConfig;
use crash_forecast_query::{ModelResolution, QueryEngine};
use crash_forecast_query_models::ConfidenceStatus;

#[derive(Parser)]
#[command(name = "crash_forecast", about = "NYC collision forecasting")]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hide progress bars.
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train region and city models and save the artifacts
    Train,
    /// Start the HTTP API server
    Serve {
        /// Overrides the configured bind address
        #[arg(long)]
        bind_addr: Option<String>,
        /// Overrides the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print forecast totals for the city or one region
    Forecast {
        /// Region name. Omit for the whole city.
        #[arg(long)]
        region: Option<String>,
    },
    /// List regions with their confidence levels
    Regions,
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let multi = crash_forecast_cli_utils::init_logger(cli.quiet);

    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Train => pipeline::run_training(&config, &multi)?,
        Commands::Serve { bind_addr, port } => {
            if let Some(bind_addr) = bind_addr {
                config.server.bind_addr = bind_addr;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let engine = crash_forecast_server::load_engine(&config)?;
            crash_forecast_server::run_server(
                engine,
                &config.server.bind_addr,
                config.server.port,
            )
            .await?;
        }
        Commands::Forecast { region } => {
            let engine = crash_forecast_server::load_engine(&config)?;
            print_forecast(&engine, region.as_deref())?;
        }
        Commands::Regions => {
            let engine = crash_forecast_server::load_engine(&config)?;
            print_regions(&engine);
        }
    }

    Ok(())
}

fn print_forecast(
    engine: &QueryEngine,
    region: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let range = engine.dataset().range();
    let result = engine.get_totals(range.start, range.end, region, Mode::Forecast)?;

    println!(
        "{} forecast, {} to {}",
        result.scope, result.range.start, result.range.end
    );
    println!("  Collisions: {}", result.totals.collisions);
    println!("  Injured:    {}", result.totals.injured);
    println!("  Killed:     {}", result.totals.killed);

    if let Some(region) = region {
        println!("  Confidence: {}", confidence_label(&engine.get_confidence(region)));
    }

    Ok(())
}

fn print_regions(engine: &QueryEngine) {
    let roster = engine.dataset().regions().roster();
    println!("{} regions", roster.len());
    for name in roster {
        let scope = Scope::Region(name.clone());
        let model = match engine.resolve_model(&scope) {
            ModelResolution::Cached(_) => "trained",
            ModelResolution::NeedsFit(_) => "on demand",
        };
        println!(
            "  {name:<48} {:<12} {model}",
            confidence_label(&engine.get_confidence(name))
        );
    }
}

fn confidence_label(status: &ConfidenceStatus) -> String {
    match status {
        ConfidenceStatus::Available(level) => level.to_string(),
        ConfidenceStatus::Unavailable => "unavailable".to_string(),
    }
}
