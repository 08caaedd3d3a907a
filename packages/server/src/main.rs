#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Standalone API server.
//!
//! Reads its configuration from the file named by `CRASH_FORECAST_CONFIG`
//! when set, otherwise uses defaults.

use std::path::PathBuf;

use crash_forecast_config::AppConfig;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config_path = std::env::var_os("CRASH_FORECAST_CONFIG").map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    let engine = crash_forecast_server::load_engine(&config)?;

    crash_forecast_server::run_server(engine, &config.server.bind_addr, config.server.port).await?;
    Ok(())
}
