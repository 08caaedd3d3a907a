#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for collision totals, series, maps and forecasts.
//!
//! Everything the handlers read is loaded once by [`load_engine`] and
//! shared read-only through [`AppState`]. Queries run on actix's blocking
//! thread pool, since forecast requests may fit a model on demand.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use crash_forecast_config::AppConfig;
use crash_forecast_forecast::ForecastError;
use crash_forecast_forecast::artifacts::ArtifactStore;
use crash_forecast_query::{Dataset, QueryEngine, QueryError};
use crash_forecast_source::SourceError;
use crash_forecast_spatial::{RegionIndex, SpatialError};

/// Errors that can occur while loading the data the server needs.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Event file error.
    #[error("Failed to load events: {0}")]
    Source(#[from] SourceError),

    /// Boundary file error.
    #[error("Failed to load region boundaries: {0}")]
    Spatial(#[from] SpatialError),

    /// Artifact directory error.
    #[error("Failed to load model artifacts: {0}")]
    Artifacts(#[from] ForecastError),

    /// Dataset construction error.
    #[error("Failed to build dataset: {0}")]
    Dataset(#[from] QueryError),
}

/// Shared application state.
pub struct AppState {
    /// Read-only query engine.
    pub engine: Arc<QueryEngine>,
}

/// Loads events, boundaries and artifacts named by `config` and builds
/// the query engine.
///
/// # Errors
///
/// Returns [`LoadError`] if any input cannot be loaded.
pub fn load_engine(config: &AppConfig) -> Result<QueryEngine, LoadError> {
    let events = crash_forecast_source::load_events(&config.data.events_path)?.events;
    let regions = RegionIndex::load(
        &config.data.boundaries_path,
        &config.data.region_name_property,
    )?;
    let dataset = Dataset::build(events, regions)?;
    let artifacts = ArtifactStore::new(&config.data.artifacts_dir).load()?;
    Ok(QueryEngine::new(
        dataset,
        artifacts,
        config.query_options(),
    ))
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/regions", web::get().to(handlers::regions))
            .route("/totals", web::get().to(handlers::totals))
            .route("/time-series", web::get().to(handlers::time_series))
            .route("/map", web::get().to(handlers::map))
            .route("/confidence", web::get().to(handlers::confidence))
            .route("/mode-switch", web::get().to(handlers::mode_switch)),
    );
}

/// Serves the API until shutdown.
///
/// The caller provides the async runtime (e.g. via
/// `#[actix_web::main]`) and initializes logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(engine: QueryEngine, bind_addr: &str, port: u16) -> std::io::Result<()> {
    let state = web::Data::new(AppState {
        engine: Arc::new(engine),
    });

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
