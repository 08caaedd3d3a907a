#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interactive collision queries.
//!
//! [`Dataset`] holds the read-only events, series and region geometry
//! loaded at startup. [`QueryEngine`] answers totals, time-series, map and
//! confidence queries over it, choosing between batch-trained models and
//! on-demand fits for forecasts.

pub mod dataset;
pub mod decomposition;
pub mod engine;
pub mod map;

use chrono::NaiveDate;

pub use dataset::Dataset;
pub use decomposition::SeverityRatios;
pub use engine::{ModelResolution, QueryEngine, QueryOptions};

/// Errors returned by queries.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The start date is after the end date.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange {
        /// Requested start.
        start: NaiveDate,
        /// Requested end.
        end: NaiveDate,
    },

    /// The region is not in the boundary roster.
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// No forecast could be produced for the scope.
    #[error("Forecast unavailable for {scope}: {reason}")]
    ForecastUnavailable {
        /// Scope requested.
        scope: String,
        /// Why the forecast failed.
        reason: String,
    },

    /// The dataset has no events.
    #[error("Dataset contains no collision events")]
    EmptyDataset,
}
