#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collision count forecasting.
//!
//! Fits seasonal ARIMA models to daily count series ([`sarima`]), trains
//! and evaluates one model per region offline ([`trainer`]), and persists
//! the resulting artifacts for the query engine ([`artifacts`]).

pub mod artifacts;
pub mod metrics;
pub mod optimize;
pub mod progress;
pub mod sarima;
pub mod trainer;

pub use sarima::{FitOptions, fit, forecast};

/// Errors that can occur while fitting, forecasting, or persisting models.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    /// The series is too short for the model orders.
    #[error("Insufficient data: {len} days, at least {required} required")]
    InsufficientData {
        /// Days available.
        len: usize,
        /// Days required.
        required: usize,
    },

    /// The model orders cannot be used.
    #[error("Invalid model order: {message}")]
    InvalidOrder {
        /// What is wrong with the orders.
        message: String,
    },

    /// Fitting or forecasting produced NaN or infinite values.
    #[error("Non-finite values while modelling {scope}")]
    NonFinite {
        /// Scope being modelled.
        scope: String,
    },

    /// The optimizer exhausted its iteration budget.
    #[error("Optimizer did not converge after {iterations} iterations")]
    NotConverged {
        /// Iterations performed.
        iterations: usize,
    },

    /// I/O error (artifact file read or write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
