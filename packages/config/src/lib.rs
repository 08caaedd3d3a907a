#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Application configuration.
//!
//! Loaded from a TOML file in which every key is optional:
//!
//! ```toml
//! [data]
//! events_path = "data/processed/crashes.csv"
//! boundaries_path = "data/external/neighborhoods.geojson"
//! region_name_property = "NTAName"
//! artifacts_dir = "models"
//!
//! [model]
//! order = [1, 1, 1]
//! seasonal_order = [1, 1, 1, 7]
//! max_iterations = 4000
//!
//! [training]
//! min_history_days = 400
//! min_mean_daily = 0.5
//! holdout_days = 365
//! confidence = { high_max_relative_error = 0.5, medium_max_relative_error = 1.0 }
//!
//! [query]
//! horizon_days = 365
//! rolling_window = 7
//! anchor_date = "2021-04-22"
//! default_center = { latitude = 40.7128, longitude = -74.006, zoom = 9 }
//!
//! [server]
//! bind_addr = "127.0.0.1"
//! port = 8080
//! ```
//!
//! `BIND_ADDR` and `PORT` in the environment override the `[server]`
//! section.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use crash_forecast_forecast::sarima::FitOptions;
use crash_forecast_forecast::trainer::TrainingOptions;
use crash_forecast_forecast_models::{ConfidenceThresholds, SarimaOrder};
use crash_forecast_query::QueryOptions;
use crash_forecast_query_models::MapCenter;
use serde::{Deserialize, Serialize};

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error (config file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for [`AppConfig`].
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

/// Input and output locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Collision event CSV.
    pub events_path: PathBuf,
    /// Region boundary `GeoJSON`.
    pub boundaries_path: PathBuf,
    /// Feature property holding the region name.
    pub region_name_property: String,
    /// Directory for training artifacts.
    pub artifacts_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            events_path: PathBuf::from("data/processed/crashes.csv"),
            boundaries_path: PathBuf::from("data/external/neighborhoods.geojson"),
            region_name_property: "NTAName".to_string(),
            artifacts_dir: PathBuf::from("models"),
        }
    }
}

/// Seasonal ARIMA settings shared by training and on-demand fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// `[p, d, q]`.
    pub order: [usize; 3],
    /// `[P, D, Q, s]`.
    pub seasonal_order: [usize; 4],
    /// Optimizer iteration budget per fit.
    pub max_iterations: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let fit = FitOptions::default();
        Self {
            order: fit.order.order,
            seasonal_order: fit.order.seasonal_order,
            max_iterations: fit.max_iterations,
        }
    }
}

impl ModelConfig {
    /// Fit settings for these orders.
    #[must_use]
    pub const fn fit_options(&self) -> FitOptions {
        FitOptions {
            order: SarimaOrder {
                order: self.order,
                seasonal_order: self.seasonal_order,
            },
            max_iterations: self.max_iterations,
        }
    }
}

/// Batch training rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Minimum series length to train a region.
    pub min_history_days: usize,
    /// Minimum mean daily count to train a region.
    pub min_mean_daily: f64,
    /// Trailing days held out for evaluation.
    pub holdout_days: usize,
    /// Confidence cut-offs.
    pub confidence: ConfidenceThresholds,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let training = TrainingOptions::default();
        Self {
            min_history_days: training.min_history_days,
            min_mean_daily: training.min_mean_daily,
            holdout_days: training.holdout_days,
            confidence: training.confidence,
        }
    }
}

/// Interactive query settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Forecast horizon in days.
    pub horizon_days: usize,
    /// Rolling mean window in days.
    pub rolling_window: usize,
    /// Start date selected in forecast mode.
    pub anchor_date: Option<NaiveDate>,
    /// Map center when no single region is selected.
    pub default_center: MapCenter,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let query = QueryOptions::default();
        Self {
            horizon_days: query.horizon_days,
            rolling_window: query.rolling_window,
            anchor_date: query.anchor_date,
            default_center: query.default_center,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_addr: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Input and output locations.
    pub data: DataConfig,
    /// Model orders.
    pub model: ModelConfig,
    /// Batch training rules.
    pub training: TrainingConfig,
    /// Query settings.
    pub query: QueryConfig,
    /// HTTP listener.
    pub server: ServerConfig,
}

impl AppConfig {
    /// Loads `path` if given, otherwise defaults, then applies environment
    /// overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or a
    /// value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::from_toml_str(&std::fs::read_to_string(path)?)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration text without overrides or validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the text does not parse.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `BIND_ADDR` and `PORT` from `lookup`. An unparseable port
    /// is ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind_addr) = lookup("BIND_ADDR") {
            self.server.bind_addr = bind_addr;
        }
        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(e) => log::warn!("Ignoring PORT={port}: {e}"),
            }
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };

        let seasonal = &self.model.seasonal_order;
        if seasonal[0] + seasonal[1] + seasonal[2] > 0 && seasonal[3] == 0 {
            return invalid("model.seasonal_order needs a non-zero period");
        }
        if self.model.max_iterations == 0 {
            return invalid("model.max_iterations must be at least 1");
        }
        if !self.training.confidence.is_monotone() {
            return invalid(
                "training.confidence thresholds must satisfy 0 <= high_max_relative_error <= medium_max_relative_error",
            );
        }
        if self.training.holdout_days == 0 {
            return invalid("training.holdout_days must be at least 1");
        }
        if !self.training.min_mean_daily.is_finite() {
            return invalid("training.min_mean_daily must be finite");
        }
        if self.query.horizon_days == 0 {
            return invalid("query.horizon_days must be at least 1");
        }
        if self.query.rolling_window == 0 {
            return invalid("query.rolling_window must be at least 1");
        }
        Ok(())
    }

    /// Batch training settings.
    #[must_use]
    pub const fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            fit: self.model.fit_options(),
            min_history_days: self.training.min_history_days,
            min_mean_daily: self.training.min_mean_daily,
            holdout_days: self.training.holdout_days,
            confidence: self.training.confidence,
        }
    }

    /// Query engine settings.
    #[must_use]
    pub const fn query_options(&self) -> QueryOptions {
        QueryOptions {
            horizon_days: self.query.horizon_days,
            rolling_window: self.query.rolling_window,
            anchor_date: self.query.anchor_date,
            holdout_days: self.training.holdout_days,
            default_center: self.query.default_center,
            fit: self.model.fit_options(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.data.region_name_property, "NTAName");
        assert_eq!(config.model.order, [1, 1, 1]);
        assert_eq!(config.model.seasonal_order, [1, 1, 1, 7]);
        assert_eq!(config.training.min_history_days, 400);
        assert_eq!(config.query.horizon_days, 365);
        assert_eq!(config.server.port, 8080);
        config.validate().unwrap();
    }

    #[test]
    fn parses_partial_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            [query]
            anchor_date = "2021-04-22"
            default_center = { latitude = 40.0, longitude = -73.0, zoom = 11 }

            [training.confidence]
            high_max_relative_error = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(
            config.query.anchor_date,
            NaiveDate::from_ymd_opt(2021, 4, 22)
        );
        assert_eq!(config.query.default_center.zoom, 11);
        assert_eq!(config.query.rolling_window, 7);
        assert!((config.training.confidence.high_max_relative_error - 0.25).abs() < 1e-12);
        assert!((config.training.confidence.medium_max_relative_error - 1.0).abs() < 1e-12);

        let options = config.query_options();
        assert_eq!(options.anchor_date, NaiveDate::from_ymd_opt(2021, 4, 22));
        assert_eq!(options.holdout_days, 365);
    }

    #[test]
    fn rejects_unknown_types() {
        let err = AppConfig::from_toml_str("[server]\nport = \"eighty\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn environment_overrides_server() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| match key {
            "BIND_ADDR" => Some("0.0.0.0".to_string()),
            "PORT" => Some("9090".to_string()),
            _ => None,
        });
        assert_eq!(config.server.bind_addr, "0.0.0.0");
        assert_eq!(config.server.port, 9090);

        config.apply_overrides(|key| (key == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.training.confidence.high_max_relative_error = 2.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let mut config = AppConfig::default();
        config.model.seasonal_order = [1, 1, 1, 0];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.query.rolling_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_holdout_window() {
        let config = AppConfig::from_toml_str("[training]\nholdout_days = 0").unwrap();
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string().contains("holdout_days"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn model_config_maps_to_fit_options() {
        let config = AppConfig::from_toml_str("[model]\norder = [2, 1, 0]\nmax_iterations = 50")
            .unwrap();
        let fit = config.training_options().fit;
        assert_eq!(fit.order.p(), 2);
        assert_eq!(fit.order.q(), 0);
        assert_eq!(fit.order.period(), 7);
        assert_eq!(fit.max_iterations, 50);
    }
}
