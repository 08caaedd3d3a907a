#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the crash forecast server.
//!
//! Query results are serialized straight from the query models; the types
//! here cover query-string parameters and the few responses that only the
//! HTTP layer produces.

use chrono::NaiveDate;
use crash_forecast_collision_models::{BoundingBox, Mode};
use crash_forecast_query_models::{ConfidenceStatus, DateRange};
use serde::{Deserialize, Serialize};

/// Query parameters shared by the totals and time-series endpoints.
///
/// Missing dates default to the dataset's first and last dates.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesQueryParams {
    /// First day (`YYYY-MM-DD`).
    pub start: Option<NaiveDate>,
    /// Last day (`YYYY-MM-DD`).
    pub end: Option<NaiveDate>,
    /// Region name. Omitted for the whole city.
    pub region: Option<String>,
    /// `historical` (default) or `forecast`.
    pub mode: Option<Mode>,
}

/// Query parameters for the map endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapQueryParams {
    /// First day (`YYYY-MM-DD`).
    pub start: Option<NaiveDate>,
    /// Last day (`YYYY-MM-DD`).
    pub end: Option<NaiveDate>,
    /// Region name.
    pub region: Option<String>,
}

/// Query parameters for the confidence endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfidenceQueryParams {
    /// Region name.
    pub region: String,
}

/// Query parameters for the mode-switch endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeSwitchParams {
    /// Mode being switched to.
    pub mode: Mode,
    /// Currently selected first day.
    pub start: Option<NaiveDate>,
    /// Currently selected last day.
    pub end: Option<NaiveDate>,
}

/// A region as listed by the regions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRegion {
    /// Region name.
    pub name: String,
    /// Training confidence.
    pub confidence: ConfidenceStatus,
    /// Whether a batch-trained model exists.
    pub has_model: bool,
    /// Boundary extent.
    pub bounds: Option<BoundingBox>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
    /// First and last dates of the loaded data.
    pub data_range: DateRange,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable error.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_from_snake_case() {
        let params: ModeSwitchParams =
            serde_json::from_str(r#"{ "mode": "forecast", "start": "2020-01-01" }"#).unwrap();
        assert_eq!(params.mode, Mode::Forecast);
        assert_eq!(params.start, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert!(params.end.is_none());
    }

    #[test]
    fn region_serializes_camel_case() {
        let region = ApiRegion {
            name: "Astoria".to_string(),
            confidence: ConfidenceStatus::Unavailable,
            has_model: false,
            bounds: None,
        };
        let json = serde_json::to_value(&region).unwrap();
        assert_eq!(json["hasModel"], false);
        assert_eq!(json["confidence"]["status"], "unavailable");
    }
}
