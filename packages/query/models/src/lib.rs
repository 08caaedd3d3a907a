#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query result types.
//!
//! Display-ready outputs of the query engine: summary totals, smoothed
//! daily series, per-region map counts, and confidence lookups. All are
//! plain data and serialize to JSON for the HTTP API.

use chrono::NaiveDate;
use crash_forecast_collision_models::{BoundingBox, Mode, Scope, SeverityTotals};
use crash_forecast_forecast_models::ConfidenceLevel;
use serde::{Deserialize, Serialize};

/// Map center used when no single region is framed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapCenter {
    /// Center latitude.
    pub latitude: f64,
    /// Center longitude.
    pub longitude: f64,
    /// Map zoom level.
    pub zoom: u8,
}

impl Default for MapCenter {
    /// Lower Manhattan at city-wide zoom.
    fn default() -> Self {
        Self {
            latitude: 40.7128,
            longitude: -74.0060,
            zoom: 9,
        }
    }
}

/// How the map should be framed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Viewport {
    /// Fit the bounding box of the single selected region.
    Bounds(BoundingBox),
    /// Fixed default center and zoom.
    Center(MapCenter),
}

/// An inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day included.
    pub start: NaiveDate,
    /// Last day included.
    pub end: NaiveDate,
}

impl DateRange {
    /// Whether `date` falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start..=self.end).contains(&date)
    }
}

/// Summary totals for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsResult {
    /// City or region the totals cover.
    pub scope: Scope,
    /// Query mode.
    pub mode: Mode,
    /// Days the totals cover. In forecast mode, the forecast horizon.
    pub range: DateRange,
    /// Collision, injury and fatality counts. Forecast counts are
    /// rounded estimates.
    pub totals: SeverityTotals,
}

/// One displayed day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Day.
    pub date: NaiveDate,
    /// Observed count, or predicted count in a forecast.
    pub value: f64,
    /// Centered rolling mean at this day.
    pub smoothed: f64,
}

/// Daily series for a query.
///
/// History and forecast are smoothed separately, so the rolling mean of
/// the first forecast day never includes observed days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesResult {
    /// City or region the series covers.
    pub scope: Scope,
    /// Query mode.
    pub mode: Mode,
    /// Observed days inside the selected range.
    pub history: Vec<SeriesPoint>,
    /// Forecasted days. Empty in historical mode.
    pub forecast: Vec<SeriesPoint>,
}

/// Collision count of one region on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCount {
    /// Region name.
    pub region: String,
    /// Collisions in the selected range.
    pub count: u64,
}

/// Per-region counts for every known region plus the map framing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapAggregate {
    /// One row per roster region, in roster order.
    pub regions: Vec<RegionCount>,
    /// Framing for the selection.
    pub viewport: Viewport,
}

/// Confidence lookup result.
///
/// Untrained regions are reported as unavailable rather than assigned a
/// tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "level", rename_all = "snake_case")]
pub enum ConfidenceStatus {
    /// The region was trained and evaluated.
    Available(ConfidenceLevel),
    /// No evaluation exists for the region.
    Unavailable,
}

impl From<Option<ConfidenceLevel>> for ConfidenceStatus {
    fn from(level: Option<ConfidenceLevel>) -> Self {
        level.map_or(Self::Unavailable, Self::Available)
    }
}

/// Selection after a mode change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSelection {
    /// New mode.
    pub mode: Mode,
    /// Selected range after the switch.
    pub range: DateRange,
}
