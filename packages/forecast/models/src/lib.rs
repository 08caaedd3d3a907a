#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Forecast model artifact and evaluation types.
//!
//! A [`FittedModel`] is self-contained: it carries the estimated
//! coefficients and the tail of the training series it needs to keep
//! forecasting, so it can be persisted after training and loaded
//! read-only by the query engine.

use chrono::{Duration, NaiveDate};
use crash_forecast_collision_models::Scope;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Seasonal ARIMA orders: `(p, d, q)` and `(P, D, Q, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SarimaOrder {
    /// Non-seasonal `[p, d, q]`.
    pub order: [usize; 3],
    /// Seasonal `[P, D, Q, s]`.
    pub seasonal_order: [usize; 4],
}

impl Default for SarimaOrder {
    /// `(1,1,1)(1,1,1,7)`: weekly seasonality with trend differencing.
    fn default() -> Self {
        Self {
            order: [1, 1, 1],
            seasonal_order: [1, 1, 1, 7],
        }
    }
}

impl SarimaOrder {
    /// Non-seasonal AR order.
    #[must_use]
    pub const fn p(&self) -> usize {
        self.order[0]
    }

    /// Non-seasonal differencing order.
    #[must_use]
    pub const fn d(&self) -> usize {
        self.order[1]
    }

    /// Non-seasonal MA order.
    #[must_use]
    pub const fn q(&self) -> usize {
        self.order[2]
    }

    /// Seasonal AR order.
    #[must_use]
    pub const fn seasonal_p(&self) -> usize {
        self.seasonal_order[0]
    }

    /// Seasonal differencing order.
    #[must_use]
    pub const fn seasonal_d(&self) -> usize {
        self.seasonal_order[1]
    }

    /// Seasonal MA order.
    #[must_use]
    pub const fn seasonal_q(&self) -> usize {
        self.seasonal_order[2]
    }

    /// Seasonal period in days.
    #[must_use]
    pub const fn period(&self) -> usize {
        self.seasonal_order[3]
    }

    /// Number of free coefficients.
    #[must_use]
    pub const fn parameter_count(&self) -> usize {
        self.p() + self.q() + self.seasonal_p() + self.seasonal_q()
    }

    /// Observations consumed by differencing.
    #[must_use]
    pub const fn differencing_span(&self) -> usize {
        self.d() + self.seasonal_d() * self.period()
    }
}

/// Estimated coefficients of a seasonal ARIMA model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SarimaParams {
    /// Non-seasonal AR coefficients (phi).
    pub ar: Vec<f64>,
    /// Non-seasonal MA coefficients (theta).
    pub ma: Vec<f64>,
    /// Seasonal AR coefficients (capital phi).
    pub seasonal_ar: Vec<f64>,
    /// Seasonal MA coefficients (capital theta).
    pub seasonal_ma: Vec<f64>,
}

/// Recent history a fitted model needs to continue forecasting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastState {
    /// Trailing observations on the original scale, oldest first.
    pub levels: Vec<f64>,
    /// Trailing values of the differenced series, oldest first.
    pub differenced: Vec<f64>,
    /// Trailing in-sample residuals, oldest first.
    pub residuals: Vec<f64>,
}

/// A fitted forecast model for one scope.
///
/// Never mutated after fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FittedModel {
    /// City or region the model was fit for.
    pub scope: Scope,
    /// Orders used for the fit.
    pub order: SarimaOrder,
    /// Estimated coefficients.
    pub params: SarimaParams,
    /// Residual variance at the optimum.
    pub sigma2: f64,
    /// First date of the training window.
    pub train_start: NaiveDate,
    /// Last date of the training window.
    pub train_end: NaiveDate,
    /// Number of training observations.
    pub observations: usize,
    /// Optimizer iterations used.
    pub iterations: usize,
    /// Tail state for continuing the series.
    pub state: ForecastState,
}

/// One forecasted day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    /// Forecasted date.
    pub date: NaiveDate,
    /// Point prediction. May be fractional.
    pub value: f64,
}

/// Forecast for a scope over a fixed horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResult {
    /// City or region forecasted.
    pub scope: Scope,
    /// One point per horizon day, in date order.
    pub points: Vec<ForecastPoint>,
}

impl ForecastResult {
    /// Builds a result from consecutive daily values starting at `first`.
    #[must_use]
    pub fn from_values(scope: Scope, first: NaiveDate, values: &[f64]) -> Self {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                #[allow(clippy::cast_possible_wrap)]
                let offset = i as i64;
                ForecastPoint {
                    date: first + Duration::days(offset),
                    value,
                }
            })
            .collect();
        Self { scope, points }
    }

    /// Sum of all predicted values.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.value).sum()
    }

    /// Number of forecasted days.
    #[must_use]
    pub fn horizon(&self) -> usize {
        self.points.len()
    }

    /// Predicted values in date order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// Held-out error of a region's model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRecord {
    /// Region name.
    pub region: String,
    /// Mean absolute error over the holdout window.
    pub mae: f64,
    /// Root mean squared error over the holdout window.
    pub rmse: f64,
    /// Mean daily count over the region's full series.
    pub mean_daily: f64,
}

/// Qualitative forecast reliability for a region.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConfidenceLevel {
    /// Error at or above the region's typical daily count.
    Low,
    /// Error between half and all of the typical daily count.
    Medium,
    /// Error at most half the typical daily count.
    High,
}

/// Relative-error cut-offs for [`ConfidenceLevel`].
///
/// Relative error is `mae / mean_daily`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    /// Largest relative error still rated [`ConfidenceLevel::High`].
    pub high_max_relative_error: f64,
    /// Largest relative error still rated [`ConfidenceLevel::Medium`].
    pub medium_max_relative_error: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high_max_relative_error: 0.5,
            medium_max_relative_error: 1.0,
        }
    }
}

impl ConfidenceThresholds {
    /// Whether the cut-offs are ordered so that classification is
    /// monotone in relative error.
    #[must_use]
    pub fn is_monotone(&self) -> bool {
        self.high_max_relative_error.is_finite()
            && self.medium_max_relative_error.is_finite()
            && 0.0 <= self.high_max_relative_error
            && self.high_max_relative_error <= self.medium_max_relative_error
    }

    /// Classifies an evaluation record.
    ///
    /// Non-finite errors and regions with no mean activity are rated low.
    #[must_use]
    pub fn classify(&self, record: &EvaluationRecord) -> ConfidenceLevel {
        if record.mean_daily.is_nan() || record.mean_daily <= 0.0 || !record.mae.is_finite() {
            return ConfidenceLevel::Low;
        }
        let relative = record.mae / record.mean_daily;
        if relative <= self.high_max_relative_error {
            ConfidenceLevel::High
        } else if relative <= self.medium_max_relative_error {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// A region whose model could not be fit during batch training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingFailure {
    /// Region name.
    pub region: String,
    /// Error message from the failed fit.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(mae: f64, mean_daily: f64) -> EvaluationRecord {
        EvaluationRecord {
            region: "Astoria".to_string(),
            mae,
            rmse: mae * 1.2,
            mean_daily,
        }
    }

    #[test]
    fn default_orders() {
        let order = SarimaOrder::default();
        assert_eq!((order.p(), order.d(), order.q()), (1, 1, 1));
        assert_eq!(order.period(), 7);
        assert_eq!(order.parameter_count(), 4);
        assert_eq!(order.differencing_span(), 8);
    }

    #[test]
    fn classifies_by_relative_error() {
        let thresholds = ConfidenceThresholds::default();
        assert_eq!(thresholds.classify(&record(1.0, 4.0)), ConfidenceLevel::High);
        assert_eq!(thresholds.classify(&record(2.0, 4.0)), ConfidenceLevel::High);
        assert_eq!(thresholds.classify(&record(3.0, 4.0)), ConfidenceLevel::Medium);
        assert_eq!(thresholds.classify(&record(5.0, 4.0)), ConfidenceLevel::Low);
        assert_eq!(thresholds.classify(&record(1.0, 0.0)), ConfidenceLevel::Low);
        assert_eq!(thresholds.classify(&record(f64::NAN, 2.0)), ConfidenceLevel::Low);
    }

    #[test]
    fn classification_is_monotone() {
        let thresholds = ConfidenceThresholds::default();
        let mut previous = ConfidenceLevel::High;
        for step in 0..=300 {
            let mae = f64::from(step) * 0.01;
            let level = thresholds.classify(&record(mae, 1.0));
            assert!(level <= previous, "mae {mae} raised confidence to {level}");
            previous = level;
        }
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let inverted = ConfidenceThresholds {
            high_max_relative_error: 2.0,
            medium_max_relative_error: 1.0,
        };
        assert!(!inverted.is_monotone());
        assert!(ConfidenceThresholds::default().is_monotone());
    }

    #[test]
    fn forecast_result_dates_are_consecutive() {
        let first = NaiveDate::from_ymd_opt(2021, 12, 30).unwrap();
        let result = ForecastResult::from_values(Scope::City, first, &[1.0, 2.5, 3.0]);
        assert_eq!(result.horizon(), 3);
        assert_eq!(result.points[2].date, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
        assert!((result.total() - 6.5).abs() < 1e-12);
    }

    #[test]
    fn confidence_level_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ConfidenceLevel::Medium).unwrap(),
            "\"medium\""
        );
        assert_eq!("high".parse::<ConfidenceLevel>().unwrap(), ConfidenceLevel::High);
    }
}
