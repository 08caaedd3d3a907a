//! Splits a forecast collision total into injury and fatality estimates.
//!
//! Uses the scope's historical per-collision severity ratios, assumed to
//! hold over the forecast horizon.

use crash_forecast_collision_models::SeverityTotals;

/// Historical injuries and deaths per collision.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeverityRatios {
    /// Persons injured per collision.
    pub injured: f64,
    /// Persons killed per collision.
    pub killed: f64,
}

impl SeverityRatios {
    /// Ratios from historical totals. Zero when there are no collisions.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_totals(totals: &SeverityTotals) -> Self {
        if totals.collisions == 0 {
            return Self::default();
        }
        let collisions = totals.collisions as f64;
        Self {
            injured: totals.injured as f64 / collisions,
            killed: totals.killed as f64 / collisions,
        }
    }

    /// Estimates totals for a forecast collision total.
    #[must_use]
    pub fn decompose(&self, forecast_total: f64) -> SeverityTotals {
        SeverityTotals {
            collisions: round_count(forecast_total),
            injured: round_count(forecast_total * self.injured),
            killed: round_count(forecast_total * self.killed),
        }
    }
}

/// Rounds half to even, clamping negative and non-finite values to zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_count(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.round_ties_even() as u64
}
