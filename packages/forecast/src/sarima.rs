//! Seasonal ARIMA fitting and forecasting.
//!
//! The model is
//!
//! ```text
//! phi(B) PHI(B^s) (1 - B)^d (1 - B^s)^D y_t = theta(B) THETA(B^s) e_t
//! ```
//!
//! Coefficients are estimated by conditional sum of squares on the
//! differenced series, with pre-sample values and residuals taken as
//! zero, and minimized by Nelder-Mead. No stationarity or invertibility
//! constraints are imposed on the coefficients.

use std::time::Instant;

use chrono::Duration;
use crash_forecast_collision_models::Scope;
use crash_forecast_forecast_models::{
    FittedModel, ForecastResult, ForecastState, SarimaOrder, SarimaParams,
};
use crash_forecast_series::DailySeries;

use crate::ForecastError;
use crate::optimize::{self, Minimum, NelderMeadOptions};

/// Settings for a single fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Model orders.
    pub order: SarimaOrder,
    /// Optimizer iteration budget. Bounds the cost of one fit.
    pub max_iterations: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            order: SarimaOrder::default(),
            max_iterations: NelderMeadOptions::default().max_iterations,
        }
    }
}

/// Fits a model to the whole of `series`.
///
/// # Errors
///
/// * [`ForecastError::InvalidOrder`] if seasonal terms are requested with
///   a zero period.
/// * [`ForecastError::InsufficientData`] if the series does not outlast
///   differencing by at least one day: `d + D * s + 1` days, which is 9
///   for the default `(1,1,1)(1,1,1,7)` order.
/// * [`ForecastError::NonFinite`] if no finite objective value was found.
/// * [`ForecastError::NotConverged`] if the optimizer ran out of
///   iterations.
pub fn fit(
    scope: Scope,
    series: &DailySeries,
    options: &FitOptions,
) -> Result<FittedModel, ForecastError> {
    let order = options.order;
    validate_order(&order)?;

    let span = order.differencing_span();
    let required = span + 1;
    if series.len() < required {
        return Err(ForecastError::InsufficientData {
            len: series.len(),
            required,
        });
    }

    let started = Instant::now();
    let levels = series.values();
    let diff_poly = differencing_poly(&order);
    let differenced = apply_differencing(&levels, &diff_poly);

    let objective = |x: &[f64]| {
        let params = unpack(&order, x);
        let (ar_poly, ma_poly) = arma_polys(&order, &params);
        mean_square(&residuals(&differenced, &ar_poly, &ma_poly))
    };

    let start = vec![0.0; order.parameter_count()];
    let start_value = objective(&start);
    // A zero sum of squares cannot be improved on.
    let minimum = if start_value <= 0.0 {
        Minimum {
            point: start,
            value: start_value,
            iterations: 0,
            converged: true,
        }
    } else {
        optimize::minimize(
            objective,
            &start,
            &NelderMeadOptions {
                max_iterations: options.max_iterations,
                ..NelderMeadOptions::default()
            },
        )
    };

    if !minimum.value.is_finite() || minimum.point.iter().any(|x| !x.is_finite()) {
        return Err(ForecastError::NonFinite {
            scope: scope.to_string(),
        });
    }
    if !minimum.converged {
        return Err(ForecastError::NotConverged {
            iterations: minimum.iterations,
        });
    }

    let params = unpack(&order, &minimum.point);
    let (ar_poly, ma_poly) = arma_polys(&order, &params);
    let fitted_residuals = residuals(&differenced, &ar_poly, &ma_poly);

    let state = ForecastState {
        levels: tail_padded(&levels, diff_poly.len() - 1),
        differenced: tail_padded(&differenced, ar_poly.len() - 1),
        residuals: tail_padded(&fitted_residuals, ma_poly.len() - 1),
    };

    log::debug!(
        "Fit {scope} on {} days in {} iterations ({} ms), sigma2={:.4}",
        series.len(),
        minimum.iterations,
        started.elapsed().as_millis(),
        minimum.value,
    );

    Ok(FittedModel {
        scope,
        order,
        params,
        sigma2: minimum.value,
        train_start: series.start(),
        train_end: series.end(),
        observations: series.len(),
        iterations: minimum.iterations,
        state,
    })
}

/// Forecasts `horizon` days immediately after the model's training window.
///
/// # Errors
///
/// Returns [`ForecastError::NonFinite`] if the recursion diverges.
pub fn forecast(model: &FittedModel, horizon: usize) -> Result<ForecastResult, ForecastError> {
    let values = forecast_values(model, horizon);
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::NonFinite {
            scope: model.scope.to_string(),
        });
    }
    Ok(ForecastResult::from_values(
        model.scope.clone(),
        model.train_end + Duration::days(1),
        &values,
    ))
}

/// Runs the forecast recursion without checking for divergence.
#[must_use]
pub fn forecast_values(model: &FittedModel, horizon: usize) -> Vec<f64> {
    let (ar_poly, ma_poly) = arma_polys(&model.order, &model.params);
    let diff_poly = differencing_poly(&model.order);

    let mut w = tail_padded(&model.state.differenced, ar_poly.len() - 1);
    let mut e = tail_padded(&model.state.residuals, ma_poly.len() - 1);
    let mut y = tail_padded(&model.state.levels, diff_poly.len() - 1);

    let mut out = Vec::with_capacity(horizon);
    for _ in 0..horizon {
        let ar_part: f64 = ar_poly
            .iter()
            .skip(1)
            .zip(w.iter().rev())
            .map(|(a, past)| a * past)
            .sum();
        let ma_part: f64 = ma_poly
            .iter()
            .skip(1)
            .zip(e.iter().rev())
            .map(|(m, past)| m * past)
            .sum();
        let next_w = ma_part - ar_part;

        let integrated: f64 = diff_poly
            .iter()
            .skip(1)
            .zip(y.iter().rev())
            .map(|(d, past)| d * past)
            .sum();
        let next_y = next_w - integrated;

        w.push(next_w);
        e.push(0.0);
        y.push(next_y);
        out.push(next_y);
    }
    out
}

fn validate_order(order: &SarimaOrder) -> Result<(), ForecastError> {
    let seasonal_terms = order.seasonal_p() + order.seasonal_d() + order.seasonal_q();
    if seasonal_terms > 0 && order.period() == 0 {
        return Err(ForecastError::InvalidOrder {
            message: "seasonal terms require a period of at least 1".to_string(),
        });
    }
    Ok(())
}

/// Splits the optimizer's flat vector into named coefficient groups.
fn unpack(order: &SarimaOrder, x: &[f64]) -> SarimaParams {
    let (ar, rest) = x.split_at(order.p());
    let (ma, rest) = rest.split_at(order.q());
    let (seasonal_ar, seasonal_ma) = rest.split_at(order.seasonal_p());
    SarimaParams {
        ar: ar.to_vec(),
        ma: ma.to_vec(),
        seasonal_ar: seasonal_ar.to_vec(),
        seasonal_ma: seasonal_ma.to_vec(),
    }
}

/// Full AR and MA lag polynomials, each with a leading 1.
///
/// AR: `(1 - sum phi_i B^i)(1 - sum PHI_j B^(js))`.
/// MA: `(1 + sum theta_i B^i)(1 + sum THETA_j B^(js))`.
fn arma_polys(order: &SarimaOrder, params: &SarimaParams) -> (Vec<f64>, Vec<f64>) {
    let period = order.period();
    let ar = poly_mul(
        &lag_poly(&params.ar, 1, -1.0),
        &lag_poly(&params.seasonal_ar, period, -1.0),
    );
    let ma = poly_mul(
        &lag_poly(&params.ma, 1, 1.0),
        &lag_poly(&params.seasonal_ma, period, 1.0),
    );
    (ar, ma)
}

/// `1 + sign * sum c_i B^((i + 1) * step)`.
fn lag_poly(coefficients: &[f64], step: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coefficients.len() * step + 1];
    poly[0] = 1.0;
    for (i, c) in coefficients.iter().enumerate() {
        poly[(i + 1) * step] += sign * c;
    }
    poly
}

/// `(1 - B)^d (1 - B^s)^D`.
fn differencing_poly(order: &SarimaOrder) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..order.d() {
        poly = poly_mul(&poly, &[1.0, -1.0]);
    }
    let seasonal = lag_poly(&[1.0], order.period().max(1), -1.0);
    for _ in 0..order.seasonal_d() {
        poly = poly_mul(&poly, &seasonal);
    }
    poly
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Applies the differencing polynomial, dropping the first `deg` values.
fn apply_differencing(levels: &[f64], poly: &[f64]) -> Vec<f64> {
    let span = poly.len() - 1;
    (span..levels.len())
        .map(|t| poly.iter().enumerate().map(|(k, c)| c * levels[t - k]).sum())
        .collect()
}

/// Conditional residuals with zero pre-sample values:
/// `e_t = sum a_k w_(t-k) - sum_(k>=1) m_k e_(t-k)`.
fn residuals(differenced: &[f64], ar_poly: &[f64], ma_poly: &[f64]) -> Vec<f64> {
    let mut e = vec![0.0; differenced.len()];
    for t in 0..differenced.len() {
        let ar_part: f64 = ar_poly
            .iter()
            .take(t + 1)
            .enumerate()
            .map(|(k, a)| a * differenced[t - k])
            .sum();
        let ma_part: f64 = ma_poly
            .iter()
            .take(t + 1)
            .enumerate()
            .skip(1)
            .map(|(k, m)| m * e[t - k])
            .sum();
        e[t] = ar_part - ma_part;
    }
    e
}

#[allow(clippy::cast_precision_loss)]
fn mean_square(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64
}

/// Last `len` values, front-padded with zeros when `values` is shorter.
fn tail_padded(values: &[f64], len: usize) -> Vec<f64> {
    let take = values.len().min(len);
    let mut out = vec![0.0; len - take];
    out.extend_from_slice(&values[values.len() - take..]);
    out
}

#[cfg(test)]
pub(crate) mod test_series {
    use chrono::NaiveDate;
    use crash_forecast_series::DailySeries;

    pub const WEEKLY: [u64; 7] = [6, 5, 5, 5, 6, 8, 7];

    pub fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 1, 1).unwrap()
    }

    /// Exact weekly pattern.
    pub fn periodic(len: usize) -> DailySeries {
        DailySeries::new(start(), (0..len).map(|t| WEEKLY[t % 7]).collect())
    }

    /// Weekly pattern plus deterministic pseudo-random noise in `0..4`.
    pub fn noisy(len: usize, seed: u64) -> DailySeries {
        let mut state = seed;
        let counts = (0..len)
            .map(|t| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                WEEKLY[t % 7] + (state >> 33) % 4
            })
            .collect();
        DailySeries::new(start(), counts)
    }
}
