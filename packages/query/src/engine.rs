//! Interactive queries over the dataset and trained models.
//!
//! Every query is a pure function of its inputs and the engine's
//! read-only state. Forecast queries prefer a model from the training
//! batch and otherwise fit one synchronously; ad-hoc fits are not cached.

use std::time::Instant;

use chrono::{Duration, NaiveDate};
use crash_forecast_collision_models::{Mode, Scope, SeverityTotals};
use crash_forecast_forecast::artifacts::BatchArtifacts;
use crash_forecast_forecast::sarima::{self, FitOptions};
use crash_forecast_forecast_models::{FittedModel, ForecastResult};
use crash_forecast_query_models::{
    ConfidenceStatus, DateRange, MapAggregate, MapCenter, ModeSelection, SeriesPoint,
    TimeSeriesResult, TotalsResult,
};
use crash_forecast_series::centered_rolling_mean;

use crate::QueryError;
use crate::dataset::Dataset;
use crate::decomposition::SeverityRatios;
use crate::map::aggregate_map;

/// Query engine settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    /// Days forecast after the dataset's latest date.
    pub horizon_days: usize,
    /// Width of the centered rolling mean.
    pub rolling_window: usize,
    /// Start date selected when switching to forecast mode. Defaults to
    /// the latest date minus [`Self::holdout_days`].
    pub anchor_date: Option<NaiveDate>,
    /// Holdout window used by training.
    pub holdout_days: usize,
    /// Map framing when no single region is selected.
    pub default_center: MapCenter,
    /// Settings for on-demand fits.
    pub fit: FitOptions,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            horizon_days: 365,
            rolling_window: 7,
            anchor_date: None,
            holdout_days: 365,
            default_center: MapCenter::default(),
            fit: FitOptions::default(),
        }
    }
}

/// Which model serves a forecast query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelResolution<'a> {
    /// A model from the training batch.
    Cached(&'a FittedModel),
    /// No batch model exists; one must be fit for this scope.
    NeedsFit(&'a Scope),
}

/// Answers totals, time-series, map and confidence queries.
pub struct QueryEngine {
    dataset: Dataset,
    artifacts: BatchArtifacts,
    options: QueryOptions,
}

impl QueryEngine {
    /// Creates an engine over loaded data and artifacts.
    #[must_use]
    pub fn new(dataset: Dataset, artifacts: BatchArtifacts, options: QueryOptions) -> Self {
        log::info!(
            "Query engine ready: {} cached region models, city model {}",
            artifacts.region_models.len(),
            if artifacts.city_model.is_some() {
                "cached"
            } else {
                "fit on demand"
            },
        );
        Self {
            dataset,
            artifacts,
            options,
        }
    }

    /// Underlying dataset.
    #[must_use]
    pub const fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Engine settings.
    #[must_use]
    pub const fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Start date selected when switching to forecast mode.
    #[must_use]
    pub fn anchor_date(&self) -> NaiveDate {
        if let Some(anchor) = self.options.anchor_date {
            return anchor;
        }
        let range = self.dataset.range();
        #[allow(clippy::cast_possible_wrap)]
        let holdout = Duration::days(self.options.holdout_days as i64);
        (range.end - holdout).max(range.start)
    }

    /// Days covered by every forecast.
    #[must_use]
    pub fn forecast_range(&self) -> DateRange {
        let end = self.dataset.range().end;
        #[allow(clippy::cast_possible_wrap)]
        let horizon = self.options.horizon_days as i64;
        DateRange {
            start: end + Duration::days(1),
            end: end + Duration::days(horizon),
        }
    }

    /// Picks the batch model for `scope`, or reports that one must be fit.
    #[must_use]
    pub fn resolve_model<'a>(&'a self, scope: &'a Scope) -> ModelResolution<'a> {
        let cached = match scope {
            Scope::City => self.artifacts.city_model.as_ref(),
            Scope::Region(name) => self.artifacts.region_models.get(name),
        };
        cached.map_or(ModelResolution::NeedsFit(scope), ModelResolution::Cached)
    }

    /// Forecasts the horizon after the dataset's latest date.
    ///
    /// # Errors
    ///
    /// * [`QueryError::UnknownRegion`] for a region not in the roster.
    /// * [`QueryError::ForecastUnavailable`] if the scope has no history
    ///   or the model fails. On-demand fits need one day more history than
    ///   the model's differencing span (9 days for the default weekly
    ///   order), so a region with a shorter series is unavailable rather
    ///   than borrowing another scope's shape.
    pub fn forecast(&self, scope: &Scope) -> Result<ForecastResult, QueryError> {
        self.check_scope(scope)?;
        let unavailable = |reason: String| QueryError::ForecastUnavailable {
            scope: scope.to_string(),
            reason,
        };

        match self.resolve_model(scope) {
            ModelResolution::Cached(model) => self.aligned_forecast(model),
            ModelResolution::NeedsFit(scope) => {
                let series = self
                    .dataset
                    .series(scope)
                    .ok_or_else(|| unavailable("no collision history".to_string()))?;
                let started = Instant::now();
                let model = sarima::fit(scope.clone(), series, &self.options.fit)
                    .map_err(|e| unavailable(e.to_string()))?;
                log::info!(
                    "Fit {scope} on demand over {} days in {} ms",
                    series.len(),
                    started.elapsed().as_millis()
                );
                self.aligned_forecast(&model)
            }
        }
    }

    /// Forecasts from the end of the model's training window through the
    /// end of the horizon and keeps the horizon.
    fn aligned_forecast(&self, model: &FittedModel) -> Result<ForecastResult, QueryError> {
        let horizon = self.options.horizon_days;
        let latest = self.dataset.range().end;
        let gap = usize::try_from((latest - model.train_end).num_days()).unwrap_or(0);

        let result =
            sarima::forecast(model, gap + horizon).map_err(|e| QueryError::ForecastUnavailable {
                scope: model.scope.to_string(),
                reason: e.to_string(),
            })?;

        let first = model.train_end.max(latest) + Duration::days(1);
        let values = result.values();
        Ok(ForecastResult::from_values(
            model.scope.clone(),
            first,
            &values[gap..],
        ))
    }

    /// Collision, injury and fatality totals.
    ///
    /// Historical mode counts events in `[start, end]`. Forecast mode
    /// ignores the range and decomposes the forecast horizon's total with
    /// the scope's historical severity ratios.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for an inverted range, an unknown region, or
    /// an unavailable forecast.
    pub fn get_totals(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        region: Option<&str>,
        mode: Mode,
    ) -> Result<TotalsResult, QueryError> {
        let range = check_range(start, end)?;
        let scope = Scope::from_region(region);
        self.check_scope(&scope)?;

        match mode {
            Mode::Historical => {
                let totals = if region.is_none() && range == self.dataset.range() {
                    self.dataset.full_range_totals()
                } else {
                    SeverityTotals::from_events(
                        self.dataset.events(&scope).filter(|e| range.contains(e.date)),
                    )
                };
                Ok(TotalsResult {
                    scope,
                    mode,
                    range,
                    totals,
                })
            }
            Mode::Forecast => {
                let forecast = self.forecast(&scope)?;
                let ratios = SeverityRatios::from_totals(&self.dataset.scope_totals(&scope));
                Ok(TotalsResult {
                    totals: ratios.decompose(forecast.total()),
                    range: self.forecast_range(),
                    scope,
                    mode,
                })
            }
        }
    }

    /// Daily counts in `[start, end]` with a centered rolling mean, plus
    /// the smoothed forecast in forecast mode.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for an inverted range, an unknown region, or
    /// an unavailable forecast.
    pub fn get_time_series(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        region: Option<&str>,
        mode: Mode,
    ) -> Result<TimeSeriesResult, QueryError> {
        let range = check_range(start, end)?;
        let scope = Scope::from_region(region);
        self.check_scope(&scope)?;

        let (dates, values): (Vec<NaiveDate>, Vec<f64>) = self
            .dataset
            .series(&scope)
            .into_iter()
            .flat_map(|series| series.iter())
            .filter(|(date, _)| range.contains(*date))
            .map(|(date, count)| {
                #[allow(clippy::cast_precision_loss)]
                let value = count as f64;
                (date, value)
            })
            .unzip();
        let history = self.smoothed_points(&dates, &values);

        let forecast = match mode {
            Mode::Historical => Vec::new(),
            Mode::Forecast => {
                let result = self.forecast(&scope)?;
                let dates: Vec<NaiveDate> = result.points.iter().map(|p| p.date).collect();
                self.smoothed_points(&dates, &result.values())
            }
        };

        Ok(TimeSeriesResult {
            scope,
            mode,
            history,
            forecast,
        })
    }

    fn smoothed_points(&self, dates: &[NaiveDate], values: &[f64]) -> Vec<SeriesPoint> {
        let smoothed = centered_rolling_mean(values, self.options.rolling_window);
        dates
            .iter()
            .zip(values)
            .zip(smoothed)
            .map(|((&date, &value), smoothed)| SeriesPoint {
                date,
                value,
                smoothed,
            })
            .collect()
    }

    /// Per-region counts in `[start, end]` for every roster region.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for an inverted range or an unknown region.
    pub fn get_map_aggregate(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        region: Option<&str>,
    ) -> Result<MapAggregate, QueryError> {
        let range = check_range(start, end)?;
        self.check_scope(&Scope::from_region(region))?;
        Ok(aggregate_map(
            self.dataset.joined(),
            self.dataset.regions(),
            range,
            region,
            self.options.default_center,
        ))
    }

    /// Confidence level from training, or unavailable if the region was
    /// never trained.
    #[must_use]
    pub fn get_confidence(&self, region: &str) -> ConfidenceStatus {
        self.artifacts.confidence(region).into()
    }

    /// Selection after switching to `mode`.
    ///
    /// Forecast mode always moves the start date to the anchor date;
    /// historical mode moves it back to the first observed date. The end
    /// date is kept unless it would precede the new start.
    #[must_use]
    pub fn switch_mode(&self, mode: Mode, current: DateRange) -> ModeSelection {
        let available = self.dataset.range();
        let start = match mode {
            Mode::Historical => available.start,
            Mode::Forecast => self.anchor_date(),
        };
        let end = if current.end < start {
            available.end
        } else {
            current.end
        };
        ModeSelection {
            mode,
            range: DateRange { start, end },
        }
    }

    fn check_scope(&self, scope: &Scope) -> Result<(), QueryError> {
        match scope.region() {
            Some(name) if !self.dataset.regions().contains_region(name) => {
                Err(QueryError::UnknownRegion(name.to_string()))
            }
            _ => Ok(()),
        }
    }
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<DateRange, QueryError> {
    if start > end {
        return Err(QueryError::InvalidDateRange { start, end });
    }
    Ok(DateRange { start, end })
}
