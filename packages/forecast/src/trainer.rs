//! Offline batch training and holdout evaluation.
//!
//! Each region's series is screened, split into a training prefix and a
//! trailing holdout window, fit on the prefix, and scored against the
//! holdout. Regions are independent, so they are trained in parallel and
//! collected afterwards; one region failing never stops the batch.

use std::collections::BTreeMap;
use std::time::Instant;

use crash_forecast_collision_models::Scope;
use crash_forecast_forecast_models::{
    ConfidenceLevel, ConfidenceThresholds, EvaluationRecord, FittedModel, TrainingFailure,
};
use crash_forecast_series::DailySeries;
use rayon::prelude::*;

use crate::ForecastError;
use crate::metrics::{mae, rmse};
use crate::progress::{RegionOutcome, TrainingProgress};
use crate::sarima::{self, FitOptions};

/// Batch training settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingOptions {
    /// Model orders and optimizer budget.
    pub fit: FitOptions,
    /// Regions with fewer days are skipped.
    pub min_history_days: usize,
    /// Regions with a lower mean daily count are skipped.
    pub min_mean_daily: f64,
    /// Trailing days held out for evaluation.
    pub holdout_days: usize,
    /// Cut-offs for the confidence level.
    pub confidence: ConfidenceThresholds,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            fit: FitOptions::default(),
            min_history_days: 400,
            min_mean_daily: 0.5,
            holdout_days: 365,
            confidence: ConfidenceThresholds::default(),
        }
    }
}

/// Why a region was excluded before fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// Not enough days of history.
    ShortHistory {
        /// Days available.
        days: usize,
    },
    /// Too few collisions per day to model.
    Sparse {
        /// Mean daily count.
        mean_daily: f64,
    },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShortHistory { days } => write!(f, "only {days} days of history"),
            Self::Sparse { mean_daily } => write!(f, "mean daily count {mean_daily:.3}"),
        }
    }
}

/// A region excluded by the screening rules.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRegion {
    /// Region name.
    pub region: String,
    /// Exclusion rule that applied.
    pub reason: SkipReason,
}

/// A region that was fit and evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedRegion {
    /// Model fit on the training prefix.
    pub model: FittedModel,
    /// Holdout error.
    pub evaluation: EvaluationRecord,
    /// Level derived from [`Self::evaluation`].
    pub confidence: ConfidenceLevel,
}

/// Everything a batch run produced, sorted by region name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    /// Successfully trained regions.
    pub trained: Vec<TrainedRegion>,
    /// Regions excluded before fitting.
    pub skipped: Vec<SkippedRegion>,
    /// Regions whose fit or forecast failed.
    pub failures: Vec<TrainingFailure>,
}

/// The city-wide model and, when a holdout was possible, its error.
#[derive(Debug, Clone, PartialEq)]
pub struct CityTraining {
    /// City model.
    pub model: FittedModel,
    /// MAE and RMSE over the holdout window, if one was held out.
    pub evaluation: Option<(f64, f64)>,
}

/// Applies the exclusion rules. `None` means the region qualifies.
#[must_use]
pub fn screen_region(series: &DailySeries, options: &TrainingOptions) -> Option<SkipReason> {
    if series.len() < options.min_history_days {
        return Some(SkipReason::ShortHistory { days: series.len() });
    }
    let mean_daily = series.mean();
    if mean_daily < options.min_mean_daily {
        return Some(SkipReason::Sparse { mean_daily });
    }
    None
}

/// Fits on all but the holdout window and scores the forecast against it.
///
/// Does not apply the screening rules.
///
/// # Errors
///
/// Returns the [`ForecastError`] from fitting or forecasting.
pub fn train_region(
    region: &str,
    series: &DailySeries,
    options: &TrainingOptions,
) -> Result<TrainedRegion, ForecastError> {
    let (train, test) = series.split_tail(options.holdout_days);
    let model = sarima::fit(Scope::Region(region.to_string()), &train, &options.fit)?;
    let predicted = sarima::forecast(&model, test.len())?.values();
    let actual = test.values();

    let evaluation = EvaluationRecord {
        region: region.to_string(),
        mae: mae(&actual, &predicted),
        rmse: rmse(&actual, &predicted),
        mean_daily: series.mean(),
    };
    let confidence = options.confidence.classify(&evaluation);

    Ok(TrainedRegion {
        model,
        evaluation,
        confidence,
    })
}

enum Outcome {
    Trained(Box<TrainedRegion>),
    Skipped(SkippedRegion),
    Failed(TrainingFailure),
}

impl Outcome {
    const fn kind(&self) -> RegionOutcome {
        match self {
            Self::Trained(_) => RegionOutcome::Trained,
            Self::Skipped(_) => RegionOutcome::Skipped,
            Self::Failed(_) => RegionOutcome::Failed,
        }
    }
}

/// Trains every qualifying region.
///
/// Failures are logged and recorded, never propagated.
#[must_use]
pub fn train_regions(
    series: &BTreeMap<String, DailySeries>,
    options: &TrainingOptions,
    progress: &dyn TrainingProgress,
) -> TrainingReport {
    let started = Instant::now();
    progress.started(series.len() as u64);

    let outcomes: Vec<Outcome> = series
        .par_iter()
        .map(|(region, series)| {
            let outcome = if let Some(reason) = screen_region(series, options) {
                log::debug!("Skipping {region}: {reason}");
                Outcome::Skipped(SkippedRegion {
                    region: region.clone(),
                    reason,
                })
            } else {
                match train_region(region, series, options) {
                    Ok(trained) => Outcome::Trained(Box::new(trained)),
                    Err(e) => {
                        log::warn!("Failed to train {region}: {e}");
                        Outcome::Failed(TrainingFailure {
                            region: region.clone(),
                            message: e.to_string(),
                        })
                    }
                }
            };
            progress.region_finished(region, outcome.kind());
            outcome
        })
        .collect();

    let mut report = TrainingReport::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Trained(trained) => report.trained.push(*trained),
            Outcome::Skipped(skipped) => report.skipped.push(skipped),
            Outcome::Failed(failure) => report.failures.push(failure),
        }
    }

    let summary = format!(
        "Trained {} regions ({} skipped, {} failed) in {:.1}s",
        report.trained.len(),
        report.skipped.len(),
        report.failures.len(),
        started.elapsed().as_secs_f64(),
    );
    log::info!("{summary}");
    progress.finished(summary);

    report
}

/// Fits the city-wide model.
///
/// Holds out the trailing window when the remaining prefix is still long
/// enough to fit; otherwise fits the full series without evaluation.
///
/// # Errors
///
/// Returns the [`ForecastError`] from fitting or forecasting.
pub fn train_city(
    series: &DailySeries,
    options: &TrainingOptions,
) -> Result<CityTraining, ForecastError> {
    let required = options.fit.order.differencing_span() + 1;
    if series.len() < options.holdout_days + required {
        log::warn!(
            "City series has {} days; fitting without a holdout window",
            series.len()
        );
        let model = sarima::fit(Scope::City, series, &options.fit)?;
        return Ok(CityTraining {
            model,
            evaluation: None,
        });
    }

    let (train, test) = series.split_tail(options.holdout_days);
    let model = sarima::fit(Scope::City, &train, &options.fit)?;
    let predicted = sarima::forecast(&model, test.len())?.values();
    let actual = test.values();
    let city_mae = mae(&actual, &predicted);
    let city_rmse = rmse(&actual, &predicted);
    log::info!("City model: MAE={city_mae:.3} RMSE={city_rmse:.3}");

    Ok(CityTraining {
        model,
        evaluation: Some((city_mae, city_rmse)),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::progress::NullProgress;
    use crate::sarima::test_series::{noisy, periodic, start};

    #[derive(Default)]
    struct CountingProgress {
        total: AtomicU64,
        finished: Mutex<Vec<(String, RegionOutcome)>>,
    }

    impl TrainingProgress for CountingProgress {
        fn started(&self, regions: u64) {
            self.total.store(regions, Ordering::SeqCst);
        }
        fn region_finished(&self, region: &str, outcome: RegionOutcome) {
            self.finished
                .lock()
                .unwrap()
                .push((region.to_string(), outcome));
        }
        fn finished(&self, _summary: String) {}
    }

    #[test]
    fn screens_short_and_sparse_regions() {
        let options = TrainingOptions::default();
        assert_eq!(
            screen_region(&periodic(399), &options),
            Some(SkipReason::ShortHistory { days: 399 })
        );
        let sparse = DailySeries::new(start(), (0..500).map(|t| u64::from(t % 3 == 0)).collect());
        assert!(matches!(
            screen_region(&sparse, &options),
            Some(SkipReason::Sparse { .. })
        ));
        assert_eq!(screen_region(&periodic(400), &options), None);
    }

    #[test]
    fn trains_and_evaluates_region() {
        let series = noisy(600, 3);
        let trained = train_region("Astoria", &series, &TrainingOptions::default()).unwrap();

        assert_eq!(trained.model.observations, 235);
        assert_eq!(trained.model.train_end, series.date_at(234));
        assert!(trained.evaluation.mae >= 0.0);
        assert!(trained.evaluation.rmse >= trained.evaluation.mae);
        assert!((trained.evaluation.mean_daily - series.mean()).abs() < 1e-12);
    }

    #[test]
    fn exact_pattern_has_zero_holdout_error() {
        let trained = train_region("Flat", &periodic(500), &TrainingOptions::default()).unwrap();
        assert!(trained.evaluation.mae < 1e-9);
        assert_eq!(trained.confidence, ConfidenceLevel::High);
    }

    #[test]
    fn batch_excludes_ineligible_regions() {
        let mut series = BTreeMap::new();
        series.insert("Busy".to_string(), noisy(450, 1));
        series.insert("Tiny".to_string(), DailySeries::new(start(), vec![1; 10]));
        series.insert(
            "Quiet".to_string(),
            DailySeries::new(start(), vec![0; 450]),
        );

        let progress = CountingProgress::default();
        let report = train_regions(&series, &TrainingOptions::default(), &progress);

        let trained: Vec<&str> = report
            .trained
            .iter()
            .map(|t| t.evaluation.region.as_str())
            .collect();
        assert_eq!(trained, vec!["Busy"]);
        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.region.as_str()).collect();
        assert_eq!(skipped, vec!["Quiet", "Tiny"]);
        assert!(report.failures.is_empty());
        assert_eq!(progress.total.load(Ordering::SeqCst), 3);
        let mut finished = progress.finished.lock().unwrap().clone();
        finished.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            finished,
            vec![
                ("Busy".to_string(), RegionOutcome::Trained),
                ("Quiet".to_string(), RegionOutcome::Skipped),
                ("Tiny".to_string(), RegionOutcome::Skipped),
            ]
        );
    }

    #[test]
    fn failure_does_not_abort_batch() {
        let mut series = BTreeMap::new();
        series.insert("Noisy".to_string(), noisy(450, 9));
        series.insert("Steady".to_string(), periodic(450));

        let options = TrainingOptions {
            fit: FitOptions {
                max_iterations: 1,
                ..FitOptions::default()
            },
            ..TrainingOptions::default()
        };
        let report = train_regions(&series, &options, &NullProgress);

        assert_eq!(report.trained.len(), 1);
        assert_eq!(report.trained[0].evaluation.region, "Steady");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].region, "Noisy");
        assert!(report.failures[0].message.contains("did not converge"));
    }

    #[test]
    fn city_model_uses_holdout_when_possible() {
        let long = train_city(&noisy(500, 5), &TrainingOptions::default()).unwrap();
        assert_eq!(long.model.observations, 135);
        assert!(long.evaluation.is_some());

        let short = train_city(&periodic(100), &TrainingOptions::default()).unwrap();
        assert_eq!(short.model.observations, 100);
        assert!(short.evaluation.is_none());
    }
}
