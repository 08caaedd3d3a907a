//! Batch training pipeline.
//!
//! Loads events and boundaries, builds the daily series, trains every
//! qualifying region in parallel plus the city-wide model, and writes the
//! artifacts the server and `forecast` command read.

use std::time::Instant;

use crash_forecast_cli_utils::{MultiProgress, RegionTrainingBar, steps_bar};
use crash_forecast_collision_models::Scope;
use crash_forecast_config::AppConfig;
use crash_forecast_forecast::artifacts::{ArtifactStore, BatchArtifacts};
use crash_forecast_forecast::trainer::{self, CityTraining, TrainingOptions};
use crash_forecast_series::DailySeries;
use crash_forecast_query::Dataset;
use crash_forecast_spatial::RegionIndex;

/// Load events, load boundaries, join, train, save.
const STEPS: u64 = 5;

/// Runs the full training pipeline described by `config`.
///
/// # Errors
///
/// Returns an error if an input cannot be loaded or the artifacts cannot
/// be written. Individual region failures are recorded in the artifacts
/// instead.
pub fn run_training(
    config: &AppConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let steps = steps_bar(multi, "Training", STEPS);

    steps.set_message("Loading events");
    let outcome = crash_forecast_source::load_events(&config.data.events_path)?;
    steps.inc(1);

    steps.set_message("Loading region boundaries");
    let regions = RegionIndex::load(
        &config.data.boundaries_path,
        &config.data.region_name_property,
    )?;
    steps.inc(1);

    steps.set_message("Joining events to regions");
    let dataset = Dataset::build(outcome.events, regions)?;
    steps.inc(1);

    steps.set_message("Fitting models");
    let options = config.training_options();
    let bar = RegionTrainingBar::new(multi);
    let report = trainer::train_regions(dataset.region_series(), &options, &bar);
    let city = dataset
        .series(&Scope::City)
        .and_then(|series| train_city(series, &options));
    steps.inc(1);

    steps.set_message("Saving artifacts");
    let store = ArtifactStore::new(&config.data.artifacts_dir);
    let artifacts = BatchArtifacts::from_training(city, report, options.fit.order);
    store.save(&artifacts)?;
    steps.inc(1);

    steps.finish_with_message(format!(
        "Saved {} region models to {} in {:.1}s",
        artifacts.region_models.len(),
        store.dir().display(),
        started.elapsed().as_secs_f64(),
    ));

    Ok(())
}

/// A failed city model only disables the pre-trained city forecast; the
/// query engine can still fit it on demand.
fn train_city(series: &DailySeries, options: &TrainingOptions) -> Option<CityTraining> {
    match trainer::train_city(series, options) {
        Ok(city) => Some(city),
        Err(e) => {
            log::warn!("Failed to train city model: {e}");
            None
        }
    }
}
