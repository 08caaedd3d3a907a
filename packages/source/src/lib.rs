#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collision event source loading.
//!
//! Reads the tabular event export (one row per collision) and normalizes
//! each row into a [`CollisionEvent`]. Both the open-data column names
//! (`crash_date`, `number_of_persons_injured`, ...) and short aliases
//! (`date`, `injured`, ...) are accepted. Rows that cannot be normalized
//! are counted and skipped, never silently.

pub mod parsing;

use std::io::Read;
use std::path::Path;

use crash_forecast_collision_models::CollisionEvent;
use serde::Deserialize;

/// Errors that can occur while loading events.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader error (header row or underlying stream).
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One raw CSV row. Unknown columns are ignored.
#[derive(Debug, Deserialize)]
struct EventRecord {
    #[serde(alias = "crash_date", alias = "CRASH DATE")]
    date: String,
    #[serde(alias = "number_of_persons_injured", alias = "NUMBER OF PERSONS INJURED", default)]
    injured: Option<f64>,
    #[serde(alias = "number_of_persons_killed", alias = "NUMBER OF PERSONS KILLED", default)]
    killed: Option<f64>,
    #[serde(alias = "LONGITUDE", default)]
    longitude: Option<f64>,
    #[serde(alias = "LATITUDE", default)]
    latitude: Option<f64>,
    #[serde(alias = "neighborhood", default)]
    region: Option<String>,
}

/// Per-reason counts of rows that were skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkippedRows {
    /// Rows the CSV reader could not deserialize.
    pub malformed: usize,
    /// Rows whose date could not be parsed.
    pub bad_date: usize,
    /// Rows with missing or zero coordinates.
    pub bad_coordinates: usize,
    /// Rows with negative or non-numeric person counts.
    pub bad_counts: usize,
}

impl SkippedRows {
    /// Total rows skipped for any reason.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.malformed + self.bad_date + self.bad_coordinates + self.bad_counts
    }
}

/// Events read from a source plus what was skipped.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    /// Normalized events, in file order.
    pub events: Vec<CollisionEvent>,
    /// Rows that were not turned into events.
    pub skipped: SkippedRows,
}

/// Loads events from a CSV file.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be opened or its header row
/// cannot be read.
pub fn load_events(path: &Path) -> Result<LoadOutcome, SourceError> {
    log::info!("Loading collision events from {}", path.display());
    let file = std::fs::File::open(path)?;
    read_events(file)
}

/// Reads events from any CSV stream with a header row.
///
/// # Errors
///
/// Returns [`SourceError`] if the header row cannot be read.
pub fn read_events(reader: impl Read) -> Result<LoadOutcome, SourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    // Surface header problems as an error rather than a skip count.
    csv_reader.headers()?;

    let mut outcome = LoadOutcome::default();

    for record in csv_reader.deserialize::<EventRecord>() {
        let Ok(record) = record else {
            outcome.skipped.malformed += 1;
            continue;
        };

        let Some(date) = parsing::parse_event_date(&record.date) else {
            outcome.skipped.bad_date += 1;
            continue;
        };

        let Some((longitude, latitude)) =
            parsing::parse_lng_lat(record.longitude, record.latitude)
        else {
            outcome.skipped.bad_coordinates += 1;
            continue;
        };

        let (Some(injured), Some(killed)) = (
            parsing::parse_count(record.injured),
            parsing::parse_count(record.killed),
        ) else {
            outcome.skipped.bad_counts += 1;
            continue;
        };

        let event = CollisionEvent::new(date, injured, killed, longitude, latitude);
        let event = match record.region.filter(|name| !name.is_empty()) {
            Some(name) => event.with_region(name),
            None => event,
        };
        outcome.events.push(event);
    }

    if outcome.skipped.total() > 0 {
        log::warn!(
            "Skipped {} rows ({} malformed, {} bad date, {} bad coordinates, {} bad counts)",
            outcome.skipped.total(),
            outcome.skipped.malformed,
            outcome.skipped.bad_date,
            outcome.skipped.bad_coordinates,
            outcome.skipped.bad_counts,
        );
    }
    log::info!("Loaded {} collision events", outcome.events.len());

    Ok(outcome)
}
