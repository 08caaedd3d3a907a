#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Daily collision count series.
//!
//! Turns per-event rows into regular, gap-free daily count series: one
//! for the whole city and one per region. Every series covers each day
//! between its first and last observed date exactly once, with absent
//! days filled as zero.

pub mod rolling;

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use crash_forecast_collision_models::CollisionEvent;
use serde::{Deserialize, Serialize};

pub use rolling::centered_rolling_mean;

/// A contiguous, daily-frequency sequence of non-negative counts.
///
/// The date index is implicit: value `i` belongs to `start + i days`, so
/// the series cannot contain duplicate or missing dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySeries {
    start: NaiveDate,
    counts: Vec<u64>,
}

impl DailySeries {
    /// Creates a series whose first value falls on `start`.
    #[must_use]
    pub const fn new(start: NaiveDate, counts: Vec<u64>) -> Self {
        Self { start, counts }
    }

    /// Builds a series by counting occurrences of each date.
    ///
    /// Returns `None` when `dates` is empty. The span runs from the
    /// earliest to the latest date seen, zero-filled in between.
    pub fn from_dates(dates: impl IntoIterator<Item = NaiveDate>) -> Option<Self> {
        let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for date in dates {
            *per_day.entry(date).or_default() += 1;
        }
        Self::from_day_counts(&per_day)
    }

    /// Reindexes sparse per-day counts onto a contiguous daily index.
    #[must_use]
    pub fn from_day_counts(per_day: &BTreeMap<NaiveDate, u64>) -> Option<Self> {
        let (&start, _) = per_day.first_key_value()?;
        let (&end, _) = per_day.last_key_value()?;

        let len = usize::try_from((end - start).num_days()).ok()? + 1;
        let mut counts = vec![0; len];
        for (date, count) in per_day {
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let offset = (*date - start).num_days() as usize;
            counts[offset] = *count;
        }

        Some(Self { start, counts })
    }

    /// First date in the series.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last date in the series.
    ///
    /// Equal to [`Self::start`] for an empty series.
    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.date_at(self.counts.len().saturating_sub(1))
    }

    /// Date of the value at `index`.
    #[must_use]
    pub fn date_at(&self, index: usize) -> NaiveDate {
        #[allow(clippy::cast_possible_wrap)]
        let days = index as i64;
        self.start + Duration::days(days)
    }

    /// Number of days covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the series has no days.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Raw daily counts in date order.
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Daily counts as `f64`, as consumed by the forecast model.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn values(&self) -> Vec<f64> {
        self.counts.iter().map(|&c| c as f64).collect()
    }

    /// Sum of all daily counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Mean daily count, or `0.0` for an empty series.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.counts.is_empty() {
            return 0.0;
        }
        self.total() as f64 / self.counts.len() as f64
    }

    /// Iterates `(date, count)` pairs in date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &count)| (self.date_at(i), count))
    }

    /// Splits off the trailing `tail` days.
    ///
    /// Returns `(head, tail)`. When `tail >= len` the head is empty and
    /// starts on the original start date.
    #[must_use]
    pub fn split_tail(&self, tail: usize) -> (Self, Self) {
        let cut = self.counts.len().saturating_sub(tail);
        let head = Self::new(self.start, self.counts[..cut].to_vec());
        let tail = Self::new(self.date_at(cut), self.counts[cut..].to_vec());
        (head, tail)
    }
}

/// Builds the city-wide series from every event, regardless of region.
///
/// Returns `None` when there are no events.
pub fn build_city_series<'a>(
    events: impl IntoIterator<Item = &'a CollisionEvent>,
) -> Option<DailySeries> {
    DailySeries::from_dates(events.into_iter().map(|e| e.date))
}

/// Builds one series per region from `(region, date)` pairs, one pair
/// per region-joined event.
///
/// Regions with no events do not appear in the output at all.
pub fn build_region_series<'a>(
    joined: impl IntoIterator<Item = (&'a str, NaiveDate)>,
) -> BTreeMap<String, DailySeries> {
    let mut per_region: BTreeMap<&str, BTreeMap<NaiveDate, u64>> = BTreeMap::new();

    for (region, date) in joined {
        *per_region
            .entry(region)
            .or_default()
            .entry(date)
            .or_default() += 1;
    }

    let series: BTreeMap<String, DailySeries> = per_region
        .into_iter()
        .filter_map(|(region, per_day)| {
            DailySeries::from_day_counts(&per_day).map(|series| (region.to_string(), series))
        })
        .collect();
    log::debug!("Built {} region series", series.len());
    series
}
