//! Process-wide read-only collision data.
//!
//! A [`Dataset`] is built once at startup from the loaded events and the
//! region index, then shared by reference with every query. Nothing in
//! it changes afterwards.

use std::collections::BTreeMap;

use crash_forecast_collision_models::{CollisionEvent, Scope, SeverityTotals};
use crash_forecast_query_models::DateRange;
use crash_forecast_series::{DailySeries, build_city_series, build_region_series};
use crash_forecast_spatial::{RegionIndex, join_events};

use crate::QueryError;

/// Events, daily series and region geometry for one study area.
pub struct Dataset {
    events: Vec<CollisionEvent>,
    /// Roster position of each event's region, parallel to `events`.
    assignments: Vec<Option<usize>>,
    dropped: usize,
    city_series: DailySeries,
    region_series: BTreeMap<String, DailySeries>,
    regions: RegionIndex,
    range: DateRange,
    full_range_totals: SeverityTotals,
}

impl Dataset {
    /// Joins `events` to regions and builds every series.
    ///
    /// City-wide series and totals use all events; region series use only
    /// the events that fell inside a region.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EmptyDataset`] if there are no events.
    pub fn build(events: Vec<CollisionEvent>, regions: RegionIndex) -> Result<Self, QueryError> {
        let city_series = build_city_series(&events).ok_or(QueryError::EmptyDataset)?;
        let range = DateRange {
            start: city_series.start(),
            end: city_series.end(),
        };

        let outcome = join_events(&events, &regions);
        let region_series = build_region_series(
            joined(&events, &outcome.assignments, &regions)
                .map(|(region, event)| (region, event.date)),
        );
        let full_range_totals = SeverityTotals::from_events(&events);

        log::info!(
            "Dataset covers {} to {}: {} events, {} joined to {} regions with history",
            range.start,
            range.end,
            events.len(),
            outcome.matched(),
            region_series.len(),
        );

        Ok(Self {
            events,
            assignments: outcome.assignments,
            dropped: outcome.dropped,
            city_series,
            region_series,
            regions,
            range,
            full_range_totals,
        })
    }

    /// First and last observed dates.
    #[must_use]
    pub const fn range(&self) -> DateRange {
        self.range
    }

    /// Totals over the whole dataset, computed at build time.
    #[must_use]
    pub const fn full_range_totals(&self) -> SeverityTotals {
        self.full_range_totals
    }

    /// Events that fell outside every region.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Region boundaries and roster.
    #[must_use]
    pub const fn regions(&self) -> &RegionIndex {
        &self.regions
    }

    /// Events in scope: every event for the city, joined events for a
    /// region.
    pub fn events<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a CollisionEvent> {
        // `Some(None)` is a region outside the roster, which matches nothing.
        let target = scope.region().map(|name| self.regions.region_id(name));
        self.events
            .iter()
            .zip(&self.assignments)
            .filter(move |(_, id)| target.is_none_or(|target| target.is_some() && **id == target))
            .map(|(event, _)| event)
    }

    /// Region-joined events with their region names.
    pub fn joined(&self) -> impl Iterator<Item = (&str, &CollisionEvent)> {
        joined(&self.events, &self.assignments, &self.regions)
    }

    /// Daily series for a scope, if it has any history.
    #[must_use]
    pub fn series(&self, scope: &Scope) -> Option<&DailySeries> {
        match scope {
            Scope::City => Some(&self.city_series),
            Scope::Region(name) => self.region_series.get(name),
        }
    }

    /// Every region series, keyed by region name.
    #[must_use]
    pub const fn region_series(&self) -> &BTreeMap<String, DailySeries> {
        &self.region_series
    }

    /// Totals over all history in scope.
    #[must_use]
    pub fn scope_totals(&self, scope: &Scope) -> SeverityTotals {
        SeverityTotals::from_events(self.events(scope))
    }
}

fn joined<'a>(
    events: &'a [CollisionEvent],
    assignments: &'a [Option<usize>],
    regions: &'a RegionIndex,
) -> impl Iterator<Item = (&'a str, &'a CollisionEvent)> {
    events
        .iter()
        .zip(assignments)
        .filter_map(|(event, id)| {
            id.and_then(|id| regions.region_name(id))
                .map(|name| (name, event))
        })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveDate;
    use crash_forecast_collision_models::CollisionEvent;
    use crash_forecast_spatial::RegionIndex;

    use super::Dataset;

    /// `Harbor` is the unit square at the origin, `Hills` the one east of
    /// it, and `Park` sits far away with no collisions.
    pub const REGIONS_GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "NTAName": "Harbor" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "NTAName": "Hills" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[1.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 1.0], [1.0, 0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "NTAName": "Park" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 6.0], [5.0, 5.0]]],
                        [[[7.0, 4.0], [8.0, 4.0], [8.0, 4.5], [7.0, 4.0]]]
                    ]
                }
            }
        ]
    }"#;

    pub const WEEKLY: [u32; 7] = [4, 3, 3, 3, 4, 6, 5];

    pub fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    pub fn regions() -> RegionIndex {
        RegionIndex::from_geojson_str(REGIONS_GEOJSON, "NTAName").unwrap()
    }

    /// 500 days of an exact weekly pattern in `Harbor`, 10 days of
    /// single collisions in `Hills`, and one collision per week outside
    /// every region.
    pub fn events() -> Vec<CollisionEvent> {
        let mut events = Vec::new();
        for t in 0..500_i64 {
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let count = WEEKLY[(t % 7) as usize];
            for i in 0..count {
                events.push(CollisionEvent::new(day(t), i % 2, u32::from(i == 0 && t % 50 == 0), 0.5, 0.5));
            }
            if t % 7 == 0 {
                events.push(CollisionEvent::new(day(t), 1, 0, 10.0, 10.0));
            }
        }
        for t in 490..500_i64 {
            events.push(CollisionEvent::new(day(t), 2, 0, 1.5, 0.5));
        }
        events
    }

    pub fn dataset() -> Dataset {
        Dataset::build(events(), regions()).unwrap()
    }
}
