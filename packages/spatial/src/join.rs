//! Event-to-region joining.
//!
//! Assigns each collision the roster position of the region whose
//! boundary contains it. Events outside every boundary get no region;
//! their count is returned and logged so lost events are never silent.

use crash_forecast_collision_models::CollisionEvent;
use rayon::prelude::*;

use crate::RegionIndex;

/// Result of joining events against the region index.
#[derive(Debug, Clone, Default)]
pub struct JoinOutcome {
    /// Roster position of each input event's region, in input order.
    /// `None` for events outside every region.
    pub assignments: Vec<Option<usize>>,
    /// Number of events that fell outside every region.
    pub dropped: usize,
}

impl JoinOutcome {
    /// Number of events that were assigned a region.
    #[must_use]
    pub fn matched(&self) -> usize {
        self.assignments.len() - self.dropped
    }
}

/// Locates every event by point-in-polygon lookup.
///
/// Only coordinates are consulted; a region already present on an input
/// event plays no part.
#[must_use]
pub fn join_events(events: &[CollisionEvent], index: &RegionIndex) -> JoinOutcome {
    let total = events.len();

    let assignments: Vec<Option<usize>> = events
        .par_iter()
        .map(|event| index.locate_id(event.longitude, event.latitude))
        .collect();

    let dropped = assignments.iter().filter(|id| id.is_none()).count();
    if dropped > 0 {
        log::warn!(
            "Dropped {dropped} of {total} events outside every region boundary ({} matched)",
            total - dropped
        );
    } else {
        log::info!("Joined all {total} events to regions");
    }

    JoinOutcome {
        assignments,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::fixtures::BOROUGH_GEOJSON;

    fn event(longitude: f64, latitude: f64) -> CollisionEvent {
        let date = NaiveDate::from_ymd_opt(2021, 4, 22).unwrap();
        CollisionEvent::new(date, 1, 0, longitude, latitude)
    }

    fn names<'a>(outcome: &JoinOutcome, index: &'a RegionIndex) -> Vec<Option<&'a str>> {
        outcome
            .assignments
            .iter()
            .map(|id| id.and_then(|id| index.region_name(id)))
            .collect()
    }

    #[test]
    fn assigns_regions_and_counts_drops() {
        let index = RegionIndex::from_geojson_str(BOROUGH_GEOJSON, "NTAName").unwrap();
        let events = vec![
            event(0.5, 0.5),
            event(3.0, 3.0),
            event(1.9, 0.9),
            event(1.5, 0.5),
            event(5.1, 5.9),
        ];

        let outcome = join_events(&events, &index);
        assert_eq!(outcome.matched(), 3);
        assert_eq!(outcome.dropped, 2);
        assert_eq!(outcome.matched() + outcome.dropped, 5);
        assert_eq!(
            names(&outcome, &index),
            vec![Some("West"), None, Some("East"), None, Some("Islands")]
        );
    }

    #[test]
    fn ignores_region_already_on_the_event() {
        let index = RegionIndex::from_geojson_str(BOROUGH_GEOJSON, "NTAName").unwrap();
        let events = vec![event(50.0, 50.0).with_region("West"), event(0.2, 0.2).with_region("East")];

        let outcome = join_events(&events, &index);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(names(&outcome, &index), vec![None, Some("West")]);
    }

    #[test]
    fn empty_input() {
        let index = RegionIndex::from_geojson_str(BOROUGH_GEOJSON, "NTAName").unwrap();
        let outcome = join_events(&[], &index);
        assert_eq!(outcome.matched(), 0);
        assert_eq!(outcome.dropped, 0);
    }
}
