//! Per-region collision counts for the choropleth map.

use std::collections::BTreeMap;

use crash_forecast_collision_models::CollisionEvent;
use crash_forecast_query_models::{DateRange, MapAggregate, MapCenter, RegionCount, Viewport};
use crash_forecast_spatial::RegionIndex;

/// Counts region-joined events in `range` per region. `joined` pairs each
/// event with its region name.
///
/// Every roster region gets a row, zero when it had no events. With a
/// `region` filter only that region's events are counted and the map is
/// framed on its bounding box; otherwise the map uses `default_center`.
#[must_use]
pub fn aggregate_map<'a>(
    joined: impl IntoIterator<Item = (&'a str, &'a CollisionEvent)>,
    regions: &RegionIndex,
    range: DateRange,
    region: Option<&str>,
    default_center: MapCenter,
) -> MapAggregate {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for (name, event) in joined {
        if !range.contains(event.date) {
            continue;
        }
        if region.is_some_and(|selected| selected != name) {
            continue;
        }
        *counts.entry(name).or_default() += 1;
    }

    let rows = regions
        .roster()
        .iter()
        .map(|name| RegionCount {
            region: name.clone(),
            count: counts.get(name.as_str()).copied().unwrap_or(0),
        })
        .collect();

    let viewport = region
        .and_then(|name| regions.bounding_box(name))
        .map_or(Viewport::Center(default_center), Viewport::Bounds);

    MapAggregate {
        regions: rows,
        viewport,
    }
}
