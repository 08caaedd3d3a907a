#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collision event types shared across the crash-forecast system.
//!
//! A [`CollisionEvent`] is a single geocoded traffic collision with its
//! injury and fatality counts. Events are immutable once loaded. Region
//! membership for queries comes from the spatial joiner, which works from
//! coordinates; the event's own region field only records what the
//! source supplied.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A single geocoded traffic collision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionEvent {
    /// Calendar day the collision occurred.
    pub date: NaiveDate,
    /// Region name as supplied by the source, if any.
    pub region: Option<String>,
    /// Number of persons injured.
    pub injured: u32,
    /// Number of persons killed.
    pub killed: u32,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
}

impl CollisionEvent {
    /// Creates an event without a source-supplied region.
    #[must_use]
    pub const fn new(
        date: NaiveDate,
        injured: u32,
        killed: u32,
        longitude: f64,
        latitude: f64,
    ) -> Self {
        Self {
            date,
            region: None,
            injured,
            killed,
            longitude,
            latitude,
        }
    }

    /// Returns a copy of this event assigned to `region`.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Returns the region name, if assigned.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

/// Granularity of a forecast or decomposition request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Scope {
    /// The whole study area.
    City,
    /// A single named region.
    Region(String),
}

impl Scope {
    /// Builds a scope from an optional region filter.
    #[must_use]
    pub fn from_region(region: Option<&str>) -> Self {
        region.map_or(Self::City, |name| Self::Region(name.to_string()))
    }

    /// Returns the region name for region scopes.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        match self {
            Self::City => None,
            Self::Region(name) => Some(name),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::City => write!(f, "city"),
            Self::Region(name) => write!(f, "region '{name}'"),
        }
    }
}

/// Whether a query reads historical data or a forecast.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    /// Observed collisions inside the selected date range.
    #[default]
    Historical,
    /// The 365-day forecast after the dataset's latest date.
    Forecast,
}

/// Count, injury and fatality totals for a set of events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityTotals {
    /// Number of collisions.
    pub collisions: u64,
    /// Persons injured.
    pub injured: u64,
    /// Persons killed.
    pub killed: u64,
}

impl SeverityTotals {
    /// Sums the totals over a sequence of events.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a CollisionEvent>) -> Self {
        events.into_iter().fold(Self::default(), |mut acc, event| {
            acc.add(event);
            acc
        })
    }

    /// Adds a single event to the running totals.
    pub fn add(&mut self, event: &CollisionEvent) {
        self.collisions += 1;
        self.injured += u64::from(event.injured);
        self.killed += u64::from(event.killed);
    }
}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Whether the point lies inside or on the edge of the box.
    #[must_use]
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        (self.west..=self.east).contains(&longitude) && (self.south..=self.north).contains(&latitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn totals_sum_injured_and_killed() {
        let events = vec![
            CollisionEvent::new(day(2021, 1, 1), 2, 0, -73.9, 40.7),
            CollisionEvent::new(day(2021, 1, 2), 1, 1, -73.9, 40.7),
            CollisionEvent::new(day(2021, 1, 2), 0, 0, -73.9, 40.7),
        ];
        let totals = SeverityTotals::from_events(&events);
        assert_eq!(totals.collisions, 3);
        assert_eq!(totals.injured, 3);
        assert_eq!(totals.killed, 1);
    }

    #[test]
    fn scope_from_optional_region() {
        assert_eq!(Scope::from_region(None), Scope::City);
        assert_eq!(
            Scope::from_region(Some("Astoria")),
            Scope::Region("Astoria".to_string())
        );
        assert_eq!(Scope::Region("Astoria".to_string()).region(), Some("Astoria"));
    }

    #[test]
    fn mode_parses_snake_case() {
        assert_eq!("forecast".parse::<Mode>().unwrap(), Mode::Forecast);
        assert_eq!(Mode::Historical.to_string(), "historical");
        let json = serde_json::to_string(&Mode::Forecast).unwrap();
        assert_eq!(json, "\"forecast\"");
    }

    #[test]
    fn bounding_box_contains_edges() {
        let bbox = BoundingBox::new(-74.0, 40.0, -73.0, 41.0);
        assert!(bbox.contains(-74.0, 40.5));
        assert!(bbox.contains(-73.5, 41.0));
        assert!(!bbox.contains(-72.9, 40.5));
    }
}
