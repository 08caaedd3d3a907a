#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index for region attribution.
//!
//! Loads named region polygons from a `GeoJSON` `FeatureCollection` once at
//! startup, builds an R-tree over their envelopes, and provides fast
//! point-in-polygon lookups plus per-region bounding boxes for viewport
//! framing.
//!
//! Every boundary is normalized to a [`MultiPolygon`] at load time, so
//! single polygons and multi-part regions are handled by the same flat
//! iteration over rings.

pub mod join;

use std::collections::BTreeMap;
use std::path::Path;

use crash_forecast_collision_models::BoundingBox;
use geo::{BoundingRect, Contains, LineString, MultiPolygon};
use geojson::GeoJson;
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

pub use join::{JoinOutcome, join_events};

/// Errors that can occur while loading region boundaries.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Boundary file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Boundary file is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Boundary file parsed but is not a `FeatureCollection`.
    #[error("Expected a GeoJSON FeatureCollection")]
    NotFeatureCollection,
}

/// A named region and its boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBoundary {
    /// Unique region name.
    pub name: String,
    /// Region outline. Single polygons are stored as one-part multipolygons.
    pub polygons: MultiPolygon<f64>,
}

/// A region polygon stored in the R-tree with its roster position.
struct RegionEntry {
    order: usize,
    envelope: AABB<[f64; 2]>,
    polygons: MultiPolygon<f64>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over the region roster.
///
/// Constructed once and shared read-only across all consumers.
pub struct RegionIndex {
    tree: RTree<RegionEntry>,
    roster: Vec<String>,
    bounds: BTreeMap<String, BoundingBox>,
}

impl RegionIndex {
    /// Builds the index from already-parsed boundaries.
    ///
    /// Boundaries sharing a name are merged into one region; the roster
    /// keeps the order in which names first appear.
    #[must_use]
    pub fn new(boundaries: Vec<RegionBoundary>) -> Self {
        let mut roster: Vec<String> = Vec::new();
        let mut merged: BTreeMap<String, MultiPolygon<f64>> = BTreeMap::new();

        for boundary in boundaries {
            if let Some(existing) = merged.get_mut(&boundary.name) {
                existing.0.extend(boundary.polygons.0);
            } else {
                roster.push(boundary.name.clone());
                merged.insert(boundary.name, boundary.polygons);
            }
        }

        let mut bounds = BTreeMap::new();
        let mut entries = Vec::with_capacity(roster.len());

        for (order, name) in roster.iter().enumerate() {
            let Some(polygons) = merged.remove(name) else {
                continue;
            };
            if let Some(bbox) = ring_extent(&polygons) {
                bounds.insert(name.clone(), bbox);
            }
            entries.push(RegionEntry {
                order,
                envelope: compute_envelope(&polygons),
                polygons,
            });
        }

        log::info!("Loaded {} regions into spatial index", roster.len());

        Self {
            tree: RTree::bulk_load(entries),
            roster,
            bounds,
        }
    }

    /// Reads a `GeoJSON` `FeatureCollection` from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// `FeatureCollection`.
    pub fn load(path: &Path, name_property: &str) -> Result<Self, SpatialError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&text, name_property)
    }

    /// Parses a `GeoJSON` `FeatureCollection`, naming each region by the
    /// `name_property` feature property.
    ///
    /// Features without a name or without an areal geometry are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is not a valid `FeatureCollection`.
    pub fn from_geojson_str(text: &str, name_property: &str) -> Result<Self, SpatialError> {
        let GeoJson::FeatureCollection(collection) = text.parse::<GeoJson>()? else {
            return Err(SpatialError::NotFeatureCollection);
        };

        let mut boundaries = Vec::with_capacity(collection.features.len());
        let mut skipped = 0_usize;

        for feature in collection.features {
            let name = feature
                .property(name_property)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string);

            let polygons = feature.geometry.and_then(to_multipolygon);

            match (name, polygons) {
                (Some(name), Some(polygons)) => boundaries.push(RegionBoundary { name, polygons }),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {skipped} boundary features without a name or polygon geometry");
        }

        Ok(Self::new(boundaries))
    }

    /// Looks up the region whose interior contains the point.
    ///
    /// When several regions contain the point, the one listed first in the
    /// roster wins. Points on a boundary edge belong to no region.
    #[must_use]
    pub fn locate(&self, longitude: f64, latitude: f64) -> Option<&str> {
        self.locate_id(longitude, latitude)
            .map(|id| self.roster[id].as_str())
    }

    /// Like [`Self::locate`], but returns the region's roster position.
    #[must_use]
    pub fn locate_id(&self, longitude: f64, latitude: f64) -> Option<usize> {
        let point = geo::Point::new(longitude, latitude);
        let query_env = AABB::from_point([longitude, latitude]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygons.contains(&point))
            .map(|entry| entry.order)
            .min()
    }

    /// Roster position of `region`.
    #[must_use]
    pub fn region_id(&self, region: &str) -> Option<usize> {
        self.roster.iter().position(|r| r == region)
    }

    /// Region name at roster position `id`.
    #[must_use]
    pub fn region_name(&self, id: usize) -> Option<&str> {
        self.roster.get(id).map(String::as_str)
    }

    /// Axis-aligned extent of every coordinate across all rings and parts
    /// of a region.
    #[must_use]
    pub fn bounding_box(&self, region: &str) -> Option<BoundingBox> {
        self.bounds.get(region).copied()
    }

    /// All region names, in load order.
    #[must_use]
    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// Whether `region` is part of the roster.
    #[must_use]
    pub fn contains_region(&self, region: &str) -> bool {
        self.region_id(region).is_some()
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roster.len()
    }

    /// Whether the index has no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Every ring of every part, exterior first.
fn rings(polygons: &MultiPolygon<f64>) -> impl Iterator<Item = &LineString<f64>> {
    polygons
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
}

/// Walks every coordinate of every ring and returns the extrema.
fn ring_extent(polygons: &MultiPolygon<f64>) -> Option<BoundingBox> {
    rings(polygons)
        .flat_map(LineString::coords)
        .fold(None, |acc: Option<BoundingBox>, c| {
            Some(acc.map_or_else(
                || BoundingBox::new(c.x, c.y, c.x, c.y),
                |b| BoundingBox::new(b.west.min(c.x), b.south.min(c.y), b.east.max(c.x), b.north.max(c.y)),
            ))
        })
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Two unit squares side by side plus a two-part region, with one
    /// feature missing its name.
    pub const BOROUGH_GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "NTAName": "West" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "NTAName": "East" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[1.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 1.0], [1.0, 0.0]],
                        [[1.4, 0.4], [1.6, 0.4], [1.6, 0.6], [1.4, 0.6], [1.4, 0.4]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "NTAName": "Islands" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 6.0], [5.0, 5.0]]],
                        [[[-3.0, -2.0], [-2.5, -2.0], [-2.5, -1.0], [-3.0, -1.0], [-3.0, -2.0]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "Other": "Nameless" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[9.0, 9.0], [10.0, 9.0], [10.0, 10.0], [9.0, 9.0]]]
                }
            }
        ]
    }"#;
}
