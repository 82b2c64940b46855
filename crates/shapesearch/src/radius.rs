//! Proximity lookup: per-shape geometry tests and pairwise distance
//! normalization.
//!
//! Point shapes are tested against an approximation ellipse whose semi-axes
//! come from mile-to-degree conversion; aggregate shapes are tested by
//! bounding-box containment of the query point. The containment test ignores
//! the requested radius entirely once a box is known: an aggregate matches
//! whenever the query point falls inside its extent.

use std::sync::Arc;

use ahash::AHashMap;
use serde::Serialize;
use serde_json::Value;
use shapesearch_dataset::{BoundingBox, ShapeRecord};
use tracing::{error, warn};

use crate::filter::FilterPredicate;
use crate::geometry::{
    great_circle_distance, latitude_delta_from_miles, longitude_delta_from_miles,
};

/// Sentinel distance returned when either endpoint of a pair lookup is
/// unknown: deliberately large and "unreachable", never an error.
pub const UNREACHABLE_DISTANCE: f64 = 999.0;

/// Aggregates below this area skip log-normalization; the log of a near-zero
/// area is unstable or negative.
const AREA_NORMALIZATION_FLOOR: f64 = 10.0;

/// Geometry-only projection of a shape record, owned by the radius index and
/// immutable for its lifetime.
#[derive(Debug, Clone)]
pub struct RadiusShape {
    pub id: i64,
    pub reference_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub area: f64,
    pub is_aggregate: bool,
    pub country: Option<String>,
    pub bbox: Option<BoundingBox>,
    /// Raw record payload for post-filtering.
    pub payload: Option<Arc<Value>>,
}

impl RadiusShape {
    fn from_record(record: &ShapeRecord, payload: Option<Arc<Value>>) -> Self {
        Self {
            id: record.id,
            reference_code: record.reference_code.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            area: record.area,
            is_aggregate: record.is_aggregate,
            country: record.country().map(str::to_owned),
            bbox: record.bbox,
            payload,
        }
    }

    fn matches_country(&self, country_filter: Option<&str>) -> bool {
        match country_filter {
            None => true,
            // Absent country metadata, or the empty-string sentinel, is
            // excluded from an exact-country search.
            Some(filter) => self
                .country
                .as_deref()
                .is_some_and(|c| !c.is_empty() && c == filter),
        }
    }

    /// Ellipse or containment test, depending on shape kind.
    pub fn radius_match(
        &self,
        latitude: f64,
        longitude: f64,
        lat_delta: f64,
        lng_delta: f64,
        country_filter: Option<&str>,
    ) -> bool {
        if !self.matches_country(country_filter) {
            return false;
        }
        if self.is_aggregate {
            self.check_contains(latitude, longitude)
        } else {
            self.check_dist(latitude, longitude, lat_delta, lng_delta)
        }
    }

    // Approximate: performs well for small radii, drifts for large ones.
    fn check_dist(&self, latitude: f64, longitude: f64, lat_delta: f64, lng_delta: f64) -> bool {
        let dlat = (latitude - self.latitude) / lat_delta;
        let dlng = (longitude - self.longitude) / lng_delta;
        dlat * dlat + dlng * dlng < 1.0
    }

    fn check_contains(&self, latitude: f64, longitude: f64) -> bool {
        let Some(bbox) = &self.bbox else {
            error!(shape_id = self.id, "Radius containment check without a bounding box");
            return false;
        };
        bbox.ur_latitude >= latitude
            && latitude >= bbox.ll_latitude
            && bbox.ur_longitude >= longitude
            && longitude >= bbox.ll_longitude
    }
}

/// Pairwise distance between two shapes, with the area-normalized variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairDistance {
    pub distance: f64,
    /// Great-circle distance discounted by log-area when either endpoint is
    /// a large aggregate region: near the edge of a big region still counts
    /// as close.
    pub normalized_distance: f64,
    pub aggregate: bool,
}

impl PairDistance {
    fn unreachable() -> Self {
        Self {
            distance: UNREACHABLE_DISTANCE,
            normalized_distance: UNREACHABLE_DISTANCE,
            aggregate: false,
        }
    }
}

/// The full immutable collection of radius shapes for one generation.
#[derive(Debug, Default)]
pub struct RadiusIndex {
    shapes: AHashMap<String, RadiusShape>,
}

impl RadiusIndex {
    pub fn build<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = (&'a ShapeRecord, Option<Arc<Value>>)>,
    {
        let shapes = records
            .into_iter()
            .map(|(record, payload)| {
                (
                    record.reference_code.clone(),
                    RadiusShape::from_record(record, payload),
                )
            })
            .collect();
        Self { shapes }
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn shape_by_ref_code(&self, reference_code: &str) -> Option<&RadiusShape> {
        self.shapes.get(reference_code)
    }

    /// Ids of all shapes matching the ellipse/containment test around a
    /// point. Results are sorted by id for deterministic output; membership
    /// is independent of call order.
    pub fn search_ids(
        &self,
        latitude: f64,
        longitude: f64,
        radius_miles: f64,
        country_filter: Option<&str>,
    ) -> Vec<i64> {
        let lat_delta = latitude_delta_from_miles(radius_miles);
        let lng_delta = longitude_delta_from_miles(latitude, radius_miles);
        let mut ids: Vec<i64> = self
            .shapes
            .values()
            .filter(|shape| {
                shape.radius_match(latitude, longitude, lat_delta, lng_delta, country_filter)
            })
            .map(|shape| shape.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Ellipse test anchored at an arbitrary point. Aggregates are excluded
    /// and the optional filter predicate is applied to each shape's payload.
    pub fn lat_lng_search(
        &self,
        latitude: f64,
        longitude: f64,
        radius_miles: f64,
        filters: Option<&FilterPredicate>,
    ) -> Vec<RadiusShape> {
        let lat_delta = latitude_delta_from_miles(radius_miles);
        let lng_delta = longitude_delta_from_miles(latitude, radius_miles);
        let mut matches: Vec<RadiusShape> = self
            .shapes
            .values()
            .filter(|shape| !shape.is_aggregate)
            .filter(|shape| shape.radius_match(latitude, longitude, lat_delta, lng_delta, None))
            .filter(|shape| match filters {
                None => true,
                Some(predicate) => shape
                    .payload
                    .as_deref()
                    .is_some_and(|payload| predicate.matches(payload)),
            })
            .cloned()
            .collect();
        matches.sort_unstable_by_key(|shape| shape.id);
        matches
    }

    /// Distance between two shapes resolved by reference code.
    ///
    /// Unknown endpoints yield the [`UNREACHABLE_DISTANCE`] sentinel with a
    /// warning rather than an error. The distance is rounded to 4 decimal
    /// places; normalization divides by the log of the aggregate area (mean
    /// of both when both endpoints are aggregates), skipped below
    /// [`AREA_NORMALIZATION_FLOOR`].
    pub fn pair_distance(&self, orig_ref: &str, dest_ref: &str) -> PairDistance {
        let (Some(orig), Some(dest)) = (self.shapes.get(orig_ref), self.shapes.get(dest_ref))
        else {
            warn!(orig_ref, dest_ref, "Unable to find orig/dest shape for pair distance");
            return PairDistance::unreachable();
        };

        let distance = round4(great_circle_distance(
            orig.latitude,
            orig.longitude,
            dest.latitude,
            dest.longitude,
        ));

        if !orig.is_aggregate && !dest.is_aggregate {
            return PairDistance {
                distance,
                normalized_distance: distance,
                aggregate: false,
            };
        }

        let area = if orig.is_aggregate && dest.is_aggregate {
            if orig.area < AREA_NORMALIZATION_FLOOR || dest.area < AREA_NORMALIZATION_FLOOR {
                return PairDistance {
                    distance,
                    normalized_distance: distance,
                    aggregate: true,
                };
            }
            f64::midpoint(orig.area, dest.area)
        } else if orig.is_aggregate {
            orig.area
        } else {
            dest.area
        };

        if area < AREA_NORMALIZATION_FLOOR {
            return PairDistance {
                distance,
                normalized_distance: distance,
                aggregate: true,
            };
        }
        PairDistance {
            distance,
            normalized_distance: distance / area.ln(),
            aggregate: true,
        }
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
