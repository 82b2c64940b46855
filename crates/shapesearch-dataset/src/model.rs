//! Wire-format data model for shape datasets.
//!
//! A dataset snapshot consists of a shape-record collection and, optionally, a
//! pre-computed trigram posting-list collection. Records are deserialized
//! leniently: a malformed record is logged and skipped rather than failing the
//! whole load, since upstream dataset exports occasionally carry stray rows.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// File name of the shape-record collection within a dataset directory.
pub const SHAPE_FILE_NAME: &str = "shape_records.json";
/// File name of the optional pre-computed trigram posting lists.
pub const POSTINGS_FILE_NAME: &str = "ngram_postings.json";

/// The category of a geographic shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeoType {
    City,
    ZipCode,
    County,
    MetroArea,
    Aggregate,
}

/// Structured reference metadata nested under a shape record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_prov: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metro_size: Option<i64>,
}

/// Bounding box carried by aggregate shapes: lower-left and upper-right corners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(deserialize_with = "f64_or_zero", default)]
    pub ll_latitude: f64,
    #[serde(deserialize_with = "f64_or_zero", default)]
    pub ll_longitude: f64,
    #[serde(deserialize_with = "f64_or_zero", default)]
    pub ur_latitude: f64,
    #[serde(deserialize_with = "f64_or_zero", default)]
    pub ur_longitude: f64,
}

/// A single place record: city, postal code, county, metro area or synthetic
/// aggregate region. Immutable once loaded.
///
/// Field names follow the dataset wire format. Coordinates may arrive as JSON
/// numbers or numeric strings; both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    pub id: i64,
    pub reference_code: String,
    pub geo_type: GeoType,
    #[serde(deserialize_with = "f64_flexible")]
    pub latitude: f64,
    #[serde(deserialize_with = "f64_flexible")]
    pub longitude: f64,
    #[serde(deserialize_with = "u64_or_zero", default)]
    pub population: u64,
    #[serde(deserialize_with = "f64_or_zero", default)]
    pub area: f64,
    #[serde(default)]
    pub short_display: String,
    #[serde(default)]
    pub long_display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_data: Option<ReferenceMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_timezone: Option<String>,
    #[serde(default)]
    pub is_aggregate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl ShapeRecord {
    /// Country code from the nested reference metadata, if any.
    pub fn country(&self) -> Option<&str> {
        self.ref_data.as_ref()?.country.as_deref()
    }
}

/// One loaded generation of raw data, as handed to the search engine.
#[derive(Debug, Clone, Default)]
pub struct ShapeDataset {
    pub shapes: Vec<ShapeRecord>,
    /// Pre-computed trigram posting lists, when the dataset ships them.
    pub postings: Option<HashMap<String, Vec<i64>>>,
}

impl ShapeDataset {
    pub fn new(shapes: Vec<ShapeRecord>) -> Self {
        Self {
            shapes,
            postings: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

/// Parse a shape-record collection from its JSON representation.
///
/// The wire format is either a map of `reference_code -> record` or a plain
/// array of records. Records that fail to deserialize, or that carry
/// non-finite coordinates, are logged and skipped.
pub fn parse_shape_records(value: serde_json::Value) -> Vec<ShapeRecord> {
    let raw: Vec<serde_json::Value> = match value {
        serde_json::Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        serde_json::Value::Array(items) => items,
        other => {
            warn!(kind = %json_kind(&other), "Shape collection is neither object nor array");
            return Vec::new();
        }
    };

    let total = raw.len();
    let mut shapes = Vec::with_capacity(total);
    for item in raw {
        match serde_json::from_value::<ShapeRecord>(item) {
            Ok(record) => {
                if !record.latitude.is_finite() || !record.longitude.is_finite() {
                    warn!(
                        reference_code = %record.reference_code,
                        "Skipping record with non-finite coordinates"
                    );
                    continue;
                }
                if record.is_aggregate && record.bbox.is_none() {
                    // Kept: the radius index treats a missing box as no-match.
                    warn!(
                        reference_code = %record.reference_code,
                        "Aggregate record is missing its bounding box"
                    );
                }
                shapes.push(record);
            }
            Err(e) => warn!(error = %e, "Skipping malformed shape record"),
        }
    }
    if shapes.len() < total {
        warn!(
            parsed = shapes.len(),
            total, "Some shape records were skipped during parsing"
        );
    }
    shapes
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(f64),
    Str(String),
}

fn f64_flexible<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

fn f64_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<NumOrStr>::deserialize(deserializer)?
        .map(|v| match v {
            NumOrStr::Num(n) => n,
            NumOrStr::Str(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        })
        .unwrap_or(0.0))
}

fn u64_or_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}
