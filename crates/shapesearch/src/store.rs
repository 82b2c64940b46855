//! Canonical record set with id and reference-code lookup maps.
//!
//! All accessors are total: an unknown key yields `None`, never an error.

use std::sync::Arc;

use ahash::AHashMap;
use chrono::{DateTime, FixedOffset, Local, Utc};
use chrono_tz::Tz;
use shapesearch_dataset::{GeoType, ShapeRecord};
use tracing::warn;

/// Flags selecting which display string a shape lookup returns.
///
/// `user_friendly` takes precedence: County and ZipCode shapes route to the
/// long display, MetroArea shapes to the short display. Otherwise `long_desc`
/// directly selects long vs short.
#[derive(Debug, Clone, Copy)]
pub struct DisplayOptions {
    pub long_desc: bool,
    pub user_friendly: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            long_desc: true,
            user_friendly: false,
        }
    }
}

/// Caller-facing location fields for a shape, shaped by its category.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeLocale {
    Metro {
        reference_code: String,
        metro_name: Option<String>,
        metro_size_rank: Option<i64>,
        namesake_city: Option<String>,
        state_code: Option<String>,
        country_code: Option<String>,
    },
    Standard {
        zip_code: Option<String>,
        city_name: Option<String>,
        state_code: Option<String>,
        country_code: Option<String>,
    },
}

/// The canonical record set for one loaded generation.
#[derive(Debug, Default)]
pub struct ShapeStore {
    by_ref: AHashMap<String, Arc<ShapeRecord>>,
    id_to_ref: AHashMap<i64, String>,
}

impl ShapeStore {
    /// Build the lookup maps from a record collection. Records with a
    /// duplicate id or reference code are logged and the later one kept,
    /// mirroring a keyed wire format where later entries win.
    pub fn build(shapes: Vec<ShapeRecord>) -> Self {
        let mut by_ref = AHashMap::with_capacity(shapes.len());
        let mut id_to_ref = AHashMap::with_capacity(shapes.len());
        for record in shapes {
            if let Some(previous) = id_to_ref.insert(record.id, record.reference_code.clone()) {
                warn!(id = record.id, %previous, "Duplicate shape id in dataset");
            }
            if by_ref
                .insert(record.reference_code.clone(), Arc::new(record))
                .is_some()
            {
                warn!("Duplicate reference code in dataset");
            }
        }
        Self { by_ref, id_to_ref }
    }

    pub fn len(&self) -> usize {
        self.by_ref.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ref.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ShapeRecord>> {
        self.by_ref.values()
    }

    pub fn shape_by_ref_code(&self, reference_code: &str) -> Option<Arc<ShapeRecord>> {
        self.by_ref.get(reference_code).cloned()
    }

    pub fn shape_by_id(&self, shape_id: i64) -> Option<Arc<ShapeRecord>> {
        self.shape_by_ref_code(self.id_to_ref.get(&shape_id)?)
    }

    pub fn ref_code_by_id(&self, shape_id: i64) -> Option<&str> {
        self.id_to_ref.get(&shape_id).map(String::as_str)
    }

    pub fn id_by_ref_code(&self, reference_code: &str) -> Option<i64> {
        self.by_ref.get(reference_code).map(|r| r.id)
    }

    pub fn geo_type_by_id(&self, shape_id: i64) -> Option<GeoType> {
        self.shape_by_id(shape_id).map(|r| r.geo_type)
    }

    pub fn geo_type_by_ref_code(&self, reference_code: &str) -> Option<GeoType> {
        self.by_ref.get(reference_code).map(|r| r.geo_type)
    }

    pub fn display_by_id(&self, shape_id: i64, options: DisplayOptions) -> Option<String> {
        self.display_by_ref_code(self.id_to_ref.get(&shape_id)?, options)
    }

    pub fn display_by_ref_code(
        &self,
        reference_code: &str,
        options: DisplayOptions,
    ) -> Option<String> {
        let record = self.by_ref.get(reference_code)?;
        let display = match record.geo_type {
            GeoType::County | GeoType::ZipCode if options.user_friendly => &record.long_display,
            GeoType::MetroArea if options.user_friendly => &record.short_display,
            _ if options.long_desc => &record.long_display,
            _ => &record.short_display,
        };
        Some(display.clone())
    }

    /// Current local time for a shape. Falls back to an un-zoned local clock
    /// read when the record carries no timezone, which is documented as
    /// imprecise.
    pub fn local_time_by_ref_code(&self, reference_code: &str) -> Option<DateTime<FixedOffset>> {
        let record = self.by_ref.get(reference_code)?;
        let time = match record.primary_timezone.as_deref() {
            Some(zone_name) => match zone_name.parse::<Tz>() {
                Ok(zone) => Utc::now().with_timezone(&zone).fixed_offset(),
                Err(_) => {
                    warn!(
                        reference_code,
                        zone_name, "Unknown timezone on shape, using local clock"
                    );
                    Local::now().fixed_offset()
                }
            },
            None => Local::now().fixed_offset(),
        };
        Some(time)
    }

    pub fn local_time_by_id(&self, shape_id: i64) -> Option<DateTime<FixedOffset>> {
        self.local_time_by_ref_code(self.id_to_ref.get(&shape_id)?)
    }

    pub fn locale_by_ref_code(&self, reference_code: &str) -> Option<ShapeLocale> {
        let record = self.by_ref.get(reference_code)?;
        let ref_data = record.ref_data.clone().unwrap_or_default();
        let locale = if record.geo_type == GeoType::MetroArea {
            ShapeLocale::Metro {
                reference_code: record.reference_code.clone(),
                metro_name: ref_data.metro,
                metro_size_rank: ref_data.metro_size,
                namesake_city: ref_data.city,
                state_code: ref_data.state_prov,
                country_code: ref_data.country,
            }
        } else {
            ShapeLocale::Standard {
                zip_code: ref_data.zip_code,
                city_name: ref_data.city,
                state_code: ref_data.state_prov,
                country_code: ref_data.country,
            }
        };
        Some(locale)
    }

    pub fn locale_by_id(&self, shape_id: i64) -> Option<ShapeLocale> {
        self.locale_by_ref_code(self.id_to_ref.get(&shape_id)?)
    }
}
