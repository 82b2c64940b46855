//! Shared dataset fixtures for unit and integration tests.
//!
//! The small dataset is hand-picked to exercise every query path: point
//! shapes in two countries, Chicago-area zip codes for country-exact radius
//! searches, a large metro aggregate with a bounding box, a low-area
//! aggregate that escapes distance normalization, and a county without a
//! timezone for the local-clock fallback.

use crate::model::{BoundingBox, GeoType, ReferenceMetadata, ShapeDataset, ShapeRecord};

#[allow(clippy::too_many_arguments)]
fn record(
    id: i64,
    reference_code: &str,
    geo_type: GeoType,
    latitude: f64,
    longitude: f64,
    population: u64,
    area: f64,
    short_display: &str,
    long_display: &str,
) -> ShapeRecord {
    ShapeRecord {
        id,
        reference_code: reference_code.to_string(),
        geo_type,
        latitude,
        longitude,
        population,
        area,
        short_display: short_display.to_string(),
        long_display: long_display.to_string(),
        ref_data: None,
        primary_timezone: None,
        is_aggregate: false,
        bbox: None,
    }
}

fn ref_data(
    zip_code: Option<&str>,
    city: Option<&str>,
    state_prov: Option<&str>,
    country: Option<&str>,
) -> ReferenceMetadata {
    ReferenceMetadata {
        zip_code: zip_code.map(String::from),
        city: city.map(String::from),
        state_prov: state_prov.map(String::from),
        country: country.map(String::from),
        metro: None,
        metro_size: None,
    }
}

/// A nine-record dataset covering cities, zip codes, a county, a metro-area
/// aggregate and a small aggregate, across two countries.
pub fn small_dataset() -> ShapeDataset {
    let mut shapes = Vec::new();

    let mut nashville = record(
        1,
        "us__tn__nashville",
        GeoType::City,
        36.1627,
        -86.7816,
        689_447,
        525.9,
        "Nashville, TN",
        "Nashville, TN, US",
    );
    nashville.ref_data = Some(ref_data(None, Some("Nashville"), Some("TN"), Some("us")));
    nashville.primary_timezone = Some("America/Chicago".to_string());
    shapes.push(nashville);

    let mut chicago = record(
        2,
        "us__il__chicago",
        GeoType::City,
        41.8781,
        -87.6298,
        2_746_388,
        234.5,
        "Chicago, IL",
        "Chicago, IL, US",
    );
    chicago.ref_data = Some(ref_data(None, Some("Chicago"), Some("IL"), Some("us")));
    chicago.primary_timezone = Some("America/Chicago".to_string());
    shapes.push(chicago);

    let mut loop_zip = record(
        3,
        "us__60606",
        GeoType::ZipCode,
        41.8787,
        -87.6366,
        3_101,
        0.6,
        "60606 US",
        "60606, Chicago, IL, US",
    );
    loop_zip.ref_data = Some(ref_data(
        Some("60606"),
        Some("Chicago"),
        Some("IL"),
        Some("us"),
    ));
    loop_zip.primary_timezone = Some("America/Chicago".to_string());
    shapes.push(loop_zip);

    let mut lakeshore_zip = record(
        4,
        "us__60601",
        GeoType::ZipCode,
        41.8858,
        -87.6229,
        14_675,
        0.4,
        "60601 US",
        "60601, Chicago, IL, US",
    );
    lakeshore_zip.ref_data = Some(ref_data(
        Some("60601"),
        Some("Chicago"),
        Some("IL"),
        Some("us"),
    ));
    shapes.push(lakeshore_zip);

    let mut nashville_zip = record(
        5,
        "us__37203",
        GeoType::ZipCode,
        36.1491,
        -86.7904,
        12_743,
        2.1,
        "37203 US",
        "37203, Nashville, TN, US",
    );
    nashville_zip.ref_data = Some(ref_data(
        Some("37203"),
        Some("Nashville"),
        Some("TN"),
        Some("us"),
    ));
    shapes.push(nashville_zip);

    let mut chi_metro = record(
        6,
        "us__chi_metro",
        GeoType::MetroArea,
        41.8781,
        -87.6298,
        9_618_502,
        10_856.0,
        "Chicago Metro",
        "Chicago Metropolitan Area, US",
    );
    chi_metro.is_aggregate = true;
    chi_metro.bbox = Some(BoundingBox {
        ll_latitude: 41.2,
        ll_longitude: -88.7,
        ur_latitude: 42.5,
        ur_longitude: -87.0,
    });
    chi_metro.primary_timezone = Some("America/Chicago".to_string());
    chi_metro.ref_data = Some(ReferenceMetadata {
        zip_code: None,
        city: Some("Chicago".to_string()),
        state_prov: Some("IL".to_string()),
        country: Some("us".to_string()),
        metro: Some("Chicago Metro".to_string()),
        metro_size: Some(3),
    });
    shapes.push(chi_metro);

    let mut tiny_region = record(
        7,
        "us__tiny_region",
        GeoType::Aggregate,
        36.16,
        -86.78,
        0,
        4.0,
        "Tiny Region",
        "Tiny Region, TN, US",
    );
    tiny_region.is_aggregate = true;
    tiny_region.bbox = Some(BoundingBox {
        ll_latitude: 36.1,
        ll_longitude: -86.9,
        ur_latitude: 36.2,
        ur_longitude: -86.7,
    });
    tiny_region.ref_data = Some(ref_data(None, None, Some("TN"), Some("us")));
    shapes.push(tiny_region);

    let mut toronto = record(
        8,
        "ca__on__toronto",
        GeoType::City,
        43.6532,
        -79.3832,
        2_731_571,
        243.3,
        "Toronto, ON",
        "Toronto, ON, CA",
    );
    toronto.ref_data = Some(ref_data(None, Some("Toronto"), Some("ON"), Some("ca")));
    toronto.primary_timezone = Some("America/Toronto".to_string());
    shapes.push(toronto);

    // No timezone on purpose: exercises the local-clock fallback.
    let mut davidson = record(
        9,
        "us__tn__davidson",
        GeoType::County,
        36.1700,
        -86.7800,
        715_884,
        504.0,
        "Davidson County",
        "Davidson County, TN, US",
    );
    davidson.ref_data = Some(ref_data(None, Some("Nashville"), Some("TN"), Some("us")));
    shapes.push(davidson);

    ShapeDataset::new(shapes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_ids_and_reference_codes_are_unique() {
        let dataset = small_dataset();
        let mut ids: Vec<_> = dataset.shapes.iter().map(|s| s.id).collect();
        let mut refs: Vec<_> = dataset
            .shapes
            .iter()
            .map(|s| s.reference_code.clone())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        refs.sort();
        refs.dedup();
        assert_eq!(ids.len(), dataset.shapes.len());
        assert_eq!(refs.len(), dataset.shapes.len());
    }

    #[test]
    fn every_aggregate_carries_a_bounding_box() {
        for shape in small_dataset().shapes {
            assert_eq!(shape.is_aggregate, shape.bbox.is_some());
        }
    }
}
