//! End-to-end tests exercising the public engine API over the bundled
//! fixture dataset.

use serde_json::json;
use shapesearch::{
    DisplayOptions, FilterPredicate, FuzzySearchParams, GeoType, MemoryDatasetLoader,
    ShapeSearchEngine, UNREACHABLE_DISTANCE, init_logging,
};
use shapesearch_dataset::{DataError, DatasetLoader, ShapeDataset, test_data};

fn setup_test_env() {
    let _ = init_logging(tracing::Level::WARN);
}

fn engine() -> ShapeSearchEngine {
    setup_test_env();
    let engine = ShapeSearchEngine::new(MemoryDatasetLoader::new(test_data::small_dataset()));
    engine.load(None, false).unwrap();
    engine
}

#[test]
fn fuzzy_search_finds_nashville_with_typo() {
    let engine = engine();
    let results = engine.fuzzy_search("nashvile tn", &FuzzySearchParams::default());
    assert!(!results.is_empty());
    assert_eq!(results[0].id, 1);
    assert_eq!(results[0].value, "Nashville, TN");
    assert!(results[0].score > 0.0);
    assert!(results[0].ngram_similarity > 0.5);
}

#[test]
fn fuzzy_search_respects_num_results_and_ordering() {
    let engine = engine();
    let params = FuzzySearchParams::default().num_results(3);
    let results = engine.fuzzy_search("chicago", &params);
    assert!(results.len() <= 3);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn fuzzy_search_with_filters() {
    let engine = engine();
    let zips_only = FilterPredicate::parse([("geo_type", json!("ZipCode"))]).unwrap();
    let params = FuzzySearchParams::default().filters(zips_only);
    let results = engine.fuzzy_search("60606", &params);
    assert!(!results.is_empty());
    for result in &results {
        assert_eq!(
            engine.geo_type_by_id(result.id),
            Some(GeoType::ZipCode),
            "filtered search leaked a non-zip shape"
        );
    }

    let impossible = FilterPredicate::parse([("population__gt", json!(u64::MAX))]).unwrap();
    let params = FuzzySearchParams::default().filters(impossible);
    assert!(engine.fuzzy_search("chicago", &params).is_empty());
}

#[test]
fn numeric_queries_match_on_the_leading_token() {
    let engine = engine();
    // "60606 US" is indexed; a bare numeric query still ranks it first.
    let results = engine.fuzzy_search("60606", &FuzzySearchParams::default());
    assert!(!results.is_empty());
    assert_eq!(results[0].id, 3);
}

#[test]
fn radius_search_around_a_zip() {
    let engine = engine();
    let ids = engine.radius_search("us__60606", 50.0, true);
    // Chicago, the other Loop zip and the metro aggregate are all inside;
    // country-exact keeps Toronto out and Tennessee is simply too far.
    assert!(ids.contains(&2));
    assert!(ids.contains(&4));
    assert!(ids.contains(&6));
    assert!(!ids.contains(&1));
    assert!(!ids.contains(&8));

    for id in &ids {
        let record = engine.shape_by_id(*id).unwrap();
        assert_eq!(record.country().unwrap(), "us");
    }
}

#[test]
fn radius_search_unknown_reference_is_empty() {
    let engine = engine();
    assert!(engine.radius_search("no_such_place", 100.0, false).is_empty());
}

#[test]
fn radius_search_full_attaches_distances() {
    let engine = engine();
    let matches = engine.radius_search_full("us__60606", 50.0, false);
    assert!(!matches.is_empty());
    for m in &matches {
        assert!(m.distance.distance < UNREACHABLE_DISTANCE);
        if !m.record.is_aggregate {
            assert!(m.distance.distance <= 50.0 * 1.5, "point match implausibly far");
        }
    }
}

#[test]
fn radius_search_full_is_consistent_across_concurrent_reloads() {
    let engine = engine();
    let expected: Vec<i64> = engine
        .radius_search_full("us__60606", 50.0, false)
        .iter()
        .map(|m| m.record.id)
        .collect();
    assert!(!expected.is_empty());

    // Membership, records and distances must all come from one snapshot:
    // no match may lose its record or its distance while loads swap the
    // generation underneath the query.
    std::thread::scope(|scope| {
        let reloader = scope.spawn(|| {
            for _ in 0..200 {
                engine.load(None, true).unwrap();
            }
        });
        for _ in 0..200 {
            let matches = engine.radius_search_full("us__60606", 50.0, false);
            let ids: Vec<i64> = matches.iter().map(|m| m.record.id).collect();
            assert_eq!(ids, expected);
            for m in &matches {
                assert!(m.distance.distance < UNREACHABLE_DISTANCE);
            }
        }
        reloader.join().unwrap();
    });
}

#[test]
fn lat_lng_search_excludes_aggregates() {
    let engine = engine();
    let shapes = engine.radius_lat_lng_search(41.8781, -87.6298, 50.0, None);
    assert!(!shapes.is_empty());
    assert!(shapes.iter().all(|s| !s.is_aggregate));

    let filters = FilterPredicate::parse([("geo_type", json!("City"))]).unwrap();
    let cities = engine.radius_lat_lng_search(41.8781, -87.6298, 50.0, Some(&filters));
    assert!(cities.iter().any(|s| s.reference_code == "us__il__chicago"));
    assert!(cities.iter().all(|s| !s.reference_code.starts_with("us__6")));
}

#[test]
fn pair_distance_symmetry_and_sentinel() {
    let engine = engine();
    let ab = engine.shape_pair_distance("us__tn__nashville", "us__il__chicago");
    let ba = engine.shape_pair_distance("us__il__chicago", "us__tn__nashville");
    assert_eq!(ab.distance, ba.distance);
    assert!((390.0..410.0).contains(&ab.distance));

    let sentinel = engine.shape_pair_distance("us__tn__nashville", "atlantis");
    assert_eq!(sentinel.distance, UNREACHABLE_DISTANCE);
    assert_eq!(sentinel.normalized_distance, UNREACHABLE_DISTANCE);
    assert!(!sentinel.aggregate);
}

#[test]
fn pair_distance_normalizes_against_aggregates() {
    let engine = engine();
    let pair = engine.shape_pair_distance("us__tn__nashville", "us__chi_metro");
    assert!(pair.aggregate);
    assert!(pair.normalized_distance < pair.distance);
}

#[test]
fn pair_distance_by_id_round_trips_the_reference_code() {
    let engine = engine();
    let (pair, dest_ref) = engine
        .shape_pair_distance_by_id("us__il__chicago", 1)
        .unwrap();
    assert_eq!(dest_ref, "us__tn__nashville");
    assert_eq!(
        pair,
        engine.shape_pair_distance("us__il__chicago", "us__tn__nashville")
    );
    assert!(engine.shape_pair_distance_by_id("us__il__chicago", -5).is_none());
}

#[test]
fn metadata_lookups() {
    let engine = engine();
    assert_eq!(engine.id_by_ref_code("us__il__chicago"), Some(2));
    assert_eq!(engine.ref_code_by_id(2).as_deref(), Some("us__il__chicago"));
    assert_eq!(engine.geo_type_by_ref_code("us__chi_metro"), Some(GeoType::MetroArea));
    assert_eq!(
        engine.display_by_id(
            3,
            DisplayOptions {
                long_desc: false,
                user_friendly: true
            }
        ),
        Some("60606, Chicago, IL, US".to_string())
    );
    assert!(engine.local_time_by_ref_code("us__tn__nashville").is_some());
    assert!(engine.locale_by_id(6).is_some());
}

#[test]
fn queries_before_first_load_are_empty_not_errors() {
    setup_test_env();
    let engine = ShapeSearchEngine::new(MemoryDatasetLoader::new(test_data::small_dataset()));
    assert_eq!(engine.num_shapes(), 0);
    assert!(engine
        .fuzzy_search("nashville", &FuzzySearchParams::default())
        .is_empty());
    assert!(engine.radius_search("us__60606", 50.0, false).is_empty());
    assert!(engine.shape_by_ref_code("us__60606").is_none());
    assert_eq!(
        engine.shape_pair_distance("a", "b").distance,
        UNREACHABLE_DISTANCE
    );
}

struct FlakyLoader {
    good: MemoryDatasetLoader,
    fail: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl DatasetLoader for FlakyLoader {
    fn load_dataset(
        &self,
        version: Option<&str>,
        force_refresh: bool,
    ) -> Result<ShapeDataset, DataError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(DataError::EmptyDataset);
        }
        self.good.load_dataset(version, force_refresh)
    }
}

#[test]
fn failed_reload_keeps_serving_the_old_generation() {
    setup_test_env();
    let fail = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let engine = ShapeSearchEngine::new(FlakyLoader {
        good: MemoryDatasetLoader::new(test_data::small_dataset()),
        fail: fail.clone(),
    });
    engine.load(None, false).unwrap();
    let shapes_before = engine.num_shapes();
    assert!(shapes_before > 0);

    fail.store(true, std::sync::atomic::Ordering::SeqCst);
    assert!(engine.load(None, true).is_err());
    assert_eq!(engine.num_shapes(), shapes_before);
    assert!(!engine
        .fuzzy_search("nashville", &FuzzySearchParams::default())
        .is_empty());
}
