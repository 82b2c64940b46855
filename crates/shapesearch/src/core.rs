//! The orchestrating search engine: one owned component per capability.
//!
//! [`ShapeSearchEngine`] holds a dataset loader plus the current index
//! generation (shape store, fuzzy index, radius index). A reload builds the
//! next generation entirely off to the side and publishes it atomically, so
//! concurrent readers never observe a half-built index; queries clone the
//! generation handle once and then compute without locks.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use shapesearch_dataset::{DatasetLoader, GeoType, ShapeDataset, ShapeRecord};
use tracing::{info, instrument, warn};

use crate::error::{Result, ShapeSearchError};
use crate::filter::FilterPredicate;
use crate::fuzzy::{FuzzyIndex, FuzzyResult, FuzzySearchParams};
use crate::radius::{PairDistance, RadiusIndex, RadiusShape};
use crate::store::{DisplayOptions, ShapeLocale, ShapeStore};

/// One fully-built index generation. Read-only after construction.
struct Generation {
    store: ShapeStore,
    fuzzy: FuzzyIndex,
    radius: RadiusIndex,
}

impl Generation {
    fn build(dataset: ShapeDataset) -> Self {
        let ShapeDataset { shapes, postings } = dataset;
        let store = ShapeStore::build(shapes);

        let mut fuzzy_builder = FuzzyIndex::builder();
        if let Some(postings) = postings {
            info!(grams = postings.len(), "Adopting pre-computed trigram postings");
            fuzzy_builder = fuzzy_builder.with_postings(postings);
        }

        let mut radius_entries: Vec<(&ShapeRecord, Option<Arc<Value>>)> =
            Vec::with_capacity(store.len());
        for record in store.iter() {
            let payload = match serde_json::to_value(record.as_ref()) {
                Ok(value) => Some(Arc::new(value)),
                Err(e) => {
                    warn!(
                        reference_code = %record.reference_code,
                        error = %e,
                        "Unable to serialize record payload; filters will skip it"
                    );
                    None
                }
            };
            fuzzy_builder.add_entity(
                record.id,
                &record.short_display,
                record.population,
                payload.clone(),
            );
            radius_entries.push((record.as_ref(), payload));
        }
        let radius = RadiusIndex::build(radius_entries);
        let fuzzy = fuzzy_builder.build();

        info!(
            shapes = store.len(),
            entities = fuzzy.num_entities(),
            "Index generation built"
        );
        Self {
            store,
            fuzzy,
            radius,
        }
    }

    fn radius_ids(
        &self,
        reference_code: &str,
        radius_miles: f64,
        country_exact: bool,
    ) -> Vec<i64> {
        let Some(origin) = self.store.shape_by_ref_code(reference_code) else {
            return Vec::new();
        };
        let country_filter = if country_exact {
            origin.country().map(str::to_owned)
        } else {
            None
        };
        self.radius.search_ids(
            origin.latitude,
            origin.longitude,
            radius_miles,
            country_filter.as_deref(),
        )
    }
}

/// A full shape record together with its distance from a search origin.
#[derive(Debug, Clone)]
pub struct RadiusMatch {
    pub record: Arc<ShapeRecord>,
    pub distance: PairDistance,
}

/// The main engine: fuzzy text lookup, radius lookup and shape accessors
/// over a single atomically-replaced dataset generation.
///
/// # Examples
///
/// ```rust
/// use shapesearch::{FuzzySearchParams, ShapeSearchEngine};
/// use shapesearch_dataset::{MemoryDatasetLoader, test_data};
///
/// let loader = MemoryDatasetLoader::new(test_data::small_dataset());
/// let engine = ShapeSearchEngine::new(loader);
/// engine.load(None, false)?;
///
/// let results = engine.fuzzy_search("Nashville, TN", &FuzzySearchParams::default());
/// assert_eq!(results[0].id, 1);
///
/// let nearby = engine.radius_search("us__60606", 50.0, true);
/// assert!(!nearby.is_empty());
/// # Ok::<(), shapesearch::ShapeSearchError>(())
/// ```
pub struct ShapeSearchEngine {
    loader: Box<dyn DatasetLoader>,
    generation: RwLock<Option<Arc<Generation>>>,
}

impl ShapeSearchEngine {
    /// Create an engine with the default configuration (lower-cased keys).
    /// No data is loaded yet; every query returns empty until
    /// [`load`](Self::load) succeeds once.
    pub fn new(loader: impl DatasetLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            generation: RwLock::new(None),
        }
    }

    pub fn builder() -> ShapeSearchEngineBuilder {
        ShapeSearchEngineBuilder::new()
    }

    fn current(&self) -> Option<Arc<Generation>> {
        self.generation.read().clone()
    }

    /// Load (or reload) the dataset and rebuild every index.
    ///
    /// Build-then-swap: the new generation is constructed entirely off to
    /// the side and published atomically. A loader failure is fatal for the
    /// call but leaves the previous generation serving.
    #[instrument(name = "Load dataset", level = "info", skip(self))]
    pub fn load(&self, version: Option<&str>, force_refresh: bool) -> Result<()> {
        let t_load = std::time::Instant::now();
        let dataset = self.loader.load_dataset(version, force_refresh)?;
        let generation = Generation::build(dataset);
        *self.generation.write() = Some(Arc::new(generation));
        info!(elapsed = ?t_load.elapsed(), "Dataset loaded and indices swapped");
        Ok(())
    }

    /// Number of shapes in the current generation, 0 before the first load.
    pub fn num_shapes(&self) -> usize {
        self.current().map_or(0, |g| g.store.len())
    }

    // === Fuzzy search ===

    /// Ranked fuzzy text lookup (§ trigram candidates + composite scoring).
    #[instrument(name = "Fuzzy Search", level = "debug", skip_all)]
    pub fn fuzzy_search(&self, query: &str, params: &FuzzySearchParams) -> Vec<FuzzyResult> {
        self.current()
            .map_or_else(Vec::new, |g| g.fuzzy.search(query, params))
    }

    // === Radius search ===

    /// Ids of all shapes within `radius_miles` of the reference shape.
    /// Unknown reference codes yield an empty list, never an error. With
    /// `country_exact`, matches must share the reference's country code.
    #[instrument(name = "Radius Search", level = "debug", skip(self))]
    pub fn radius_search(
        &self,
        reference_code: &str,
        radius_miles: f64,
        country_exact: bool,
    ) -> Vec<i64> {
        self.current().map_or_else(Vec::new, |g| {
            g.radius_ids(reference_code, radius_miles, country_exact)
        })
    }

    /// [`radius_search`](Self::radius_search), returning each match as the
    /// full record plus its distance from the reference shape. Membership,
    /// records and distances all come from one generation snapshot, so a
    /// concurrent reload can never mix generations within one result set.
    #[instrument(name = "Radius Search (full)", level = "debug", skip(self))]
    pub fn radius_search_full(
        &self,
        reference_code: &str,
        radius_miles: f64,
        country_exact: bool,
    ) -> Vec<RadiusMatch> {
        let Some(generation) = self.current() else {
            return Vec::new();
        };
        generation
            .radius_ids(reference_code, radius_miles, country_exact)
            .into_iter()
            .filter_map(|id| {
                let record = generation.store.shape_by_id(id)?;
                let distance = generation
                    .radius
                    .pair_distance(reference_code, &record.reference_code);
                Some(RadiusMatch { record, distance })
            })
            .collect()
    }

    /// Ellipse test anchored at an arbitrary point rather than a known
    /// shape. Aggregates are excluded; `filters` post-filters on payloads.
    #[instrument(name = "Radius Lat/Lng Search", level = "debug", skip(self, filters))]
    pub fn radius_lat_lng_search(
        &self,
        latitude: f64,
        longitude: f64,
        radius_miles: f64,
        filters: Option<&FilterPredicate>,
    ) -> Vec<RadiusShape> {
        self.current().map_or_else(Vec::new, |g| {
            g.radius
                .lat_lng_search(latitude, longitude, radius_miles, filters)
        })
    }

    /// Distance between two shapes by reference code; the unreachable
    /// sentinel when either is unknown (or nothing is loaded yet).
    pub fn shape_pair_distance(&self, orig_ref: &str, dest_ref: &str) -> PairDistance {
        self.current().map_or_else(
            || {
                warn!(orig_ref, dest_ref, "Pair distance requested before first load");
                PairDistance {
                    distance: crate::radius::UNREACHABLE_DISTANCE,
                    normalized_distance: crate::radius::UNREACHABLE_DISTANCE,
                    aggregate: false,
                }
            },
            |g| g.radius.pair_distance(orig_ref, dest_ref),
        )
    }

    /// Id-flavored pair distance: resolves `dest_id` to its reference code
    /// first. `None` when the id is unknown.
    pub fn shape_pair_distance_by_id(
        &self,
        orig_ref: &str,
        dest_id: i64,
    ) -> Option<(PairDistance, String)> {
        let generation = self.current()?;
        let Some(dest_ref) = generation.store.ref_code_by_id(dest_id) else {
            warn!(dest_id, "Unable to resolve reference code for id");
            return None;
        };
        let dest_ref = dest_ref.to_owned();
        Some((generation.radius.pair_distance(orig_ref, &dest_ref), dest_ref))
    }

    // === Shape/metadata lookups (total; `None` means not found) ===

    pub fn shape_by_id(&self, shape_id: i64) -> Option<Arc<ShapeRecord>> {
        self.current()?.store.shape_by_id(shape_id)
    }

    pub fn shape_by_ref_code(&self, reference_code: &str) -> Option<Arc<ShapeRecord>> {
        self.current()?.store.shape_by_ref_code(reference_code)
    }

    pub fn ref_code_by_id(&self, shape_id: i64) -> Option<String> {
        self.current()?
            .store
            .ref_code_by_id(shape_id)
            .map(str::to_owned)
    }

    pub fn id_by_ref_code(&self, reference_code: &str) -> Option<i64> {
        self.current()?.store.id_by_ref_code(reference_code)
    }

    pub fn geo_type_by_id(&self, shape_id: i64) -> Option<GeoType> {
        self.current()?.store.geo_type_by_id(shape_id)
    }

    pub fn geo_type_by_ref_code(&self, reference_code: &str) -> Option<GeoType> {
        self.current()?.store.geo_type_by_ref_code(reference_code)
    }

    pub fn display_by_id(&self, shape_id: i64, options: DisplayOptions) -> Option<String> {
        self.current()?.store.display_by_id(shape_id, options)
    }

    pub fn display_by_ref_code(
        &self,
        reference_code: &str,
        options: DisplayOptions,
    ) -> Option<String> {
        self.current()?
            .store
            .display_by_ref_code(reference_code, options)
    }

    pub fn local_time_by_id(&self, shape_id: i64) -> Option<chrono::DateTime<chrono::FixedOffset>> {
        self.current()?.store.local_time_by_id(shape_id)
    }

    pub fn local_time_by_ref_code(
        &self,
        reference_code: &str,
    ) -> Option<chrono::DateTime<chrono::FixedOffset>> {
        self.current()?.store.local_time_by_ref_code(reference_code)
    }

    pub fn locale_by_id(&self, shape_id: i64) -> Option<ShapeLocale> {
        self.current()?.store.locale_by_id(shape_id)
    }

    pub fn locale_by_ref_code(&self, reference_code: &str) -> Option<ShapeLocale> {
        self.current()?.store.locale_by_ref_code(reference_code)
    }
}

/// Builder for a [`ShapeSearchEngine`] with explicit configuration.
pub struct ShapeSearchEngineBuilder {
    loader: Option<Box<dyn DatasetLoader>>,
    lower_only: bool,
}

impl ShapeSearchEngineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: None,
            lower_only: true,
        }
    }

    #[must_use]
    pub fn loader(mut self, loader: impl DatasetLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Case-folding mode for normalized keys. Only the lower-cased mode is
    /// implemented; requesting case preservation is a declared-but-
    /// unsupported configuration and fails at build time.
    #[must_use]
    pub fn lower_only(mut self, lower_only: bool) -> Self {
        self.lower_only = lower_only;
        self
    }

    pub fn build(self) -> Result<ShapeSearchEngine> {
        if !self.lower_only {
            return Err(ShapeSearchError::ConfigError(
                "only lower_only = true is currently supported".to_string(),
            ));
        }
        let loader = self.loader.ok_or_else(|| {
            ShapeSearchError::ConfigError("a dataset loader is required".to_string())
        })?;
        Ok(ShapeSearchEngine {
            loader,
            generation: RwLock::new(None),
        })
    }
}

impl Default for ShapeSearchEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapesearch_dataset::{DataError, MemoryDatasetLoader, test_data};

    struct FailingLoader;
    impl DatasetLoader for FailingLoader {
        fn load_dataset(
            &self,
            _version: Option<&str>,
            _force_refresh: bool,
        ) -> std::result::Result<ShapeDataset, DataError> {
            Err(DataError::EmptyDataset)
        }
    }

    fn engine() -> ShapeSearchEngine {
        let engine =
            ShapeSearchEngine::new(MemoryDatasetLoader::new(test_data::small_dataset()));
        engine.load(None, false).unwrap();
        engine
    }

    #[test]
    fn queries_before_first_load_return_empty() {
        let engine = ShapeSearchEngine::new(FailingLoader);
        assert_eq!(engine.num_shapes(), 0);
        assert!(engine
            .fuzzy_search("nashville", &FuzzySearchParams::default())
            .is_empty());
        assert!(engine.radius_search("us__60606", 50.0, false).is_empty());
        assert!(engine.shape_by_id(1).is_none());
        let sentinel = engine.shape_pair_distance("a", "b");
        assert_eq!(sentinel.distance, crate::radius::UNREACHABLE_DISTANCE);
    }

    #[test]
    fn load_failure_is_fatal_but_keeps_the_previous_generation() {
        let engine = engine();
        let before = engine.num_shapes();
        assert!(before > 0);

        // Swap in a loader failure by building a second engine around the
        // same generation semantics: a failing load must not clear state.
        let failing = ShapeSearchEngine {
            loader: Box::new(FailingLoader),
            generation: RwLock::new(engine.generation.read().clone()),
        };
        assert!(failing.load(None, false).is_err());
        assert_eq!(failing.num_shapes(), before);
    }

    #[test]
    fn reload_replaces_the_generation_wholesale() {
        let engine = engine();
        let first = engine.num_shapes();
        engine.load(None, true).unwrap();
        assert_eq!(engine.num_shapes(), first);
    }

    #[test]
    fn builder_rejects_unimplemented_case_mode() {
        let result = ShapeSearchEngine::builder()
            .loader(MemoryDatasetLoader::new(test_data::small_dataset()))
            .lower_only(false)
            .build();
        assert!(matches!(result, Err(ShapeSearchError::ConfigError(_))));
    }

    #[test]
    fn builder_requires_a_loader() {
        assert!(matches!(
            ShapeSearchEngine::builder().build(),
            Err(ShapeSearchError::ConfigError(_))
        ));
    }

    #[test]
    fn pre_computed_postings_are_adopted() {
        let mut dataset = test_data::small_dataset();
        // Postings that only know about Nashville.
        let mut postings = std::collections::HashMap::new();
        for gram in crate::fuzzy::trigrams("nashville tn") {
            postings.entry(gram).or_insert_with(Vec::new).push(1);
        }
        dataset.postings = Some(postings);

        let engine = ShapeSearchEngine::new(MemoryDatasetLoader::new(dataset));
        engine.load(None, false).unwrap();

        let results = engine.fuzzy_search("Nashville", &FuzzySearchParams::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
        // Chicago is indexed as an entity but absent from the adopted
        // postings, so it can never become a candidate.
        assert!(engine
            .fuzzy_search("Chicago", &FuzzySearchParams::default())
            .is_empty());
    }

    #[test]
    fn pair_distance_by_id_resolves_or_declines() {
        let engine = engine();
        let (pair, dest_ref) = engine
            .shape_pair_distance_by_id("us__tn__nashville", 2)
            .unwrap();
        assert_eq!(dest_ref, "us__il__chicago");
        assert!(pair.distance > 0.0);
        assert!(engine.shape_pair_distance_by_id("us__tn__nashville", 404).is_none());
    }
}
