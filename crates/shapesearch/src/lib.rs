//! Shapesearch - Geographic Shape Search Engine
//!
//! Shapesearch answers two questions about a loaded set of geographic shapes
//! (cities, zip codes, counties, metro areas and aggregate regions): *"which
//! shape did the user mean by this text?"* and *"which shapes are near this
//! one?"*. Text lookup runs a trigram-candidate fuzzy match with a composite
//! relevance/population ranking; proximity lookup tests point shapes against
//! a radius ellipse and aggregate regions by bounding-box containment.
//!
//! The whole dataset lives in memory. Reloads build the next index generation
//! off to the side and swap it in atomically, so readers are never blocked by
//! a rebuild.
//!
//! # Quick Start
//!
//! ```rust
//! use shapesearch::{FuzzySearchParams, ShapeSearchEngine};
//! use shapesearch_dataset::{MemoryDatasetLoader, test_data};
//!
//! let engine = ShapeSearchEngine::new(MemoryDatasetLoader::new(test_data::small_dataset()));
//! engine.load(None, false)?;
//!
//! // Fuzzy text lookup, tolerant of typos and partial input.
//! let results = engine.fuzzy_search("nashvile", &FuzzySearchParams::default());
//! assert_eq!(results[0].value, "Nashville, TN");
//!
//! // Everything within 50 miles of a Chicago Loop zip code.
//! let nearby = engine.radius_search("us__60606", 50.0, true);
//! assert!(!nearby.is_empty());
//! # Ok::<(), shapesearch::ShapeSearchError>(())
//! ```
//!
//! # Data
//!
//! Dataset retrieval is a replaceable collaborator: anything implementing
//! [`DatasetLoader`](shapesearch_dataset::DatasetLoader) can feed the engine.
//! The companion `shapesearch-dataset` crate ships HTTP, directory and
//! in-memory loaders plus the wire-format model.

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod core;
pub mod error;
mod filter;
mod fuzzy;
mod geometry;
mod normalize;
mod radius;
mod store;

pub use core::{RadiusMatch, ShapeSearchEngine, ShapeSearchEngineBuilder};

pub use error::ShapeSearchError;
pub use filter::{FilterError, FilterPredicate};
pub use fuzzy::{
    FuzzyIndex, FuzzyIndexBuilder, FuzzyResult, FuzzySearchParams, edit_distance,
    entity_fuzzy_score, geo_auto_complete_score, geo_search_score, tversky_index,
};
pub use geometry::{
    EARTH_RADIUS_MILES, great_circle_distance, latitude_delta_from_miles,
    longitude_delta_from_miles,
};
pub use radius::{PairDistance, RadiusShape, UNREACHABLE_DISTANCE};
pub use shapesearch_dataset as dataset;
pub use shapesearch_dataset::{
    BoundingBox, DatasetLoader, DirDatasetLoader, GeoType, MemoryDatasetLoader, ShapeDataset,
    ShapeRecord,
};
pub use store::{DisplayOptions, ShapeLocale};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the shapesearch library.
///
/// Sets up structured logging with configurable levels and filtering. Call
/// this once at the start of your application; later calls are no-ops.
///
/// # Examples
///
/// ```rust
/// use shapesearch::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), shapesearch::ShapeSearchError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), ShapeSearchError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("hyper_util=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapesearch_dataset::test_data;

    fn setup_test_env() {
        let _ = init_logging(tracing::Level::WARN);
    }

    fn engine() -> ShapeSearchEngine {
        setup_test_env();
        let engine =
            ShapeSearchEngine::new(MemoryDatasetLoader::new(test_data::small_dataset()));
        engine.load(None, false).unwrap();
        engine
    }

    #[test]
    fn test_engine_creation_and_load() {
        let engine = engine();
        assert!(engine.num_shapes() > 0);
    }

    #[test]
    fn test_basic_fuzzy_search() {
        let engine = engine();
        let results = engine.fuzzy_search("Nashville", &FuzzySearchParams::default());
        assert!(!results.is_empty(), "Should find results for Nashville");
        assert_eq!(results[0].id, 1);
    }

    #[test]
    fn test_empty_and_garbage_queries() {
        let engine = engine();
        assert!(engine
            .fuzzy_search("", &FuzzySearchParams::default())
            .is_empty());
        // Trigram candidates may surface loosely related shapes but the
        // call must never error.
        let _ = engine.fuzzy_search("XYZ123NONEXISTENT", &FuzzySearchParams::default());
    }

    #[test]
    fn test_radius_search_from_reference() {
        let engine = engine();
        let ids = engine.radius_search("us__60606", 50.0, false);
        assert!(ids.contains(&2), "Chicago should be within 50mi of the Loop");
        assert!(engine.radius_search("nowhere", 50.0, false).is_empty());
    }

    #[test]
    fn test_display_lookup() {
        let engine = engine();
        assert_eq!(
            engine.display_by_ref_code("us__tn__nashville", DisplayOptions::default()),
            Some("Nashville, TN, US".to_string())
        );
    }
}
