//! Fuzzy text lookup over the bundled fixture dataset.
//!
//! Run with: `cargo run --example fuzzy_search`

use shapesearch::{FilterPredicate, FuzzySearchParams, ShapeSearchEngine, init_logging};
use shapesearch_dataset::{MemoryDatasetLoader, test_data};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(tracing::Level::INFO)?;

    let engine = ShapeSearchEngine::new(MemoryDatasetLoader::new(test_data::small_dataset()));
    engine.load(None, false)?;
    println!("Loaded {} shapes\n", engine.num_shapes());

    for query in ["Nashville", "nashvile tn", "chicago", "60606"] {
        println!("query: {query:?}");
        for result in engine.fuzzy_search(query, &FuzzySearchParams::default().num_results(3)) {
            println!(
                "  {:<20} score={:.4} distance={} id={}",
                result.value, result.score, result.edit_distance, result.id
            );
        }
        println!();
    }

    // Restrict a search to zip codes via the payload filter mini-language.
    let zips_only = FilterPredicate::parse([("geo_type", serde_json::json!("ZipCode"))])?;
    let params = FuzzySearchParams::default().filters(zips_only);
    println!("query: \"chicago\" (zip codes only)");
    for result in engine.fuzzy_search("chicago", &params) {
        println!("  {:<20} score={:.4}", result.value, result.score);
    }

    Ok(())
}
