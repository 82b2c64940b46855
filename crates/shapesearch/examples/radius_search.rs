//! Proximity lookup: radius search and pairwise distances.
//!
//! Run with: `cargo run --example radius_search`

use shapesearch::{DisplayOptions, ShapeSearchEngine, init_logging};
use shapesearch_dataset::{MemoryDatasetLoader, test_data};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(tracing::Level::INFO)?;

    let engine = ShapeSearchEngine::new(MemoryDatasetLoader::new(test_data::small_dataset()));
    engine.load(None, false)?;

    println!("Within 50 miles of us__60606 (same country only):");
    for m in engine.radius_search_full("us__60606", 50.0, true) {
        let display = engine
            .display_by_id(m.record.id, DisplayOptions::default())
            .unwrap_or_default();
        println!(
            "  {:<25} {:>8.2} mi (normalized {:>7.2}){}",
            display,
            m.distance.distance,
            m.distance.normalized_distance,
            if m.record.is_aggregate { "  [aggregate]" } else { "" }
        );
    }

    println!("\nPoint shapes within 30 miles of downtown Chicago:");
    for shape in engine.radius_lat_lng_search(41.8781, -87.6298, 30.0, None) {
        println!("  {:<25} id={}", shape.reference_code, shape.id);
    }

    let pair = engine.shape_pair_distance("us__tn__nashville", "us__chi_metro");
    println!(
        "\nNashville -> Chicago Metro: {:.1} mi, normalized {:.1} (aggregate: {})",
        pair.distance, pair.normalized_distance, pair.aggregate
    );

    Ok(())
}
