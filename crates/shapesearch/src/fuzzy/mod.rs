//! Fuzzy text lookup: trigram candidate generation plus composite ranking.
//!
//! The trigram index cheaply narrows the whole entity set down to a bounded
//! candidate list by gram-occurrence counting; the scorer then runs the full
//! similarity formula only on those candidates.

mod score;
mod search;
mod trigram;

pub use score::{
    edit_distance, entity_fuzzy_score, geo_auto_complete_score, geo_search_score, tversky_index,
};
pub use search::{
    CANDIDATE_FLOOR, FuzzyIndex, FuzzyIndexBuilder, FuzzyResult, FuzzySearchParams, SearchEntity,
};
pub use trigram::{TrigramIndex, trigrams};
