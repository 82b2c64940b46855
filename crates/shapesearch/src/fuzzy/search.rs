//! The fuzzy search pipeline over an indexed entity set.

use std::collections::HashMap;
use std::sync::Arc;

use ahash::AHashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::score::{edit_distance, entity_fuzzy_score, geo_search_score};
use super::trigram::{TrigramIndex, trigrams};
use crate::filter::FilterPredicate;
use crate::normalize::normalize;

/// Minimum candidate-set size fetched from the trigram index before scoring
/// and filtering, so that post-filtered recall stays acceptable.
pub const CANDIDATE_FLOOR: usize = 500;

/// A per-entity view indexed for fuzzy search. The id usually matches a
/// shape record id, but external callers may register arbitrary text entries
/// under their own keys.
#[derive(Debug, Clone)]
pub struct SearchEntity {
    pub entity_id: i64,
    pub raw_value: String,
    pub normalized_value: String,
    pub population: u64,
    /// Opaque metadata carried through to results and evaluated by filters.
    pub payload: Option<Arc<Value>>,
}

/// One fuzzy search hit.
#[derive(Debug, Clone, Serialize)]
pub struct FuzzyResult {
    pub value: String,
    pub normalized_value: String,
    /// Damerau-Levenshtein distance to the query, for diagnostics and
    /// caller-side tie-breaks; not part of the ranking score.
    pub edit_distance: usize,
    pub ngram_similarity: f64,
    pub score: f64,
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Arc<Value>>,
}

/// Options for a fuzzy search call.
#[derive(Debug, Clone)]
pub struct FuzzySearchParams {
    /// Maximum number of results returned.
    pub num_results: usize,
    /// Conjunctive post-filter evaluated against candidate payloads.
    pub filters: Option<FilterPredicate>,
}

impl Default for FuzzySearchParams {
    fn default() -> Self {
        Self {
            num_results: 50,
            filters: None,
        }
    }
}

impl FuzzySearchParams {
    #[must_use]
    pub fn num_results(mut self, num_results: usize) -> Self {
        self.num_results = num_results;
        self
    }

    #[must_use]
    pub fn filters(mut self, filters: FilterPredicate) -> Self {
        self.filters = Some(filters);
        self
    }
}

/// Builder for a [`FuzzyIndex`]; consumes every entity once.
#[derive(Debug)]
pub struct FuzzyIndexBuilder {
    lower_only: bool,
    index: TrigramIndex,
    entities: AHashMap<i64, SearchEntity>,
    adopted_postings: bool,
}

impl FuzzyIndexBuilder {
    pub fn new() -> Self {
        Self {
            lower_only: true,
            index: TrigramIndex::new(),
            entities: AHashMap::new(),
            adopted_postings: false,
        }
    }

    /// Adopt pre-computed posting lists instead of deriving grams locally.
    /// Entity ids in the lists must match the ids registered via
    /// [`add_entity`](Self::add_entity).
    #[must_use]
    pub fn with_postings(mut self, postings: HashMap<String, Vec<i64>>) -> Self {
        self.index = TrigramIndex::from_postings(postings);
        self.adopted_postings = true;
        self
    }

    /// Register one entity under `entity_id`.
    pub fn add_entity(
        &mut self,
        entity_id: i64,
        raw_value: &str,
        population: u64,
        payload: Option<Arc<Value>>,
    ) {
        let normalized_value = normalize(raw_value, self.lower_only);
        if !self.adopted_postings {
            self.index.insert(&normalized_value, entity_id);
        }
        self.entities.insert(
            entity_id,
            SearchEntity {
                entity_id,
                raw_value: raw_value.to_string(),
                normalized_value,
                population,
                payload,
            },
        );
    }

    pub fn build(self) -> FuzzyIndex {
        FuzzyIndex {
            lower_only: self.lower_only,
            index: self.index,
            entities: self.entities,
        }
    }
}

impl Default for FuzzyIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Trigram index plus entity store, serving ranked fuzzy lookups.
#[derive(Debug)]
pub struct FuzzyIndex {
    lower_only: bool,
    index: TrigramIndex,
    entities: AHashMap<i64, SearchEntity>,
}

impl FuzzyIndex {
    pub fn builder() -> FuzzyIndexBuilder {
        FuzzyIndexBuilder::new()
    }

    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    /// Ranked fuzzy lookup.
    ///
    /// Candidates are fetched from the trigram index (at least
    /// [`CANDIDATE_FLOOR`], more if `num_results` exceeds it), scored,
    /// post-filtered, de-duplicated by normalized value (later candidates
    /// overwrite earlier ones in place), sorted by score descending and
    /// truncated. An empty result is valid, never an error.
    pub fn search(&self, query: &str, params: &FuzzySearchParams) -> Vec<FuzzyResult> {
        let query = normalize(query, self.lower_only);
        let query_grams = trigrams(&query);
        if query_grams.is_empty() {
            return Vec::new();
        }

        let candidate_limit = params.num_results.max(CANDIDATE_FLOOR);
        let candidate_ids = self.index.candidates(&query_grams, candidate_limit);
        debug!(
            candidates = candidate_ids.len(),
            query = %query,
            "Trigram candidates fetched"
        );

        let mut slots: AHashMap<String, usize> = AHashMap::new();
        let mut results: Vec<FuzzyResult> = Vec::new();
        for id in candidate_ids {
            let Some(entity) = self.entities.get(&id) else {
                continue;
            };
            if let Some(filters) = &params.filters {
                match &entity.payload {
                    Some(payload) => {
                        if !filters.matches(payload) {
                            continue;
                        }
                    }
                    // A filtered search can only match entities that carry
                    // metadata to filter on.
                    None => continue,
                }
            }

            let result = FuzzyResult {
                value: entity.raw_value.clone(),
                normalized_value: entity.normalized_value.clone(),
                edit_distance: edit_distance(&query, &entity.normalized_value),
                ngram_similarity: entity_fuzzy_score(&query, &entity.normalized_value),
                score: geo_search_score(&query, &entity.normalized_value, entity.population),
                id,
                extra: entity.payload.clone(),
            };
            match slots.entry(entity.normalized_value.clone()) {
                std::collections::hash_map::Entry::Occupied(slot) => {
                    results[*slot.get()] = result;
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(results.len());
                    results.push(result);
                }
            }
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(params.num_results);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index() -> FuzzyIndex {
        let mut builder = FuzzyIndex::builder();
        builder.add_entity(
            1,
            "Nashville, TN",
            689_447,
            Some(Arc::new(json!({"geo_type": "City", "population": 689447}))),
        );
        builder.add_entity(
            2,
            "Nashua, NH",
            91_322,
            Some(Arc::new(json!({"geo_type": "City", "population": 91322}))),
        );
        builder.add_entity(
            3,
            "Asheville, NC",
            94_589,
            Some(Arc::new(json!({"geo_type": "City", "population": 94589}))),
        );
        builder.add_entity(4, "annotation only", 0, None);
        builder.build()
    }

    #[test]
    fn finds_the_expected_city_with_score() {
        let results = index().search("Nashville, TN", &FuzzySearchParams::default());
        assert!(!results.is_empty());
        assert_eq!(results[0].id, 1);
        assert!(results[0].score > 0.0);
        assert_eq!(results[0].edit_distance, 0);
    }

    #[test]
    fn results_are_sorted_by_score_descending() {
        let results = index().search("nash", &FuzzySearchParams::default());
        assert!(results.len() >= 2);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn num_results_truncates() {
        let params = FuzzySearchParams::default().num_results(1);
        let results = index().search("nash", &params);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn always_false_filter_yields_empty() {
        let filters = FilterPredicate::parse([("geo_type", json!("NoSuchType"))]).unwrap();
        let params = FuzzySearchParams::default().filters(filters);
        assert!(index().search("nashville", &params).is_empty());
    }

    #[test]
    fn entities_without_payload_fail_any_filter() {
        let filters = FilterPredicate::parse([("geo_type", json!("City"))]).unwrap();
        let params = FuzzySearchParams::default().filters(filters);
        let results = index().search("annotation only", &params);
        assert!(results.iter().all(|r| r.id != 4));
    }

    #[test]
    fn empty_query_returns_empty() {
        assert!(index().search("", &FuzzySearchParams::default()).is_empty());
        assert!(index().search("!!", &FuzzySearchParams::default()).is_empty());
    }

    #[test]
    fn duplicate_normalized_values_collapse_to_the_later_entry() {
        let mut builder = FuzzyIndex::builder();
        builder.add_entity(10, "Springfield", 100, None);
        builder.add_entity(11, "springfield", 200, None);
        let index = builder.build();

        let results = index.search("springfield", &FuzzySearchParams::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 11);
    }
}
