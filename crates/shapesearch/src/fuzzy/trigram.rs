//! Inverted index from 3-character grams to candidate entity ids.

use std::collections::HashMap;

use ahash::AHashMap;
use itertools::Itertools;

const GRAM_LEN: usize = 3;

/// Overlapping length-3 substrings of `text`.
///
/// A string of length `L` produces `L - 2` grams, zero when `L < 3`. Inputs
/// are expected to be normalized already (ASCII letters, digits, spaces).
pub fn trigrams(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < GRAM_LEN {
        return Vec::new();
    }
    chars
        .windows(GRAM_LEN)
        .map(|w| w.iter().collect())
        .collect()
}

/// Append-only posting lists mapping each gram to the entity ids containing
/// it, in insertion order. Built once per dataset load.
#[derive(Debug, Clone, Default)]
pub struct TrigramIndex {
    postings: AHashMap<String, Vec<i64>>,
}

impl TrigramIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt posting lists computed elsewhere (e.g. shipped with a dataset).
    pub fn from_postings(postings: HashMap<String, Vec<i64>>) -> Self {
        Self {
            postings: postings.into_iter().collect(),
        }
    }

    /// Index one entity: every gram of its normalized value gets the id
    /// appended to its posting list.
    pub fn insert(&mut self, normalized_value: &str, entity_id: i64) {
        for gram in trigrams(normalized_value) {
            self.postings.entry(gram).or_default().push(entity_id);
        }
    }

    pub fn num_grams(&self) -> usize {
        self.postings.len()
    }

    /// Top `limit` candidate entity ids for a set of query grams.
    ///
    /// Posting lists for the (de-duplicated) query grams are unioned and
    /// occurrences counted per id; ids are returned by descending occurrence
    /// count with ties broken by first-seen order, i.e. a stable most-common
    /// selection. The count approximates gram overlap without re-deriving
    /// full similarity per candidate.
    pub fn candidates(&self, query_grams: &[String], limit: usize) -> Vec<i64> {
        let mut counts: AHashMap<i64, (usize, usize)> = AHashMap::new();
        for gram in query_grams.iter().unique() {
            if let Some(list) = self.postings.get(gram) {
                for &id in list {
                    let order = counts.len();
                    let entry = counts.entry(id).or_insert((0, order));
                    entry.0 += 1;
                }
            }
        }

        counts
            .into_iter()
            .sorted_by(|(_, (ca, fa)), (_, (cb, fb))| cb.cmp(ca).then(fa.cmp(fb)))
            .map(|(id, _)| id)
            .take(limit)
            .collect()
    }
}
