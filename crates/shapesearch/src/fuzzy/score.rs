//! Similarity primitives and the composite ranking formula.

use ahash::AHashSet;

use super::trigram::trigrams;

/// Asymmetric weighting used for ranking: missing grams in the candidate are
/// penalized far more than extra grams in the query, so a query that is a
/// prefix of a longer candidate still scores well.
const RANKING_ALPHA: f64 = 0.85;
const RANKING_BETA: f64 = 0.15;
/// Relative boost applied when the candidate starts with the query verbatim.
const PREFIX_BOOST: f64 = 0.15;
/// Fuzzy score below which the population signal is withheld, so that a
/// high-population low-relevance hit cannot outrank a true near-match.
const RELEVANCE_FLOOR: f64 = 0.65;
const FUZZY_WEIGHT: f64 = 0.9;
const POPULATION_WEIGHT: f64 = 0.1;

/// Tversky index over the trigram sets of two strings.
///
/// Returns 0 when either string is empty or too short to produce grams.
/// `alpha` weights grams only in `a`, `beta` grams only in `b`; the pair is
/// normalized to sum to 1, so `(0.5, 0.5)` is the symmetric Sorensen-Dice
/// form and `(0.85, 0.15)` the ranking form described above.
pub fn tversky_index(a: &str, b: &str, alpha: f64, beta: f64) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let grams_a: AHashSet<String> = trigrams(a).into_iter().collect();
    let grams_b: AHashSet<String> = trigrams(b).into_iter().collect();

    let agree = grams_a.intersection(&grams_b).count() as f64;
    let only_a = grams_a.len() as f64 - agree;
    let only_b = grams_b.len() as f64 - agree;

    let total = alpha + beta;
    let (alpha, beta) = if total > 0.0 {
        (alpha / total, beta / total)
    } else {
        (0.5, 0.5)
    };

    let denominator = agree + alpha * only_a + beta * only_b;
    if denominator == 0.0 {
        return 0.0;
    }
    agree / denominator
}

/// Ranking similarity between a query and a candidate value, with an extra
/// boost for exact-prefix matches over merely-similar ones.
pub fn entity_fuzzy_score(query: &str, candidate: &str) -> f64 {
    let mut score = tversky_index(query, candidate, RANKING_ALPHA, RANKING_BETA);
    if candidate.starts_with(query) {
        score += score * PREFIX_BOOST;
    }
    score
}

/// Composite geo ranking score: fuzzy similarity blended with a small
/// log-population tiebreak once basic relevance is established.
///
/// A purely numeric query is postal-code style; it is compared against only
/// the candidate's first whitespace-delimited token so that "71330 US"
/// matches the query "71330".
pub fn geo_search_score(query: &str, candidate: &str, population: u64) -> f64 {
    let fuzzy = if is_numeric(query) {
        entity_fuzzy_score(query, candidate.split(' ').next().unwrap_or(""))
    } else {
        entity_fuzzy_score(query, candidate)
    };

    if population == 0 || fuzzy <= RELEVANCE_FLOOR {
        return fuzzy * FUZZY_WEIGHT;
    }
    fuzzy * FUZZY_WEIGHT + (population as f64).ln() * POPULATION_WEIGHT
}

/// Population blend over an externally supplied rating, used when callers
/// pre-score candidates by other means. No relevance floor applies.
pub fn geo_auto_complete_score(rating: f64, population: u64) -> f64 {
    if population == 0 {
        return rating * FUZZY_WEIGHT;
    }
    rating * FUZZY_WEIGHT + (population as f64).ln() * POPULATION_WEIGHT
}

/// Damerau-Levenshtein distance, taken as the smaller of the full-string
/// distance and the distance restricted to the substrings before the first
/// comma (handles "Nashville, TN" vs "Nashville" style inputs). Reported in
/// results for diagnostics; it does not feed the primary ranking.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let full = rapidfuzz::distance::damerau_levenshtein::distance(a.chars(), b.chars());
    let a_head = a.split(',').next().unwrap_or(a);
    let b_head = b.split(',').next().unwrap_or(b);
    let head = rapidfuzz::distance::damerau_levenshtein::distance(a_head.chars(), b_head.chars());
    full.min(head)
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
