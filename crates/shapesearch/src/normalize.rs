//! Deterministic cleanup of free-text inputs into comparable keys.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new("[^0-9a-zA-Z ]+").expect("valid normalization pattern"));

/// Normalize free text into a comparable key.
///
/// Strips every character that is not an ASCII letter, digit or space, and
/// lower-cases the remainder when `lower` is set. No locale dependence; empty
/// input normalizes to an empty string, which never matches any gram.
pub fn normalize(text: &str, lower: bool) -> String {
    let stripped = NON_ALNUM_SPACE.replace_all(text, "");
    if lower {
        stripped.to_lowercase()
    } else {
        stripped.into_owned()
    }
}
