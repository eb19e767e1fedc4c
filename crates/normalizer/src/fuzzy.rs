//! Typo correction by minimum Levenshtein distance against dictionary keys.
//!
//! A candidate is accepted when its edit distance is at most
//! [`MAX_DISTANCE`] *and* the distance relative to the longer string is at
//! most [`MAX_DISTANCE_RATIO`]. Both gates are needed: the absolute cap keeps
//! short queries from matching everything, the relative cap keeps long
//! queries from absorbing wildly different keys.

use crate::dictionary::Dictionary;

/// Maximum absolute edit distance accepted.
pub const MAX_DISTANCE: usize = 3;

/// Maximum `distance / max(len_a, len_b)` accepted.
pub const MAX_DISTANCE_RATIO: f32 = 0.35;

/// Confidence floor for accepted fuzzy matches.
pub const MIN_CONFIDENCE: f32 = 0.6;

/// A fuzzy dictionary hit.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    /// Canonical name the matched key maps to.
    pub canonical: String,
    /// Edit distance between the query and the matched key.
    pub distance: usize,
    /// `max(0.6, 1 - distance / max_len)`.
    pub confidence: f32,
}

/// Find the closest dictionary key to `cleaned` within the acceptance gates.
///
/// Ties on distance break toward the lexicographically smaller key so the
/// result is deterministic regardless of hash-map iteration order.
pub fn closest_match(dict: &Dictionary, cleaned: &str) -> Option<FuzzyMatch> {
    let query_len = cleaned.chars().count();
    let mut best: Option<(usize, &str)> = None;

    for key in dict.keys() {
        let key_len = key.chars().count();
        // Cheap pre-filter: the distance is at least the length difference.
        if key_len.abs_diff(query_len) > MAX_DISTANCE {
            continue;
        }
        let distance = strsim::levenshtein(cleaned, key);
        if distance > MAX_DISTANCE {
            continue;
        }
        let max_len = query_len.max(key_len);
        if max_len == 0 || distance as f32 / max_len as f32 > MAX_DISTANCE_RATIO {
            continue;
        }
        match best {
            Some((best_distance, best_key))
                if (distance, key) >= (best_distance, best_key) => {}
            _ => best = Some((distance, key)),
        }
    }

    best.map(|(distance, key)| {
        let max_len = query_len.max(key.chars().count()) as f32;
        let canonical = dict
            .lookup(key)
            .expect("fuzzy candidate came from dictionary keys")
            .to_string();
        FuzzyMatch {
            canonical,
            distance,
            confidence: (1.0 - distance as f32 / max_len).max(MIN_CONFIDENCE),
        }
    })
}
