//! Query cleaning: the pure first stage of normalization.
//!
//! Cleaning is a single pass over the input that trims edges, collapses
//! internal whitespace runs to one space, lowercases, decomposes to NFD, and
//! drops combining marks. The result is the form every later stage (dictionary
//! lookup, fuzzy matching, fingerprinting) operates on, so it must be
//! deterministic and idempotent: `clean(clean(x)) == clean(x)`.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase, accent-strip, and whitespace-collapse `input`.
///
/// The pass keeps a `pending_space` flag instead of pushing separators
/// eagerly, so leading/trailing whitespace never reaches the output and
/// internal runs collapse to a single space.
///
/// # Examples
///
/// ```
/// use normalizer::clean;
///
/// assert_eq!(clean("  Vitamín   D "), "vitamin d");
/// assert_eq!(clean("MAGNESIO"), "magnesio");
/// ```
pub fn clean(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;

    for ch in input.nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_whitespace() {
            // Only flag a separator once a token already exists; this drops
            // leading whitespace for free.
            if !out.is_empty() {
                pending_space = true;
            }
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        // Lowercasing may expand a single char (e.g. German ß).
        for lower in ch.to_lowercase() {
            out.push(lower);
        }
    }

    out
}

/// Character count of a cleaned query, used for the length gate.
///
/// Counted in scalar values rather than bytes so accented or non-Latin input
/// is not penalized for its encoding width.
pub fn cleaned_len(cleaned: &str) -> usize {
    cleaned.chars().count()
}
