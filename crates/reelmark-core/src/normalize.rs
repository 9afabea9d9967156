//! Title folding for case-insensitive search.

use unicode_normalization::UnicodeNormalization;

/// NFKC-normalize and lowercase, so fullwidth forms, composed diacritics
/// and case variants compare equal.
pub fn fold(s: &str) -> String {
    s.nfkc().collect::<String>().to_lowercase()
}

/// Case-insensitive substring test. A blank needle matches everything;
/// otherwise the needle's whitespace is significant.
pub fn contains_folded(haystack: &str, needle: &str) -> bool {
    needle.trim().is_empty() || fold(haystack).contains(&fold(needle))
}
