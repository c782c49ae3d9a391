use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Canonical comparison key for a team or league name.
///
/// Lower-cases, decomposes (NFD) and drops combining marks, then keeps only
/// alphanumeric characters, so "Al-Hilal Saudi FC" and "al hilal saudi fc."
/// share a key.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric())
        .collect()
}
