// src/normalize.rs

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Canonical form used for every tolerant comparison (headers, aliases and
/// lookup keys): NFD, combining marks dropped, lowercased, and only
/// `[a-z0-9]` kept.
///
/// `canonicalize("Número de Cliente") == "numerodecliente"`
pub fn canonicalize(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Same as [`canonicalize`], absent input yields `""`.
pub fn canonicalize_opt(s: Option<&str>) -> String {
    s.map(canonicalize).unwrap_or_default()
}
