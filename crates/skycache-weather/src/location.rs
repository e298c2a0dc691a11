//! Location normalization for cache keys and upstream requests.

use crate::error::ResolveError;

/// Prefix for every weather entry in the cache.
pub const KEY_PREFIX: &str = "weather:";

/// Characters treated as separators and dropped before calling the provider.
const UPSTREAM_SEPARATORS: &[char] = &[',', ';'];

/// Cache key derived from a normalized location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a user-entered location.
    ///
    /// Trims, collapses whitespace runs and lower-cases, so `" New  York "`
    /// and `"new york"` share an entry. Fails on empty input.
    pub fn for_location(input: &str) -> Result<Self, ResolveError> {
        let normalized = normalize(input);
        if normalized.is_empty() {
            return Err(ResolveError::Validation);
        }
        Ok(Self(format!("{}{}", KEY_PREFIX, normalized)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The normalized location without the prefix.
    pub fn location(&self) -> &str {
        &self.0[KEY_PREFIX.len()..]
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Location as sent to the provider: case-folded, separators stripped,
/// percent-encoded for use as a single path segment.
///
/// Fails when nothing usable is left, or when the segment is made only of
/// dots, which URL normalization would resolve against the endpoint path.
pub fn upstream_location(input: &str) -> Result<String, ResolveError> {
    let stripped: String = input
        .chars()
        .filter(|c| !UPSTREAM_SEPARATORS.contains(c))
        .collect();
    let normalized = normalize(&stripped);
    if normalized.is_empty() || normalized.chars().all(|c| c == '.') {
        return Err(ResolveError::Validation);
    }
    Ok(urlencoding::encode(&normalized).into_owned())
}
