//! Resolving the set of chars to retain.

use std::collections::BTreeSet;

/// Combines remotely fetched text (if any) with custom text into a set of distinct chars.
///
/// An empty result means that subsetting should be skipped.
pub fn resolve_chars(remote: Option<&str>, custom: &str) -> BTreeSet<char> {
    remote.unwrap_or_default().chars().chain(custom.chars()).collect()
}
