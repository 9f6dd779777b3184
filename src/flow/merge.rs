//! Selection merge
//!
//! Builds the candidate list a select step offers: a search or ranking result,
//! followed by any already-configured items that fell outside that window.

use crate::catalog::CatalogItem;
use std::collections::HashSet;

/// Case-insensitive substring search over a catalog snapshot, first `limit` matches
pub fn search_snapshot(snapshot: &[CatalogItem], query: &str, limit: usize) -> Vec<CatalogItem> {
    let query_lower = query.trim().to_lowercase();
    snapshot
        .iter()
        .filter(|item| item.matches(&query_lower))
        .take(limit)
        .cloned()
        .collect()
}

/// Merge `primary` with the items of `must_include`.
///
/// The output starts with `primary` in order (first occurrence of each id),
/// then appends, in snapshot order, every snapshot item whose id is in
/// `must_include` and not yet present. No id appears twice.
pub fn merge(
    primary: Vec<CatalogItem>,
    must_include: &[String],
    snapshot: &[CatalogItem],
) -> Vec<CatalogItem> {
    let mut seen: HashSet<String> = HashSet::with_capacity(primary.len() + must_include.len());
    let mut merged: Vec<CatalogItem> = Vec::with_capacity(primary.len() + must_include.len());

    for item in primary {
        if seen.insert(item.id.clone()) {
            merged.push(item);
        }
    }

    if must_include.is_empty() {
        return merged;
    }

    let wanted: HashSet<&str> = must_include.iter().map(String::as_str).collect();
    for item in snapshot {
        if wanted.contains(item.id.as_str()) && seen.insert(item.id.clone()) {
            merged.push(item.clone());
        }
    }

    merged
}
