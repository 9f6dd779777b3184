//! Validation checks
//!
//! Pure checks used by the flow steps. None of them touch storage.

use crate::catalog::{all_valid, CatalogItem, CatalogService};
use crate::config::MAX_INTERVAL_MINUTES;
use crate::flow::form::StepError;
use std::collections::HashMap;
use tracing::warn;

/// Split a delimited multiplier string into trimmed, non-empty entries
pub fn parse_multipliers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect()
}

/// Trim, lower-case and de-duplicate selected ids, keeping first occurrences
pub fn normalize_selection(selected: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(selected.len());
    for id in selected {
        let id = id.trim().to_lowercase();
        if !id.is_empty() && !normalized.contains(&id) {
            normalized.push(id);
        }
    }
    normalized
}

pub fn check_count_parity<T, U>(selection: &[T], multipliers: &[U]) -> bool {
    selection.len() == multipliers.len()
}

pub fn check_non_empty<T>(selection: &[T]) -> bool {
    !selection.is_empty()
}

/// Ask the catalog which ids exist.
///
/// A catalog outage never blocks configuration: if the catalog cannot answer,
/// every id is reported valid.
pub async fn check_catalog_validity(
    ids: &[String],
    catalog: &dyn CatalogService,
) -> HashMap<String, bool> {
    match catalog.validate(ids).await {
        Ok(results) => results,
        Err(e) => {
            warn!("Catalog validation unavailable, accepting selection: {}", e);
            all_valid(ids)
        }
    }
}

/// Check ids against a catalog snapshot the session already holds
pub fn check_snapshot_validity(ids: &[String], snapshot: &[CatalogItem]) -> HashMap<String, bool> {
    ids.iter()
        .map(|id| (id.clone(), snapshot.iter().any(|item| &item.id == id)))
        .collect()
}

/// Ids reported invalid, in selection order
pub fn invalid_ids(ids: &[String], results: &HashMap<String, bool>) -> Vec<String> {
    ids.iter()
        .filter(|id| results.get(*id) == Some(&false))
        .cloned()
        .collect()
}

/// True if `key` is not used by any record other than `own_entry`
pub fn check_unique_key(key: &str, existing: &[(String, String)], own_entry: Option<&str>) -> bool {
    !existing
        .iter()
        .any(|(entry_id, existing_key)| existing_key == key && Some(entry_id.as_str()) != own_entry)
}

pub fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Check an interval in minutes, returning the error to show on its field
pub fn check_interval(minutes: f64) -> Option<StepError> {
    if !is_positive(minutes) {
        Some(StepError::PositiveNumberRequired)
    } else if minutes > MAX_INTERVAL_MINUTES {
        Some(StepError::IntervalTooLong)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_multipliers() {
        assert_eq!(parse_multipliers("1, 2"), vec!["1", "2"]);
        assert_eq!(parse_multipliers(" 0.5 ,, x "), vec!["0.5", "x"]);
        assert!(parse_multipliers("").is_empty());
        assert!(parse_multipliers("  ").is_empty());
    }

    #[test]
    fn test_count_parity() {
        let selection = strings(&["bitcoin", "ethereum"]);
        assert!(check_count_parity(&selection, &parse_multipliers("1, 2")));
        assert!(!check_count_parity(&selection, &parse_multipliers("1")));
        assert!(!check_count_parity(&strings(&["bitcoin"]), &parse_multipliers("")));
    }

    #[test]
    fn test_non_empty() {
        assert!(check_non_empty(&strings(&["a"])));
        assert!(!check_non_empty::<String>(&[]));
    }

    #[test]
    fn test_normalize_selection() {
        let selected = strings(&[" Bitcoin", "ethereum", "bitcoin", ""]);
        assert_eq!(normalize_selection(&selected), vec!["bitcoin", "ethereum"]);
    }

    #[test]
    fn test_unique_key_is_record_scoped() {
        let existing = vec![
            ("e1".to_string(), "price_wallet".to_string()),
            ("e2".to_string(), "price_savings".to_string()),
        ];
        assert!(!check_unique_key("price_wallet", &existing, None));
        assert!(check_unique_key("price_wallet", &existing, Some("e1")));
        assert!(!check_unique_key("price_savings", &existing, Some("e1")));
        assert!(check_unique_key("price_other", &existing, None));
    }

    #[tokio::test]
    async fn test_catalog_validity_reports_invalid_ids() {
        let catalog = StaticCatalog::new(vec![CatalogItem::new("bitcoin", "Bitcoin", "btc")]);
        let ids = strings(&["bitcoin", "fakecoin"]);

        let results = check_catalog_validity(&ids, &catalog).await;
        assert_eq!(invalid_ids(&ids, &results), vec!["fakecoin"]);
    }

    #[test]
    fn test_snapshot_validity() {
        let snapshot = vec![
            CatalogItem::new("bitcoin", "Bitcoin", "btc"),
            CatalogItem::new("ethereum", "Ethereum", "eth"),
        ];
        let ids = strings(&["ethereum", "fakecoin"]);

        let results = check_snapshot_validity(&ids, &snapshot);
        assert_eq!(results.get("ethereum"), Some(&true));
        assert_eq!(invalid_ids(&ids, &results), vec!["fakecoin"]);
    }

    #[tokio::test]
    async fn test_catalog_outage_does_not_block() {
        let catalog = StaticCatalog::unavailable();
        let ids = strings(&["bitcoin", "fakecoin"]);

        let results = check_catalog_validity(&ids, &catalog).await;
        assert!(invalid_ids(&ids, &results).is_empty());
    }

    #[test]
    fn test_is_positive() {
        assert!(is_positive(0.25));
        assert!(!is_positive(0.0));
        assert!(!is_positive(-1.0));
        assert!(!is_positive(f64::NAN));
    }

    #[test]
    fn test_check_interval() {
        assert_eq!(check_interval(5.0), None);
        assert_eq!(check_interval(MAX_INTERVAL_MINUTES), None);
        assert_eq!(check_interval(-2.0), Some(StepError::PositiveNumberRequired));
        assert_eq!(check_interval(1e300), Some(StepError::IntervalTooLong));
    }
}
