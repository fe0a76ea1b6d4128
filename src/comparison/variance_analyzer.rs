// ==========================================
// BOQ Import Engine - Variance Analyzer
// ==========================================
// Input: baseline items, actual items
// Output: per-key and aggregate variance
// ==========================================
// Key: itemCode, falling back to description
// Within one side the last item with a key wins the per-key map;
// aggregate totals always sum every item
// Added/removed keys are counted and listed, without variance rows
// ==========================================

use crate::domain::boq::ParsedItem;
use crate::domain::variance::{CompareOptions, VarianceEntry, VarianceReport};
use std::collections::BTreeMap;

// ==========================================
// VarianceAnalyzer
// ==========================================
// Stateless apart from its options; all methods are pure
#[derive(Debug, Clone, Default)]
pub struct VarianceAnalyzer {
    options: CompareOptions,
}

impl VarianceAnalyzer {
    pub fn new(options: CompareOptions) -> Self {
        Self { options }
    }

    /// Comparison key of an item
    fn key_of(&self, item: &ParsedItem) -> String {
        let raw = match item.item_code.as_deref() {
            Some(code) if !code.trim().is_empty() => code,
            _ => item.description.as_str(),
        };
        let key = if self.options.trim_keys { raw.trim() } else { raw };
        if self.options.case_insensitive_keys {
            key.to_lowercase()
        } else {
            key.to_string()
        }
    }

    fn index<'a>(&self, items: &'a [ParsedItem]) -> BTreeMap<String, &'a ParsedItem> {
        let mut map = BTreeMap::new();
        for item in items {
            map.insert(self.key_of(item), item);
        }
        map
    }

    /// Compare two item sets
    pub fn compare(&self, baseline: &[ParsedItem], actual: &[ParsedItem]) -> VarianceReport {
        let baseline_map = self.index(baseline);
        let actual_map = self.index(actual);

        let mut item_variances = Vec::new();
        let mut removed_keys = Vec::new();
        let mut quantity_variance = 0.0;
        let mut price_variance = 0.0;
        let mut items_matched = 0;

        // BTreeMap iteration keeps entries sorted by key
        for (key, base) in &baseline_map {
            let Some(current) = actual_map.get(key) else {
                removed_keys.push(key.clone());
                continue;
            };
            items_matched += 1;

            let entry = VarianceEntry {
                item_code: current.item_code.clone().or_else(|| base.item_code.clone()),
                description: current.description.clone(),
                quantity_variance: current.quantity - base.quantity,
                price_variance: current.unit_price.unwrap_or(0.0) - base.unit_price.unwrap_or(0.0),
                total_variance: current.effective_total() - base.effective_total(),
            };
            quantity_variance += entry.quantity_variance;
            price_variance += entry.price_variance;

            if self.options.include_unchanged || !entry.is_zero() {
                item_variances.push(entry);
            }
        }

        let added_keys: Vec<String> = actual_map
            .keys()
            .filter(|key| !baseline_map.contains_key(*key))
            .cloned()
            .collect();

        let baseline_total: f64 = baseline.iter().map(ParsedItem::effective_total).sum();
        let actual_total: f64 = actual.iter().map(ParsedItem::effective_total).sum();
        let total_variance = actual_total - baseline_total;
        let variance_percentage = if baseline_total == 0.0 {
            0.0
        } else {
            total_variance / baseline_total * 100.0
        };

        tracing::debug!(
            matched = items_matched,
            added = added_keys.len(),
            removed = removed_keys.len(),
            total_variance,
            "versions compared"
        );

        VarianceReport {
            total_variance,
            quantity_variance,
            price_variance,
            variance_percentage,
            item_variances,
            baseline_total,
            actual_total,
            items_matched,
            items_added: added_keys.len(),
            items_removed: removed_keys.len(),
            added_keys,
            removed_keys,
        }
    }
}

/// Compare with default options
pub fn compare_versions(baseline: &[ParsedItem], actual: &[ParsedItem]) -> VarianceReport {
    VarianceAnalyzer::default().compare(baseline, actual)
}

pub fn compare_versions_with(
    baseline: &[ParsedItem],
    actual: &[ParsedItem],
    options: &CompareOptions,
) -> VarianceReport {
    VarianceAnalyzer::new(options.clone()).compare(baseline, actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priced(code: &str, qty: f64, price: f64) -> ParsedItem {
        ParsedItem::new(format!("Item {}", code), qty)
            .with_item_code(code)
            .with_unit_price(price)
    }

    #[test]
    fn test_quantity_change_scenario() {
        let report = compare_versions(&[priced("A1", 10.0, 5.0)], &[priced("A1", 12.0, 5.0)]);

        assert_eq!(report.item_variances.len(), 1);
        let entry = &report.item_variances[0];
        assert_eq!(entry.item_code.as_deref(), Some("A1"));
        assert_eq!(entry.quantity_variance, 2.0);
        assert_eq!(entry.price_variance, 0.0);
        assert_eq!(entry.total_variance, 10.0);
        assert_eq!(report.total_variance, 10.0);
        assert_eq!(report.variance_percentage, 20.0);
    }

    #[test]
    fn test_added_and_removed_are_counted_only() {
        let baseline = vec![priced("A1", 1.0, 10.0), priced("B1", 2.0, 10.0)];
        let actual = vec![priced("A1", 1.0, 10.0), priced("C1", 3.0, 10.0)];
        let report = compare_versions(&baseline, &actual);

        assert_eq!(report.items_matched, 1);
        assert_eq!(report.items_added, 1);
        assert_eq!(report.items_removed, 1);
        assert_eq!(report.added_keys, vec!["C1".to_string()]);
        assert_eq!(report.removed_keys, vec!["B1".to_string()]);
        assert_eq!(report.item_variances.len(), 1);
        // aggregate still reflects every item: 40 - 30
        assert_eq!(report.total_variance, 10.0);
    }

    #[test]
    fn test_zero_baseline_percentage_is_zero() {
        let baseline = vec![ParsedItem::new("Labour", 1.0)];
        let actual = vec![priced("X", 1.0, 50.0)];
        let report = compare_versions(&baseline, &actual);
        assert_eq!(report.baseline_total, 0.0);
        assert_eq!(report.variance_percentage, 0.0);
    }

    #[test]
    fn test_description_fallback_key_and_options() {
        let baseline = vec![ParsedItem::new(" Trenching ", 100.0).with_unit_price(2.0)];
        let actual = vec![ParsedItem::new("trenching", 120.0).with_unit_price(2.0)];

        let strict = compare_versions(&baseline, &actual);
        assert_eq!(strict.items_matched, 0);

        let relaxed = compare_versions_with(
            &baseline,
            &actual,
            &CompareOptions {
                case_insensitive_keys: true,
                ..Default::default()
            },
        );
        assert_eq!(relaxed.items_matched, 1);
        assert_eq!(relaxed.item_variances[0].quantity_variance, 20.0);
    }

    #[test]
    fn test_explicit_total_preferred() {
        let baseline = vec![priced("A1", 10.0, 5.0).with_total_price(45.0)];
        let actual = vec![priced("A1", 10.0, 5.0)];
        let report = compare_versions(&baseline, &actual);
        assert_eq!(report.item_variances[0].total_variance, 5.0);
    }

    #[test]
    fn test_exclude_unchanged() {
        let items = vec![priced("A1", 1.0, 1.0), priced("B1", 1.0, 1.0)];
        let mut changed = items.clone();
        changed[1].quantity = 2.0;

        let report = compare_versions_with(
            &items,
            &changed,
            &CompareOptions {
                include_unchanged: false,
                ..Default::default()
            },
        );
        assert_eq!(report.items_matched, 2);
        assert_eq!(report.item_variances.len(), 1);
        assert_eq!(report.item_variances[0].item_code.as_deref(), Some("B1"));
    }
}
