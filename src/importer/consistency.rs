// ==========================================
// BOQ Import Engine - Consistency Validator
// ==========================================
// Scope: cross-row checks needing the whole accepted set
//        (duplicate item codes, category allow-list, total outliers)
// Runs once per run after the last chunk; warnings only
// ==========================================

use crate::config::import_config::ImportConfig;
use crate::domain::boq::{ImportWarning, ParsedItem};
use crate::domain::types::{CanonicalField, IssueKind};
use crate::importer::boq_importer_trait::ConsistencyValidator;
use std::collections::HashMap;
use std::sync::Arc;

pub struct BatchConsistencyValidator {
    config: Arc<ImportConfig>,
}

impl BatchConsistencyValidator {
    pub fn new(config: Arc<ImportConfig>) -> Self {
        Self { config }
    }

    /// Later occurrences of an item code, citing the first row
    ///
    /// Re-listed items are legitimate in a BOQ, hence warning level
    fn check_duplicates(&self, items: &[ParsedItem]) -> Vec<ImportWarning> {
        let mut first_seen: HashMap<&str, usize> = HashMap::new();
        let mut warnings = Vec::new();

        for item in items {
            let Some(code) = item.item_code.as_deref().map(str::trim) else {
                continue;
            };
            if code.is_empty() {
                continue;
            }
            match first_seen.get(code) {
                Some(first_row) => warnings.push(ImportWarning::new(
                    item.source_row,
                    CanonicalField::ItemCode.as_str(),
                    format!("duplicate itemCode '{}' (first seen on row {})", code, first_row),
                    IssueKind::Consistency,
                )),
                None => {
                    first_seen.insert(code, item.source_row);
                }
            }
        }
        warnings
    }

    fn check_categories(&self, items: &[ParsedItem]) -> Vec<ImportWarning> {
        if self.config.allowed_categories.is_empty() {
            return Vec::new();
        }
        items
            .iter()
            .filter_map(|item| {
                let category = item.category.as_deref()?;
                if self.config.is_category_allowed(category) {
                    return None;
                }
                Some(ImportWarning::new(
                    item.source_row,
                    CanonicalField::Category.as_str(),
                    format!("category '{}' is not in the allowed set", category),
                    IssueKind::Consistency,
                ))
            })
            .collect()
    }

    /// Totals above `outlier_multiplier` × median of priced items
    fn check_outliers(&self, items: &[ParsedItem]) -> Vec<ImportWarning> {
        let mut totals: Vec<f64> = items
            .iter()
            .map(ParsedItem::effective_total)
            .filter(|t| *t > 0.0)
            .collect();

        if totals.len() < self.config.outlier_min_items.max(1) {
            return Vec::new();
        }

        totals.sort_by(|a, b| a.total_cmp(b));
        let median = median_of_sorted(&totals);
        let threshold = median * self.config.outlier_multiplier;

        items
            .iter()
            .filter(|item| item.effective_total() > threshold)
            .map(|item| {
                ImportWarning::new(
                    item.source_row,
                    CanonicalField::TotalPrice.as_str(),
                    format!(
                        "item total {:.2} is more than {}× the batch median {:.2}, review manually",
                        item.effective_total(),
                        self.config.outlier_multiplier,
                        median
                    ),
                    IssueKind::Consistency,
                )
            })
            .collect()
    }
}

fn median_of_sorted(values: &[f64]) -> f64 {
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

impl ConsistencyValidator for BatchConsistencyValidator {
    fn check(&self, items: &[ParsedItem]) -> Vec<ImportWarning> {
        let mut warnings = self.check_duplicates(items);
        warnings.extend(self.check_categories(items));
        warnings.extend(self.check_outliers(items));

        tracing::debug!(
            items = items.len(),
            warnings = warnings.len(),
            "consistency check finished"
        );
        warnings
    }
}
