// ==========================================
// BOQ Import Engine - Row Validator
// ==========================================
// Scope: required fields, value ranges, text lengths,
//        quantity × unitPrice vs totalPrice agreement
// Never fails: every outcome is returned as data
// ==========================================

use crate::config::import_config::ImportConfig;
use crate::domain::boq::{CandidateItem, ImportError, ImportWarning, ParsedItem};
use crate::domain::types::{CanonicalField, IssueKind, MappingStatus};
use crate::importer::boq_importer_trait::RowValidator;
use std::sync::Arc;

const TEXT_FIELDS: [CanonicalField; 10] = [
    CanonicalField::ItemCode,
    CanonicalField::Description,
    CanonicalField::Unit,
    CanonicalField::Category,
    CanonicalField::Subcategory,
    CanonicalField::Phase,
    CanonicalField::Task,
    CanonicalField::Site,
    CanonicalField::Vendor,
    CanonicalField::Remarks,
];

// ==========================================
// RowOutcome - validator output for one row
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RowOutcome {
    /// Present iff `errors` is empty
    pub item: Option<ParsedItem>,
    pub errors: Vec<ImportError>,
    pub warnings: Vec<ImportWarning>,
}

impl RowOutcome {
    pub fn is_accepted(&self) -> bool {
        self.item.is_some()
    }
}

// ==========================================
// BoqRowValidator
// ==========================================
pub struct BoqRowValidator {
    config: Arc<ImportConfig>,
}

impl BoqRowValidator {
    pub fn new(config: Arc<ImportConfig>) -> Self {
        Self { config }
    }

    /// Missing required values (fields that already failed to parse are skipped)
    fn validate_required_fields(&self, candidate: &CandidateItem, errors: &mut Vec<ImportError>) {
        let row = candidate.row_number;
        let mut require = |field: CanonicalField, present: bool| {
            if !present && !candidate.failed_fields.contains(&field) {
                errors.push(ImportError::new(
                    row,
                    field.as_str(),
                    format!("{} is required", field),
                    IssueKind::Validation,
                ));
            }
        };

        require(CanonicalField::Description, candidate.description.is_some());
        require(CanonicalField::Quantity, candidate.quantity.is_some());
        if self.config.strict_validation {
            require(CanonicalField::Unit, candidate.unit.is_some());
        }
    }

    fn validate_ranges(
        &self,
        candidate: &CandidateItem,
        errors: &mut Vec<ImportError>,
        warnings: &mut Vec<ImportWarning>,
    ) {
        let row = candidate.row_number;

        if let Some(quantity) = candidate.quantity {
            if quantity < 0.0 {
                errors.push(ImportError::new(
                    row,
                    CanonicalField::Quantity.as_str(),
                    format!("quantity must not be negative: {}", quantity),
                    IssueKind::Validation,
                ));
            } else if quantity == 0.0 {
                warnings.push(ImportWarning::new(
                    row,
                    CanonicalField::Quantity.as_str(),
                    "quantity is zero",
                    IssueKind::Validation,
                ));
            }
        }

        if let Some(price) = candidate.unit_price {
            if price < 0.0 {
                errors.push(ImportError::new(
                    row,
                    CanonicalField::UnitPrice.as_str(),
                    format!("unitPrice must not be negative: {}", price),
                    IssueKind::Validation,
                ));
            }
        }
    }

    fn validate_lengths(&self, candidate: &CandidateItem, errors: &mut Vec<ImportError>) {
        for field in TEXT_FIELDS {
            let (Some(value), Some(limit)) = (candidate.text(field), self.config.max_length(field))
            else {
                continue;
            };
            let length = value.chars().count();
            if length > limit {
                errors.push(ImportError::new(
                    candidate.row_number,
                    field.as_str(),
                    format!("{} is too long ({} > {} characters)", field, length, limit),
                    IssueKind::Validation,
                ));
            }
        }
    }

    /// Supplied totalPrice is kept even when it disagrees
    fn check_total(&self, candidate: &CandidateItem, warnings: &mut Vec<ImportWarning>) {
        let (Some(quantity), Some(price), Some(total)) =
            (candidate.quantity, candidate.unit_price, candidate.total_price)
        else {
            return;
        };

        let expected = quantity * price;
        let tolerance = self.config.total_tolerance(expected);
        if (total - expected).abs() > tolerance {
            warnings.push(ImportWarning::new(
                candidate.row_number,
                CanonicalField::TotalPrice.as_str(),
                format!(
                    "totalPrice {} differs from quantity × unitPrice = {} (tolerance {})",
                    total, expected, tolerance
                ),
                IssueKind::Consistency,
            ));
        }
    }

    fn finalize(candidate: CandidateItem) -> Option<ParsedItem> {
        Some(ParsedItem {
            line_number: candidate
                .line_number
                .unwrap_or(candidate.row_number as i64),
            item_code: candidate.item_code,
            description: candidate.description?,
            quantity: candidate.quantity?,
            unit: candidate.unit,
            unit_price: candidate.unit_price,
            total_price: candidate.total_price,
            category: candidate.category,
            subcategory: candidate.subcategory,
            phase: candidate.phase,
            task: candidate.task,
            site: candidate.site,
            vendor: candidate.vendor,
            remarks: candidate.remarks,
            required_date: candidate.required_date,
            provisional: candidate.provisional,
            mapping_status: MappingStatus::Pending,
            catalog_item_id: None,
            mapping_confidence: None,
            source_row: candidate.row_number,
        })
    }
}

impl RowValidator for BoqRowValidator {
    fn validate(&self, candidate: CandidateItem) -> RowOutcome {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.validate_required_fields(&candidate, &mut errors);
        self.validate_ranges(&candidate, &mut errors, &mut warnings);
        self.validate_lengths(&candidate, &mut errors);
        self.check_total(&candidate, &mut warnings);

        // a parse failure upstream also excludes the row
        let item = if errors.is_empty() && candidate.failed_fields.is_empty() {
            Self::finalize(candidate)
        } else {
            None
        };

        RowOutcome {
            item,
            errors,
            warnings,
        }
    }
}
