// ==========================================
// BOQ Import Engine - Column Mapper
// ==========================================
// Scope: raw row → candidate item via the header-alias table
//        + type conversion with the declared field type
// Unresolved header → warning; unparseable value → mapping error
// ==========================================

use crate::config::column_mapping::{normalize_header, CompiledField, CompiledMapping};
use crate::domain::boq::{CandidateItem, CellValue, ImportError, ImportWarning, RawRow};
use crate::domain::types::{CanonicalField, IssueKind};
use crate::importer::boq_importer_trait::FieldMapper;
use crate::importer::value_parser::{parse_cell, whole_number, TypedValue};
use std::sync::Arc;

// ==========================================
// MappingOutcome - mapper output for one row
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct MappingOutcome {
    pub candidate: CandidateItem,
    pub errors: Vec<ImportError>,
    pub warnings: Vec<ImportWarning>,
}

// ==========================================
// ColumnMapper
// ==========================================
#[derive(Debug, Clone)]
pub struct ColumnMapper {
    mapping: Arc<CompiledMapping>,
}

impl ColumnMapper {
    pub fn new(mapping: Arc<CompiledMapping>) -> Self {
        Self { mapping }
    }

    /// First header (column order) matching the earliest alias
    fn resolve<'r>(
        spec: &CompiledField,
        headers: &'r [(String, &'r CellValue)],
    ) -> Option<&'r CellValue> {
        spec.aliases.iter().find_map(|alias| {
            headers
                .iter()
                .find(|(normalized, _)| normalized == alias)
                .map(|(_, value)| *value)
        })
    }

    /// Store a parsed value into its canonical slot
    fn assign(
        candidate: &mut CandidateItem,
        field: CanonicalField,
        value: TypedValue,
    ) -> Result<(), String> {
        match field {
            CanonicalField::LineNumber => match value {
                TypedValue::Integer(n) => candidate.line_number = Some(n),
                TypedValue::Decimal(n) => candidate.line_number = Some(whole_number(n)?),
                other => return Err(format!("'{}' is not a whole line number", other.to_text())),
            },
            CanonicalField::Quantity | CanonicalField::UnitPrice | CanonicalField::TotalPrice => {
                let number = value
                    .as_f64()
                    .ok_or_else(|| format!("'{}' is not numeric", value.to_text()))?;
                match field {
                    CanonicalField::Quantity => candidate.quantity = Some(number),
                    CanonicalField::UnitPrice => candidate.unit_price = Some(number),
                    _ => candidate.total_price = Some(number),
                }
            }
            CanonicalField::RequiredDate => match value {
                TypedValue::Date(d) => candidate.required_date = Some(d),
                other => return Err(format!("'{}' is not a date", other.to_text())),
            },
            CanonicalField::Provisional => match value {
                TypedValue::Boolean(b) => candidate.provisional = Some(b),
                other => return Err(format!("'{}' is not a boolean", other.to_text())),
            },
            text_field => {
                if let Some(slot) = candidate.text_slot_mut(text_field) {
                    *slot = Some(value.to_text());
                }
            }
        }
        Ok(())
    }
}

impl FieldMapper for ColumnMapper {
    fn map_row(&self, row: &RawRow, row_number: usize) -> MappingOutcome {
        let mut outcome = MappingOutcome {
            candidate: CandidateItem::new(row_number),
            ..Default::default()
        };

        let headers: Vec<(String, &CellValue)> = row
            .iter()
            .map(|(header, value)| (normalize_header(header), value))
            .collect();

        for spec in &self.mapping.entries {
            let field = spec.field;

            let cell = match Self::resolve(spec, &headers) {
                Some(cell) => cell,
                None => {
                    if self.mapping.report_unresolved {
                        outcome.warnings.push(ImportWarning::new(
                            row_number,
                            field.as_str(),
                            format!("no column matches the aliases of '{}'", field),
                            IssueKind::Mapping,
                        ));
                    }
                    continue;
                }
            };

            let parsed = parse_cell(cell, spec.value_type)
                .and_then(|value| match value {
                    Some(value) => Self::assign(&mut outcome.candidate, field, value),
                    None => Ok(()),
                });

            if let Err(reason) = parsed {
                outcome.candidate.failed_fields.insert(field);
                outcome.errors.push(ImportError::new(
                    row_number,
                    field.as_str(),
                    format!("cannot read {} as {}: {}", field, spec.value_type, reason),
                    IssueKind::Mapping,
                ));
            }
        }

        outcome
    }
}
