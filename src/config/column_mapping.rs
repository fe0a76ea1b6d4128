// ==========================================
// BOQ Import Engine - Column Mapping Configuration
// ==========================================
// Scope: canonical field → accepted header aliases + declared value type
//        header auto-detection and mapping coverage checks
// Header matching is case-insensitive and ignores whitespace/underscores
// ==========================================

use crate::domain::types::{CanonicalField, FieldType};
use crate::importer::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ==========================================
// FieldSpec - aliases for one canonical field
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub aliases: Vec<String>,
    /// Declared parse type; the field's natural type when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<FieldType>,
}

impl FieldSpec {
    pub fn new<S: Into<String>>(aliases: impl IntoIterator<Item = S>) -> Self {
        Self {
            aliases: aliases.into_iter().map(Into::into).collect(),
            value_type: None,
        }
    }

    pub fn typed(mut self, value_type: FieldType) -> Self {
        self.value_type = Some(value_type);
        self
    }
}

// ==========================================
// ColumnMapping
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub fields: BTreeMap<CanonicalField, FieldSpec>,
    /// Emit a warning for every field whose header is not found (default true)
    #[serde(default = "default_true")]
    pub report_unresolved: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ColumnMapping {
    fn default() -> Self {
        use CanonicalField::*;

        let mut fields = BTreeMap::new();
        fields.insert(
            LineNumber,
            FieldSpec::new(["line number", "line no", "line", "item no", "s/no", "sr no"]),
        );
        fields.insert(
            ItemCode,
            FieldSpec::new([
                "item code",
                "code",
                "sku",
                "part number",
                "part no",
                "material code",
                "product code",
                "catalog code",
            ]),
        );
        fields.insert(
            Description,
            FieldSpec::new([
                "description",
                "item description",
                "desc",
                "material description",
                "item",
                "details",
            ]),
        );
        fields.insert(
            Quantity,
            FieldSpec::new(["quantity", "qty", "qnty", "quantity required", "count"]),
        );
        fields.insert(
            Unit,
            FieldSpec::new(["unit", "uom", "unit of measure", "units", "measure"]),
        );
        fields.insert(
            UnitPrice,
            FieldSpec::new(["unit price", "rate", "price", "unit cost", "unit rate", "cost per unit"]),
        );
        fields.insert(
            TotalPrice,
            FieldSpec::new(["total price", "total", "amount", "total cost", "line total", "extended price"]),
        );
        fields.insert(
            Category,
            FieldSpec::new(["category", "item category", "type", "group"]),
        );
        fields.insert(
            Subcategory,
            FieldSpec::new(["subcategory", "sub category", "sub-category"]),
        );
        fields.insert(Phase, FieldSpec::new(["phase", "project phase", "stage"]));
        fields.insert(Task, FieldSpec::new(["task", "activity", "work package"]));
        fields.insert(
            Site,
            FieldSpec::new(["site", "location", "site name", "site/location"]),
        );
        fields.insert(Vendor, FieldSpec::new(["vendor", "supplier", "manufacturer"]));
        fields.insert(
            Remarks,
            FieldSpec::new(["remarks", "notes", "comments", "comment"]),
        );
        fields.insert(
            RequiredDate,
            FieldSpec::new(["required date", "required by", "delivery date", "need by date"]),
        );
        fields.insert(
            Provisional,
            FieldSpec::new(["provisional", "provisional sum", "is provisional"]),
        );

        Self {
            fields,
            report_unresolved: true,
        }
    }
}

impl ColumnMapping {
    /// Required canonical fields for a given strictness
    pub fn required_fields(strict: bool) -> Vec<CanonicalField> {
        let mut required = vec![CanonicalField::Description, CanonicalField::Quantity];
        if strict {
            required.push(CanonicalField::Unit);
        }
        required
    }

    /// Declared type of a field (natural type when not overridden)
    pub fn value_type(&self, field: CanonicalField) -> FieldType {
        self.fields
            .get(&field)
            .and_then(|spec| spec.value_type)
            .unwrap_or_else(|| field.default_type())
    }

    /// Replace aliases with user-selected headers (one header per field)
    pub fn with_selected_headers(mut self, selections: &BTreeMap<CanonicalField, String>) -> Self {
        for (field, header) in selections {
            if header.trim().is_empty() {
                continue;
            }
            let value_type = self.fields.get(field).and_then(|spec| spec.value_type);
            self.fields.insert(
                *field,
                FieldSpec {
                    aliases: vec![header.clone()],
                    value_type,
                },
            );
        }
        self
    }

    /// Structural checks: required fields present, declared types storable
    pub fn validate(&self) -> EngineResult<()> {
        for field in Self::required_fields(false) {
            let has_alias = self
                .fields
                .get(&field)
                .map(|spec| spec.aliases.iter().any(|a| !a.trim().is_empty()))
                .unwrap_or(false);
            if !has_alias {
                return Err(EngineError::InvalidMapping {
                    field: field.to_string(),
                    message: "required field has no header alias".to_string(),
                });
            }
        }

        for (field, spec) in &self.fields {
            if let Some(declared) = spec.value_type {
                if !field.accepts(declared) {
                    return Err(EngineError::InvalidMapping {
                        field: field.to_string(),
                        message: format!(
                            "declared type {} cannot be stored in a {} field",
                            declared,
                            field.default_type()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Pre-normalise aliases once per run
    pub fn compile(&self) -> CompiledMapping {
        let entries = CanonicalField::ALL
            .iter()
            .filter_map(|field| {
                self.fields.get(field).map(|spec| CompiledField {
                    field: *field,
                    value_type: spec.value_type.unwrap_or_else(|| field.default_type()),
                    aliases: spec
                        .aliases
                        .iter()
                        .map(|a| normalize_header(a))
                        .filter(|a| !a.is_empty())
                        .collect(),
                })
            })
            .collect();

        CompiledMapping {
            entries,
            report_unresolved: self.report_unresolved,
        }
    }
}

// ==========================================
// CompiledMapping - normalised, immutable run view
// ==========================================
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub field: CanonicalField,
    pub value_type: FieldType,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CompiledMapping {
    pub entries: Vec<CompiledField>,
    pub report_unresolved: bool,
}

/// Lowercase, drop whitespace and underscores
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

// ==========================================
// Header auto-detection
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedColumn {
    pub field: CanonicalField,
    pub header: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDetection {
    pub mapping: ColumnMapping,
    pub confidence: f64,
    pub suggestions: Vec<DetectedColumn>,
}

/// Guess the best header per field from the default alias table
///
/// Scores: exact 1.0, header contains alias 0.8,
/// alias contains header 0.7 (header longer than 2), word overlap otherwise.
/// Only scores above 0.5 are kept.
pub fn detect_column_mapping(headers: &[String]) -> MappingDetection {
    let defaults = ColumnMapping::default();
    let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

    let mut fields = BTreeMap::new();
    let mut suggestions = Vec::new();

    for (field, spec) in &defaults.fields {
        let mut best: Option<(usize, f64)> = None;

        for alias in &spec.aliases {
            let alias = alias.trim().to_lowercase();
            for (idx, header) in lowered.iter().enumerate() {
                if header.is_empty() {
                    continue;
                }
                let confidence = if *header == alias {
                    1.0
                } else if header.contains(alias.as_str()) {
                    0.8
                } else if alias.contains(header.as_str()) && header.chars().count() > 2 {
                    0.7
                } else {
                    fuzzy_match(header, &alias)
                };

                if confidence > 0.5 && best.map_or(true, |(_, c)| confidence > c) {
                    best = Some((idx, confidence));
                }
            }
        }

        if let Some((idx, confidence)) = best {
            fields.insert(
                *field,
                FieldSpec {
                    aliases: vec![headers[idx].clone()],
                    value_type: spec.value_type,
                },
            );
            suggestions.push(DetectedColumn {
                field: *field,
                header: headers[idx].clone(),
                confidence,
            });
        }
    }

    let confidence = if suggestions.is_empty() {
        0.0
    } else {
        suggestions.iter().map(|s| s.confidence).sum::<f64>() / suggestions.len() as f64
    };

    MappingDetection {
        mapping: ColumnMapping {
            fields,
            report_unresolved: defaults.report_unresolved,
        },
        confidence,
        suggestions,
    }
}

/// Word-overlap score between two lowercase labels
fn fuzzy_match(a: &str, b: &str) -> f64 {
    let split = |s: &str| -> Vec<String> {
        s.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
            .filter(|w| w.chars().count() > 1)
            .map(str::to_string)
            .collect()
    };
    let words_a = split(a);
    let words_b = split(b);
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let mut matches = 0usize;
    for wa in &words_a {
        for wb in &words_b {
            if wa.contains(wb.as_str()) || wb.contains(wa.as_str()) {
                matches += 1;
            }
        }
    }
    matches as f64 / words_a.len().max(words_b.len()) as f64
}

// ==========================================
// Mapping coverage check
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingCoverage {
    pub is_valid: bool,
    pub missing_required: Vec<CanonicalField>,
    pub suggestions: Vec<DetectedColumn>,
}

/// Which required fields the given headers cannot satisfy
pub fn validate_column_mapping(
    mapping: &ColumnMapping,
    headers: &[String],
    strict: bool,
) -> MappingCoverage {
    let normalized: HashSet<String> = headers.iter().map(|h| normalize_header(h)).collect();

    let missing_required: Vec<CanonicalField> = ColumnMapping::required_fields(strict)
        .into_iter()
        .filter(|field| {
            !mapping
                .fields
                .get(field)
                .map(|spec| {
                    spec.aliases
                        .iter()
                        .any(|a| normalized.contains(&normalize_header(a)))
                })
                .unwrap_or(false)
        })
        .collect();

    let detection = detect_column_mapping(headers);
    let suggestions = detection
        .suggestions
        .into_iter()
        .filter(|s| missing_required.contains(&s.field))
        .collect();

    MappingCoverage {
        is_valid: missing_required.is_empty(),
        missing_required,
        suggestions,
    }
}

/// Headers no alias claims (offered for manual mapping)
pub fn unmapped_headers(mapping: &ColumnMapping, headers: &[String]) -> Vec<String> {
    let claimed: HashSet<String> = mapping
        .fields
        .values()
        .flat_map(|spec| spec.aliases.iter().map(|a| normalize_header(a)))
        .collect();

    headers
        .iter()
        .filter(|h| !claimed.contains(&normalize_header(h)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  Unit Price "), "unitprice");
        assert_eq!(normalize_header("UNIT_PRICE"), "unitprice");
        assert_eq!(normalize_header("Qty\t"), "qty");
    }

    #[test]
    fn test_default_mapping_is_valid() {
        assert!(ColumnMapping::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_incompatible_type() {
        let mut mapping = ColumnMapping::default();
        mapping.fields.insert(
            CanonicalField::Quantity,
            FieldSpec::new(["qty"]).typed(FieldType::Date),
        );
        let err = mapping.validate().unwrap_err();
        assert!(matches!(err, EngineError::InvalidMapping { .. }));
    }

    #[test]
    fn test_validate_requires_description_alias() {
        let mut mapping = ColumnMapping::default();
        mapping.fields.remove(&CanonicalField::Description);
        assert!(mapping.validate().is_err());
    }

    #[test]
    fn test_detect_column_mapping_exact_and_partial() {
        let detection =
            detect_column_mapping(&headers(&["Item Code", "Item Description", "Qty", "UOM", "Rate"]));

        let find = |field: CanonicalField| {
            detection
                .suggestions
                .iter()
                .find(|s| s.field == field)
                .cloned()
        };

        assert_eq!(find(CanonicalField::Quantity).unwrap().confidence, 1.0);
        assert_eq!(find(CanonicalField::Unit).unwrap().header, "UOM");
        assert_eq!(
            find(CanonicalField::Description).unwrap().header,
            "Item Description"
        );
        assert!(detection.confidence > 0.5);
    }

    #[test]
    fn test_validate_column_mapping_reports_missing() {
        let coverage = validate_column_mapping(
            &ColumnMapping::default(),
            &headers(&["Code", "Description"]),
            false,
        );
        assert!(!coverage.is_valid);
        assert_eq!(coverage.missing_required, vec![CanonicalField::Quantity]);

        let strict = validate_column_mapping(
            &ColumnMapping::default(),
            &headers(&["Description", "Qty"]),
            true,
        );
        assert_eq!(strict.missing_required, vec![CanonicalField::Unit]);
    }

    #[test]
    fn test_unmapped_headers() {
        let unmapped = unmapped_headers(
            &ColumnMapping::default(),
            &headers(&["Description", "Qty", "Colour"]),
        );
        assert_eq!(unmapped, vec!["Colour".to_string()]);
    }

    #[test]
    fn test_with_selected_headers() {
        let mut selections = BTreeMap::new();
        selections.insert(CanonicalField::Quantity, "Amount Needed".to_string());
        let mapping = ColumnMapping::default().with_selected_headers(&selections);
        assert_eq!(
            mapping.fields[&CanonicalField::Quantity].aliases,
            vec!["Amount Needed".to_string()]
        );
    }

    #[test]
    fn test_compile_preserves_field_order() {
        let compiled = ColumnMapping::default().compile();
        assert_eq!(compiled.entries[0].field, CanonicalField::LineNumber);
        assert!(compiled.entries.iter().any(|e| e.aliases.contains(&"unitprice".to_string())));
    }
}
