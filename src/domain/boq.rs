// ==========================================
// BOQ Import Engine - BOQ Domain Model
// ==========================================
// Scope: raw rows, candidate/canonical items, row findings,
//        processing context and the final import report
// ==========================================

use crate::domain::types::{CanonicalField, IssueKind, MappingStatus, RunState};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Display row number of the first data row (row 1 is the header)
pub const FIRST_DATA_ROW: usize = 2;

/// Global zero-based data index → 1-based display row number
pub fn display_row(global_index: usize) -> usize {
    global_index + FIRST_DATA_ROW
}

// ==========================================
// CellValue - raw spreadsheet cell
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl CellValue {
    /// Empty cell or whitespace-only text
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value)
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}

// ==========================================
// RawRow - one source line (header → cell, in column order)
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    cells: Vec<(String, CellValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self { cells: Vec::new() }
    }

    /// Build from (header, value) pairs, keeping column order
    pub fn from_pairs<H, V, I>(pairs: I) -> Self
    where
        H: Into<String>,
        V: Into<CellValue>,
        I: IntoIterator<Item = (H, V)>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(h, v)| (h.into(), v.into()))
                .collect(),
        }
    }

    pub fn push(&mut self, header: impl Into<String>, value: impl Into<CellValue>) {
        self.cells.push((header.into(), value.into()));
    }

    /// Exact header lookup
    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v))
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(h, _)| h.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Every cell blank
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.is_blank())
    }
}

// ==========================================
// RawTable - in-memory table handed over by the spreadsheet reader
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ==========================================
// CandidateItem - mapper output, validator input
// ==========================================
// Lifetime: one row inside one chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub line_number: Option<i64>,
    pub item_code: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub phase: Option<String>,
    pub task: Option<String>,
    pub site: Option<String>,
    pub vendor: Option<String>,
    pub remarks: Option<String>,
    pub required_date: Option<NaiveDate>,
    pub provisional: Option<bool>,

    // Fields that were present but failed to parse
    pub failed_fields: BTreeSet<CanonicalField>,

    // Display row number (header = 1)
    pub row_number: usize,
}

impl CandidateItem {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            ..Default::default()
        }
    }

    /// Text slot accessor
    pub fn text(&self, field: CanonicalField) -> Option<&str> {
        let value = match field {
            CanonicalField::ItemCode => &self.item_code,
            CanonicalField::Description => &self.description,
            CanonicalField::Unit => &self.unit,
            CanonicalField::Category => &self.category,
            CanonicalField::Subcategory => &self.subcategory,
            CanonicalField::Phase => &self.phase,
            CanonicalField::Task => &self.task,
            CanonicalField::Site => &self.site,
            CanonicalField::Vendor => &self.vendor,
            CanonicalField::Remarks => &self.remarks,
            _ => return None,
        };
        value.as_deref()
    }

    /// Mutable text slot
    pub fn text_slot_mut(&mut self, field: CanonicalField) -> Option<&mut Option<String>> {
        match field {
            CanonicalField::ItemCode => Some(&mut self.item_code),
            CanonicalField::Description => Some(&mut self.description),
            CanonicalField::Unit => Some(&mut self.unit),
            CanonicalField::Category => Some(&mut self.category),
            CanonicalField::Subcategory => Some(&mut self.subcategory),
            CanonicalField::Phase => Some(&mut self.phase),
            CanonicalField::Task => Some(&mut self.task),
            CanonicalField::Site => Some(&mut self.site),
            CanonicalField::Vendor => Some(&mut self.vendor),
            CanonicalField::Remarks => Some(&mut self.remarks),
            _ => None,
        }
    }
}

// ==========================================
// ParsedItem - canonical BOQ record
// ==========================================
// Created only after validation succeeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedItem {
    pub line_number: i64,
    pub item_code: Option<String>,
    pub description: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub phase: Option<String>,
    pub task: Option<String>,
    pub site: Option<String>,
    pub vendor: Option<String>,
    pub remarks: Option<String>,
    pub required_date: Option<NaiveDate>,
    pub provisional: Option<bool>,
    pub mapping_status: MappingStatus,
    pub catalog_item_id: Option<String>,
    pub mapping_confidence: Option<f64>,
    pub source_row: usize,
}

impl ParsedItem {
    /// Minimal item for callers building comparison inputs by hand
    pub fn new(description: impl Into<String>, quantity: f64) -> Self {
        Self {
            line_number: 0,
            item_code: None,
            description: description.into(),
            quantity,
            unit: None,
            unit_price: None,
            total_price: None,
            category: None,
            subcategory: None,
            phase: None,
            task: None,
            site: None,
            vendor: None,
            remarks: None,
            required_date: None,
            provisional: None,
            mapping_status: MappingStatus::Pending,
            catalog_item_id: None,
            mapping_confidence: None,
            source_row: 0,
        }
    }

    pub fn with_item_code(mut self, code: impl Into<String>) -> Self {
        self.item_code = Some(code.into());
        self
    }

    pub fn with_unit_price(mut self, price: f64) -> Self {
        self.unit_price = Some(price);
        self
    }

    pub fn with_total_price(mut self, total: f64) -> Self {
        self.total_price = Some(total);
        self
    }

    /// Explicit total when supplied, otherwise quantity × unitPrice
    pub fn effective_total(&self) -> f64 {
        self.total_price
            .unwrap_or_else(|| self.quantity * self.unit_price.unwrap_or(0.0))
    }
}

// ==========================================
// ImportError / ImportWarning - row findings
// ==========================================
/// Row-excluding finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportError {
    pub row: usize,
    pub field: String,
    pub message: String,
    pub kind: IssueKind,
}

impl ImportError {
    pub fn new(row: usize, field: impl Into<String>, message: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            row,
            field: field.into(),
            message: message.into(),
            kind,
        }
    }
}

/// Row-including finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportWarning {
    pub row: usize,
    pub field: String,
    pub message: String,
    pub kind: IssueKind,
}

impl ImportWarning {
    pub fn new(row: usize, field: impl Into<String>, message: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            row,
            field: field.into(),
            message: message.into(),
            kind,
        }
    }
}

// ==========================================
// ChunkResult - pure output of one chunk
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResult {
    pub chunk_index: usize,
    pub start_index: usize,
    pub valid_items: Vec<ParsedItem>,
    pub errors: Vec<ImportError>,
    pub warnings: Vec<ImportWarning>,
    pub processed_count: usize,
}

// ==========================================
// ChunkFailure - chunk-level degradation (timeout)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub first_row: usize,
    pub last_row: usize,
    pub message: String,
}

// ==========================================
// ProcessingContext - single accumulator for one run
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ProcessingContext {
    pub valid_items: Vec<ParsedItem>,
    pub errors: Vec<ImportError>,
    pub warnings: Vec<ImportWarning>,
    pub processed_rows: usize,
}

// ==========================================
// MappingSummary - items per catalog mapping status
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSummary {
    pub mapped: usize,
    pub unmapped: usize,
    pub pending: usize,
    pub exception: usize,
}

impl MappingSummary {
    pub fn from_items(items: &[ParsedItem]) -> Self {
        let mut summary = Self::default();
        for item in items {
            match item.mapping_status {
                MappingStatus::Mapped => summary.mapped += 1,
                MappingStatus::Unmapped => summary.unmapped += 1,
                MappingStatus::Pending => summary.pending += 1,
                MappingStatus::Exception => summary.exception += 1,
            }
        }
        summary
    }
}

// ==========================================
// ImportReport - final result handed to the caller
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub run_id: String,
    pub success: bool,
    pub cancelled: bool,
    pub state: RunState,
    pub total_rows: usize,
    pub valid_item_count: usize,
    pub error_rows: usize,
    pub warning_rows: usize,
    pub errors: Vec<ImportError>,
    pub warnings: Vec<ImportWarning>,
    pub items: Vec<ParsedItem>,
    pub chunk_failures: Vec<ChunkFailure>,
    pub mapping_summary: MappingSummary,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl ImportReport {
    /// Errors grouped by row (UI tables render one line per row)
    pub fn errors_by_row(&self) -> BTreeMap<usize, Vec<&ImportError>> {
        let mut grouped: BTreeMap<usize, Vec<&ImportError>> = BTreeMap::new();
        for error in &self.errors {
            grouped.entry(error.row).or_default().push(error);
        }
        grouped
    }

    /// Warnings grouped by row
    pub fn warnings_by_row(&self) -> BTreeMap<usize, Vec<&ImportWarning>> {
        let mut grouped: BTreeMap<usize, Vec<&ImportWarning>> = BTreeMap::new();
        for warning in &self.warnings {
            grouped.entry(warning.row).or_default().push(warning);
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_row_offsets_header() {
        assert_eq!(display_row(0), 2);
        assert_eq!(display_row(999), 1001);
    }

    #[test]
    fn test_raw_row_keeps_column_order() {
        let row = RawRow::from_pairs(vec![("Code", "A1"), ("Description", "Cable"), ("Qty", "")]);
        let headers: Vec<&str> = row.headers().collect();
        assert_eq!(headers, vec!["Code", "Description", "Qty"]);
        assert_eq!(row.get("Qty"), Some(&CellValue::Empty));
        assert!(!row.is_blank());
    }

    #[test]
    fn test_effective_total_fallback() {
        let item = ParsedItem::new("Cable", 10.0).with_unit_price(5.0);
        assert_eq!(item.effective_total(), 50.0);

        let item = item.with_total_price(48.0);
        assert_eq!(item.effective_total(), 48.0);

        let no_price = ParsedItem::new("Labour", 3.0);
        assert_eq!(no_price.effective_total(), 0.0);
    }

    #[test]
    fn test_mapping_summary_counts() {
        let mut a = ParsedItem::new("A", 1.0);
        a.mapping_status = MappingStatus::Mapped;
        let b = ParsedItem::new("B", 1.0);
        let summary = MappingSummary::from_items(&[a, b]);
        assert_eq!(summary.mapped, 1);
        assert_eq!(summary.pending, 1);
    }
}
