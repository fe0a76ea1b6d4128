// ==========================================
// BOQ Import Engine - Domain Layer
// ==========================================
// Scope: entities and value types only
// No parsing, no validation rules, no I/O
// ==========================================

pub mod boq;
pub mod types;
pub mod variance;

pub use boq::{
    display_row, CandidateItem, CellValue, ChunkFailure, ChunkResult, ImportError, ImportReport,
    ImportWarning, MappingSummary, ParsedItem, ProcessingContext, RawRow, RawTable,
    FIRST_DATA_ROW,
};
pub use types::{CanonicalField, FieldType, IssueKind, MappingStatus, RunState};
pub use variance::{CompareOptions, VarianceEntry, VarianceReport};
