// ==========================================
// BOQ Import Engine - Domain Types
// ==========================================
// Scope: enums shared by mapper, validator, aggregator and comparison
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Mapping Status
// ==========================================
// Link state against the reference catalog; set by an external matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStatus {
    Mapped,    // linked to a catalog entry
    Unmapped,  // no candidate found
    Pending,   // awaiting resolution
    Exception, // flagged for manual review
}

impl Default for MappingStatus {
    fn default() -> Self {
        MappingStatus::Pending
    }
}

impl fmt::Display for MappingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingStatus::Mapped => write!(f, "mapped"),
            MappingStatus::Unmapped => write!(f, "unmapped"),
            MappingStatus::Pending => write!(f, "pending"),
            MappingStatus::Exception => write!(f, "exception"),
        }
    }
}

// ==========================================
// Field Type
// ==========================================
// Declared value type used by the column mapper when parsing a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Integer,
    Decimal,
    Date,
    Boolean,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Decimal => write!(f, "decimal"),
            FieldType::Date => write!(f, "date"),
            FieldType::Boolean => write!(f, "boolean"),
        }
    }
}

// ==========================================
// Canonical Field
// ==========================================
// One slot of the canonical BOQ item; the order here is the mapping order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    LineNumber,
    ItemCode,
    Description,
    Quantity,
    Unit,
    UnitPrice,
    TotalPrice,
    Category,
    Subcategory,
    Phase,
    Task,
    Site,
    Vendor,
    Remarks,
    RequiredDate,
    Provisional,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 16] = [
        CanonicalField::LineNumber,
        CanonicalField::ItemCode,
        CanonicalField::Description,
        CanonicalField::Quantity,
        CanonicalField::Unit,
        CanonicalField::UnitPrice,
        CanonicalField::TotalPrice,
        CanonicalField::Category,
        CanonicalField::Subcategory,
        CanonicalField::Phase,
        CanonicalField::Task,
        CanonicalField::Site,
        CanonicalField::Vendor,
        CanonicalField::Remarks,
        CanonicalField::RequiredDate,
        CanonicalField::Provisional,
    ];

    /// Field name as it appears in error/warning records
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::LineNumber => "lineNumber",
            CanonicalField::ItemCode => "itemCode",
            CanonicalField::Description => "description",
            CanonicalField::Quantity => "quantity",
            CanonicalField::Unit => "unit",
            CanonicalField::UnitPrice => "unitPrice",
            CanonicalField::TotalPrice => "totalPrice",
            CanonicalField::Category => "category",
            CanonicalField::Subcategory => "subcategory",
            CanonicalField::Phase => "phase",
            CanonicalField::Task => "task",
            CanonicalField::Site => "site",
            CanonicalField::Vendor => "vendor",
            CanonicalField::Remarks => "remarks",
            CanonicalField::RequiredDate => "requiredDate",
            CanonicalField::Provisional => "provisional",
        }
    }

    /// Natural value type of the slot
    pub fn default_type(&self) -> FieldType {
        match self {
            CanonicalField::LineNumber => FieldType::Integer,
            CanonicalField::Quantity | CanonicalField::UnitPrice | CanonicalField::TotalPrice => {
                FieldType::Decimal
            }
            CanonicalField::RequiredDate => FieldType::Date,
            CanonicalField::Provisional => FieldType::Boolean,
            _ => FieldType::Text,
        }
    }

    /// Whether a declared type can be stored in this slot
    pub fn accepts(&self, declared: FieldType) -> bool {
        match self.default_type() {
            // any parsed value has a text form
            FieldType::Text => true,
            FieldType::Decimal => matches!(declared, FieldType::Decimal | FieldType::Integer),
            FieldType::Integer => matches!(declared, FieldType::Integer | FieldType::Decimal),
            FieldType::Date => declared == FieldType::Date,
            FieldType::Boolean => declared == FieldType::Boolean,
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// Issue Kind
// ==========================================
// Error taxonomy for row-level findings (SystemError lives in EngineError)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueKind {
    Mapping,     // header/type unresolvable, field dropped
    Validation,  // required/range rule
    Consistency, // cross-row or cross-field
    Chunk,       // chunk-level degradation (timeout)
    Catalog,     // catalog lookup annotation
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Mapping => "mapping",
            IssueKind::Validation => "validation",
            IssueKind::Consistency => "consistency",
            IssueKind::Chunk => "chunk",
            IssueKind::Catalog => "catalog",
        }
    }
}

// ==========================================
// Run State
// ==========================================
// NOT_STARTED → READING → (MAP_VALIDATE)* → CONSISTENCY_CHECK → COMPLETE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    NotStarted,
    Reading,
    MapValidate,
    ConsistencyCheck,
    Complete { success: bool },
}

impl RunState {
    /// Legal successor check
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (*self, next),
            (RunState::NotStarted, RunState::Reading)
                | (RunState::Reading, RunState::MapValidate)
                | (RunState::Reading, RunState::ConsistencyCheck)
                | (RunState::MapValidate, RunState::MapValidate)
                | (RunState::MapValidate, RunState::ConsistencyCheck)
                | (RunState::ConsistencyCheck, RunState::Complete { .. })
                // a run can fail before reaching the consistency check
                | (RunState::Reading, RunState::Complete { success: false })
                | (RunState::MapValidate, RunState::Complete { success: false })
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Complete { .. })
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::NotStarted => write!(f, "NOT_STARTED"),
            RunState::Reading => write!(f, "READING"),
            RunState::MapValidate => write!(f, "MAP_VALIDATE"),
            RunState::ConsistencyCheck => write!(f, "CONSISTENCY_CHECK"),
            RunState::Complete { success: true } => write!(f, "COMPLETE(success)"),
            RunState::Complete { success: false } => write!(f, "COMPLETE(failed)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_transitions() {
        assert!(RunState::NotStarted.can_transition_to(RunState::Reading));
        assert!(RunState::Reading.can_transition_to(RunState::MapValidate));
        assert!(RunState::MapValidate.can_transition_to(RunState::ConsistencyCheck));
        assert!(RunState::ConsistencyCheck.can_transition_to(RunState::Complete { success: true }));

        assert!(!RunState::NotStarted.can_transition_to(RunState::MapValidate));
        assert!(!RunState::Complete { success: false }.can_transition_to(RunState::Reading));
        assert!(!RunState::Reading.can_transition_to(RunState::Complete { success: true }));
    }

    #[test]
    fn test_canonical_field_accepts() {
        assert!(CanonicalField::Quantity.accepts(FieldType::Integer));
        assert!(!CanonicalField::Quantity.accepts(FieldType::Date));
        assert!(CanonicalField::Description.accepts(FieldType::Date));
        assert!(!CanonicalField::Provisional.accepts(FieldType::Text));
    }

    #[test]
    fn test_mapping_status_serde() {
        let json = serde_json::to_string(&MappingStatus::Exception).unwrap();
        assert_eq!(json, "\"exception\"");
        assert_eq!(MappingStatus::default(), MappingStatus::Pending);
    }
}
