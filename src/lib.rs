// ==========================================
// BOQ Import Engine - Core Library
// ==========================================
// Bulk import, validation, consistency checks and version variance
// for spreadsheet-sourced Bill of Quantities line items
// In-process library: storage, UI and spreadsheet decoding stay with the host
// ==========================================

// ==========================================
// Modules
// ==========================================

// Domain layer - entities and value types
pub mod domain;

// Configuration layer - run settings and column mapping
pub mod config;

// Import layer - mapping, validation, chunked runs
pub mod importer;

// Comparison layer - baseline vs. actual variance
pub mod comparison;

// Logging
pub mod logging;

// ==========================================
// Re-exports
// ==========================================

// Domain
pub use domain::{
    CanonicalField, CellValue, CompareOptions, FieldType, ImportError, ImportReport,
    ImportWarning, IssueKind, MappingStatus, ParsedItem, RawRow, RawTable, RunState,
    VarianceEntry, VarianceReport,
};

// Configuration
pub use config::{ColumnMapping, ConfigManager, ImportConfig};

// Import engine
pub use importer::{
    BoqImportEngine, CatalogMatcher, CsvRowSource, EngineError, EngineResult, ImportEvent,
    InMemoryRowSource, RowSource, RowValidator, RunRegistry, RunStatus,
};

// Comparison
pub use comparison::{compare_versions, compare_versions_with, load_items};

// Cancellation handle accepted by `BoqImportEngine::run`
pub use tokio_util::sync::CancellationToken;

// ==========================================
// Constants
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const APP_NAME: &str = "BOQ Import Engine";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
