// ==========================================
// BOQ Import Engine - Import Layer
// ==========================================
// Scope: raw rows → validated canonical items + import report
// Pipeline: RowSource → ColumnMapper → BoqRowValidator (per chunk)
//           → ContextAggregator → BatchConsistencyValidator
// ==========================================

pub mod aggregator;
pub mod boq_importer_trait;
pub mod catalog;
pub mod chunk_processor;
pub mod consistency;
pub mod error;
pub mod field_mapper;
pub mod import_engine;
pub mod row_source;
pub mod row_validator;
pub mod run_registry;
pub mod value_parser;

// Core types
pub use aggregator::ContextAggregator;
pub use catalog::{apply_catalog_matches, CatalogMatch, CatalogPolicy, StaticCatalogMatcher};
pub use chunk_processor::ChunkProcessor;
pub use consistency::BatchConsistencyValidator;
pub use error::{EngineError, EngineResult};
pub use field_mapper::{ColumnMapper, MappingOutcome};
pub use import_engine::{BoqImportEngine, ImportEvent};
pub use row_source::{CsvRowSource, InMemoryRowSource};
pub use row_validator::{BoqRowValidator, RowOutcome};
pub use run_registry::{FailureReason, RunRecord, RunRegistry, RunStats, RunStatus};
pub use value_parser::{parse_cell, TypedValue};

// Trait interfaces
pub use boq_importer_trait::{
    CatalogMatcher, ConsistencyValidator, FieldMapper, RowSource, RowValidator,
};
