// ==========================================
// BOQ Import Engine - Configuration Layer
// ==========================================
// Scope: run configuration, column mapping, layered loading
// ==========================================

pub mod column_mapping;
pub mod config_manager;
pub mod import_config;

pub use column_mapping::{
    detect_column_mapping, normalize_header, unmapped_headers, validate_column_mapping,
    ColumnMapping, CompiledField, CompiledMapping, DetectedColumn, FieldSpec, MappingCoverage,
    MappingDetection,
};
pub use config_manager::{config_keys, load_column_mapping, ConfigManager};
pub use import_config::ImportConfig;
