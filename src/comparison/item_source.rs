// ==========================================
// BOQ Import Engine - Comparison Inputs
// ==========================================
// Scope: item sets for comparison from JSON
//   accepted: a bare ParsedItem array, or any object with an `items`
//   array (a serialized ImportReport)
// ==========================================

use crate::domain::boq::ParsedItem;
use crate::importer::error::{EngineError, EngineResult};
use std::path::Path;

/// Decode an item set from JSON text
pub fn decode_items(json: &str) -> EngineResult<Vec<ParsedItem>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let items = match value {
        serde_json::Value::Object(mut report) => report.remove("items").ok_or_else(|| {
            EngineError::Serialization("object has no `items` field".to_string())
        })?,
        other => other,
    };
    Ok(serde_json::from_value(items)?)
}

/// Read and decode an item set file
pub fn load_items<P: AsRef<Path>>(path: P) -> EngineResult<Vec<ParsedItem>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(EngineError::SourceNotFound(path.display().to_string()));
    }
    let raw = std::fs::read_to_string(path)?;
    decode_items(&raw)
}
