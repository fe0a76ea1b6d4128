// ==========================================
// Configuration integration tests
// ==========================================
// ConfigManager layering, column mapping files, header detection
// ==========================================

mod test_helpers;

use boq_import::config::{
    config_keys, detect_column_mapping, load_column_mapping, unmapped_headers,
    validate_column_mapping, ConfigManager, FieldSpec,
};
use boq_import::{
    BoqImportEngine, CanonicalField, CancellationToken, ColumnMapping, EngineError, FieldType,
    ImportConfig, InMemoryRowSource, RawRow, RawTable,
};
use std::collections::BTreeMap;
use std::io::Write;
use tempfile::NamedTempFile;

fn headers(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn json_file(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", body).unwrap();
    file
}

#[test]
fn test_snapshot_is_isolated_from_later_changes() {
    let mut manager = ConfigManager::from_config(ImportConfig {
        chunk_size: 100,
        ..Default::default()
    });
    let snapshot = manager.snapshot();

    manager.config_mut().chunk_size = 900;
    assert_eq!(snapshot.chunk_size, 100);
    assert_eq!(manager.config().chunk_size, 900);
}

#[test]
fn test_invalid_file_value_rejected_by_validation() {
    let file = json_file(r#"{"minMappingConfidence": 1.5}"#);
    let manager = ConfigManager::from_file(file.path()).unwrap();
    let err = manager.config().validate().unwrap_err();
    assert!(matches!(err, EngineError::Config { ref key, .. } if key == "minMappingConfidence"));
}

#[test]
fn test_overrides_then_snapshot_json() {
    let mut manager = ConfigManager::new();
    manager
        .apply_overrides([
            (config_keys::CHUNK_TIMEOUT_MS, "1500"),
            (config_keys::STRICT, "off"),
        ])
        .unwrap();

    let json = manager.config_snapshot_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["chunkTimeoutMs"], 1500);
    assert_eq!(value["strictValidation"], false);
}

#[test]
fn test_mapping_file_round_trip_through_engine() {
    let file = json_file(
        r#"{
            "fields": {
                "description": { "aliases": ["Scope of Work"] },
                "quantity": { "aliases": ["Units Ordered"], "valueType": "integer" },
                "unitPrice": { "aliases": ["Cost Each"] }
            },
            "reportUnresolved": false
        }"#,
    );
    let mapping = load_column_mapping(file.path()).unwrap();
    assert_eq!(mapping.value_type(CanonicalField::Quantity), FieldType::Integer);
    assert!(!mapping.report_unresolved);

    let engine = BoqImportEngine::new(ImportConfig::default(), mapping).unwrap();
    let table = RawTable::new(
        headers(&["Scope of Work", "Units Ordered", "Cost Each"]),
        vec![
            RawRow::from_pairs(vec![
                ("Scope of Work", "Excavation"),
                ("Units Ordered", "12"),
                ("Cost Each", "7.5"),
            ]),
            RawRow::from_pairs(vec![
                ("Scope of Work", "Backfill"),
                ("Units Ordered", "2.5"),
                ("Cost Each", "3"),
            ]),
        ],
    );

    let report = engine.import_table(table).unwrap();
    assert_eq!(report.valid_item_count, 1);
    assert_eq!(report.items[0].quantity, 12.0);
    assert_eq!(report.items[0].unit_price, Some(7.5));
    // fractional value under an integer declaration
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].row, 3);
    assert_eq!(report.errors[0].field, "quantity");
}

#[test]
fn test_mapping_without_quantity_alias_rejected() {
    let file = json_file(r#"{"fields": {"description": {"aliases": ["Description"]}}}"#);
    let err = load_column_mapping(file.path()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidMapping { ref field, .. } if field == "quantity"));
}

#[test]
fn test_mapping_with_unstorable_type_rejected() {
    let mut mapping = ColumnMapping::default();
    mapping.fields.insert(
        CanonicalField::Quantity,
        FieldSpec::new(["qty"]).typed(FieldType::Date),
    );
    let err = BoqImportEngine::new(ImportConfig::default(), mapping)
        .err()
        .expect("date quantity must be rejected");
    assert!(matches!(err, EngineError::InvalidMapping { .. }));
}

#[tokio::test]
async fn test_selected_headers_override_aliases() {
    let mut selections = BTreeMap::new();
    selections.insert(CanonicalField::Description, "Work Item".to_string());
    selections.insert(CanonicalField::Quantity, "Volume".to_string());
    let mapping = test_helpers::quiet_mapping().with_selected_headers(&selections);

    let engine = BoqImportEngine::new(ImportConfig::default(), mapping).unwrap();
    let table = RawTable::new(
        headers(&["Work Item", "Volume", "Description"]),
        vec![RawRow::from_pairs(vec![
            ("Work Item", "Formwork"),
            ("Volume", "30"),
            ("Description", "ignored"),
        ])],
    );

    let report = engine
        .run(InMemoryRowSource::new(table), CancellationToken::new())
        .await
        .unwrap();
    assert!(report.success);
    assert_eq!(report.items[0].description, "Formwork");
    assert_eq!(report.items[0].quantity, 30.0);
}

#[test]
fn test_detection_and_coverage() {
    let sheet = headers(&["S/No", "Item Description", "Qty", "UOM", "Unit Rate", "Supplier Notes"]);

    let detection = detect_column_mapping(&sheet);
    let description = detection
        .suggestions
        .iter()
        .find(|s| s.field == CanonicalField::Description)
        .unwrap();
    assert_eq!(description.header, "Item Description");
    assert_eq!(description.confidence, 1.0);
    assert!(detection.confidence > 0.5);

    let coverage = validate_column_mapping(&ColumnMapping::default(), &sheet, true);
    assert!(coverage.is_valid);

    let no_qty = headers(&["Description", "Volume"]);
    let coverage = validate_column_mapping(&ColumnMapping::default(), &no_qty, false);
    assert!(!coverage.is_valid);
    assert_eq!(coverage.missing_required, vec![CanonicalField::Quantity]);

    let leftover = unmapped_headers(&ColumnMapping::default(), &sheet);
    assert_eq!(leftover, vec!["Supplier Notes".to_string()]);
}
