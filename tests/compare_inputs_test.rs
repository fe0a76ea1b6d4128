// ==========================================
// Comparison input decoding tests
// ==========================================
// Item sets as the `compare` command reads them: bare arrays,
// serialized import reports, and malformed files
// ==========================================

mod test_helpers;

use boq_import::comparison::decode_items;
use boq_import::{compare_versions, load_items, EngineError, ParsedItem};
use std::io::Write;
use tempfile::NamedTempFile;
use test_helpers::{engine_with, generated_table};

fn json_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_serialized_report_loads_its_items() {
    let report = engine_with(10, 2).import_table(generated_table(25)).unwrap();
    let file = json_file(&serde_json::to_string_pretty(&report).unwrap());

    let items = load_items(file.path()).unwrap();
    assert_eq!(items, report.items);

    let variance = compare_versions(&items, &report.items);
    assert_eq!(variance.total_variance, 0.0);
    assert_eq!(variance.items_matched, 25);
}

#[test]
fn test_bare_item_array_loads() {
    let items = vec![
        ParsedItem::new("Fibre cable", 10.0).with_item_code("FC-1").with_unit_price(2.5),
        ParsedItem::new("Closure", 2.0).with_item_code("CL-1"),
    ];
    let file = json_file(&serde_json::to_string(&items).unwrap());

    assert_eq!(load_items(file.path()).unwrap(), items);
}

#[test]
fn test_object_without_items_is_rejected() {
    let result = decode_items(r#"{"runId": "r1", "success": true}"#);
    match result {
        Err(EngineError::Serialization(message)) => assert!(message.contains("items")),
        other => panic!("expected Serialization error, got {:?}", other),
    }
}

#[test]
fn test_malformed_inputs_are_errors() {
    assert!(matches!(
        decode_items("not json"),
        Err(EngineError::Serialization(_))
    ));
    assert!(matches!(
        decode_items(r#"{"items": 3}"#),
        Err(EngineError::Serialization(_))
    ));
    assert!(matches!(
        load_items("/nonexistent/items.json"),
        Err(EngineError::SourceNotFound(_))
    ));
}
