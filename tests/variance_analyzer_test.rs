// ==========================================
// Variance analyzer integration tests
// ==========================================
// Version comparison over imported item sets
// ==========================================

mod test_helpers;

use boq_import::{compare_versions, compare_versions_with, CompareOptions, ParsedItem};
use test_helpers::{boq_row, engine_with, generated_table, table_of};

fn item(code: &str, qty: f64, price: f64) -> ParsedItem {
    ParsedItem::new(format!("Item {}", code), qty)
        .with_item_code(code)
        .with_unit_price(price)
}

#[test]
fn test_self_comparison_is_zero() {
    let report = engine_with(50, 2).import_table(generated_table(120)).unwrap();

    let variance = compare_versions(&report.items, &report.items);
    assert_eq!(variance.total_variance, 0.0);
    assert_eq!(variance.quantity_variance, 0.0);
    assert_eq!(variance.price_variance, 0.0);
    assert_eq!(variance.variance_percentage, 0.0);
    assert_eq!(variance.items_matched, 120);
    assert_eq!(variance.items_added, 0);
    assert_eq!(variance.items_removed, 0);
    assert!(variance.item_variances.iter().all(|v| v.is_zero()));
}

#[test]
fn test_imported_versions_compared_by_item_code() {
    let engine = engine_with(10, 2);
    let baseline = engine
        .import_table(table_of(vec![
            boq_row("A1", "Fibre cable", "10", "5", None),
            boq_row("B1", "Closure", "2", "40", None),
        ]))
        .unwrap();
    let actual = engine
        .import_table(table_of(vec![
            boq_row("A1", "Fibre cable", "12", "5", None),
            boq_row("B1", "Closure", "2", "45", None),
            boq_row("C1", "Splice tray", "4", "3", None),
        ]))
        .unwrap();

    let variance = compare_versions(&baseline.items, &actual.items);

    assert_eq!(variance.items_matched, 2);
    assert_eq!(variance.added_keys, vec!["C1".to_string()]);
    assert_eq!(variance.baseline_total, 130.0);
    assert_eq!(variance.actual_total, 162.0);
    assert_eq!(variance.total_variance, 32.0);
    assert_eq!(variance.quantity_variance, 2.0);
    assert_eq!(variance.price_variance, 5.0);

    let a1 = &variance.item_variances[0];
    assert_eq!(a1.item_code.as_deref(), Some("A1"));
    assert_eq!(a1.total_variance, 10.0);
    let b1 = &variance.item_variances[1];
    assert_eq!(b1.total_variance, 10.0);
}

#[test]
fn test_duplicate_keys_last_wins_but_totals_sum_all() {
    let baseline = vec![item("A1", 1.0, 10.0), item("A1", 3.0, 10.0)];
    let actual = vec![item("A1", 3.0, 10.0)];

    let variance = compare_versions(&baseline, &actual);
    assert_eq!(variance.items_matched, 1);
    assert_eq!(variance.item_variances[0].quantity_variance, 0.0);
    assert_eq!(variance.baseline_total, 40.0);
    assert_eq!(variance.total_variance, -10.0);
    assert_eq!(variance.variance_percentage, -25.0);
}

#[test]
fn test_trimmed_keys_match_when_enabled() {
    let baseline = vec![item(" A1 ", 1.0, 10.0)];
    let actual = vec![item("A1", 1.0, 10.0)];

    let untrimmed = compare_versions_with(
        &baseline,
        &actual,
        &CompareOptions {
            trim_keys: false,
            ..Default::default()
        },
    );
    assert_eq!(untrimmed.items_matched, 0);
    assert_eq!(untrimmed.items_removed, 1);

    let trimmed = compare_versions_with(
        &baseline,
        &actual,
        &CompareOptions {
            trim_keys: true,
            ..Default::default()
        },
    );
    assert_eq!(trimmed.items_matched, 1);
}
