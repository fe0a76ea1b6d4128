// ==========================================
// Test helpers
// ==========================================
// Raw table builders, quiet column mapping, engine construction
// and a temporary CSV writer shared by the integration tests
// ==========================================

#![allow(dead_code)]

use boq_import::{logging, BoqImportEngine, ColumnMapping, ImportConfig, RawRow, RawTable};
use std::io::Write;
use tempfile::{Builder, NamedTempFile};

/// Standard header row used by most fixtures
pub fn standard_headers() -> Vec<String> {
    ["Item Code", "Description", "Qty", "Unit", "Rate", "Amount", "Category"]
        .iter()
        .map(|h| h.to_string())
        .collect()
}

/// One row in the standard layout; `None` leaves the cell empty
pub fn boq_row(
    code: &str,
    description: &str,
    qty: &str,
    rate: &str,
    amount: Option<&str>,
) -> RawRow {
    RawRow::from_pairs(vec![
        ("Item Code", code.to_string()),
        ("Description", description.to_string()),
        ("Qty", qty.to_string()),
        ("Unit", "ea".to_string()),
        ("Rate", rate.to_string()),
        ("Amount", amount.unwrap_or("").to_string()),
        ("Category", "Material".to_string()),
    ])
}

/// `rows` valid rows with unique codes
///
/// Quantities cycle 1..=7 and rates 10..=14, so totals stay within
/// the outlier band and no consistency warning is produced.
pub fn generated_table(rows: usize) -> RawTable {
    RawTable::new(
        standard_headers(),
        (0..rows)
            .map(|i| {
                boq_row(
                    &format!("C-{:05}", i),
                    &format!("Line item {}", i),
                    &(i % 7 + 1).to_string(),
                    &(10 + i % 5).to_string(),
                    None,
                )
            })
            .collect(),
    )
}

/// Table from explicit rows in the standard layout
pub fn table_of(rows: Vec<RawRow>) -> RawTable {
    RawTable::new(standard_headers(), rows)
}

/// Default aliases without the per-row "no column matches" warnings
pub fn quiet_mapping() -> ColumnMapping {
    ColumnMapping {
        report_unresolved: false,
        ..ColumnMapping::default()
    }
}

pub fn config_with(chunk_size: usize, max_workers: usize) -> ImportConfig {
    ImportConfig {
        chunk_size,
        max_workers,
        ..Default::default()
    }
}

pub fn engine_with(chunk_size: usize, max_workers: usize) -> BoqImportEngine {
    logging::init_test();
    BoqImportEngine::new(config_with(chunk_size, max_workers), quiet_mapping())
        .expect("valid test configuration")
}

/// Write `lines` to a temporary `.csv` file (kept alive by the handle)
pub fn write_csv(lines: &[&str]) -> NamedTempFile {
    let mut file = Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("create temp csv");
    for line in lines {
        writeln!(file, "{}", line).expect("write temp csv");
    }
    file.flush().expect("flush temp csv");
    file
}
