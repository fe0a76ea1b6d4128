// ==========================================
// BOQ Import Engine - Row Sources
// ==========================================
// Scope: upstream suppliers of raw rows
//   - InMemoryRowSource: table already read by the spreadsheet collaborator
//   - CsvRowSource: streams a .csv file in chunk-sized batches
// Blank rows are delivered as-is so row numbers match source positions;
// the csv reader skips blank lines, so CsvRowSource rebuilds them from
// line positions
// ==========================================

use crate::domain::boq::{CellValue, RawRow, RawTable};
use crate::importer::boq_importer_trait::RowSource;
use crate::importer::error::{EngineError, EngineResult};
use async_trait::async_trait;
use csv::{Reader, ReaderBuilder, StringRecord};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

// ==========================================
// InMemoryRowSource
// ==========================================
pub struct InMemoryRowSource {
    headers: Vec<String>,
    rows: std::vec::IntoIter<RawRow>,
    total: usize,
}

impl InMemoryRowSource {
    pub fn new(table: RawTable) -> Self {
        let total = table.rows.len();
        Self {
            headers: table.headers,
            rows: table.rows.into_iter(),
            total,
        }
    }
}

#[async_trait]
impl RowSource for InMemoryRowSource {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn row_count_hint(&self) -> Option<usize> {
        Some(self.total)
    }

    async fn next_rows(&mut self, max_rows: usize) -> EngineResult<Vec<RawRow>> {
        Ok(self.rows.by_ref().take(max_rows.max(1)).collect())
    }
}

// ==========================================
// CsvRowSource
// ==========================================
pub struct CsvRowSource {
    headers: Vec<String>,
    // taken while a blocking read is in flight
    cursor: Option<CsvCursor>,
    exhausted: bool,
}

// Reader plus rows read past the last batch boundary
struct CsvCursor {
    reader: Reader<File>,
    pending: VecDeque<RawRow>,
    file_len: u64,
    // a final record without '\n' consumes no line of its own
    ends_with_newline: bool,
}

fn ends_with_newline(path: &Path, len: u64) -> EngineResult<bool> {
    if len == 0 {
        return Ok(true);
    }
    let mut file = File::open(path)?;
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

impl CsvRowSource {
    /// Open a CSV file with a header row
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(EngineError::SourceNotFound(path.display().to_string()));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ext != "csv" {
            return Err(EngineError::UnsupportedFormat(ext));
        }

        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let ends_with_newline = ends_with_newline(path, file_len)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // rows may be shorter or longer than the header
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        tracing::debug!(path = %path.display(), columns = headers.len(), "CSV source opened");

        Ok(Self {
            headers,
            cursor: Some(CsvCursor {
                reader,
                pending: VecDeque::new(),
                file_len,
                ends_with_newline,
            }),
            exhausted: false,
        })
    }

    fn to_raw_row(headers: &[String], record: &StringRecord) -> RawRow {
        let mut row = RawRow::new();
        for (idx, header) in headers.iter().enumerate() {
            let value = record.get(idx).map(str::trim).unwrap_or("");
            row.push(header.clone(), CellValue::from(value));
        }
        row
    }

    fn read_batch(
        cursor: &mut CsvCursor,
        headers: &[String],
        max_rows: usize,
    ) -> EngineResult<Vec<RawRow>> {
        let mut rows = Vec::with_capacity(max_rows);
        let mut record = StringRecord::new();
        loop {
            while rows.len() < max_rows {
                match cursor.pending.pop_front() {
                    Some(row) => rows.push(row),
                    None => break,
                }
            }
            if rows.len() >= max_rows {
                break;
            }

            let before = cursor.reader.position().line();
            if !cursor.reader.read_record(&mut record)? {
                break;
            }
            // lines consumed = skipped blank lines + the record's own lines
            let position = cursor.reader.position();
            let consumed = position.line().saturating_sub(before);
            let embedded: u64 = record
                .iter()
                .map(|field| field.matches('\n').count() as u64)
                .sum();
            let unterminated = !cursor.ends_with_newline && position.byte() >= cursor.file_len;
            let own = if unterminated { embedded } else { embedded + 1 };
            let skipped = consumed.saturating_sub(own);

            for _ in 0..skipped {
                cursor
                    .pending
                    .push_back(Self::to_raw_row(headers, &StringRecord::new()));
            }
            cursor.pending.push_back(Self::to_raw_row(headers, &record));
        }
        Ok(rows)
    }
}

#[async_trait]
impl RowSource for CsvRowSource {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    async fn next_rows(&mut self, max_rows: usize) -> EngineResult<Vec<RawRow>> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        let mut cursor = self
            .cursor
            .take()
            .ok_or_else(|| EngineError::Internal("CSV reader lost after a failed read".to_string()))?;
        let headers = self.headers.clone();
        let max_rows = max_rows.max(1);

        let (cursor, batch) = tokio::task::spawn_blocking(move || {
            let batch = Self::read_batch(&mut cursor, &headers, max_rows);
            (cursor, batch)
        })
        .await
        .map_err(|e| EngineError::SourceRead(format!("CSV read task failed: {}", e)))?;

        self.cursor = Some(cursor);
        let batch = batch?;
        if batch.len() < max_rows {
            self.exhausted = true;
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[tokio::test]
    async fn test_csv_source_reads_in_batches() {
        let file = csv_file(&[
            "Item Code,Description,Qty",
            "A1,Cable,10",
            "A2,Pole,3",
            "A3,Closure,1",
        ]);

        let mut source = CsvRowSource::open(file.path()).unwrap();
        assert_eq!(source.headers(), &["Item Code", "Description", "Qty"]);

        let first = source.next_rows(2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].get("Description"), Some(&CellValue::from("Cable")));

        let second = source.next_rows(2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert!(source.next_rows(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_short_rows_padded_with_empty_cells() {
        let file = csv_file(&["Description,Qty,Unit", "Cable,10"]);
        let mut source = CsvRowSource::open(file.path()).unwrap();
        let rows = source.next_rows(10).await.unwrap();
        assert_eq!(rows[0].get("Unit"), Some(&CellValue::Empty));
    }

    #[tokio::test]
    async fn test_blank_lines_keep_their_row_positions() {
        let file = csv_file(&[
            "Item Code,Description,Qty",
            "A1,Cable,10",
            "",
            "A3,\"Pole\nwith stay\",3",
            "",
            "",
            "A6,Closure,1",
        ]);

        // batch of 2 forces blank rows across a batch boundary
        let mut source = CsvRowSource::open(file.path()).unwrap();
        let mut rows = Vec::new();
        loop {
            let batch = source.next_rows(2).await.unwrap();
            if batch.is_empty() {
                break;
            }
            rows.extend(batch);
        }

        assert_eq!(rows.len(), 6);
        let codes: Vec<Option<&CellValue>> = rows.iter().map(|r| r.get("Item Code")).collect();
        assert_eq!(codes[0], Some(&CellValue::from("A1")));
        assert_eq!(codes[1], Some(&CellValue::Empty));
        assert_eq!(codes[2], Some(&CellValue::from("A3")));
        assert_eq!(codes[3], Some(&CellValue::Empty));
        assert_eq!(codes[4], Some(&CellValue::Empty));
        assert_eq!(codes[5], Some(&CellValue::from("A6")));
        assert_eq!(
            rows[2].get("Description"),
            Some(&CellValue::from("Pole\nwith stay"))
        );
    }

    #[tokio::test]
    async fn test_blank_lines_before_unterminated_last_row() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "Description,Qty\nCable,10\n\n\nPole,3").unwrap();

        let mut source = CsvRowSource::open(file.path()).unwrap();
        let rows = source.next_rows(10).await.unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].get("Description"), Some(&CellValue::Empty));
        assert_eq!(rows[2].get("Description"), Some(&CellValue::Empty));
        assert_eq!(rows[3].get("Description"), Some(&CellValue::from("Pole")));
    }

    #[test]
    fn test_open_rejects_missing_and_non_csv() {
        assert!(matches!(
            CsvRowSource::open("does_not_exist.csv"),
            Err(EngineError::SourceNotFound(_))
        ));

        let file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        assert!(matches!(
            CsvRowSource::open(file.path()),
            Err(EngineError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_in_memory_source() {
        let table = RawTable::new(
            vec!["Description".to_string()],
            (0..5)
                .map(|i| RawRow::from_pairs(vec![("Description", format!("Item {}", i))]))
                .collect(),
        );
        let mut source = InMemoryRowSource::new(table);
        assert_eq!(source.row_count_hint(), Some(5));
        assert_eq!(source.next_rows(3).await.unwrap().len(), 3);
        assert_eq!(source.next_rows(3).await.unwrap().len(), 2);
        assert!(source.next_rows(3).await.unwrap().is_empty());
    }
}
