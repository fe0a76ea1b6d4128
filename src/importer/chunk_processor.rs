// ==========================================
// BOQ Import Engine - Chunk Processor
// ==========================================
// Scope: mapper + validator over one bounded slice of rows
// Pure: no shared state touched, safe to run chunks in parallel
// Row numbers: display_row(start_index + offset), never completion order
// ==========================================

use crate::domain::boq::{display_row, ChunkResult, RawRow};
use crate::importer::boq_importer_trait::{FieldMapper, RowValidator};
use std::sync::Arc;

#[derive(Clone)]
pub struct ChunkProcessor {
    mapper: Arc<dyn FieldMapper>,
    validator: Arc<dyn RowValidator>,
}

impl ChunkProcessor {
    pub fn new(mapper: Arc<dyn FieldMapper>, validator: Arc<dyn RowValidator>) -> Self {
        Self { mapper, validator }
    }

    /// Same mapper, different row rules
    pub fn with_validator(mut self, validator: Arc<dyn RowValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Process one chunk
    ///
    /// # Parameters
    /// - chunk_index: position of the chunk in the run
    /// - start_index: global zero-based index of the chunk's first row
    /// - rows: the chunk's rows in source order
    pub fn process(&self, chunk_index: usize, start_index: usize, rows: &[RawRow]) -> ChunkResult {
        let mut result = ChunkResult {
            chunk_index,
            start_index,
            ..Default::default()
        };

        for (offset, row) in rows.iter().enumerate() {
            let row_number = display_row(start_index + offset);

            let mapped = self.mapper.map_row(row, row_number);
            let validated = self.validator.validate(mapped.candidate);

            let row_has_errors = !mapped.errors.is_empty() || !validated.errors.is_empty();

            result.errors.extend(mapped.errors);
            result.errors.extend(validated.errors);
            result.warnings.extend(mapped.warnings);
            result.warnings.extend(validated.warnings);

            match validated.item {
                Some(item) if !row_has_errors => result.valid_items.push(item),
                _ => {}
            }
            result.processed_count += 1;
        }

        result
    }
}
