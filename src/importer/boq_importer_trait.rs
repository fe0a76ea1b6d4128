// ==========================================
// BOQ Import Engine - Importer Traits
// ==========================================
// Scope: interfaces of the import pipeline stages (no implementations)
// Pipeline: RowSource → FieldMapper → RowValidator → (aggregate)
//           → ConsistencyValidator, CatalogMatcher on accepted items
// ==========================================

use crate::domain::boq::{CandidateItem, ImportWarning, ParsedItem, RawRow};
use crate::importer::catalog::CatalogMatch;
use crate::importer::error::EngineResult;
use crate::importer::field_mapper::MappingOutcome;
use crate::importer::row_validator::RowOutcome;
use async_trait::async_trait;

// ==========================================
// RowSource Trait
// ==========================================
// Purpose: upstream supplier of raw rows (I/O-bound suspension point)
// Implementors: InMemoryRowSource, CsvRowSource
#[async_trait]
pub trait RowSource: Send {
    /// Header row in original column order
    fn headers(&self) -> &[String];

    /// Total data rows when known up front
    fn row_count_hint(&self) -> Option<usize> {
        None
    }

    /// Next batch of at most `max_rows` rows
    ///
    /// # Returns
    /// - Ok(rows): empty once the source is exhausted
    /// - Err: read/decoding failure (fatal to the run)
    async fn next_rows(&mut self, max_rows: usize) -> EngineResult<Vec<RawRow>>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// Purpose: raw row → candidate item (stage 1)
// Implementors: ColumnMapper
pub trait FieldMapper: Send + Sync {
    /// Map one raw row; parse failures come back as data, never as Err
    ///
    /// # Parameters
    /// - row: raw cells keyed by original header
    /// - row_number: display row number (header = 1)
    fn map_row(&self, row: &RawRow, row_number: usize) -> MappingOutcome;
}

// ==========================================
// RowValidator Trait
// ==========================================
// Purpose: candidate item → accepted item or row errors (stage 2)
// Implementors: BoqRowValidator
pub trait RowValidator: Send + Sync {
    /// Validate one candidate; the row is accepted iff no error is returned
    fn validate(&self, candidate: CandidateItem) -> RowOutcome;
}

// ==========================================
// ConsistencyValidator Trait
// ==========================================
// Purpose: cross-row checks over the complete accepted set (stage 3)
// Implementors: BatchConsistencyValidator
pub trait ConsistencyValidator: Send + Sync {
    /// Findings are warnings only; accepted items are never removed
    fn check(&self, items: &[ParsedItem]) -> Vec<ImportWarning>;
}

// ==========================================
// CatalogMatcher Trait
// ==========================================
// Purpose: external reference-catalog lookup feeding `mappingStatus`
// Implementors: provided by the host application (StaticCatalogMatcher for tests)
#[async_trait]
pub trait CatalogMatcher: Send + Sync {
    /// Best catalog candidate for an item
    ///
    /// # Returns
    /// - Ok(Some(match)): best candidate with its confidence in [0, 1]
    /// - Ok(None): no candidate
    /// - Err: lookup failure (item stays pending, warning recorded)
    async fn best_match(&self, item: &ParsedItem) -> EngineResult<Option<CatalogMatch>>;
}
