// ==========================================
// BOQ Import Engine - Context Aggregator
// ==========================================
// Scope: single owner of the run's ProcessingContext
//        + run state machine + final report
// Chunk results arrive in completion order; the report is ordered by row
// ==========================================

use crate::domain::boq::{
    display_row, ChunkFailure, ChunkResult, ImportError, ImportReport, MappingSummary,
    ProcessingContext,
};
use crate::domain::types::{IssueKind, RunState};
use crate::importer::boq_importer_trait::ConsistencyValidator;
use crate::importer::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct ContextAggregator {
    run_id: String,
    state: RunState,
    context: ProcessingContext,
    chunk_failures: Vec<ChunkFailure>,
    cancelled: bool,
    started_at: DateTime<Utc>,
    consistency: Arc<dyn ConsistencyValidator>,
}

impl ContextAggregator {
    /// Fresh context; a failed run restarts with a new aggregator
    pub fn new(run_id: impl Into<String>, consistency: Arc<dyn ConsistencyValidator>) -> Self {
        Self {
            run_id: run_id.into(),
            state: RunState::NotStarted,
            context: ProcessingContext::default(),
            chunk_failures: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
            consistency,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn processed_rows(&self) -> usize {
        self.context.processed_rows
    }

    fn transition(&mut self, next: RunState) -> EngineResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(EngineError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::trace!(run_id = %self.run_id, from = %self.state, to = %next, "run state changed");
        self.state = next;
        Ok(())
    }

    /// NOT_STARTED → READING
    pub fn begin(&mut self) -> EngineResult<()> {
        self.transition(RunState::Reading)
    }

    /// Fold one chunk result into the context
    pub fn absorb(&mut self, chunk: ChunkResult) -> EngineResult<()> {
        self.transition(RunState::MapValidate)?;

        self.context.processed_rows += chunk.processed_count;
        self.context.valid_items.extend(chunk.valid_items);
        self.context.errors.extend(chunk.errors);
        self.context.warnings.extend(chunk.warnings);
        Ok(())
    }

    /// Degrade a failed chunk: one error per row keeps every row accounted for
    pub fn absorb_failure(
        &mut self,
        chunk_index: usize,
        start_index: usize,
        row_count: usize,
        message: impl Into<String>,
    ) -> EngineResult<()> {
        self.transition(RunState::MapValidate)?;
        let message = message.into();

        for offset in 0..row_count {
            self.context.errors.push(ImportError::new(
                display_row(start_index + offset),
                "row",
                format!("row not processed: {}", message),
                IssueKind::Chunk,
            ));
        }
        self.context.processed_rows += row_count;

        if row_count > 0 {
            self.chunk_failures.push(ChunkFailure {
                chunk_index,
                first_row: display_row(start_index),
                last_row: display_row(start_index + row_count - 1),
                message,
            });
        }
        Ok(())
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// CONSISTENCY_CHECK → COMPLETE; consumes the context
    pub fn finish(mut self) -> EngineResult<ImportReport> {
        self.transition(RunState::ConsistencyCheck)?;

        self.context.valid_items.sort_by_key(|item| item.source_row);
        let findings = self.consistency.check(&self.context.valid_items);
        self.context.warnings.extend(findings);

        let success = !self.context.valid_items.is_empty()
            && self.context.errors.is_empty()
            && !self.cancelled
            && self.chunk_failures.is_empty();

        self.transition(RunState::Complete { success })?;
        Ok(self.into_report(success))
    }

    /// Partial report for a run aborted by a system error
    pub fn fail(mut self) -> ImportReport {
        // also reached before READING when the source cannot be opened
        self.state = RunState::Complete { success: false };
        self.context.valid_items.sort_by_key(|item| item.source_row);
        self.into_report(false)
    }

    fn into_report(mut self, success: bool) -> ImportReport {
        let ProcessingContext {
            valid_items,
            mut errors,
            mut warnings,
            processed_rows,
        } = std::mem::take(&mut self.context);

        // stable: findings of one row keep their production order
        errors.sort_by_key(|e| e.row);
        warnings.sort_by_key(|w| w.row);
        self.chunk_failures.sort_by_key(|f| f.chunk_index);

        let error_rows = errors.iter().map(|e| e.row).collect::<BTreeSet<_>>().len();
        let warning_rows = warnings.iter().map(|w| w.row).collect::<BTreeSet<_>>().len();

        let completed_at = Utc::now();
        let elapsed_ms = (completed_at - self.started_at).num_milliseconds().max(0) as u64;

        ImportReport {
            run_id: self.run_id,
            success,
            cancelled: self.cancelled,
            state: self.state,
            total_rows: processed_rows,
            valid_item_count: valid_items.len(),
            error_rows,
            warning_rows,
            mapping_summary: MappingSummary::from_items(&valid_items),
            errors,
            warnings,
            items: valid_items,
            chunk_failures: self.chunk_failures,
            started_at: self.started_at,
            completed_at,
            elapsed_ms,
        }
    }
}
