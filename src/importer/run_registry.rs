// ==========================================
// BOQ Import Engine - Run Registry
// ==========================================
// Scope: in-memory tracking of import runs keyed by run_id
//   fed by ImportEvent (progress) and the final ImportReport
//   answers: status, active runs, history, aggregate statistics
//   cancels a running run through its CancellationToken
// Lives for the process; cleanup_history bounds its size
// ==========================================

use crate::domain::boq::ImportReport;
use crate::importer::error::{EngineError, EngineResult};
use crate::importer::import_engine::ImportEvent;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// One tracked run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub status: RunStatus,
    /// Import outcome; only meaningful once completed
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub elapsed_ms: Option<u64>,
    pub total_rows_hint: Option<usize>,
    pub processed_rows: usize,
    pub valid_items: usize,
    pub error_rows: usize,
    pub warning_rows: usize,
    pub timed_out_chunks: usize,
    /// System failure message of a failed run
    pub failure: Option<String>,
    /// Error count per `kind:field`
    pub error_reasons: HashMap<String, usize>,
}

impl RunRecord {
    fn started(run_id: &str, total_rows_hint: Option<usize>) -> Self {
        Self {
            run_id: run_id.to_string(),
            status: RunStatus::Running,
            success: false,
            started_at: Utc::now(),
            completed_at: None,
            elapsed_ms: None,
            total_rows_hint,
            processed_rows: 0,
            valid_items: 0,
            error_rows: 0,
            warning_rows: 0,
            timed_out_chunks: 0,
            failure: None,
            error_reasons: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReason {
    pub reason: String,
    pub count: usize,
}

/// Aggregate view over every tracked run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub total_runs: usize,
    pub running: usize,
    pub completed: usize,
    /// Completed runs whose report was not successful
    pub unsuccessful: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Mean elapsed time of finished runs
    pub average_elapsed_ms: Option<f64>,
    pub rows_processed: usize,
    /// Most frequent reasons, highest count first
    pub top_failure_reasons: Vec<FailureReason>,
}

#[derive(Debug)]
struct Entry {
    record: RunRecord,
    // dropped once the run is finished
    cancel: Option<CancellationToken>,
}

impl Entry {
    fn new(record: RunRecord) -> Self {
        Self {
            record,
            cancel: None,
        }
    }
}

// ==========================================
// RunRegistry
// ==========================================
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<String, Entry>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.runs
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))
    }

    /// Apply one progress event of `run_id`
    pub fn record_event(&self, run_id: &str, event: &ImportEvent) -> EngineResult<()> {
        let mut runs = self.lock()?;

        if let ImportEvent::RunStarted { total_rows, .. } = event {
            runs.insert(
                run_id.to_string(),
                Entry::new(RunRecord::started(run_id, *total_rows)),
            );
            return Ok(());
        }

        let Some(record) = runs.get_mut(run_id).map(|e| &mut e.record) else {
            tracing::trace!(run_id, "event for untracked run ignored");
            return Ok(());
        };
        match event {
            ImportEvent::ChunkCompleted { processed_rows, .. } => {
                record.processed_rows = *processed_rows;
            }
            ImportEvent::ChunkTimedOut { .. } => record.timed_out_chunks += 1,
            ImportEvent::Cancelled { processed_rows } => {
                record.processed_rows = *processed_rows;
                record.status = RunStatus::Cancelled;
            }
            // the final report carries the outcome
            ImportEvent::RunStarted { .. } | ImportEvent::RunCompleted { .. } => {}
        }
        Ok(())
    }

    /// Close a run from its final report; `failure` marks a system failure
    pub fn record_report(&self, report: &ImportReport, failure: Option<&str>) -> EngineResult<()> {
        let mut runs = self.lock()?;
        let entry = runs
            .entry(report.run_id.clone())
            .or_insert_with(|| Entry::new(RunRecord::started(&report.run_id, None)));
        entry.cancel = None;
        let record = &mut entry.record;

        record.status = match (failure, report.cancelled) {
            (Some(_), _) => RunStatus::Failed,
            (None, true) => RunStatus::Cancelled,
            (None, false) => RunStatus::Completed,
        };
        record.success = report.success;
        record.started_at = report.started_at;
        record.completed_at = Some(report.completed_at);
        record.elapsed_ms = Some(report.elapsed_ms);
        record.processed_rows = report.total_rows;
        record.valid_items = report.valid_item_count;
        record.error_rows = report.error_rows;
        record.warning_rows = report.warning_rows;
        record.failure = failure.map(str::to_string);

        record.error_reasons.clear();
        for error in &report.errors {
            *record
                .error_reasons
                .entry(format!("{}:{}", error.kind.as_str(), error.field))
                .or_default() += 1;
        }
        Ok(())
    }

    /// Make a running run cancellable by id
    pub fn track_cancel(&self, run_id: &str, token: CancellationToken) -> EngineResult<()> {
        if let Some(entry) = self.lock()?.get_mut(run_id) {
            if !entry.record.status.is_finished() {
                entry.cancel = Some(token);
            }
        }
        Ok(())
    }

    /// Cancel a running run
    ///
    /// # Returns
    /// - Ok(true): cancellation requested
    /// - Ok(false): unknown, finished, or not cancellable
    pub fn cancel_run(&self, run_id: &str) -> EngineResult<bool> {
        let runs = self.lock()?;
        match runs.get(run_id).and_then(|e| e.cancel.as_ref()) {
            Some(token) => {
                tracing::info!(run_id, "run cancellation requested");
                token.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn status(&self, run_id: &str) -> EngineResult<Option<RunRecord>> {
        Ok(self.lock()?.get(run_id).map(|e| e.record.clone()))
    }

    /// Runs still in progress, oldest first
    pub fn active_runs(&self) -> EngineResult<Vec<RunRecord>> {
        let mut active: Vec<RunRecord> = self
            .lock()?
            .values()
            .map(|e| &e.record)
            .filter(|r| !r.status.is_finished())
            .cloned()
            .collect();
        active.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(active)
    }

    /// Finished runs, newest first, at most `limit`
    pub fn history(&self, limit: usize) -> EngineResult<Vec<RunRecord>> {
        let mut finished: Vec<RunRecord> = self
            .lock()?
            .values()
            .map(|e| &e.record)
            .filter(|r| r.status.is_finished())
            .cloned()
            .collect();
        finished.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        finished.truncate(limit);
        Ok(finished)
    }

    /// Counts, mean elapsed time and the `top_n` most frequent failure reasons
    ///
    /// Reasons are row errors keyed `kind:field` plus system failure messages.
    pub fn stats(&self, top_n: usize) -> EngineResult<RunStats> {
        let runs = self.lock()?;

        let mut stats = RunStats {
            total_runs: runs.len(),
            running: 0,
            completed: 0,
            unsuccessful: 0,
            failed: 0,
            cancelled: 0,
            average_elapsed_ms: None,
            rows_processed: 0,
            top_failure_reasons: Vec::new(),
        };
        let mut elapsed_total = 0u64;
        let mut elapsed_runs = 0u64;
        let mut reasons: HashMap<&str, usize> = HashMap::new();

        for record in runs.values().map(|e| &e.record) {
            match record.status {
                RunStatus::Running => stats.running += 1,
                RunStatus::Completed => {
                    stats.completed += 1;
                    if !record.success {
                        stats.unsuccessful += 1;
                    }
                }
                RunStatus::Failed => stats.failed += 1,
                RunStatus::Cancelled => stats.cancelled += 1,
            }
            stats.rows_processed += record.processed_rows;
            if let Some(ms) = record.elapsed_ms {
                elapsed_total += ms;
                elapsed_runs += 1;
            }
            for (reason, count) in &record.error_reasons {
                *reasons.entry(reason.as_str()).or_default() += count;
            }
            if let Some(failure) = &record.failure {
                *reasons.entry(failure.as_str()).or_default() += 1;
            }
        }

        if elapsed_runs > 0 {
            stats.average_elapsed_ms = Some(elapsed_total as f64 / elapsed_runs as f64);
        }

        let mut ranked: Vec<FailureReason> = reasons
            .into_iter()
            .map(|(reason, count)| FailureReason {
                reason: reason.to_string(),
                count,
            })
            .collect();
        // ties broken by name so the ranking is stable
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));
        ranked.truncate(top_n);
        stats.top_failure_reasons = ranked;

        Ok(stats)
    }

    /// Drop finished runs started before `now - max_age`; running ones are kept
    ///
    /// # Returns
    /// Number of records removed
    pub fn cleanup_history(&self, max_age: Duration) -> EngineResult<usize> {
        let cutoff = Utc::now() - max_age;
        let mut runs = self.lock()?;
        let before = runs.len();
        runs.retain(|_, e| !e.record.status.is_finished() || e.record.started_at >= cutoff);
        let removed = before - runs.len();
        if removed > 0 {
            tracing::debug!(removed, kept = runs.len(), "run history cleaned up");
        }
        Ok(removed)
    }
}
