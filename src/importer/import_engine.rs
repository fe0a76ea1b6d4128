// ==========================================
// BOQ Import Engine - Run Orchestration
// ==========================================
// Scope: chunked parallel import run
//   producer: reads chunks from the RowSource, dispatches workers
//   workers:  spawn_blocking chunk processing under the chunk timeout,
//             then catalog lookups (each under its own timeout),
//             bounded by a semaphore
//   consumer: single owner of the ContextAggregator, fed by mpsc
// Cancellation stops dispatching; dispatched chunks still finish
// Progress events never block the run: a full channel drops them
// ==========================================

use crate::config::column_mapping::{validate_column_mapping, ColumnMapping};
use crate::config::import_config::ImportConfig;
use crate::domain::boq::{display_row, ChunkResult, ImportReport, RawTable};
use crate::importer::aggregator::ContextAggregator;
use crate::importer::boq_importer_trait::{
    CatalogMatcher, ConsistencyValidator, RowSource, RowValidator,
};
use crate::importer::catalog::{apply_catalog_matches, CatalogPolicy};
use crate::importer::chunk_processor::ChunkProcessor;
use crate::importer::consistency::BatchConsistencyValidator;
use crate::importer::error::{EngineError, EngineResult};
use crate::importer::field_mapper::ColumnMapper;
use crate::importer::row_validator::BoqRowValidator;
use crate::importer::run_registry::RunRegistry;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

// ==========================================
// ImportEvent - progress notifications
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ImportEvent {
    RunStarted {
        run_id: String,
        total_rows: Option<usize>,
    },
    ChunkCompleted {
        chunk_index: usize,
        rows: usize,
        processed_rows: usize,
    },
    ChunkTimedOut {
        chunk_index: usize,
        first_row: usize,
        last_row: usize,
    },
    Cancelled {
        processed_rows: usize,
    },
    RunCompleted {
        run_id: String,
        success: bool,
        valid_items: usize,
        error_rows: usize,
        warning_rows: usize,
    },
}

// Worker → consumer message
enum ChunkMessage {
    Completed(ChunkResult),
    TimedOut {
        chunk_index: usize,
        start_index: usize,
        row_count: usize,
    },
    Crashed {
        chunk_index: usize,
        message: String,
    },
}

// Where progress goes: the caller's channel and the run registry
#[derive(Clone)]
struct EventSink {
    run_id: String,
    sender: Option<mpsc::Sender<ImportEvent>>,
    registry: Option<Arc<RunRegistry>>,
}

impl EventSink {
    fn emit(&self, event: ImportEvent) {
        if let Some(registry) = &self.registry {
            if let Err(e) = registry.record_event(&self.run_id, &event) {
                tracing::warn!(error = %e, "run registry update failed");
            }
        }
        if let Some(sender) = &self.sender {
            match sender.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    tracing::trace!(?event, "progress channel full, event dropped");
                }
                Err(TrySendError::Closed(_)) => tracing::trace!("progress receiver dropped"),
            }
        }
    }

    fn record_report(&self, report: &ImportReport, failure: Option<&str>) {
        if let Some(registry) = &self.registry {
            if let Err(e) = registry.record_report(report, failure) {
                tracing::warn!(error = %e, "run registry update failed");
            }
        }
    }
}

// What the producer loop ended with
struct DispatchSummary {
    chunks: usize,
    cancelled: bool,
    read_error: Option<EngineError>,
}

// What the consumer loop ended with
struct ConsumeSummary {
    aggregator: ContextAggregator,
    failure: Option<String>,
}

// ==========================================
// BoqImportEngine
// ==========================================
pub struct BoqImportEngine {
    config: Arc<ImportConfig>,
    mapping: Arc<ColumnMapping>,
    processor: ChunkProcessor,
    consistency: Arc<dyn ConsistencyValidator>,
    catalog: Option<Arc<dyn CatalogMatcher>>,
    events: Option<mpsc::Sender<ImportEvent>>,
    registry: Option<Arc<RunRegistry>>,
}

impl BoqImportEngine {
    /// Build an engine; configuration and mapping are frozen for every run
    pub fn new(config: ImportConfig, mapping: ColumnMapping) -> EngineResult<Self> {
        Self::from_snapshot(Arc::new(config), mapping)
    }

    /// Build from a ConfigManager snapshot
    pub fn from_snapshot(config: Arc<ImportConfig>, mapping: ColumnMapping) -> EngineResult<Self> {
        config.validate()?;
        mapping.validate()?;

        let compiled = Arc::new(mapping.compile());
        let processor = ChunkProcessor::new(
            Arc::new(ColumnMapper::new(compiled)),
            Arc::new(BoqRowValidator::new(config.clone())),
        );

        Ok(Self {
            consistency: Arc::new(BatchConsistencyValidator::new(config.clone())),
            config,
            mapping: Arc::new(mapping),
            processor,
            catalog: None,
            events: None,
            registry: None,
        })
    }

    /// Attach the external catalog matcher that sets `mappingStatus`
    pub fn with_catalog_matcher(mut self, matcher: Arc<dyn CatalogMatcher>) -> Self {
        self.catalog = Some(matcher);
        self
    }

    /// Replace the cross-row checks
    pub fn with_consistency_validator(mut self, validator: Arc<dyn ConsistencyValidator>) -> Self {
        self.consistency = validator;
        self
    }

    /// Replace the per-row rules
    pub fn with_row_validator(mut self, validator: Arc<dyn RowValidator>) -> Self {
        self.processor = self.processor.with_validator(validator);
        self
    }

    /// Receive progress events
    ///
    /// Sending never waits: events that do not fit the channel are dropped.
    pub fn with_event_sender(mut self, sender: mpsc::Sender<ImportEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Track every run in `registry`
    pub fn with_run_registry(mut self, registry: Arc<RunRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    fn event_sink(&self, run_id: &str) -> EventSink {
        EventSink {
            run_id: run_id.to_string(),
            sender: self.events.clone(),
            registry: self.registry.clone(),
        }
    }

    // ==========================================
    // Async run
    // ==========================================

    /// Import every row of `source`
    ///
    /// # Returns
    /// - Ok(report): complete (or cancelled) run; row problems are inside the report
    /// - Err(RunFailed): source read failure or chunk crash, with the partial report
    pub async fn run<S: RowSource>(
        &self,
        source: S,
        cancel: CancellationToken,
    ) -> EngineResult<ImportReport> {
        let run_id = Uuid::new_v4().to_string();
        self.run_with_id(run_id, source, cancel).await
    }

    #[instrument(skip(self, source, cancel), fields(run_id = %run_id))]
    async fn run_with_id<S: RowSource>(
        &self,
        run_id: String,
        mut source: S,
        cancel: CancellationToken,
    ) -> EngineResult<ImportReport> {
        let started = Instant::now();
        let sink = self.event_sink(&run_id);
        self.log_mapping_coverage(source.headers());

        let mut aggregator = ContextAggregator::new(run_id.clone(), self.consistency.clone());
        aggregator.begin()?;

        sink.emit(ImportEvent::RunStarted {
            run_id: run_id.clone(),
            total_rows: source.row_count_hint(),
        });
        if let Some(registry) = &self.registry {
            if let Err(e) = registry.track_cancel(&run_id, cancel.clone()) {
                tracing::warn!(error = %e, "run registry update failed");
            }
        }

        tracing::info!(
            chunk_size = self.config.effective_chunk_size(),
            workers = self.config.effective_workers(),
            timeout_ms = self.config.chunk_timeout_ms,
            catalog = self.catalog.is_some(),
            "import run started"
        );

        // internal stop: user cancellation or a crashed chunk
        let stop = cancel.child_token();
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        let (dispatch, consumed) = tokio::join!(
            self.dispatch_chunks(&mut source, tx, &cancel, &stop),
            consume_chunks(aggregator, rx, sink.clone(), stop.clone()),
        );
        let ConsumeSummary {
            mut aggregator,
            failure,
        } = consumed;

        // ===== System errors: keep everything completed so far =====
        let fatal = match (dispatch.read_error, failure) {
            (Some(e), _) => Some(format!("source read failed: {}", e)),
            (None, Some(message)) => Some(message),
            (None, None) => None,
        };
        if let Some(message) = fatal {
            let report = aggregator.fail();
            tracing::error!(
                error = %message,
                processed_rows = report.total_rows,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "import run failed"
            );
            sink.record_report(&report, Some(&message));
            emit_completed(&sink, &report);
            return Err(EngineError::RunFailed {
                message,
                report: Box::new(report),
            });
        }

        if dispatch.cancelled {
            aggregator.mark_cancelled();
            tracing::warn!(
                processed_rows = aggregator.processed_rows(),
                chunks = dispatch.chunks,
                "import run cancelled, keeping completed chunks"
            );
            sink.emit(ImportEvent::Cancelled {
                processed_rows: aggregator.processed_rows(),
            });
        }

        let report = aggregator.finish()?;

        tracing::info!(
            success = report.success,
            rows = report.total_rows,
            valid_items = report.valid_item_count,
            error_rows = report.error_rows,
            warning_rows = report.warning_rows,
            chunks = dispatch.chunks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "import run completed"
        );
        sink.record_report(&report, None);
        emit_completed(&sink, &report);
        Ok(report)
    }

    /// Producer: read chunk, wait for a worker slot, dispatch
    async fn dispatch_chunks<S: RowSource>(
        &self,
        source: &mut S,
        tx: mpsc::Sender<ChunkMessage>,
        cancel: &CancellationToken,
        stop: &CancellationToken,
    ) -> DispatchSummary {
        let chunk_size = self.config.effective_chunk_size();
        let timeout = Duration::from_millis(self.config.chunk_timeout_ms);
        let semaphore = Arc::new(Semaphore::new(self.config.effective_workers()));

        let mut workers: Vec<(usize, JoinHandle<()>)> = Vec::new();
        let mut next_index = 0usize;
        let mut read_error = None;
        let mut interrupted = false;

        loop {
            if stop.is_cancelled() {
                interrupted = true;
                break;
            }

            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = stop.cancelled() => {
                    interrupted = true;
                    break;
                }
            };

            let rows = match source.next_rows(chunk_size).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::error!(error = %e, rows_read = next_index, "row source failed");
                    read_error = Some(e);
                    break;
                }
            };
            if rows.is_empty() {
                break;
            }

            let chunk_index = workers.len();
            let start_index = next_index;
            next_index += rows.len();

            let processor = self.processor.clone();
            let catalog = self.catalog.clone();
            let policy = CatalogPolicy::from_config(&self.config);
            let tx = tx.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let row_count = rows.len();

                // only row processing counts against the chunk timeout
                let processing = tokio::task::spawn_blocking(move || {
                    processor.process(chunk_index, start_index, &rows)
                });

                let message = match tokio::time::timeout(timeout, processing).await {
                    Ok(Ok(mut result)) => {
                        if let Some(matcher) = catalog {
                            let warnings = apply_catalog_matches(
                                matcher.as_ref(),
                                &mut result.valid_items,
                                &policy,
                            )
                            .await;
                            result.warnings.extend(warnings);
                        }
                        ChunkMessage::Completed(result)
                    }
                    Ok(Err(e)) => ChunkMessage::Crashed {
                        chunk_index,
                        message: e.to_string(),
                    },
                    Err(_) => ChunkMessage::TimedOut {
                        chunk_index,
                        start_index,
                        row_count,
                    },
                };
                // receiver gone means the run is already being torn down
                let _ = tx.send(message).await;
            });
            workers.push((chunk_index, handle));
        }

        let cancelled = interrupted && cancel.is_cancelled();
        let chunks = workers.len();

        for (chunk_index, handle) in workers {
            if let Err(e) = handle.await {
                let _ = tx
                    .send(ChunkMessage::Crashed {
                        chunk_index,
                        message: e.to_string(),
                    })
                    .await;
            }
        }

        DispatchSummary {
            chunks,
            cancelled,
            read_error,
        }
    }

    fn log_mapping_coverage(&self, headers: &[String]) {
        let coverage =
            validate_column_mapping(&self.mapping, headers, self.config.strict_validation);
        if coverage.is_valid {
            tracing::debug!(columns = headers.len(), "column mapping covers required fields");
        } else {
            let missing: Vec<&str> = coverage.missing_required.iter().map(|f| f.as_str()).collect();
            let suggested: Vec<String> = coverage
                .suggestions
                .iter()
                .map(|s| format!("{}={}", s.field, s.header))
                .collect();
            tracing::warn!(
                missing = ?missing,
                suggestions = ?suggested,
                "required fields have no matching column; affected rows will be rejected"
            );
        }
    }

    // ==========================================
    // Synchronous run
    // ==========================================

    /// Sequential run over an in-memory table (no async runtime needed)
    ///
    /// Uses the same chunking as `run`; the catalog matcher is not consulted,
    /// so every item stays `pending`.
    pub fn import_table(&self, table: RawTable) -> EngineResult<ImportReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("import_table", run_id = %run_id);
        let _guard = span.enter();

        self.log_mapping_coverage(&table.headers);
        if self.catalog.is_some() {
            tracing::debug!("catalog matcher skipped in synchronous import");
        }

        let mut aggregator = ContextAggregator::new(run_id, self.consistency.clone());
        aggregator.begin()?;

        let chunk_size = self.config.effective_chunk_size();
        for (chunk_index, rows) in table.rows.chunks(chunk_size).enumerate() {
            let start_index = chunk_index * chunk_size;
            let result = self.processor.process(chunk_index, start_index, rows);
            tracing::debug!(
                chunk_index,
                first_row = display_row(start_index),
                rows = result.processed_count,
                errors = result.errors.len(),
                "chunk processed"
            );
            aggregator.absorb(result)?;
        }

        let report = aggregator.finish()?;
        tracing::info!(
            success = report.success,
            rows = report.total_rows,
            valid_items = report.valid_item_count,
            error_rows = report.error_rows,
            "table import completed"
        );
        Ok(report)
    }
}

fn emit_completed(sink: &EventSink, report: &ImportReport) {
    sink.emit(ImportEvent::RunCompleted {
        run_id: report.run_id.clone(),
        success: report.success,
        valid_items: report.valid_item_count,
        error_rows: report.error_rows,
        warning_rows: report.warning_rows,
    });
}

/// Consumer: the only place the aggregator is mutated
async fn consume_chunks(
    mut aggregator: ContextAggregator,
    mut rx: mpsc::Receiver<ChunkMessage>,
    events: EventSink,
    stop: CancellationToken,
) -> ConsumeSummary {
    let mut failure: Option<String> = None;

    while let Some(message) = rx.recv().await {
        let absorbed = match message {
            ChunkMessage::Completed(result) => {
                let chunk_index = result.chunk_index;
                let rows = result.processed_count;
                tracing::debug!(
                    chunk_index,
                    rows,
                    errors = result.errors.len(),
                    warnings = result.warnings.len(),
                    "chunk completed"
                );
                aggregator
                    .absorb(result)
                    .map(|_| ImportEvent::ChunkCompleted {
                        chunk_index,
                        rows,
                        processed_rows: aggregator.processed_rows(),
                    })
            }
            ChunkMessage::TimedOut {
                chunk_index,
                start_index,
                row_count,
            } => {
                tracing::warn!(
                    chunk_index,
                    first_row = display_row(start_index),
                    rows = row_count,
                    "chunk timed out, rows reported as errors"
                );
                aggregator
                    .absorb_failure(chunk_index, start_index, row_count, "chunk processing timed out")
                    .map(|_| ImportEvent::ChunkTimedOut {
                        chunk_index,
                        first_row: display_row(start_index),
                        last_row: display_row(start_index + row_count.saturating_sub(1)),
                    })
            }
            ChunkMessage::Crashed {
                chunk_index,
                message,
            } => {
                tracing::error!(chunk_index, error = %message, "chunk crashed");
                Err(EngineError::ChunkPanicked {
                    chunk_index,
                    message,
                })
            }
        };

        match absorbed {
            Ok(event) => events.emit(event),
            Err(e) => {
                // first system error wins; keep draining so finished chunks are kept
                if failure.is_none() {
                    failure = Some(e.to_string());
                }
                stop.cancel();
            }
        }
    }

    ConsumeSummary {
        aggregator,
        failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::boq::RawRow;
    use crate::importer::row_source::InMemoryRowSource;

    fn quiet_mapping() -> ColumnMapping {
        ColumnMapping {
            report_unresolved: false,
            ..ColumnMapping::default()
        }
    }

    fn table(rows: usize) -> RawTable {
        RawTable::new(
            vec!["Item Code".into(), "Description".into(), "Qty".into(), "Rate".into()],
            (0..rows)
                .map(|i| {
                    RawRow::from_pairs(vec![
                        ("Item Code", format!("C-{}", i)),
                        ("Description", format!("Item {}", i)),
                        ("Qty", (i % 7 + 1).to_string()),
                        ("Rate", "10".to_string()),
                    ])
                })
                .collect(),
        )
    }

    fn engine(chunk_size: usize) -> BoqImportEngine {
        BoqImportEngine::new(
            ImportConfig {
                chunk_size,
                max_workers: 4,
                ..Default::default()
            },
            quiet_mapping(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_async_run_matches_sync_import() {
        let engine = engine(7);
        let async_report = engine
            .run(InMemoryRowSource::new(table(50)), CancellationToken::new())
            .await
            .unwrap();
        let sync_report = engine.import_table(table(50)).unwrap();

        assert!(async_report.success);
        assert_eq!(async_report.total_rows, 50);
        assert_eq!(async_report.items, sync_report.items);
        assert_eq!(async_report.warnings, sync_report.warnings);
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let (tx, mut rx) = mpsc::channel(64);
        let engine = engine(10).with_event_sender(tx);
        engine
            .run(InMemoryRowSource::new(table(25)), CancellationToken::new())
            .await
            .unwrap();
        drop(engine);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(ImportEvent::RunStarted { total_rows: Some(25), .. })));
        assert!(matches!(events.last(), Some(ImportEvent::RunCompleted { success: true, .. })));
        let chunks = events
            .iter()
            .filter(|e| matches!(e, ImportEvent::ChunkCompleted { .. }))
            .count();
        assert_eq!(chunks, 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = BoqImportEngine::new(
            ImportConfig {
                chunk_timeout_ms: 0,
                ..Default::default()
            },
            ColumnMapping::default(),
        );
        assert!(matches!(result, Err(EngineError::Config { .. })));
    }
}
