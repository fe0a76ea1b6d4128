// ==========================================
// BOQ Import Engine - Catalog Mapping Status
// ==========================================
// Scope: annotate accepted items with the external matcher's verdict
// The engine never matches products itself; it only records status
// ==========================================

use crate::config::import_config::ImportConfig;
use crate::domain::boq::{ImportWarning, ParsedItem};
use crate::domain::types::{IssueKind, MappingStatus};
use crate::importer::boq_importer_trait::CatalogMatcher;
use crate::importer::error::{EngineError, EngineResult};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ==========================================
// CatalogMatch - matcher answer
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMatch {
    pub catalog_item_id: String,
    pub confidence: f64,
}

impl CatalogMatch {
    pub fn new(catalog_item_id: impl Into<String>, confidence: f64) -> Self {
        Self {
            catalog_item_id: catalog_item_id.into(),
            confidence,
        }
    }
}

// ==========================================
// CatalogPolicy - lookup limits for one run
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogPolicy {
    /// Confidence needed for `mapped`
    pub min_confidence: f64,
    /// Per-lookup deadline; an elapsed lookup counts as a failure
    pub lookup_timeout: Duration,
    /// Lookups in flight per chunk
    pub max_concurrent: usize,
}

impl CatalogPolicy {
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            min_confidence: config.min_mapping_confidence,
            lookup_timeout: Duration::from_millis(config.catalog_timeout_ms),
            max_concurrent: config.catalog_concurrency.max(1),
        }
    }
}

impl Default for CatalogPolicy {
    fn default() -> Self {
        Self::from_config(&ImportConfig::default())
    }
}

async fn lookup(
    matcher: &dyn CatalogMatcher,
    item: &ParsedItem,
    deadline: Duration,
) -> EngineResult<Option<CatalogMatch>> {
    match tokio::time::timeout(deadline, matcher.best_match(item)).await {
        Ok(found) => found,
        Err(_) => Err(EngineError::Catalog(format!(
            "lookup timed out after {} ms",
            deadline.as_millis()
        ))),
    }
}

/// Look up every item (bounded concurrency, input order kept) and set its mapping status
///
/// - confidence ≥ `min_confidence` → mapped
/// - weaker candidate → exception + warning
/// - no candidate → unmapped
/// - lookup failure or timeout → stays pending + warning
pub async fn apply_catalog_matches(
    matcher: &dyn CatalogMatcher,
    items: &mut [ParsedItem],
    policy: &CatalogPolicy,
) -> Vec<ImportWarning> {
    let min_confidence = policy.min_confidence;
    let pending: Vec<_> = items
        .iter()
        .map(|item| lookup(matcher, item, policy.lookup_timeout))
        .collect();
    let lookups: Vec<EngineResult<Option<CatalogMatch>>> = stream::iter(pending)
        .buffered(policy.max_concurrent.max(1))
        .collect()
        .await;

    let mut warnings = Vec::new();
    for (item, lookup) in items.iter_mut().zip(lookups) {
        match lookup {
            Ok(Some(found)) if found.confidence >= min_confidence => {
                item.mapping_status = MappingStatus::Mapped;
                item.catalog_item_id = Some(found.catalog_item_id);
                item.mapping_confidence = Some(found.confidence);
            }
            Ok(Some(found)) => {
                warnings.push(ImportWarning::new(
                    item.source_row,
                    "mappingStatus",
                    format!(
                        "catalog candidate {} below confidence threshold ({:.2} < {:.2}), needs review",
                        found.catalog_item_id, found.confidence, min_confidence
                    ),
                    IssueKind::Catalog,
                ));
                item.mapping_status = MappingStatus::Exception;
                item.catalog_item_id = Some(found.catalog_item_id);
                item.mapping_confidence = Some(found.confidence);
            }
            Ok(None) => item.mapping_status = MappingStatus::Unmapped,
            Err(e) => {
                tracing::warn!(row = item.source_row, error = %e, "catalog lookup failed");
                item.mapping_status = MappingStatus::Pending;
                warnings.push(ImportWarning::new(
                    item.source_row,
                    "mappingStatus",
                    match e {
                        EngineError::Catalog(_) => e.to_string(),
                        other => format!("catalog lookup failed: {}", other),
                    },
                    IssueKind::Catalog,
                ));
            }
        }
    }
    warnings
}

// ==========================================
// StaticCatalogMatcher - in-memory lookup table
// ==========================================
// Keyed by item code (case-insensitive), falling back to description
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogMatcher {
    entries: HashMap<String, CatalogMatch>,
}

impl StaticCatalogMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, found: CatalogMatch) -> Self {
        self.entries.insert(key.trim().to_lowercase(), found);
        self
    }
}

#[async_trait]
impl CatalogMatcher for StaticCatalogMatcher {
    async fn best_match(&self, item: &ParsedItem) -> EngineResult<Option<CatalogMatch>> {
        let key = item
            .item_code
            .as_deref()
            .unwrap_or(&item.description)
            .trim()
            .to_lowercase();
        Ok(self.entries.get(&key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingMatcher;

    #[async_trait]
    impl CatalogMatcher for FailingMatcher {
        async fn best_match(&self, _item: &ParsedItem) -> EngineResult<Option<CatalogMatch>> {
            Err(EngineError::Catalog("catalog offline".to_string()))
        }
    }

    fn items() -> Vec<ParsedItem> {
        vec![
            ParsedItem::new("Fibre cable", 1.0).with_item_code("FC-24"),
            ParsedItem::new("Closure", 1.0).with_item_code("CL-1"),
            ParsedItem::new("Pole 7m", 1.0),
        ]
    }

    #[tokio::test]
    async fn test_statuses_from_confidence() {
        let matcher = StaticCatalogMatcher::new()
            .with_entry("fc-24", CatalogMatch::new("CAT-1", 0.95))
            .with_entry("CL-1", CatalogMatch::new("CAT-2", 0.4));

        let mut items = items();
        let warnings = apply_catalog_matches(&matcher, &mut items, &CatalogPolicy::default()).await;

        assert_eq!(items[0].mapping_status, MappingStatus::Mapped);
        assert_eq!(items[0].catalog_item_id.as_deref(), Some("CAT-1"));
        assert_eq!(items[1].mapping_status, MappingStatus::Exception);
        assert_eq!(items[2].mapping_status, MappingStatus::Unmapped);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, IssueKind::Catalog);
    }

    #[tokio::test]
    async fn test_lookup_failure_keeps_pending() {
        let mut items = items();
        let warnings = apply_catalog_matches(&FailingMatcher, &mut items, &CatalogPolicy::default()).await;

        assert!(items.iter().all(|i| i.mapping_status == MappingStatus::Pending));
        assert_eq!(warnings.len(), 3);
    }

    struct SlowMatcher {
        delay: Duration,
        in_flight: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl CatalogMatcher for SlowMatcher {
        async fn best_match(&self, item: &ParsedItem) -> EngineResult<Option<CatalogMatch>> {
            use std::sync::atomic::Ordering;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(CatalogMatch::new(item.description.clone(), 1.0)))
        }
    }

    fn slow(delay_ms: u64) -> SlowMatcher {
        SlowMatcher {
            delay: Duration::from_millis(delay_ms),
            in_flight: Default::default(),
            peak: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_lookup_timeout_keeps_pending_with_warning() {
        let policy = CatalogPolicy {
            lookup_timeout: Duration::from_millis(20),
            ..CatalogPolicy::default()
        };
        let mut items = items();
        let warnings = apply_catalog_matches(&slow(500), &mut items, &policy).await;

        assert!(items.iter().all(|i| i.mapping_status == MappingStatus::Pending));
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().all(|w| w.message.contains("timed out")));
    }

    #[tokio::test]
    async fn test_lookups_bounded_and_order_kept() {
        let matcher = slow(10);
        let policy = CatalogPolicy {
            max_concurrent: 2,
            ..CatalogPolicy::default()
        };
        let mut items: Vec<ParsedItem> = (0..9).map(|i| ParsedItem::new(format!("D{}", i), 1.0)).collect();
        let warnings = apply_catalog_matches(&matcher, &mut items, &policy).await;

        assert!(warnings.is_empty());
        assert!(matcher.peak.load(std::sync::atomic::Ordering::SeqCst) <= 2);
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item.catalog_item_id.as_deref(), Some(format!("D{}", i).as_str()));
        }
    }
}
