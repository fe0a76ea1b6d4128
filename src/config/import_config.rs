// ==========================================
// BOQ Import Engine - Import Run Configuration
// ==========================================
// Scope: chunking, worker pool, tolerances, consistency thresholds
// Lifetime: immutable for the whole run (snapshot via Arc)
// ==========================================

use crate::domain::types::CanonicalField;
use crate::importer::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Chunk size bounds
pub const MIN_CHUNK_SIZE: usize = 1;
pub const MAX_CHUNK_SIZE: usize = 10_000;

/// Worker cap when sizing from CPU count
pub const MAX_DEFAULT_WORKERS: usize = 8;

// ==========================================
// ImportConfig
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportConfig {
    /// Rows per chunk (default 500, clamped to 1..=10_000)
    pub chunk_size: usize,

    /// Parallel chunk workers (default: CPU count, at most 8)
    pub max_workers: usize,

    /// Per-chunk timeout in milliseconds (default 30_000)
    pub chunk_timeout_ms: u64,

    /// Bounded result channel between workers and the aggregator (default 16)
    pub channel_capacity: usize,

    /// Absolute total-price tolerance (default 0.01)
    pub total_abs_tolerance: f64,

    /// Relative total-price tolerance, fraction of quantity × unitPrice (default 0.001)
    pub total_rel_tolerance: f64,

    /// Item total above this multiple of the batch median is flagged (default 10)
    pub outlier_multiplier: f64,

    /// Minimum priced items before the outlier check runs (default 3)
    pub outlier_min_items: usize,

    /// Allowed categories; empty disables the check (default empty)
    pub allowed_categories: Vec<String>,

    /// Strict mode additionally requires `unit` (default false)
    pub strict_validation: bool,

    /// Maximum text lengths per field
    pub max_lengths: BTreeMap<CanonicalField, usize>,

    /// Catalog match confidence needed for `mapped` (default 0.8)
    pub min_mapping_confidence: f64,

    /// Deadline for one catalog lookup in milliseconds (default 5_000)
    pub catalog_timeout_ms: u64,

    /// Catalog lookups in flight per chunk (default 16)
    pub catalog_concurrency: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            max_workers: default_worker_count(),
            chunk_timeout_ms: 30_000,
            channel_capacity: 16,
            total_abs_tolerance: 0.01,
            total_rel_tolerance: 0.001,
            outlier_multiplier: 10.0,
            outlier_min_items: 3,
            allowed_categories: Vec::new(),
            strict_validation: false,
            max_lengths: default_max_lengths(),
            min_mapping_confidence: 0.8,
            catalog_timeout_ms: 5_000,
            catalog_concurrency: 16,
        }
    }
}

impl ImportConfig {
    /// Chunk size after clamping
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
    }

    /// Worker count, never zero
    pub fn effective_workers(&self) -> usize {
        self.max_workers.max(1)
    }

    /// Allowed tolerance for a given expected total
    pub fn total_tolerance(&self, expected: f64) -> f64 {
        self.total_abs_tolerance
            .max(self.total_rel_tolerance * expected.abs())
    }

    /// Max length for a text field, if limited
    pub fn max_length(&self, field: CanonicalField) -> Option<usize> {
        self.max_lengths.get(&field).copied()
    }

    /// Case-insensitive category membership; empty set allows everything
    pub fn is_category_allowed(&self, category: &str) -> bool {
        if self.allowed_categories.is_empty() {
            return true;
        }
        let needle = category.trim().to_lowercase();
        self.allowed_categories
            .iter()
            .any(|c| c.trim().to_lowercase() == needle)
    }

    /// Reject settings that would make the run meaningless
    pub fn validate(&self) -> EngineResult<()> {
        if self.chunk_timeout_ms == 0 {
            return Err(config_error("chunkTimeoutMs", "must be greater than 0"));
        }
        if self.catalog_timeout_ms == 0 {
            return Err(config_error("catalogTimeoutMs", "must be greater than 0"));
        }
        if self.catalog_concurrency == 0 {
            return Err(config_error("catalogConcurrency", "must be greater than 0"));
        }
        if self.channel_capacity == 0 {
            return Err(config_error("channelCapacity", "must be greater than 0"));
        }
        if !is_non_negative(self.total_abs_tolerance) {
            return Err(config_error("totalAbsTolerance", "must be >= 0"));
        }
        if !is_non_negative(self.total_rel_tolerance) {
            return Err(config_error("totalRelTolerance", "must be >= 0"));
        }
        if !self.outlier_multiplier.is_finite() || self.outlier_multiplier <= 1.0 {
            return Err(config_error("outlierMultiplier", "must be greater than 1"));
        }
        if !(0.0..=1.0).contains(&self.min_mapping_confidence) {
            return Err(config_error("minMappingConfidence", "must be within [0, 1]"));
        }
        for (field, limit) in &self.max_lengths {
            if *limit == 0 {
                return Err(config_error(
                    "maxLengths",
                    &format!("limit for {} must be greater than 0", field),
                ));
            }
        }
        Ok(())
    }
}

fn is_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn config_error(key: &str, message: &str) -> EngineError {
    EngineError::Config {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// CPU count capped at MAX_DEFAULT_WORKERS
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_WORKERS)
}

/// Text length limits carried over from the procurement item schema
pub fn default_max_lengths() -> BTreeMap<CanonicalField, usize> {
    let mut limits = BTreeMap::new();
    limits.insert(CanonicalField::ItemCode, 100);
    limits.insert(CanonicalField::Description, 500);
    limits.insert(CanonicalField::Unit, 20);
    limits.insert(CanonicalField::Category, 100);
    limits.insert(CanonicalField::Subcategory, 100);
    limits.insert(CanonicalField::Phase, 100);
    limits.insert(CanonicalField::Task, 100);
    limits.insert(CanonicalField::Site, 100);
    limits.insert(CanonicalField::Vendor, 100);
    limits.insert(CanonicalField::Remarks, 1000);
    limits
}
