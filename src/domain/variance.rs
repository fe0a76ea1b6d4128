// ==========================================
// BOQ Import Engine - Variance Model
// ==========================================
// Scope: inputs/outputs of baseline vs. actual comparison
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// CompareOptions - comparison switches
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompareOptions {
    /// Match keys ignoring letter case (default: false)
    pub case_insensitive_keys: bool,
    /// Trim surrounding whitespace from keys (default: true)
    pub trim_keys: bool,
    /// Keep matched keys with zero variance in `itemVariances` (default: true)
    pub include_unchanged: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            case_insensitive_keys: false,
            trim_keys: true,
            include_unchanged: true,
        }
    }
}

// ==========================================
// VarianceEntry - one matched key
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VarianceEntry {
    pub item_code: Option<String>,
    pub description: String,
    pub quantity_variance: f64,
    pub price_variance: f64,
    pub total_variance: f64,
}

impl VarianceEntry {
    pub fn is_zero(&self) -> bool {
        self.quantity_variance == 0.0 && self.price_variance == 0.0 && self.total_variance == 0.0
    }
}

// ==========================================
// VarianceReport - aggregate comparison result
// ==========================================
// Added/removed keys are counted only; they carry no per-item row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VarianceReport {
    pub total_variance: f64,
    pub quantity_variance: f64,
    pub price_variance: f64,
    pub variance_percentage: f64,
    pub item_variances: Vec<VarianceEntry>,

    pub baseline_total: f64,
    pub actual_total: f64,
    pub items_matched: usize,
    pub items_added: usize,
    pub items_removed: usize,
    pub added_keys: Vec<String>,
    pub removed_keys: Vec<String>,
}
