// ==========================================
// BOQ Import Engine - Comparison Layer
// ==========================================
// Scope: baseline vs. actual item sets → variance report
// Independent entry point; works on already-produced item sets
// (in memory, or JSON files via item_source)
// ==========================================

pub mod item_source;
pub mod variance_analyzer;

pub use item_source::{decode_items, load_items};
pub use variance_analyzer::{compare_versions, compare_versions_with, VarianceAnalyzer};
