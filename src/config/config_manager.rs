// ==========================================
// BOQ Import Engine - Configuration Manager
// ==========================================
// Scope: layered loading (defaults ← JSON file ← environment),
//        run snapshots, column mapping files
// Lifetime: a run receives an immutable snapshot; no hot reload mid-run
// ==========================================

use crate::config::column_mapping::ColumnMapping;
use crate::config::import_config::ImportConfig;
use crate::importer::error::{EngineError, EngineResult};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

// ==========================================
// ConfigManager
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    config: ImportConfig,
}

impl ConfigManager {
    /// Built-in defaults only
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already-built configuration
    pub fn from_config(config: ImportConfig) -> Self {
        Self { config }
    }

    /// Full layering: defaults ← optional JSON file ← BOQ_IMPORT_* variables
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        let mut manager = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::new(),
        };
        manager.apply_env()?;
        manager.config.validate()?;
        Ok(manager)
    }

    /// Read a (partial) JSON configuration file
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        if !path.exists() {
            return Err(EngineError::SourceNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config: ImportConfig = serde_json::from_str(&raw)?;

        tracing::debug!(path = %path.display(), "configuration file loaded");
        Ok(Self { config })
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> EngineResult<()> {
        let pairs = config_keys::ENV_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (*key, value)));
        self.apply_overrides(pairs)
    }

    /// Apply `(key, value)` overrides; unknown keys are ignored
    pub fn apply_overrides<K, V, I>(&mut self, overrides: I) -> EngineResult<()>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in overrides {
            let key = key.as_ref();
            let value = value.as_ref().trim();

            match key {
                config_keys::CHUNK_SIZE => self.config.chunk_size = parse_value(key, value)?,
                config_keys::MAX_WORKERS => self.config.max_workers = parse_value(key, value)?,
                config_keys::CHUNK_TIMEOUT_MS => {
                    self.config.chunk_timeout_ms = parse_value(key, value)?
                }
                config_keys::STRICT => self.config.strict_validation = parse_flag(key, value)?,
                _ => {
                    tracing::debug!(config_key = key, "unknown configuration key ignored");
                    continue;
                }
            }
            tracing::debug!(config_key = key, value = value, "configuration override applied");
        }
        Ok(())
    }

    /// Current configuration (mutable view for programmatic callers)
    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ImportConfig {
        &mut self.config
    }

    /// Immutable snapshot handed to one run
    pub fn snapshot(&self) -> Arc<ImportConfig> {
        Arc::new(self.config.clone())
    }

    /// Snapshot serialised for audit records
    pub fn config_snapshot_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(&self.config)?)
    }
}

/// Read and check a column mapping JSON file
pub fn load_column_mapping(path: &Path) -> EngineResult<ColumnMapping> {
    if !path.exists() {
        return Err(EngineError::SourceNotFound(path.display().to_string()));
    }
    let raw = std::fs::read_to_string(path)?;
    let mapping: ColumnMapping = serde_json::from_str(&raw)?;
    mapping.validate()?;
    Ok(mapping)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> EngineResult<T> {
    value.parse::<T>().map_err(|_| EngineError::Config {
        key: key.to_string(),
        message: format!("cannot parse value '{}'", value),
    })
}

fn parse_flag(key: &str, value: &str) -> EngineResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EngineError::Config {
            key: key.to_string(),
            message: format!("expected a boolean, got '{}'", value),
        }),
    }
}

// ==========================================
// Configuration keys (environment overrides)
// ==========================================
pub mod config_keys {
    pub const CHUNK_SIZE: &str = "BOQ_IMPORT_CHUNK_SIZE";
    pub const MAX_WORKERS: &str = "BOQ_IMPORT_MAX_WORKERS";
    pub const CHUNK_TIMEOUT_MS: &str = "BOQ_IMPORT_CHUNK_TIMEOUT_MS";
    pub const STRICT: &str = "BOQ_IMPORT_STRICT";

    pub const ENV_KEYS: [&str; 4] = [CHUNK_SIZE, MAX_WORKERS, CHUNK_TIMEOUT_MS, STRICT];
}
