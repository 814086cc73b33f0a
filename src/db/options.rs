//! Database options
//!
//! Loaded from a JSON file or built in code:
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/aerokv",
//!   "sync_writes": true,
//!   "detect_conflicts": true,
//!   "max_pending_writes": 100000,
//!   "log_level": "warn"
//! }
//! ```
//!
//! Only `data_dir` is required; every other field has a default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{KvError, KvResult};
use crate::observability::Severity;
use crate::txn::CommitSettings;

/// Options controlling how a database is opened and how commits behave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbOptions {
    /// Data directory; the WAL lives at `<data_dir>/wal/wal.log`
    pub data_dir: PathBuf,

    /// Keep everything in memory and write no WAL (default: false)
    #[serde(default)]
    pub in_memory: bool,

    /// fsync the WAL after every commit (default: true)
    #[serde(default = "default_true")]
    pub sync_writes: bool,

    /// Validate read-sets on commit (default: true)
    #[serde(default = "default_true")]
    pub detect_conflicts: bool,

    /// Upper bound on buffered writes per transaction (default: 100000)
    #[serde(default = "default_max_pending_writes")]
    pub max_pending_writes: usize,

    /// Minimum log severity (default: "warn")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}
fn default_max_pending_writes() -> usize {
    100_000
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl DbOptions {
    /// Options for a durable database in `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            in_memory: false,
            sync_writes: default_true(),
            detect_conflicts: default_true(),
            max_pending_writes: default_max_pending_writes(),
            log_level: default_log_level(),
        }
    }

    /// Options for a database with no WAL.
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            ..Self::new(PathBuf::new())
        }
    }

    /// Load options from a JSON file and validate them
    pub fn load(path: &Path) -> KvResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| KvError::config(format!("Failed to read config: {}", e)))?;

        let options: DbOptions = serde_json::from_str(&content)
            .map_err(|e| KvError::config(format!("Invalid config JSON: {}", e)))?;

        options.validate()?;
        Ok(options)
    }

    /// Check every field for a usable value
    pub fn validate(&self) -> KvResult<()> {
        if !self.in_memory && self.data_dir.as_os_str().is_empty() {
            return Err(KvError::config("data_dir is required unless in_memory is set"));
        }

        if self.max_pending_writes == 0 {
            return Err(KvError::config("max_pending_writes must be > 0"));
        }

        self.severity()?;
        Ok(())
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> KvResult<Severity> {
        Severity::parse(&self.log_level).ok_or_else(|| {
            KvError::config(format!(
                "Invalid log_level: '{}'. Expected trace, info, warn, error or fatal.",
                self.log_level
            ))
        })
    }

    pub fn with_in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn with_detect_conflicts(mut self, detect_conflicts: bool) -> Self {
        self.detect_conflicts = detect_conflicts;
        self
    }

    pub fn with_max_pending_writes(mut self, max_pending_writes: usize) -> Self {
        self.max_pending_writes = max_pending_writes;
        self
    }

    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }

    pub(crate) fn commit_settings(&self) -> CommitSettings {
        CommitSettings {
            detect_conflicts: self.detect_conflicts,
            sync_writes: self.sync_writes,
            max_pending_writes: self.max_pending_writes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, value: serde_json::Value) -> PathBuf {
        let path = dir.path().join("aerokv.json");
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_config_defaults() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, json!({ "data_dir": "/tmp/kv" }));

        let options = DbOptions::load(&path).unwrap();
        assert_eq!(options, DbOptions::new("/tmp/kv"));
        assert!(options.sync_writes);
        assert!(options.detect_conflicts);
        assert_eq!(options.max_pending_writes, 100_000);
        assert_eq!(options.severity().unwrap(), Severity::Warn);
    }

    #[test]
    fn test_config_rejects_zero_pending_writes() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            json!({ "data_dir": "/tmp/kv", "max_pending_writes": 0 }),
        );
        let err = DbOptions::load(&path).unwrap_err();
        assert_eq!(err.code(), "AERO_CONFIG_INVALID");
    }

    #[test]
    fn test_config_rejects_unknown_log_level() {
        let options = DbOptions::new("/tmp/kv").with_log_level("verbose");
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_config_requires_data_dir() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, json!({ "sync_writes": false }));
        assert!(DbOptions::load(&path).is_err());

        assert!(DbOptions::new("").validate().is_err());
        assert!(DbOptions::in_memory().validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let options = DbOptions::new("/tmp/kv")
            .with_sync_writes(false)
            .with_detect_conflicts(false)
            .with_max_pending_writes(7);
        let settings = options.commit_settings();
        assert!(!settings.sync_writes);
        assert!(!settings.detect_conflicts);
        assert_eq!(settings.max_pending_writes, 7);
    }
}
