use crate::core::{CaseError, Result};
use crate::drafts::DEFAULT_RETENTION;
use crate::storage::{DEFAULT_CHECKPOINT_THRESHOLD, DurabilityMode};
use std::path::{Path, PathBuf};

pub const ENV_DATA_DIR: &str = "CASEKEEPER_DATA_DIR";
pub const ENV_DURABILITY: &str = "CASEKEEPER_DURABILITY";
pub const ENV_SNAPSHOT_RETENTION: &str = "CASEKEEPER_SNAPSHOT_RETENTION";
pub const ENV_CHECKPOINT_THRESHOLD: &str = "CASEKEEPER_CHECKPOINT_THRESHOLD";

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the WAL and snapshot; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,

    pub durability: DurabilityMode,

    /// Draft snapshots kept per case
    pub snapshot_retention: usize,

    /// WAL entries written before an automatic checkpoint
    pub checkpoint_threshold: usize,
}

impl StoreConfig {
    /// In-memory configuration with default limits
    pub fn new() -> Self {
        Self {
            data_dir: None,
            durability: DurabilityMode::default(),
            snapshot_retention: DEFAULT_RETENTION,
            checkpoint_threshold: DEFAULT_CHECKPOINT_THRESHOLD,
        }
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.data_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    pub fn snapshot_retention(mut self, retention: usize) -> Self {
        self.snapshot_retention = retention;
        self
    }

    pub fn checkpoint_threshold(mut self, threshold: usize) -> Self {
        self.checkpoint_threshold = threshold;
        self
    }

    pub fn is_persistent(&self) -> bool {
        self.data_dir.is_some() && self.durability != DurabilityMode::None
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            config.data_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(mode) = lookup(ENV_DURABILITY) {
            config.durability = mode.parse()?;
        }
        if let Some(value) = lookup(ENV_SNAPSHOT_RETENTION) {
            config.snapshot_retention = parse_count(ENV_SNAPSHOT_RETENTION, &value)?;
        }
        if let Some(value) = lookup(ENV_CHECKPOINT_THRESHOLD) {
            config.checkpoint_threshold = parse_count(ENV_CHECKPOINT_THRESHOLD, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.snapshot_retention == 0 {
            return Err(CaseError::Validation(
                "snapshot_retention must be > 0".to_string(),
            ));
        }
        if self.checkpoint_threshold == 0 {
            return Err(CaseError::Validation(
                "checkpoint_threshold must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| CaseError::Validation(format!("{} must be a positive integer, got '{}'", key, value)))
}
