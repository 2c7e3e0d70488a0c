//! Storage configuration

use std::path::PathBuf;
use std::time::Duration;

use super::error::{StorageError, StorageResult};

/// Connection pool settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub pool_size: u32,
    pub connection_timeout: Duration,
    pub busy_timeout: Duration,
    pub enable_wal: bool,
    pub enable_foreign_keys: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("communaute.db"),
            pool_size: 4,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_millis(5000),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl StorageConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.pool_size == 0 {
            return Err(StorageError::InvalidConfig("pool_size must be greater than 0".into()));
        }
        if self.connection_timeout.is_zero() {
            return Err(StorageError::InvalidConfig("connection_timeout must be non-zero".into()));
        }
        Ok(())
    }
}
