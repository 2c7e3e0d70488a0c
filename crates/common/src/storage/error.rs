//! Storage errors

use thiserror::Error;

use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<r2d2::Error> for StorageError {
    fn from(err: r2d2::Error) -> Self {
        Self::PoolExhausted(err.to_string())
    }
}

impl From<StorageError> for CommonError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidConfig(message) => CommonError::config_field("storage", message),
            other => CommonError::storage("sqlite", other.to_string()),
        }
    }
}

impl ErrorClassification for StorageError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::PoolExhausted(_) => true,
            Self::Query(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        if self.is_retryable() {
            ErrorSeverity::Warning
        } else {
            ErrorSeverity::Error
        }
    }
}
