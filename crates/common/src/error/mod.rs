//! Common error types and classification shared by every layer
//!
//! Module-specific errors compose with [`CommonError`] and implement
//! [`ErrorClassification`] so retry and alerting decisions stay uniform:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum NexusError {
//!     #[error("Unexpected payload: {0}")]
//!     Payload(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that appear across several modules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    #[error("Configuration error: {message}")]
    Config { message: String, field: Option<String> },

    #[error("Serialization error ({format}): {message}")]
    Serialization { message: String, format: String },

    #[error("Storage error during {operation}: {message}")]
    Storage { message: String, operation: String },

    #[error("Backend '{service}' failed: {message}")]
    Backend { service: String, message: String, is_retryable: bool },

    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    #[error("Cryptographic failure: {0}")]
    Crypto(String),

    #[error("{resource_type} not found")]
    NotFound { resource_type: String, identifier: Option<String> },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommonError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    pub fn config_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    pub fn serialization(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), format: format.into() }
    }

    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage { message: message.into(), operation: operation.into() }
    }

    pub fn backend(
        service: impl Into<String>,
        message: impl Into<String>,
        is_retryable: bool,
    ) -> Self {
        Self::Backend { service: service.into(), message: message.into(), is_retryable }
    }

    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Result alias for [`CommonError`]
pub type CommonResult<T> = Result<T, CommonError>;

/// Uniform classification used for retry and alerting decisions.
pub trait ErrorClassification {
    /// Transient failures that may succeed when attempted again.
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    /// Data integrity or invariant violations.
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        })
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Backend { is_retryable, .. } => *is_retryable,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound { .. } => ErrorSeverity::Info,
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Backend { is_retryable: true, .. } => ErrorSeverity::Warning,
            Self::Crypto(_) | Self::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_backend_is_a_warning() {
        let err = CommonError::backend("nexus", "502 Bad Gateway", true);
        assert!(err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert!(!err.is_critical());
    }

    #[test]
    fn crypto_failures_are_critical() {
        let err = CommonError::crypto("tag mismatch");
        assert!(!err.is_retryable());
        assert!(err.is_critical());
        assert_eq!(err.to_string(), "Cryptographic failure: tag mismatch");
    }

    #[test]
    fn timeouts_are_retryable() {
        let err = CommonError::Timeout {
            operation: "matomo fetch".into(),
            duration: Duration::from_secs(30),
        };
        assert!(err.is_retryable());
        assert_eq!(err.severity().to_string(), "warning");
    }
}
