//! Error types used throughout the application

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Granularity;

/// Main error type for Communauté
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CommunauteError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A collaborator (Matomo, Nexus) was unreachable or answered with an
    /// error.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Attempted to move a watermark backwards or sideways.
    ///
    /// Never expected with a single writer. Callers must treat it as fatal.
    #[error(
        "Watermark regression for {subject_key}/{granularity}: current {current}, attempted {attempted}"
    )]
    WatermarkRegression {
        subject_key: String,
        granularity: Granularity,
        current: NaiveDate,
        attempted: NaiveDate,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommunauteError {
    /// True for invariant violations that must never be swallowed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::WatermarkRegression { .. })
    }
}

/// Result type alias for Communauté operations
pub type Result<T> = std::result::Result<T, CommunauteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_regressions_are_fatal() {
        let regression = CommunauteError::WatermarkRegression {
            subject_key: "matomo".into(),
            granularity: Granularity::Day,
            current: NaiveDate::from_ymd_opt(2025, 10, 30).unwrap(),
            attempted: NaiveDate::from_ymd_opt(2025, 10, 29).unwrap(),
        };
        assert!(regression.is_fatal());
        assert!(!CommunauteError::ExternalService("matomo down".into()).is_fatal());
        assert!(regression.to_string().contains("matomo/day"));
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(CommunauteError::NotFound("user 4".into())).unwrap();
        assert_eq!(json["type"], "NotFound");
        assert_eq!(json["message"], "user 4");
    }
}
