//! Conversions from external infrastructure errors into domain errors.

use communaute_common::storage::StorageError;
use communaute_common::ErrorClassification;
use communaute_domain::CommunauteError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use tokio::task::JoinError;
use tracing::warn;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CommunauteError);

impl From<InfraError> for CommunauteError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CommunauteError> for InfraError {
    fn from(value: CommunauteError) -> Self {
        InfraError(value)
    }
}

trait IntoCommunauteError {
    fn into_communaute(self) -> CommunauteError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CommunauteError */
/* -------------------------------------------------------------------------- */

impl IntoCommunauteError for SqlError {
    fn into_communaute(self) -> CommunauteError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        CommunauteError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        CommunauteError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        CommunauteError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        CommunauteError::Database("foreign key constraint violation".into())
                    }
                    _ => CommunauteError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                CommunauteError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                CommunauteError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CommunauteError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidParameterName(parameter_name) => {
                CommunauteError::Database(format!("invalid parameter name: {parameter_name}"))
            }
            RE::InvalidPath(path) => CommunauteError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => CommunauteError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_communaute())
    }
}

/* -------------------------------------------------------------------------- */
/* StorageError → CommunauteError */
/* -------------------------------------------------------------------------- */

impl From<StorageError> for InfraError {
    fn from(value: StorageError) -> Self {
        if value.is_retryable() {
            warn!(severity = %value.severity(), error = %value, "transient storage failure");
        }
        match value {
            StorageError::Query(err) => InfraError::from(err),
            StorageError::InvalidConfig(message) => InfraError(CommunauteError::Config(message)),
            other => InfraError(CommunauteError::Database(other.to_string())),
        }
    }
}

/// Shorthand for `map_err` on pool checkouts and queries.
pub fn map_storage_error(err: impl Into<StorageError>) -> CommunauteError {
    InfraError::from(err.into()).into()
}

/// A blocking database task panicked or was cancelled.
pub fn map_join_error(err: JoinError) -> CommunauteError {
    if err.is_cancelled() {
        CommunauteError::Internal("database task cancelled".into())
    } else {
        CommunauteError::Internal(format!("database task panicked: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CommunauteError */
/* -------------------------------------------------------------------------- */

impl IntoCommunauteError for HttpError {
    fn into_communaute(self) -> CommunauteError {
        if self.is_timeout() {
            return CommunauteError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return CommunauteError::Network("HTTP connection failure".into());
        }

        if self.is_decode() {
            return CommunauteError::ExternalService(format!("unexpected response body: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => CommunauteError::Auth(message),
                404 => CommunauteError::NotFound(message),
                400..=499 => CommunauteError::InvalidInput(message),
                _ => CommunauteError::ExternalService(message),
            };
        }

        CommunauteError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_communaute())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: CommunauteError = InfraError::from(err).into();
        match mapped {
            CommunauteError::Database(msg) => {
                assert!(msg.contains("busy") || msg.contains("locked"));
            }
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[test]
    fn unique_violation_is_reported() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::ConstraintViolation, extended_code: 2067 },
            None,
        );
        let mapped: CommunauteError = InfraError::from(err).into();
        assert_eq!(mapped, CommunauteError::Database("unique constraint violation".into()));
    }

    #[test]
    fn pool_exhaustion_maps_to_database_error() {
        let mapped = map_storage_error(StorageError::PoolExhausted("timed out".into()));
        assert!(matches!(mapped, CommunauteError::Database(msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn http_status_401_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::UNAUTHORIZED))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: CommunauteError = InfraError::from(error).into();
        match mapped {
            CommunauteError::Auth(msg) => assert!(msg.contains("401")),
            other => panic!("expected auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn http_status_503_maps_to_external_service() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: CommunauteError = InfraError::from(error).into();
        assert!(matches!(mapped, CommunauteError::ExternalService(msg) if msg.contains("503")));
    }
}
