use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use communaute_domain::CommunauteError;
use tracing::error;

/// Handler error rendered as a JSON body.
#[derive(Debug)]
pub struct ApiError(pub CommunauteError);

impl From<CommunauteError> for ApiError {
    fn from(err: CommunauteError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CommunauteError::NotFound(_) => StatusCode::NOT_FOUND,
            CommunauteError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CommunauteError::Auth(_) => StatusCode::UNAUTHORIZED,
            CommunauteError::Network(_) | CommunauteError::ExternalService(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_errors_to_status_codes() {
        let not_found = ApiError(CommunauteError::NotFound("x".into())).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let internal = ApiError(CommunauteError::Internal("boom".into())).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let upstream = ApiError(CommunauteError::ExternalService("nexus".into())).into_response();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
    }
}
