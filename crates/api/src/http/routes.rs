//! Route handlers

use std::sync::Arc;

use axum::extract::{OriginalUri, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use communaute_domain::constants::AUTO_LOGIN_PARAM;
use communaute_domain::CommunauteError;
use tracing::{info, warn};
use url::{form_urlencoded, Url};

use super::error::ApiError;
use super::session::CurrentSession;
use crate::context::AppContext;

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

pub async fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Response {
    let report = ctx.health().await;
    let status = if report.is_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report)).into_response()
}

/// `GET /nexus/auto-login?next_url=...`
///
/// Sends the signed-in member to an allowed Nexus host with a fresh
/// `auto_login` token appended to `next_url`.
pub async fn issue_auto_login(
    State(ctx): State<Arc<AppContext>>,
    OriginalUri(uri): OriginalUri,
    session: Option<Extension<CurrentSession>>,
) -> Result<Response, ApiError> {
    let Some(Extension(session)) = session else {
        let current =
            uri.path_and_query().map_or_else(|| uri.path().to_string(), |pq| pq.to_string());
        return Ok(found(&login_url(&ctx.config.server.login_path, &current)));
    };

    let next_url = uri.query().and_then(|query| {
        form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key == "next_url")
            .map(|(_, value)| value.into_owned())
            .last()
    });
    let Some(next_url) = next_url else {
        return Ok(not_found().await);
    };

    let Some(mut target) = Url::parse(&next_url).ok().filter(|url| {
        url.host_str().is_some_and(|host| ctx.config.nexus.is_allowed_redirect_host(host))
    }) else {
        warn!(next_url = %next_url, "Nexus auto login: redirect host not allowed");
        return Ok(not_found().await);
    };

    let Some(codec) = ctx.token_codec.as_ref() else {
        return Ok(not_found().await);
    };

    let token = codec
        .issue(&session.user.email)
        .map_err(|err| CommunauteError::Internal(err.to_string()))?;
    target.query_pairs_mut().append_pair(AUTO_LOGIN_PARAM, &token);

    info!(
        user_id = session.user.id,
        host = target.host_str().unwrap_or_default(),
        "Nexus auto login: token issued"
    );
    Ok(found(target.as_str()))
}

fn login_url(login_path: &str, next: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new()).append_pair("next", next).finish();
    format!("{login_path}?{query}")
}
