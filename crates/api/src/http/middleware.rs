//! Request middleware: session resolution and Nexus auto login

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use communaute_core::AutoLoginRequest;
use tracing::debug;

use super::routes::found;
use super::session::{cleared_session_cookie, session_id, CurrentSession};
use crate::context::AppContext;

/// Attach the [`CurrentSession`] of the `sessionid` cookie to the request.
///
/// Sessions pointing at a deleted or inactive member are terminated.
pub async fn session_middleware(
    State(ctx): State<Arc<AppContext>>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie = session_id(request.headers());
    if let Some(session) = resolve_session(&ctx, cookie).await {
        request.extensions_mut().insert(session);
    }
    next.run(request).await
}

async fn resolve_session(ctx: &AppContext, cookie: Option<String>) -> Option<CurrentSession> {
    let id = cookie?;
    let user_id = ctx.sessions.user_id(&id)?;

    match ctx.users.get(user_id).await {
        Ok(Some(user)) if user.is_active => Some(CurrentSession { id, user }),
        Ok(_) => {
            debug!(user_id, "session user is gone or inactive, dropping session");
            ctx.sessions.remove(&id);
            None
        }
        Err(err) => {
            debug!(user_id, error = %err, "session user lookup failed");
            None
        }
    }
}

/// Consume `auto_login` query parameters before routing.
///
/// Requests without the parameter pass through untouched. Otherwise the
/// request always ends in exactly one redirect: back to the stripped URL or
/// on to the identity provider, terminating the current session first when
/// it belongs to someone else.
pub async fn auto_login_middleware(
    State(ctx): State<Arc<AppContext>>,
    request: Request,
    next: Next,
) -> Response {
    let login_request = AutoLoginRequest::new(request.uri().path(), request.uri().query());
    let session = request.extensions().get::<CurrentSession>().cloned();

    let decision = ctx.auto_login.evaluate(&login_request, session.as_ref().map(|s| &s.user)).await;
    let Some(location) = decision.redirect_to else {
        return next.run(request).await;
    };

    let mut response = found(&location);
    if decision.logout {
        if let Some(session) = session {
            ctx.sessions.remove(&session.id);
        }
        if let Ok(cookie) = cleared_session_cookie().parse() {
            response.headers_mut().append(axum::http::header::SET_COOKIE, cookie);
        }
    }
    response
}
