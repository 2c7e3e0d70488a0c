//! HTTP surface
//!
//! Sessions are resolved first, then `auto_login` parameters are consumed,
//! then the request is routed. Both middlewares also wrap the fallback so
//! auto login applies to every path.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod session;

use std::future::Future;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

pub use error::ApiError;
pub use middleware::{auto_login_middleware, session_middleware};
pub use session::{CurrentSession, SessionStore};

use crate::context::AppContext;

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/nexus/auto-login", get(routes::issue_auto_login))
        .fallback(routes::not_found)
        .layer(axum::middleware::from_fn_with_state(Arc::clone(&ctx), auto_login_middleware))
        .layer(axum::middleware::from_fn_with_state(Arc::clone(&ctx), session_middleware))
        .with_state(ctx)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(ctx: Arc<AppContext>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(&ctx.config.server.bind_address).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(ctx)).with_graceful_shutdown(shutdown).await
}
