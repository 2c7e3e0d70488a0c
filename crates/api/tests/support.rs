#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use chrono::{TimeZone, Utc};
use communaute_api::http::router;
use communaute_api::http::session::session_cookie;
use communaute_api::AppContext;
use communaute_common::time::MockClock;
use communaute_domain::{Config, DatabaseConfig, NewUser, User};
use tempfile::TempDir;
use tower::ServiceExt;

pub const AUTO_LOGIN_KEY: &str = "integration-auto-login-key-0123456789";
pub const NEXUS_HOST: &str = "nexus.example.org";

/// Application context over a fresh database in a temporary directory.
pub struct TestApp {
    pub ctx: Arc<AppContext>,
    pub clock: MockClock,
    _temp_dir: TempDir,
}

/// Config with auto login enabled and Nexus sync / Matomo left unset.
pub fn base_config(temp_dir: &TempDir) -> Config {
    let mut config = Config {
        database: DatabaseConfig {
            path: temp_dir.path().join("communaute.db").to_string_lossy().to_string(),
            pool_size: 4,
        },
        ..Config::default()
    };
    config.nexus.allowed_redirect_hosts = vec![NEXUS_HOST.to_string()];
    config.nexus.auto_login_key = Some(AUTO_LOGIN_KEY.to_string());
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temporary directory");
        let mut config = base_config(&temp_dir);
        customize(&mut config);

        let clock = MockClock::at(Utc.with_ymd_and_hms(2025, 11, 2, 9, 0, 0).unwrap());
        let ctx = AppContext::with_clock(config, Arc::new(clock.clone()))
            .expect("failed to build application context");

        Self { ctx: Arc::new(ctx), clock, _temp_dir: temp_dir }
    }

    pub async fn member(&self, username: &str, email: &str) -> User {
        self.ctx.users.create(NewUser::new(username, email)).await.expect("failed to create member")
    }

    /// Open a session for `user` and return the matching `Cookie` header.
    pub fn login(&self, user: &User) -> (String, String) {
        let id = self.ctx.sessions.create(user.id);
        let cookie = session_cookie(&id).split(';').next().unwrap_or_default().to_string();
        (id, cookie)
    }

    pub fn token_for(&self, email: &str) -> String {
        self.ctx.token_codec.as_ref().expect("auto login is disabled").issue(email).unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        router(Arc::clone(&self.ctx)).oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
    }
}

pub fn location(response: &Response<Body>) -> &str {
    response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).unwrap_or_default()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}
