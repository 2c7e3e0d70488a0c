//! Per-request auto-login state machine
//!
//! Entered for every request; only acts when the `auto_login` query
//! parameter is present. Each terminal state issues exactly one redirect
//! and the outgoing URL never carries the token.

use std::sync::Arc;

use communaute_domain::constants::AUTO_LOGIN_PARAM;
use communaute_domain::User;
use tracing::{info, warn};
use url::form_urlencoded;

use super::token::TokenCodec;
use crate::directory::ports::UserRepository;

/// Path and decoded query pairs of an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoLoginRequest {
    path: String,
    query: Vec<(String, String)>,
}

impl AutoLoginRequest {
    /// Parse the raw (still percent-encoded) query string.
    pub fn new(path: impl Into<String>, query: Option<&str>) -> Self {
        let query = query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self { path: path.into(), query }
    }

    /// Request path without query.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Every `auto_login` value, in request order.
    pub fn tokens(&self) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(key, _)| key == AUTO_LOGIN_PARAM)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// The request URL with every `auto_login` parameter removed, other
    /// parameters kept in order.
    pub fn stripped_url(&self) -> String {
        let remaining: Vec<_> =
            self.query.iter().filter(|(key, _)| key != AUTO_LOGIN_PARAM).collect();
        if remaining.is_empty() {
            return self.path.clone();
        }
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in remaining {
            serializer.append_pair(key, value);
        }
        format!("{}?{}", self.path, serializer.finish())
    }
}

/// Terminal state reached for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoLoginState {
    NoToken,
    MultipleTokens,
    TokenInvalid,
    MissingClaim,
    AlreadyAuthenticated,
    UserFound,
    UserNotFound,
}

/// What the HTTP layer must do with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoLoginDecision {
    pub state: AutoLoginState,
    /// Terminate the current session before redirecting.
    pub logout: bool,
    /// `None` only for [`AutoLoginState::NoToken`] (pass through).
    pub redirect_to: Option<String>,
}

impl AutoLoginDecision {
    fn passthrough() -> Self {
        Self { state: AutoLoginState::NoToken, logout: false, redirect_to: None }
    }

    fn redirect(state: AutoLoginState, to: String) -> Self {
        Self { state, logout: false, redirect_to: Some(to) }
    }
}

/// Decides what an incoming `auto_login` token does to the session.
pub struct AutoLoginFlow {
    codec: Option<Arc<TokenCodec>>,
    users: Arc<dyn UserRepository>,
    authorize_path: String,
}

impl AutoLoginFlow {
    /// `codec` is `None` when auto-login is disabled; every token is then
    /// treated as invalid and stripped.
    pub fn new(
        codec: Option<Arc<TokenCodec>>,
        users: Arc<dyn UserRepository>,
        authorize_path: impl Into<String>,
    ) -> Self {
        Self { codec, users, authorize_path: authorize_path.into() }
    }

    /// Evaluate one request against the member of its session, if any.
    pub async fn evaluate(
        &self,
        request: &AutoLoginRequest,
        session_user: Option<&User>,
    ) -> AutoLoginDecision {
        let tokens = request.tokens();
        if tokens.is_empty() {
            return AutoLoginDecision::passthrough();
        }
        let stripped = request.stripped_url();

        let [token] = tokens.as_slice() else {
            info!("Nexus auto login: Multiple tokens found -> ignored");
            return AutoLoginDecision::redirect(AutoLoginState::MultipleTokens, stripped);
        };

        let claims = match self.codec.as_ref().map(|codec| codec.decode(token)) {
            Some(Ok(claims)) => claims,
            Some(Err(e)) => {
                info!(reason = %e, "Nexus auto login: invalid token -> ignored");
                return AutoLoginDecision::redirect(AutoLoginState::TokenInvalid, stripped);
            }
            None => {
                info!(reason = "disabled", "Nexus auto login: invalid token -> ignored");
                return AutoLoginDecision::redirect(AutoLoginState::TokenInvalid, stripped);
            }
        };

        let Some(email) = claims.email() else {
            info!("Nexus auto login: Missing email in token -> ignored");
            return AutoLoginDecision::redirect(AutoLoginState::MissingClaim, stripped);
        };

        let mut logout = false;
        if let Some(current) = session_user {
            if current.email == email {
                info!(user_id = current.id, "Nexus auto login: user is already logged in");
                return AutoLoginDecision::redirect(AutoLoginState::AlreadyAuthenticated, stripped);
            }
            info!(
                user_id = current.id,
                "Nexus auto login: wrong user is logged in -> logging them out"
            );
            logout = true;
        }

        let (state, login_hint) = match self.users.find_by_email(email).await {
            Ok(Some(user)) => {
                info!(
                    user_id = user.id,
                    "Nexus auto login: user was found and forwarded to ProConnect"
                );
                (AutoLoginState::UserFound, user.email)
            }
            Ok(None) => {
                info!("Nexus auto login: no user found, forward to ProConnect to create account");
                (AutoLoginState::UserNotFound, email.to_string())
            }
            Err(e) => {
                warn!(error = %e, "Nexus auto login: user lookup failed, forward to ProConnect");
                (AutoLoginState::UserNotFound, email.to_string())
            }
        };

        let redirect_to = Some(self.authorize_url(&stripped, &login_hint));
        AutoLoginDecision { state, logout, redirect_to }
    }

    fn authorize_url(&self, next: &str, login_hint: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("next", next)
            .append_pair("login_hint", login_hint)
            .finish();
        format!("{}?{}", self.authorize_path, query)
    }
}
