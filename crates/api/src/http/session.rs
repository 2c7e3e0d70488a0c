//! In-memory cookie sessions
//!
//! Login itself happens at the identity provider; this store only maps a
//! `sessionid` cookie to the member it was opened for. Sessions expire
//! after a fixed lifetime and expired entries are pruned whenever a new
//! session is opened.

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use communaute_common::time::Clock;
use communaute_domain::constants::{SESSION_COOKIE_NAME, SESSION_TTL_SECS};
use communaute_domain::User;
use dashmap::DashMap;
use uuid::Uuid;

/// Session resolved for the current request, stored in request extensions.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub id: String,
    pub user: User,
}

#[derive(Debug, Clone, Copy)]
struct SessionEntry {
    user_id: i64,
    expires_at: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: DashMap<String, SessionEntry>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, Duration::seconds(SESSION_TTL_SECS))
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { sessions: DashMap::new(), clock, ttl }
    }

    /// Open a session for `user_id` and return its id.
    ///
    /// Entry point for the identity-provider login callback, which lives
    /// outside this service.
    pub fn create(&self, user_id: i64) -> String {
        let now = self.clock.now();
        self.sessions.retain(|_, entry| entry.expires_at > now);

        let id = Uuid::new_v4().simple().to_string();
        self.sessions.insert(id.clone(), SessionEntry { user_id, expires_at: now + self.ttl });
        id
    }

    /// Member of a live session. An expired session is removed.
    pub fn user_id(&self, session_id: &str) -> Option<i64> {
        let entry = *self.sessions.get(session_id)?.value();
        if entry.expires_at <= self.clock.now() {
            self.sessions.remove(session_id);
            return None;
        }
        Some(entry.user_id)
    }

    /// Terminate a session. Returns whether it existed.
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Session id carried by the request's `Cookie` headers, if any.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE_NAME && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value opening a session in the browser.
pub fn session_cookie(session_id: &str) -> String {
    format!("{SESSION_COOKIE_NAME}={session_id}; Path=/; HttpOnly; SameSite=Lax")
}

/// `Set-Cookie` value that expires the session cookie.
pub fn cleared_session_cookie() -> String {
    format!("{SESSION_COOKIE_NAME}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}
