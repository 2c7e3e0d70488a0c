//! Auto-login claim carried by the short-lived token

use serde::{Deserialize, Serialize};

/// The single claim an auto-login token binds.
///
/// `email` is optional on the wire: a correctly signed token without it is
/// still a valid token, just one the auto-login flow ignores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoLoginClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AutoLoginClaims {
    pub fn new(email: impl Into<String>) -> Self {
        Self { email: Some(email.into()) }
    }

    /// The claimed email, if present and non-blank.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}
