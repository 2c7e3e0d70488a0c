//! Auto-login token codec
//!
//! A token is an HS256 JWS carrying `{email, iat, exp}`, sealed with
//! AES-256-GCM and rendered as URL-safe base64. Signing and encryption keys
//! are derived from one configured secret. Verification is stateless: there
//! is no replay cache, a token works for every use inside its validity
//! window.

use std::sync::Arc;

use chrono::Duration;
use communaute_common::crypto::{derive_key, SealingKey};
use communaute_common::time::Clock;
use communaute_domain::constants::{AUTO_LOGIN_LEEWAY_SECS, MIN_AUTO_LOGIN_KEY_LEN};
use communaute_domain::AutoLoginClaims;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SIGNING_CONTEXT: &str = "communaute:auto-login:sign";
const SEALING_CONTEXT: &str = "communaute:auto-login:seal";

/// Failures of [`TokenCodec`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// No usable key configured. Issuance fails closed.
    #[error("Auto-login is disabled: {0}")]
    Disabled(String),

    /// Malformed, unsigned, wrongly signed or structurally invalid.
    #[error("Invalid auto-login token: {0}")]
    Decode(String),

    #[error("Auto-login token has expired")]
    Expired,

    #[error("Failed to issue auto-login token: {0}")]
    Issue(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    iat: i64,
    exp: i64,
}

/// Issues and verifies auto-login tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    sealing_key: SealingKey,
    expiry: Duration,
    leeway: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("keys", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .field("leeway", &self.leeway)
            .finish()
    }
}

impl TokenCodec {
    /// Build a codec from the configured secret.
    ///
    /// Fails with [`TokenError::Disabled`] when the secret is unset or
    /// shorter than 32 bytes.
    pub fn new(
        secret: Option<&str>,
        expiry: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        let secret = secret
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TokenError::Disabled("no auto-login key configured".into()))?;
        if secret.len() < MIN_AUTO_LOGIN_KEY_LEN {
            return Err(TokenError::Disabled(format!(
                "auto-login key must be at least {MIN_AUTO_LOGIN_KEY_LEN} bytes"
            )));
        }
        if expiry <= Duration::zero() {
            return Err(TokenError::Disabled("auto-login expiry must be positive".into()));
        }

        let signing = derive_key(secret.as_bytes(), SIGNING_CONTEXT);
        Ok(Self {
            encoding_key: EncodingKey::from_secret(&signing[..]),
            decoding_key: DecodingKey::from_secret(&signing[..]),
            sealing_key: SealingKey::derive(secret.as_bytes(), SEALING_CONTEXT),
            expiry,
            leeway: Duration::seconds(AUTO_LOGIN_LEEWAY_SECS),
            clock,
        })
    }

    /// Validity of a freshly issued token.
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Grace period accepted after expiry.
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Opaque URL-safe token for `email`, valid for [`Self::expiry`].
    pub fn issue(&self, email: &str) -> Result<String, TokenError> {
        let now = self.clock.unix_timestamp();
        let claims = TokenClaims {
            email: Some(email.to_string()),
            iat: now,
            exp: now + self.expiry.num_seconds(),
        };
        let jws = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Issue(e.to_string()))?;
        self.sealing_key
            .seal_to_string(jws.as_bytes())
            .map_err(|e| TokenError::Issue(e.to_string()))
    }

    /// Verify `token` and return its claims.
    pub fn decode(&self, token: &str) -> Result<AutoLoginClaims, TokenError> {
        let opened =
            self.sealing_key.open_str(token).map_err(|e| TokenError::Decode(e.to_string()))?;
        let jws = String::from_utf8(opened)
            .map_err(|_| TokenError::Decode("payload is not UTF-8".into()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256];
        validation.validate_exp = false;
        validation.validate_aud = false;
        let data = decode::<TokenClaims>(&jws, &self.decoding_key, &validation)
            .map_err(|e| TokenError::Decode(e.to_string()))?;

        // Expiry is checked against the injected clock rather than the
        // library's system time.
        if self.clock.unix_timestamp() > data.claims.exp + self.leeway.num_seconds() {
            return Err(TokenError::Expired);
        }
        Ok(AutoLoginClaims { email: data.claims.email })
    }
}
