//! AES-256-GCM sealing of short opaque payloads.
//!
//! A sealed payload is `nonce (12 bytes) || ciphertext+tag`, optionally
//! rendered as URL-safe base64 without padding so it can travel in a query
//! string.
//!
//! ```rust
//! use communaute_common::crypto::SealingKey;
//!
//! let key = SealingKey::derive(b"a process-wide secret of decent length", "example");
//! let sealed = key.seal_to_string(b"payload")?;
//! assert_eq!(key.open_str(&sealed)?, b"payload");
//! # Ok::<(), communaute_common::error::CommonError>(())
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{CommonError, CommonResult};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// Derive 32 bytes of key material for one purpose from a shared secret.
///
/// Distinct `context` labels yield independent keys, so a single configured
/// secret can back both signing and encryption.
pub fn derive_key(secret: &[u8], context: &str) -> Zeroizing<[u8; KEY_LEN]> {
    let mut hasher = Sha256::new();
    hasher.update(context.as_bytes());
    hasher.update([0u8]);
    hasher.update(secret);
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&hasher.finalize());
    key
}

/// AES-256-GCM key used to seal and open payloads.
#[derive(Clone)]
pub struct SealingKey {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingKey").field("key", &"[REDACTED]").finish()
    }
}

impl SealingKey {
    /// Build from raw key bytes (exactly 32).
    pub fn from_bytes(key: &[u8]) -> CommonResult<Self> {
        if key.len() != KEY_LEN {
            return Err(CommonError::crypto("Sealing key must be exactly 32 bytes"));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CommonError::crypto(format!("Failed to create cipher: {e}")))?;
        Ok(Self { cipher })
    }

    /// Build from a secret of any length via [`derive_key`].
    pub fn derive(secret: &[u8], context: &str) -> Self {
        let key = derive_key(secret, context);
        Self { cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..])) }
    }

    pub fn seal(&self, plaintext: &[u8]) -> CommonResult<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CommonError::crypto(format!("Encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8]) -> CommonResult<Vec<u8>> {
        if sealed.len() <= NONCE_LEN {
            return Err(CommonError::crypto("Sealed payload is too short"));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CommonError::crypto("Payload could not be authenticated"))
    }

    pub fn seal_to_string(&self, plaintext: &[u8]) -> CommonResult<String> {
        Ok(URL_SAFE_NO_PAD.encode(self.seal(plaintext)?))
    }

    pub fn open_str(&self, sealed: &str) -> CommonResult<Vec<u8>> {
        let bytes = URL_SAFE_NO_PAD
            .decode(sealed.trim())
            .map_err(|e| CommonError::serialization("base64url", e.to_string()))?;
        self.open(&bytes)
    }
}
