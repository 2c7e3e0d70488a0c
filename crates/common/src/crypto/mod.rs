//! Shared cryptographic primitives.

pub mod seal;

pub use seal::{derive_key, SealingKey, KEY_LEN, NONCE_LEN};
