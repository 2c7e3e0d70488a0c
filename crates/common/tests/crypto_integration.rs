//! Integration tests for the sealing primitives
//!
//! Validates that independently constructed keys interoperate and that
//! derived keys for different purposes stay isolated.

#![cfg(feature = "runtime")]

use communaute_common::crypto::{derive_key, SealingKey};
use communaute_common::CommonError;

const SECRET: &[u8] = b"integration-secret-0123456789abcdef";

/// Two keys derived from the same secret and context open each other's
/// payloads.
#[test]
fn derived_keys_interoperate_across_instances() {
    let sealer = SealingKey::derive(SECRET, "auto-login:encrypt");
    let opener = SealingKey::derive(SECRET, "auto-login:encrypt");

    let token = sealer.seal_to_string(b"{\"email\":\"a@b.fr\"}").expect("seal should succeed");
    let opened = opener.open_str(&token).expect("open should succeed");

    assert_eq!(opened, b"{\"email\":\"a@b.fr\"}");
}

#[test]
fn raw_key_matches_derived_key() {
    let material = derive_key(SECRET, "ctx");
    let from_raw = SealingKey::from_bytes(&material[..]).expect("32-byte key");
    let derived = SealingKey::derive(SECRET, "ctx");

    let sealed = derived.seal(b"payload").expect("seal should succeed");
    assert_eq!(from_raw.open(&sealed).expect("open should succeed"), b"payload");
}

#[test]
fn contexts_yield_distinct_material() {
    let a = derive_key(SECRET, "auto-login:sign");
    let b = derive_key(SECRET, "auto-login:encrypt");
    assert_ne!(&a[..], &b[..]);
}

#[test]
fn truncated_token_is_rejected() {
    let key = SealingKey::derive(SECRET, "ctx");
    let token = key.seal_to_string(b"payload").expect("seal should succeed");

    let err = key.open_str(&token[..10]).expect_err("truncated token must fail");
    assert!(matches!(err, CommonError::Crypto(_) | CommonError::Serialization { .. }));
}
