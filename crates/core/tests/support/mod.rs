//! Shared test helpers for `communaute-core` integration tests.
//!
//! In-memory adapters for the core ports so scenarios can exercise the
//! services end to end without a database or HTTP server.

pub mod repositories;
