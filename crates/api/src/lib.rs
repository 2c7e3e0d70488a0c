//! # Communauté API
//!
//! Application layer - HTTP surface, operator commands and wiring.
//!
//! This crate contains:
//! - The axum router (auto-login issuing endpoint, auto-login middleware,
//!   cookie sessions, health)
//! - Operator commands (`serve`, `collect-matomo-stats`, `nexus-full-sync`,
//!   `migrate`)
//! - Application context (dependency injection)
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core` and `infra`
//! - Wires up the hexagonal architecture

pub mod cli;
pub mod context;
pub mod http;
pub mod utils;

// Re-export for convenience
pub use context::*;
