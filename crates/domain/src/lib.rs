//! # Communauté Domain
//!
//! Business domain types and models for the Communauté sync services.
//!
//! This crate contains:
//! - Domain data types (watermarks, sync windows, users, directory intents)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other Communauté crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
