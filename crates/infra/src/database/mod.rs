//! Database implementations

pub mod manager;
pub mod stat_repository;
pub mod user_repository;
pub mod watermark_repository;

pub use manager::*;
pub use stat_repository::*;
pub use user_repository::*;
pub use watermark_repository::SqliteWatermarkRepository;
