//! SQLite storage primitives
//!
//! r2d2-pooled rusqlite connections with WAL, busy timeout and foreign keys
//! applied on checkout. Schema ownership stays with the application layer.

pub mod config;
pub mod connection;
pub mod error;
pub mod pool;

// Re-export commonly used types
pub use config::StorageConfig;
pub use connection::SqliteConnection;
pub use error::{StorageError, StorageResult};
pub use pool::SqlitePool;
