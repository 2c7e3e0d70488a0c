//! SQLite connection pool

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info, instrument, warn};

use super::config::StorageConfig;
use super::connection::SqliteConnection;
use super::error::{StorageError, StorageResult};

/// r2d2 pool of SQLite connections
///
/// Every checked-out connection has the configured pragmas applied.
#[derive(Debug, Clone)]
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    config: StorageConfig,
}

impl SqlitePool {
    /// Open (or create) the database at `config.path`.
    #[instrument(
        skip(config),
        fields(db_path = %config.path.display(), pool_size = config.pool_size)
    )]
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        info!("Creating SQLite connection pool");

        let busy_timeout = config.busy_timeout;
        let enable_wal = config.enable_wal;
        let enable_foreign_keys = config.enable_foreign_keys;
        let manager = SqliteConnectionManager::file(&config.path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if enable_wal {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            if enable_foreign_keys {
                conn.pragma_update(None, "foreign_keys", "ON")?;
            }
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!(error = %e, "Failed to create connection pool");
                StorageError::Connection(format!("Failed to create pool: {e}"))
            })?;

        debug!("SQLite connection pool ready");
        Ok(Self { pool, config })
    }

    pub fn get_connection(&self) -> StorageResult<SqliteConnection> {
        Ok(SqliteConnection::new(self.pool.get()?))
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Connections currently idle in the pool.
    pub fn idle_connections(&self) -> u32 {
        self.pool.state().idle_connections
    }
}
