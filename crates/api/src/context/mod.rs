//! Application context - dependency injection container

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use communaute_common::time::{Clock, SystemClock};
use communaute_core::{
    AnalyticsSource, AutoLoginFlow, DirectoryClient, DirectorySyncService, StatsCollectionService,
    TokenCodec, TokenError, UserRepository,
};
use communaute_domain::{CommunauteError, Config, Result};
use communaute_infra::scheduling::{CollectStatsJob, StatsJob, StatsSchedulerConfig};
use communaute_infra::{
    DbManager, MatomoClient, NexusClient, SqliteStatRepository, SqliteUserRepository,
    SqliteWatermarkRepository, StatsScheduler,
};
use tracing::{info, warn};

use crate::http::SessionStore;
use crate::utils::health::{ComponentHealth, HealthReport};

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub db: Arc<DbManager>,

    /// Member repository whose commits are propagated to Nexus.
    pub users: Arc<SqliteUserRepository>,
    pub watermarks: Arc<SqliteWatermarkRepository>,
    pub stats: Arc<SqliteStatRepository>,

    pub directory_sync: Arc<DirectorySyncService>,
    /// `None` when no usable auto-login key is configured.
    pub token_codec: Option<Arc<TokenCodec>>,
    pub auto_login: Arc<AutoLoginFlow>,
    /// `None` when Matomo is not configured.
    pub stats_collection: Option<Arc<StatsCollectionService>>,

    pub sessions: Arc<SessionStore>,
}

impl AppContext {
    /// Build the context on the system clock.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Open the database, apply the schema and wire every service.
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        // The sync service reads through a repository without a dispatcher;
        // only the mutating repository below dispatches to it.
        let reader: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(Arc::clone(&db)));
        let directory_client = NexusClient::from_config(&config.nexus)?
            .map(|client| Arc::new(client) as Arc<dyn DirectoryClient>);
        if directory_client.is_none() {
            info!("Nexus API base URL not configured, directory sync disabled");
        }
        let directory_sync =
            Arc::new(DirectorySyncService::new(directory_client, Arc::clone(&reader)));

        let users = Arc::new(
            SqliteUserRepository::new(Arc::clone(&db)).with_dispatcher(directory_sync.clone()),
        );

        let token_codec = build_token_codec(&config, Arc::clone(&clock))?;
        let auto_login = Arc::new(AutoLoginFlow::new(
            token_codec.clone(),
            reader,
            config.server.authorize_path.clone(),
        ));

        let watermarks = Arc::new(SqliteWatermarkRepository::new(Arc::clone(&db)));
        let stats = Arc::new(SqliteStatRepository::new(Arc::clone(&db)));
        let stats_collection = match MatomoClient::from_config(&config.matomo)? {
            Some(client) => Some(Arc::new(StatsCollectionService::new(
                watermarks.clone(),
                stats.clone(),
                Arc::new(client) as Arc<dyn AnalyticsSource>,
            ))),
            None => {
                info!("Matomo not configured, stats collection disabled");
                None
            }
        };

        let sessions = Arc::new(SessionStore::new(Arc::clone(&clock)));

        Ok(Self {
            config,
            clock,
            db,
            users,
            watermarks,
            stats,
            directory_sync,
            token_codec,
            auto_login,
            stats_collection,
            sessions,
        })
    }

    /// Stats collection, or a configuration error naming what is missing.
    pub fn require_stats_collection(&self) -> Result<Arc<StatsCollectionService>> {
        self.stats_collection
            .clone()
            .ok_or_else(|| {
                CommunauteError::Config("Matomo base URL and auth token are required".into())
            })
    }

    /// Start the cron trigger when `stats.enabled` is set and Matomo is
    /// configured.
    pub async fn start_stats_scheduler(&self) -> Result<Option<StatsScheduler>> {
        if !self.config.stats.enabled {
            return Ok(None);
        }
        let Some(service) = self.stats_collection.clone() else {
            warn!("stats.enabled is set but Matomo is not configured; scheduler not started");
            return Ok(None);
        };

        let job: Arc<dyn StatsJob> =
            Arc::new(CollectStatsJob::new(service, Arc::clone(&self.clock)));
        let mut scheduler =
            StatsScheduler::new(StatsSchedulerConfig::from(&self.config.stats), job).await?;
        scheduler.start().await?;

        info!(cron = %self.config.stats.cron_expression, "stats scheduler started");
        Ok(Some(scheduler))
    }

    pub async fn health(&self) -> HealthReport {
        let db = Arc::clone(&self.db);
        let database = match tokio::task::spawn_blocking(move || db.health_check()).await {
            Ok(Ok(())) => ComponentHealth::healthy("database"),
            Ok(Err(err)) => ComponentHealth::unhealthy("database", err.to_string()),
            Err(err) => ComponentHealth::unhealthy("database", err.to_string()),
        };

        HealthReport::new(self.clock.now())
            .add_component(database)
            .add_component(ComponentHealth::configured("nexus", self.directory_sync.is_enabled()))
            .add_component(ComponentHealth::configured("auto_login", self.token_codec.is_some()))
            .add_component(ComponentHealth::configured("matomo", self.stats_collection.is_some()))
    }
}

fn build_token_codec(config: &Config, clock: Arc<dyn Clock>) -> Result<Option<Arc<TokenCodec>>> {
    let expiry = ChronoDuration::seconds(config.nexus.auto_login_expiry_secs);
    match TokenCodec::new(config.nexus.auto_login_key.as_deref(), expiry, clock) {
        Ok(codec) => Ok(Some(Arc::new(codec))),
        Err(TokenError::Disabled(reason)) => {
            info!(%reason, "Nexus auto login disabled");
            Ok(None)
        }
        Err(err) => Err(CommunauteError::Config(err.to_string())),
    }
}
