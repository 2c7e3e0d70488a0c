//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Environment variables, when `COMMUNAUTE_DB_PATH` is set
//! 2. Otherwise the first config file found by [`probe_config_paths`]
//!
//! JSON and TOML files are supported, chosen by extension.
//!
//! ## Environment Variables
//! - `COMMUNAUTE_DB_PATH` (required), `COMMUNAUTE_DB_POOL_SIZE`
//! - `COMMUNAUTE_BIND_ADDRESS`, `COMMUNAUTE_LOGIN_PATH`, `COMMUNAUTE_AUTHORIZE_PATH`
//! - `COMMUNAUTE_NEXUS_API_BASE_URL`, `COMMUNAUTE_NEXUS_API_TOKEN`
//! - `COMMUNAUTE_NEXUS_ALLOWED_REDIRECT_HOSTS` (comma separated)
//! - `COMMUNAUTE_NEXUS_AUTO_LOGIN_KEY`, `COMMUNAUTE_NEXUS_AUTO_LOGIN_EXPIRY_SECS`
//! - `COMMUNAUTE_MATOMO_BASE_URL`, `COMMUNAUTE_MATOMO_SITE_ID`, `COMMUNAUTE_MATOMO_AUTH_TOKEN`
//! - `COMMUNAUTE_STATS_ENABLED`, `COMMUNAUTE_STATS_CRON`
//! - `COMMUNAUTE_LOG_LEVEL`, `COMMUNAUTE_LOG_JSON`
//!
//! Unset optional variables keep the defaults of [`Config`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use communaute_domain::{CommunauteError, Config, DatabaseConfig, Result};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["config.json", "config.toml", "communaute.json", "communaute.toml"];

/// Load configuration from the environment, falling back to a probed file.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `COMMUNAUTE_*` environment variables.
///
/// # Errors
/// `CommunauteError::Config` when `COMMUNAUTE_DB_PATH` is missing or a value
/// does not parse.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config {
        database: DatabaseConfig {
            path: env_var("COMMUNAUTE_DB_PATH")?,
            ..DatabaseConfig::default()
        },
        ..Config::default()
    };

    if let Some(pool_size) = env_parse::<u32>("COMMUNAUTE_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }

    if let Some(bind_address) = env_opt("COMMUNAUTE_BIND_ADDRESS") {
        config.server.bind_address = bind_address;
    }
    if let Some(login_path) = env_opt("COMMUNAUTE_LOGIN_PATH") {
        config.server.login_path = login_path;
    }
    if let Some(authorize_path) = env_opt("COMMUNAUTE_AUTHORIZE_PATH") {
        config.server.authorize_path = authorize_path;
    }

    config.nexus.api_base_url = env_opt("COMMUNAUTE_NEXUS_API_BASE_URL");
    config.nexus.api_token = env_opt("COMMUNAUTE_NEXUS_API_TOKEN");
    config.nexus.auto_login_key = env_opt("COMMUNAUTE_NEXUS_AUTO_LOGIN_KEY");
    if let Some(hosts) = env_opt("COMMUNAUTE_NEXUS_ALLOWED_REDIRECT_HOSTS") {
        config.nexus.allowed_redirect_hosts =
            hosts.split(',').map(str::trim).filter(|h| !h.is_empty()).map(str::to_string).collect();
    }
    if let Some(expiry) = env_parse::<i64>("COMMUNAUTE_NEXUS_AUTO_LOGIN_EXPIRY_SECS")? {
        config.nexus.auto_login_expiry_secs = expiry;
    }

    config.matomo.base_url = env_opt("COMMUNAUTE_MATOMO_BASE_URL");
    config.matomo.auth_token = env_opt("COMMUNAUTE_MATOMO_AUTH_TOKEN");
    if let Some(site_id) = env_parse::<u32>("COMMUNAUTE_MATOMO_SITE_ID")? {
        config.matomo.site_id = site_id;
    }

    config.stats.enabled = env_bool("COMMUNAUTE_STATS_ENABLED", config.stats.enabled);
    if let Some(cron) = env_opt("COMMUNAUTE_STATS_CRON") {
        config.stats.cron_expression = cron;
    }

    if let Some(level) = env_opt("COMMUNAUTE_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("COMMUNAUTE_LOG_JSON", config.logging.json);

    Ok(config)
}

/// Load configuration from a file, probing standard locations when `path`
/// is `None`.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CommunauteError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CommunauteError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CommunauteError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => {
            toml::from_str(contents)
                .map_err(|e| CommunauteError::Config(format!("Invalid TOML format: {}", e)))
        }
        "json" => serde_json::from_str(contents)
            .map_err(|e| CommunauteError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(CommunauteError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// First existing config file in the working directory, its two parents, or
/// next to the executable.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        CommunauteError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Set and non-blank.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| CommunauteError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
