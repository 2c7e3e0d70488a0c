//! Application configuration structures
//!
//! Loaded by `communaute_infra::config::loader` from environment variables or
//! a TOML/JSON file. Optional collaborators (Nexus, Matomo) are disabled by
//! leaving their base URL or key unset.

use serde::{Deserialize, Serialize};

use crate::constants::{AUTO_LOGIN_EXPIRY_SECS, DEFAULT_AUTHORIZE_PATH, DEFAULT_LOGIN_PATH};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub nexus: NexusConfig,
    #[serde(default)]
    pub matomo: MatomoConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "communaute.db".to_string(), pool_size: default_pool_size() }
    }
}

/// HTTP surface settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Where unauthenticated users are sent to sign in.
    pub login_path: String,
    /// Downstream identity-provider authorization route.
    pub authorize_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            authorize_path: DEFAULT_AUTHORIZE_PATH.to_string(),
        }
    }
}

/// Nexus directory and auto-login settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NexusConfig {
    /// Directory sync is a no-op when unset.
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub allowed_redirect_hosts: Vec<String>,
    /// Token issuance fails closed when unset.
    pub auto_login_key: Option<String>,
    pub auto_login_expiry_secs: i64,
}

impl NexusConfig {
    pub fn sync_enabled(&self) -> bool {
        self.api_base_url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }

    pub fn is_allowed_redirect_host(&self, host: &str) -> bool {
        self.allowed_redirect_hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(host))
    }
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            allowed_redirect_hosts: Vec::new(),
            auto_login_key: None,
            auto_login_expiry_secs: AUTO_LOGIN_EXPIRY_SECS,
        }
    }
}

/// Matomo reporting API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatomoConfig {
    pub base_url: Option<String>,
    pub site_id: u32,
    pub auth_token: Option<String>,
}

impl Default for MatomoConfig {
    fn default() -> Self {
        Self { base_url: None, site_id: 1, auth_token: None }
    }
}

/// Scheduled analytics backfill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub enabled: bool,
    /// Six-field cron expression (with seconds).
    pub cron_expression: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { enabled: false, cron_expression: "0 30 2 * * *".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

const fn default_pool_size() -> u32 {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nexus_sync_disabled_without_base_url() {
        let mut nexus = NexusConfig::default();
        assert!(!nexus.sync_enabled());
        nexus.api_base_url = Some("  ".into());
        assert!(!nexus.sync_enabled());
        nexus.api_base_url = Some("http://nexus/api".into());
        assert!(nexus.sync_enabled());
    }

    #[test]
    fn redirect_hosts_compare_case_insensitively() {
        let nexus = NexusConfig {
            allowed_redirect_hosts: vec!["nexus.inclusion.gouv.fr".into()],
            ..NexusConfig::default()
        };
        assert!(nexus.is_allowed_redirect_host("Nexus.Inclusion.gouv.fr"));
        assert!(!nexus.is_allowed_redirect_host("evil.example.com"));
    }

    #[test]
    fn partial_json_uses_section_defaults() {
        let config: Config = serde_json::from_str(r#"{"database": {"path": "x.db"}}"#).unwrap();
        assert_eq!(config.database.pool_size, 4);
        assert_eq!(config.nexus.auto_login_expiry_secs, AUTO_LOGIN_EXPIRY_SECS);
        assert_eq!(config.server.authorize_path, DEFAULT_AUTHORIZE_PATH);
    }
}
