use std::time::Duration;

use communaute_domain::{CommunauteError, LoggingConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `logging.level`. Fails if a subscriber is already
/// installed.
pub fn init_tracing(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).with_target(true).try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init()
    }
}

/// Log the outcome of an operator command with structured fields.
///
/// `command` should be a stable identifier such as `"collect-matomo-stats"`.
#[inline]
pub fn log_command_execution(command: &str, elapsed: Duration, error: Option<&CommunauteError>) {
    let duration_ms = elapsed.as_millis() as u64;

    match error {
        None => info!(command, duration_ms, "command_execution_success"),
        Some(err) => {
            warn!(
                command,
                duration_ms,
                error_type = error_label(err),
                error = %err,
                "command_execution_failure"
            )
        }
    }
}

/// Stable label for an error, suitable for log fields.
#[inline]
pub fn error_label(error: &CommunauteError) -> &'static str {
    match error {
        CommunauteError::Database(_) => "database",
        CommunauteError::Config(_) => "config",
        CommunauteError::Network(_) => "network",
        CommunauteError::Auth(_) => "auth",
        CommunauteError::NotFound(_) => "not_found",
        CommunauteError::InvalidInput(_) => "invalid_input",
        CommunauteError::ExternalService(_) => "external_service",
        CommunauteError::WatermarkRegression { .. } => "watermark_regression",
        CommunauteError::Internal(_) => "internal",
    }
}
