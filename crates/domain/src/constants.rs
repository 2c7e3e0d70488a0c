//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

use chrono::NaiveDate;

// Analytics backfill
pub const MATOMO_SUBJECT_KEY: &str = "matomo";
pub const EPOCH_START_YEAR: i32 = 2022;
pub const EPOCH_START_MONTH: u32 = 12;
pub const EPOCH_START_DAY: u32 = 1;

/// Metric names collected from Matomo.
pub const MATOMO_STAT_NAMES: [&str; 4] = [
    "nb_uniq_visitors",
    "nb_uniq_visitors_returning",
    "nb_uniq_active_visitors",
    "nb_uniq_engaged_visitors",
];

// Correlation keys threaded from the visits call into the engagement call
pub const DAY_VISITORS_KEY: &str = "nb_uniq_visitors";
pub const MONTH_VISITORS_KEY: &str = "sum_daily_nb_uniq_visitors";

// Auto-login token
pub const AUTO_LOGIN_PARAM: &str = "auto_login";
pub const AUTO_LOGIN_EXPIRY_SECS: i64 = 600;
pub const AUTO_LOGIN_LEEWAY_SECS: i64 = 60;
pub const MIN_AUTO_LOGIN_KEY_LEN: usize = 32;

// Directory sync
pub const DIRECTORY_USER_KIND: &str = "";
pub const DIRECTORY_USER_PHONE: &str = "";

// HTTP surface
pub const SESSION_COOKIE_NAME: &str = "sessionid";

/// Lifetime of a session from the moment it is opened (two weeks).
pub const SESSION_TTL_SECS: i64 = 14 * 24 * 60 * 60;
pub const DEFAULT_LOGIN_PATH: &str = "/users/login";
pub const DEFAULT_AUTHORIZE_PATH: &str = "/openid_connect/authorize";

/// First day ever collected when no watermark exists yet.
pub fn epoch_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(EPOCH_START_YEAR, EPOCH_START_MONTH, EPOCH_START_DAY)
        .unwrap_or(NaiveDate::MIN)
}
