//! Port interfaces for analytics collection

use async_trait::async_trait;
use chrono::NaiveDate;
use communaute_domain::{Granularity, MetricRecord, Result};

/// Persisted "last synced" markers per subject and granularity
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get_watermark(
        &self,
        subject_key: &str,
        granularity: Granularity,
    ) -> Result<Option<NaiveDate>>;

    /// Move the watermark forward.
    ///
    /// Fails with `CommunauteError::WatermarkRegression` unless `new_date` is
    /// strictly after the stored value. Creates the row on first advance.
    async fn advance(
        &self,
        subject_key: &str,
        granularity: Granularity,
        new_date: NaiveDate,
    ) -> Result<()>;
}

/// Idempotent storage of collected metrics
#[async_trait]
pub trait StatRecordStore: Send + Sync {
    /// Insert unless a record already exists for `(period, date, name)`.
    ///
    /// Returns `true` when a row was written.
    async fn insert_if_absent(&self, record: &MetricRecord) -> Result<bool>;

    /// Latest date stored for `granularity` among the given metric names.
    async fn latest_period_start(
        &self,
        granularity: Granularity,
        names: &[&str],
    ) -> Result<Option<NaiveDate>>;
}

/// External analytics provider (Matomo)
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    async fn fetch_visits(
        &self,
        granularity: Granularity,
        period_start: NaiveDate,
    ) -> Result<Vec<MetricRecord>>;

    /// Engagement metrics, correlated on the visitors metric named
    /// `visitors_key`.
    async fn fetch_engagement(
        &self,
        granularity: Granularity,
        period_start: NaiveDate,
        visitors_key: &str,
    ) -> Result<Vec<MetricRecord>>;
}
