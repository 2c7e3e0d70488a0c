//! Matomo reporting API client.
//!
//! Visits come from `VisitsSummary.get` and `VisitFrequency.get`, engagement
//! from `Events.getCategory`. Daily reports expose unique visitors as
//! `nb_uniq_visitors`; monthly reports only carry the summed daily figure,
//! `sum_daily_nb_uniq_visitors`. Records are always stored under the daily
//! metric names.

use async_trait::async_trait;
use chrono::NaiveDate;
use communaute_core::AnalyticsSource;
use communaute_domain::{
    CommunauteError, Granularity, MatomoConfig, MetricRecord, Result as DomainResult,
};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::http::HttpClient;

const VISITORS_METRIC: &str = "nb_uniq_visitors";
const RETURNING_METRIC: &str = "nb_uniq_visitors_returning";

/// Event categories tracked by the forum front-end and the metric each one
/// feeds.
pub const ENGAGEMENT_CATEGORIES: [(&str, &str); 2] =
    [("active", "nb_uniq_active_visitors"), ("engaged", "nb_uniq_engaged_visitors")];

#[derive(Clone)]
pub struct MatomoClient {
    http: HttpClient,
    endpoint: Url,
    site_id: u32,
    auth_token: String,
}

impl MatomoClient {
    pub fn new(base_url: &str, site_id: u32, auth_token: impl Into<String>) -> DomainResult<Self> {
        Self::with_http(base_url, site_id, auth_token, HttpClient::new()?)
    }

    pub fn with_http(
        base_url: &str,
        site_id: u32,
        auth_token: impl Into<String>,
        http: HttpClient,
    ) -> DomainResult<Self> {
        let endpoint = Url::parse(&format!("{}/index.php", base_url.trim_end_matches('/')))
            .map_err(|e| {
                CommunauteError::Config(format!("invalid Matomo base URL '{base_url}': {e}"))
            })?;
        Ok(Self { http, endpoint, site_id, auth_token: auth_token.into() })
    }

    /// `None` unless both the base URL and the token are configured.
    pub fn from_config(config: &MatomoConfig) -> DomainResult<Option<Self>> {
        match (config.base_url.as_deref(), config.auth_token.as_deref()) {
            (Some(base_url), Some(token)) if !base_url.trim().is_empty() => {
                Self::new(base_url, config.site_id, token).map(Some)
            }
            _ => Ok(None),
        }
    }

    #[instrument(skip(self), fields(site_id = self.site_id))]
    async fn report(
        &self,
        api_method: &str,
        granularity: Granularity,
        date: NaiveDate,
    ) -> DomainResult<Value> {
        let site_id = self.site_id.to_string();
        let date = date.format("%Y-%m-%d").to_string();
        let request = self
            .http
            .request(Method::POST, self.endpoint.clone())
            .query(&[
                ("module", "API"),
                ("method", api_method),
                ("idSite", site_id.as_str()),
                ("period", granularity.as_str()),
                ("date", date.as_str()),
                ("format", "JSON"),
            ])
            .form(&[("token_auth", self.auth_token.as_str())]);

        let body: Value = self.http.send_json(request).await?;
        if body.get("result").and_then(Value::as_str) == Some("error") {
            let message = body.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(CommunauteError::ExternalService(format!("Matomo {api_method}: {message}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl AnalyticsSource for MatomoClient {
    async fn fetch_visits(
        &self,
        granularity: Granularity,
        period_start: NaiveDate,
    ) -> DomainResult<Vec<MetricRecord>> {
        let visitors_key = granularity.visitors_key();
        let mut records = Vec::new();

        let summary = self.report("VisitsSummary.get", granularity, period_start).await?;
        if let Some(value) = metric_value(&summary, visitors_key) {
            records.push(MetricRecord::new(granularity, period_start, VISITORS_METRIC, value));
        }

        let frequency = self.report("VisitFrequency.get", granularity, period_start).await?;
        if let Some(value) = metric_value(&frequency, &format!("{visitors_key}_returning")) {
            records.push(MetricRecord::new(granularity, period_start, RETURNING_METRIC, value));
        }

        debug!(%granularity, %period_start, count = records.len(), "fetched Matomo visits");
        Ok(records)
    }

    async fn fetch_engagement(
        &self,
        granularity: Granularity,
        period_start: NaiveDate,
        visitors_key: &str,
    ) -> DomainResult<Vec<MetricRecord>> {
        let categories = self.report("Events.getCategory", granularity, period_start).await?;
        let rows = categories.as_array().map(Vec::as_slice).unwrap_or_default();

        let records: Vec<MetricRecord> = ENGAGEMENT_CATEGORIES
            .iter()
            .filter_map(|(label, name)| {
                rows.iter()
                    .find(|row| row.get("label").and_then(Value::as_str) == Some(*label))
                    .and_then(|row| metric_value(row, visitors_key))
                    .map(|value| MetricRecord::new(granularity, period_start, *name, value))
            })
            .collect();

        debug!(%granularity, %period_start, count = records.len(), "fetched Matomo events");
        Ok(records)
    }
}

/// Matomo sends numbers, or numeric strings for some plugins.
fn metric_value(object: &Value, key: &str) -> Option<i64> {
    match object.get(key)? {
        Value::Number(number) => {
            number.as_i64().or_else(|| number.as_f64().map(|f| f.round() as i64))
        }
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
