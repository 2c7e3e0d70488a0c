//! Shared helpers for infra integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use communaute_infra::database::DbManager;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Temporary migrated database, deleted when dropped.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let manager = DbManager::new(temp_dir.path().join("test.db"), 4)
            .expect("db manager should be created");
        manager.run_migrations().expect("migrations should run");
        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    pub fn execute_batch(&self, sql: &str) {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Matomo answering every report with fixed values for any date.
pub async fn mount_matomo(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/index.php"))
        .and(query_param("method", "VisitsSummary.get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nb_uniq_visitors": 10,
            "sum_daily_nb_uniq_visitors": 300,
            "nb_visits": 12
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/index.php"))
        .and(query_param("method", "VisitFrequency.get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nb_uniq_visitors_returning": 4,
            "sum_daily_nb_uniq_visitors_returning": 120
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/index.php"))
        .and(query_param("method", "Events.getCategory"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"label": "active", "nb_uniq_visitors": 3, "sum_daily_nb_uniq_visitors": "90"},
            {"label": "engaged", "nb_uniq_visitors": 2, "sum_daily_nb_uniq_visitors": 60},
            {"label": "unrelated", "nb_uniq_visitors": 99}
        ])))
        .mount(server)
        .await;
}

fn query_value(request: &Request, key: &str) -> Option<String> {
    request.url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
}

/// `(period, date)` of every Matomo call for `api_method`, in request order.
pub async fn matomo_calls(server: &MockServer, api_method: &str) -> Vec<(String, String)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| query_value(request, "method").as_deref() == Some(api_method))
        .filter_map(|request| {
            Some((query_value(request, "period")?, query_value(request, "date")?))
        })
        .collect()
}
