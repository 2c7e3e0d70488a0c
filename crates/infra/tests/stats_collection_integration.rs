//! End-to-end analytics backfill: SQLite stores, the Matomo client and the
//! collection service.

mod support;

use std::sync::Arc;
use std::time::Duration;

use communaute_core::{StatRecordStore, StatsCollectionService};
use communaute_domain::constants::{MATOMO_STAT_NAMES, MATOMO_SUBJECT_KEY};
use communaute_domain::{CommunauteError, Granularity, MetricRecord};
use communaute_infra::{HttpClient, MatomoClient, SqliteStatRepository, SqliteWatermarkRepository};
use support::{date, matomo_calls, mount_matomo, TestDatabase};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    db: TestDatabase,
    service: StatsCollectionService,
    stats: Arc<SqliteStatRepository>,
    watermarks: Arc<SqliteWatermarkRepository>,
}

fn fixture(server: &MockServer) -> Fixture {
    let db = TestDatabase::new();
    let stats = Arc::new(SqliteStatRepository::new(db.manager.clone()));
    let watermarks = Arc::new(SqliteWatermarkRepository::new(db.manager.clone()));
    let http = HttpClient::builder().max_attempts(1).base_backoff(Duration::ZERO).build().unwrap();
    let matomo = Arc::new(MatomoClient::with_http(&server.uri(), 1, "matomo-token", http).unwrap());
    let service = StatsCollectionService::new(watermarks.clone(), stats.clone(), matomo);
    Fixture { db, service, stats, watermarks }
}

async fn seed(stats: &SqliteStatRepository, granularity: Granularity, day: chrono::NaiveDate) {
    for name in MATOMO_STAT_NAMES {
        stats.insert_if_absent(&MetricRecord::new(granularity, day, name, 1)).await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn resumes_from_existing_stats_then_collects_next_day_only() {
    let server = MockServer::start().await;
    mount_matomo(&server).await;
    let f = fixture(&server);

    // Day stats filled up to 2025-10-30, month stats up to September.
    seed(&f.stats, Granularity::Day, date(2025, 10, 30)).await;
    seed(&f.stats, Granularity::Month, date(2025, 9, 1)).await;

    let summary = f.service.run_all(date(2025, 11, 1)).await.unwrap();
    assert!(summary.is_success());
    assert_eq!(
        matomo_calls(&server, "VisitsSummary.get").await,
        vec![
            ("day".to_string(), "2025-10-31".to_string()),
            ("month".to_string(), "2025-10-01".to_string())
        ]
    );
    assert_eq!(f.stats.count_since(Granularity::Day, date(2025, 10, 31)).await.unwrap(), 4);
    assert_eq!(f.stats.count_since(Granularity::Month, date(2025, 10, 1)).await.unwrap(), 4);

    // Same day again: nothing to do.
    server.reset().await;
    mount_matomo(&server).await;
    let summary = f.service.run_all(date(2025, 11, 1)).await.unwrap();
    assert_eq!(summary.records_inserted(), 0);
    assert!(server.received_requests().await.unwrap().is_empty());

    // Next day: only the day granularity moves.
    let summary = f.service.run_all(date(2025, 11, 2)).await.unwrap();
    assert_eq!(summary.records_inserted(), 4);
    assert_eq!(
        matomo_calls(&server, "Events.getCategory").await,
        vec![("day".to_string(), "2025-11-01".to_string())]
    );
    assert_eq!(
        f.watermarks.get(MATOMO_SUBJECT_KEY, Granularity::Day).await.unwrap(),
        Some(date(2025, 11, 1))
    );
    assert_eq!(
        f.watermarks.get(MATOMO_SUBJECT_KEY, Granularity::Month).await.unwrap(),
        Some(date(2025, 10, 1))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn monthly_records_use_summed_daily_visitors() {
    let server = MockServer::start().await;
    mount_matomo(&server).await;
    let f = fixture(&server);
    seed(&f.stats, Granularity::Month, date(2025, 9, 1)).await;

    let report = f.service.run(Granularity::Month, date(2025, 11, 15)).await.unwrap();
    assert_eq!(report.windows_processed, 1);

    let visitors = f.stats.list(Granularity::Month, "nb_uniq_visitors").await.unwrap();
    assert_eq!(visitors.last().map(|r| r.value), Some(300));
    let active = f.stats.list(Granularity::Month, "nb_uniq_active_visitors").await.unwrap();
    assert_eq!(active.last().map(|r| r.value), Some(90));
    let returning = f.stats.list(Granularity::Month, "nb_uniq_visitors_returning").await.unwrap();
    assert_eq!(returning.last().map(|r| r.value), Some(120));
}

#[tokio::test(flavor = "multi_thread")]
async fn matomo_failure_keeps_watermark_and_allows_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).mount(&server).await;
    let f = fixture(&server);
    seed(&f.stats, Granularity::Day, date(2025, 10, 29)).await;

    let err = f.service.run(Granularity::Day, date(2025, 11, 1)).await.unwrap_err();
    assert!(matches!(err, CommunauteError::ExternalService(_)));
    assert_eq!(
        f.watermarks.get(MATOMO_SUBJECT_KEY, Granularity::Day).await.unwrap(),
        Some(date(2025, 10, 29))
    );

    server.reset().await;
    mount_matomo(&server).await;
    let report = f.service.run(Granularity::Day, date(2025, 11, 1)).await.unwrap();
    assert_eq!(report.windows_processed, 2);
    assert_eq!(report.watermark, Some(date(2025, 10, 31)));
}

#[tokio::test(flavor = "multi_thread")]
async fn rerun_after_lost_watermark_skips_duplicates() {
    let server = MockServer::start().await;
    mount_matomo(&server).await;
    let f = fixture(&server);
    seed(&f.stats, Granularity::Day, date(2025, 10, 30)).await;
    f.service.run(Granularity::Day, date(2025, 11, 1)).await.unwrap();

    // Watermark lost but stats kept: the run re-seeds and collects nothing new.
    f.db.execute_batch("DELETE FROM sync_watermarks");
    let report = f.service.run(Granularity::Day, date(2025, 11, 1)).await.unwrap();
    assert_eq!(report.windows_processed, 0);
    assert_eq!(f.stats.count_since(Granularity::Day, date(2025, 10, 31)).await.unwrap(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn matomo_error_payload_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"result": "error", "message": "token_auth is invalid"}),
            ),
        )
        .mount(&server)
        .await;
    let f = fixture(&server);
    seed(&f.stats, Granularity::Day, date(2025, 10, 31)).await;

    match f.service.run(Granularity::Day, date(2025, 11, 2)).await {
        Err(CommunauteError::ExternalService(msg)) => {
            assert!(msg.contains("token_auth is invalid"))
        }
        other => panic!("expected external service error, got {other:?}"),
    }
}
