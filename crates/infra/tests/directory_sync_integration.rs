//! Member mutations reaching a (mocked) Nexus directory after commit.

mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use communaute_core::{DirectoryClient, DirectorySyncService};
use communaute_domain::{CommunauteError, NewUser, User, UserChanges, UserFilter};
use communaute_infra::{HttpClient, NexusClient, SqliteUserRepository};
use serde_json::{json, Value};
use support::TestDatabase;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    _db: TestDatabase,
    users: SqliteUserRepository,
    service: Arc<DirectorySyncService>,
}

fn nexus(server: &MockServer) -> Arc<dyn DirectoryClient> {
    let http = HttpClient::builder()
        .bearer_token("nexus-token")
        .max_attempts(1)
        .base_backoff(Duration::ZERO)
        .build()
        .unwrap();
    Arc::new(NexusClient::with_http(&format!("{}/api/v1", server.uri()), http).unwrap())
}

fn fixture(client: Option<Arc<dyn DirectoryClient>>) -> Fixture {
    let db = TestDatabase::new();
    // Reads go through a dispatcher-less instance to avoid an Arc cycle.
    let reader = Arc::new(SqliteUserRepository::new(db.manager.clone()));
    let service = Arc::new(DirectorySyncService::new(client, reader));
    let users = SqliteUserRepository::new(db.manager.clone()).with_dispatcher(service.clone());
    Fixture { _db: db, users, service }
}

async fn requests_to(server: &MockServer, http_method: &str, route: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == http_method && r.url.path() == route)
        .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
        .collect()
}

async fn mount_ok(server: &MockServer) {
    Mock::given(path("/api/v1/users")).respond_with(ResponseTemplate::new(200)).mount(server).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn created_member_is_sent_with_directory_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users"))
        .and(header("authorization", "Bearer nexus-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let f = fixture(Some(nexus(&server)));

    let new_user = NewUser::new("jdoe", "jdoe@example.org").with_names("Jane", "Doe");
    let user = f.users.create(new_user).await.unwrap();

    let sent = requests_to(&server, "POST", "/api/v1/users").await;
    assert_eq!(
        sent,
        vec![json!([{
            "id": user.id.to_string(),
            "kind": "",
            "first_name": "Jane",
            "last_name": "Doe",
            "email": "jdoe@example.org",
            "phone": "",
            "last_login": null,
            "auth": "PRO_CONNECT"
        }])]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn last_login_is_sent_as_iso_8601() {
    let server = MockServer::start().await;
    mount_ok(&server).await;
    let f = fixture(Some(nexus(&server)));
    let user = f.users.create(NewUser::new("jdoe", "jdoe@example.org")).await.unwrap();
    server.reset().await;
    mount_ok(&server).await;

    let login = Utc.with_ymd_and_hms(2025, 11, 2, 8, 30, 0).unwrap();
    f.users.save(&User { last_login: Some(login), ..user }).await.unwrap();

    let sent = requests_to(&server, "POST", "/api/v1/users").await;
    assert_eq!(sent[0][0]["last_login"], "2025-11-02T08:30:00+00:00");
}

#[tokio::test(flavor = "multi_thread")]
async fn bulk_deactivation_sends_a_single_delete() {
    let server = MockServer::start().await;
    mount_ok(&server).await;
    let f = fixture(Some(nexus(&server)));
    let a = f.users.create(NewUser::new("a", "a@example.org")).await.unwrap();
    let b = f.users.create(NewUser::new("b", "b@example.org")).await.unwrap();
    server.reset().await;
    mount_ok(&server).await;

    let deactivate = UserChanges { is_active: Some(false), ..Default::default() };
    f.users.update_where(UserFilter::Ids(vec![a.id, b.id]), deactivate).await.unwrap();

    assert!(requests_to(&server, "POST", "/api/v1/users").await.is_empty());
    assert_eq!(
        requests_to(&server, "DELETE", "/api/v1/users").await,
        vec![json!([{"id": a.id.to_string()}, {"id": b.id.to_string()}])]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn save_then_deactivate_in_one_unit_only_deletes() {
    let server = MockServer::start().await;
    mount_ok(&server).await;
    let f = fixture(Some(nexus(&server)));
    let user = f.users.create(NewUser::new("c", "c@example.org")).await.unwrap();
    server.reset().await;
    mount_ok(&server).await;

    let id = user.id;
    f.users
        .atomic(move |unit| {
            let renamed = User { first_name: "Renamed".into(), ..user.clone() };
            unit.save(&renamed)?;
            unit.save(&User { is_active: false, ..renamed })
        })
        .await
        .unwrap();

    assert!(requests_to(&server, "POST", "/api/v1/users").await.is_empty());
    assert_eq!(
        requests_to(&server, "DELETE", "/api/v1/users").await,
        vec![json!([{"id": id.to_string()}])]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn nexus_outage_never_fails_the_save() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let f = fixture(Some(nexus(&server)));

    let user = f.users.create(NewUser::new("d", "d@example.org")).await.expect("save succeeds");
    assert!(f.users.get(user.id).await.unwrap().is_some());
    assert_eq!(requests_to(&server, "POST", "/api/v1/users").await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_directory_sends_nothing() {
    let server = MockServer::start().await;
    let f = fixture(None);

    f.users.create(NewUser::new("e", "e@example.org")).await.unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(matches!(f.service.full_sync().await, Err(CommunauteError::Config(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn full_sync_brackets_published_members() {
    let server = MockServer::start().await;
    mount_ok(&server).await;
    let f = fixture(Some(nexus(&server)));
    let kept = f.users.create(NewUser::new("kept", "kept@example.org")).await.unwrap();
    f.users.create(NewUser::new("inactive", "inactive@example.org").inactive()).await.unwrap();
    f.users.create(NewUser::new("blank", "")).await.unwrap();

    server.reset().await;
    mount_ok(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/sync-start"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"started_at": "2025-11-02T03:00:00Z"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/sync-completed"))
        .and(body_json(json!({"started_at": "2025-11-02T03:00:00Z"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sent = f.service.full_sync().await.unwrap();

    assert_eq!(sent, 1);
    let posted = requests_to(&server, "POST", "/api/v1/users").await;
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0][0]["id"], kept.id.to_string());
}
