//! End-to-end tests against a simulated vendor API.
//!
//! A wiremock server stands in for the GoHighLevel REST surface: the token
//! endpoint, the pipelines list, the opportunity search (with and without
//! nested tasks), and the per-contact task endpoint. No real network access
//! is needed.

use std::sync::Arc;

use bridge::config::{Config, StoreBackend};
use bridge::errors::AppError;
use bridge::fetcher::Fetcher;
use bridge::ghl::VendorClient;
use bridge::models::token::TokenRecord;
use bridge::oauth::SessionManager;
use bridge::store::memory::MemoryStore;
use bridge::store::TokenStore;
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param,
    query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn vendor_for(mock: &MockServer) -> VendorClient {
    VendorClient::new(mock.uri(), format!("{}/oauth/token", mock.uri()))
}

fn session_for(mock: &MockServer, store: Arc<dyn TokenStore>) -> SessionManager {
    SessionManager::new(
        vendor_for(mock),
        store,
        "client-id".into(),
        "client-secret".into(),
        "http://localhost:3000/oauth/callback".into(),
        "https://marketplace.gohighlevel.com/oauth/chooselocation".into(),
        None,
    )
}

fn token_body(access: &str) -> serde_json::Value {
    json!({
        "access_token": access,
        "refresh_token": "rt-1",
        "expires_in": 86400,
        "locationId": "loc_1"
    })
}

fn stored_record(expires_in_secs: i64) -> TokenRecord {
    TokenRecord {
        tenant_id: "loc_1".into(),
        access_token: "at-stored".into(),
        refresh_token: "rt-stored".into(),
        expires_at: Utc::now() + chrono::Duration::seconds(expires_in_secs),
    }
}

// ── Wiring ───────────────────────────────────────────────────

#[test]
fn default_log_filter_names_the_library_target() {
    // The lib crate is `bridge`; a filter that omits it silently drops
    // every event logged from inside the library.
    tracing_subscriber::EnvFilter::try_new(bridge::DEFAULT_LOG_FILTER).unwrap();
    assert!(bridge::DEFAULT_LOG_FILTER.contains("bridge="));
}

#[tokio::test]
async fn store_backend_selection_follows_config() {
    let mock = MockServer::start().await;

    // Memory backend: records live in the process only.
    let cfg = test_config(&mock);
    assert_eq!(cfg.store_backend, StoreBackend::Memory);
    let store = bridge::store::connect(&cfg).await.unwrap();
    store.put(stored_record(3600)).await.unwrap();
    assert!(store.get("loc_1").await.unwrap().is_some());

    // File backend: the token file appears on disk.
    let dir = std::env::temp_dir().join(format!("ghlink-test-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let mut cfg = test_config(&mock);
    cfg.store_backend = StoreBackend::File;
    cfg.token_file = dir.join("tokens.json").to_string_lossy().into_owned();
    let store = bridge::store::connect(&cfg).await.unwrap();
    store.put(stored_record(3600)).await.unwrap();
    assert!(tokio::fs::try_exists(&cfg.token_file).await.unwrap());
    assert!(store.get("loc_1").await.unwrap().is_some());
    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

// ── OAuth lifecycle ──────────────────────────────────────────

#[tokio::test]
async fn authorization_flow_stores_token_keyed_by_location() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1")))
        .expect(1)
        .mount(&mock)
        .await;

    let store: Arc<dyn TokenStore> = Arc::new(MemoryStore::new());
    let session = session_for(&mock, store.clone());

    let auth = session.begin_authorization().unwrap();
    assert!(auth.authorization_url.contains("response_type=code"));
    assert!(auth.authorization_url.contains(&auth.state));

    let record = session
        .complete_authorization("the-code", Some(&auth.state))
        .await
        .unwrap();
    assert_eq!(record.tenant_id, "loc_1");
    assert!(record.is_valid_at(Utc::now()));

    let stored = store.get("loc_1").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "at-1");
}

#[tokio::test]
async fn callback_rejects_missing_code_and_unknown_state() {
    let mock = MockServer::start().await;
    let session = session_for(&mock, Arc::new(MemoryStore::new()));

    let err = session.complete_authorization("", Some("whatever")).await;
    assert!(matches!(err, Err(AppError::MissingCode)));

    let err = session
        .complete_authorization("the-code", Some("never-issued"))
        .await;
    assert!(matches!(err, Err(AppError::StateMismatch)));

    let auth = session.begin_authorization().unwrap();
    let err = session.complete_authorization("the-code", None).await;
    assert!(matches!(err, Err(AppError::StateMismatch)));
    drop(auth);
}

#[tokio::test]
async fn second_code_redemption_surfaces_auth_exchange_error() {
    let mock = MockServer::start().await;
    // Vendor contract: codes are single-use, a replay gets a 4xx.
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
        )
        .mount(&mock)
        .await;

    let session = session_for(&mock, Arc::new(MemoryStore::new()));
    let auth = session.begin_authorization().unwrap();
    let err = session
        .complete_authorization("already-used", Some(&auth.state))
        .await;
    assert!(matches!(err, Err(AppError::AuthExchange(_))));
}

#[tokio::test]
async fn status_reports_expired_record_as_unauthenticated() {
    let mock = MockServer::start().await;
    let store: Arc<dyn TokenStore> = Arc::new(MemoryStore::new());
    let session = session_for(&mock, store.clone());

    // No record at all.
    let status = session.get_status("loc_1").await.unwrap();
    assert!(!status.authenticated);
    assert!(status.expires_at.is_none());

    store.put(stored_record(-5)).await.unwrap();
    let status = session.get_status("loc_1").await.unwrap();
    assert!(!status.authenticated);
    assert!(status.expires_at.is_some());

    store.put(stored_record(3600)).await.unwrap();
    let status = session.get_status("loc_1").await.unwrap();
    assert!(status.authenticated);
}

#[tokio::test]
async fn refresh_replaces_the_record_wholesale() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-stored"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-new",
            "refresh_token": "rt-new",
            "expires_in": 86400,
            "locationId": "loc_1"
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let store: Arc<dyn TokenStore> = Arc::new(MemoryStore::new());
    store.put(stored_record(60)).await.unwrap();

    let session = session_for(&mock, store.clone());
    let record = session.refresh("loc_1").await.unwrap();
    assert_eq!(record.access_token, "at-new");

    let stored = store.get("loc_1").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "at-new");
    assert_eq!(stored.refresh_token, "rt-new");
}

#[tokio::test]
async fn refresh_failures_are_typed_and_not_retried() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_grant"})),
        )
        .expect(1) // exactly one attempt: no automatic retry
        .mount(&mock)
        .await;

    let store: Arc<dyn TokenStore> = Arc::new(MemoryStore::new());
    let session = session_for(&mock, store.clone());

    let err = session.refresh("loc_1").await;
    assert!(matches!(err, Err(AppError::NoRefreshToken { .. })));

    store.put(stored_record(60)).await.unwrap();
    let err = session.refresh("loc_1").await;
    assert!(matches!(err, Err(AppError::RefreshRejected(_))));
}

// ── Vendor client contract ───────────────────────────────────

#[tokio::test]
async fn pipeline_fetch_sends_version_header_and_location() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/opportunities/pipelines"))
        .and(query_param("locationId", "loc_1"))
        .and(header("Version", "2021-07-28"))
        .and(header("Authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pipelines": [
                {"id": "p1", "name": "Client Software Development Pipeline", "stages": []}
            ]
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let vendor = vendor_for(&mock);
    let pipelines = vendor.get_pipelines("at-1", "loc_1").await.unwrap();
    assert_eq!(pipelines.len(), 1);
    assert_eq!(pipelines[0].id, "p1");
}

#[tokio::test]
async fn vendor_status_codes_map_to_taxonomy() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contacts/c429/tasks"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/contacts/c401/tasks"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock)
        .await;

    let vendor = vendor_for(&mock);
    assert!(matches!(
        vendor.contact_tasks("at-1", "c429").await,
        Err(AppError::RateLimited)
    ));
    assert!(matches!(
        vendor.contact_tasks("at-1", "c401").await,
        Err(AppError::AuthenticationExpired)
    ));
}

// ── Fetcher fallback chain ───────────────────────────────────

fn search_body_with_tasks() -> serde_json::Value {
    json!({
        "opportunities": [{
            "id": "o1",
            "name": "Proj A",
            "status": "open",
            "pipelineStageName": "Proposal",
            "monetaryValue": 5000.0,
            "contactId": "c1",
            "pipelineId": "p1",
            "tasks": [
                {"id": "t1", "title": "Call", "completed": false}
            ]
        }]
    })
}

#[tokio::test]
async fn nested_search_is_the_primary_tier() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/opportunities/search"))
        .and(query_param("pipeline_id", "p1"))
        .and(query_param("getTasks", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body_with_tasks()))
        .expect(1)
        .mount(&mock)
        .await;

    let fetcher = Fetcher::new(vendor_for(&mock), 10);
    let outcome = fetcher
        .fetch_tasks_for_pipeline("at-1", "loc_1", "p1", "open", 100)
        .await
        .unwrap();

    assert_eq!(outcome.source, "nested-search");
    assert_eq!(outcome.tasks.len(), 1);
    assert_eq!(outcome.tasks[0].opportunity_id, "o1");
    assert_eq!(outcome.tasks[0].opportunity_title, "Proj A");
    assert_eq!(outcome.tasks[0].opportunity_value, Some(5000.0));
}

/// Primary tier throws AuthenticationExpired; the caller observes the
/// fallback tier's result, not the primary error.
#[tokio::test]
async fn fallback_result_masks_primary_failure() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/opportunities/search"))
        .and(query_param("getTasks", "true"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/opportunities/search"))
        .and(query_param_is_missing("getTasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "opportunities": [{
                "id": "o1",
                "name": "Proj A",
                "status": "open",
                "contactId": "c1"
            }]
        })))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/contacts/c1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tasks": [{"id": "t9", "title": "Follow up", "completed": false}]
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let fetcher = Fetcher::new(vendor_for(&mock), 10);
    let outcome = fetcher
        .fetch_tasks_for_pipeline("at-1", "loc_1", "p1", "open", 100)
        .await
        .unwrap();

    assert_eq!(outcome.source, "contact-walk");
    assert_eq!(outcome.tasks.len(), 1);
    assert_eq!(outcome.tasks[0].id, "t9");
    assert_eq!(outcome.tasks[0].opportunity_id, "o1");
}

#[tokio::test]
async fn contact_walk_respects_the_contact_cap() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/opportunities/search"))
        .and(query_param("getTasks", "true"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock)
        .await;

    let opportunities: Vec<_> = (0..5)
        .map(|i| {
            json!({
                "id": format!("o{i}"),
                "name": format!("Opp {i}"),
                "contactId": format!("c{i}")
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/opportunities/search"))
        .and(query_param_is_missing("getTasks"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "opportunities": opportunities })),
        )
        .mount(&mock)
        .await;

    // Only the first two contacts may be walked.
    for i in 0..2 {
        Mock::given(method("GET"))
            .and(path(format!("/contacts/c{i}/tasks")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tasks": [{"id": format!("t{i}"), "title": "T", "completed": false}]
            })))
            .expect(1)
            .mount(&mock)
            .await;
    }
    for i in 2..5 {
        Mock::given(method("GET"))
            .and(path(format!("/contacts/c{i}/tasks")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tasks": []})))
            .expect(0)
            .mount(&mock)
            .await;
    }

    let fetcher = Fetcher::new(vendor_for(&mock), 2);
    let outcome = fetcher
        .fetch_tasks_for_pipeline("at-1", "loc_1", "p1", "open", 100)
        .await
        .unwrap();

    assert_eq!(outcome.source, "contact-walk");
    assert_eq!(outcome.tasks.len(), 2);
}

#[tokio::test]
async fn exhausted_chain_reports_every_tier() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/opportunities/search"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock)
        .await;

    let fetcher = Fetcher::new(vendor_for(&mock), 10);
    let err = fetcher
        .fetch_tasks_for_pipeline("at-1", "loc_1", "p1", "open", 100)
        .await
        .unwrap_err();

    match err {
        AppError::FallbackExhausted { attempts } => {
            let tiers: Vec<_> = attempts.iter().map(|(t, _)| t.as_str()).collect();
            assert_eq!(tiers, vec!["nested-search", "contact-walk"]);
        }
        other => panic!("expected FallbackExhausted, got {other:?}"),
    }
}

// ── HTTP surface ─────────────────────────────────────────────

fn test_config(mock: &MockServer) -> Config {
    Config {
        port: 0,
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
        redirect_uri: "http://localhost:3000/oauth/callback".into(),
        api_base_url: mock.uri(),
        token_url: format!("{}/oauth/token", mock.uri()),
        auth_url: "https://marketplace.gohighlevel.com/oauth/chooselocation".into(),
        default_location_id: Some("loc_1".into()),
        default_pipeline: "Client Software Development Pipeline".into(),
        store_backend: StoreBackend::Memory,
        token_file: "unused.json".into(),
        database_url: "postgres://unused".into(),
        fallback_contact_cap: 10,
    }
}

async fn request_json(
    app: axum::Router,
    req: axum::http::Request<axum::body::Body>,
) -> (axum::http::StatusCode, serde_json::Value) {
    use tower::util::ServiceExt;

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

#[tokio::test]
async fn oauth_init_returns_url_and_state() {
    let mock = MockServer::start().await;
    let state = Arc::new(bridge::AppState::from_config(test_config(&mock)).await.unwrap());
    let app = bridge::api::router(state);

    let (status, body) = request_json(
        app,
        axum::http::Request::get("/oauth/init")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["success"], true);
    let url = body["auth_url"].as_str().unwrap();
    assert!(url.starts_with("https://marketplace.gohighlevel.com/oauth/chooselocation"));
    assert!(url.contains("scope="));
    assert!(!body["state"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn pipeline_tasks_route_resolves_names_case_insensitively() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/opportunities/pipelines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pipelines": [
                {"id": "p1", "name": "Client Software Development Pipeline", "stages": []}
            ]
        })))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/opportunities/search"))
        .and(query_param("getTasks", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body_with_tasks()))
        .mount(&mock)
        .await;

    let state = Arc::new(bridge::AppState::from_config(test_config(&mock)).await.unwrap());
    state.store.put(stored_record(3600)).await.unwrap();
    let app = bridge::api::router(state);

    let (status, body) = request_json(
        app,
        axum::http::Request::get("/pipelines/software%20dev/tasks")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["pipeline"]["id"], "p1");
    assert_eq!(body["opportunities_count"], 1);
    assert_eq!(body["tasks_count"], 1);
    assert_eq!(body["tasks"][0]["opportunity_id"], "o1");
}

#[tokio::test]
async fn unknown_pipeline_returns_404_with_available_names() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/opportunities/pipelines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pipelines": [
                {"id": "p1", "name": "Client Software Development Pipeline", "stages": []}
            ]
        })))
        .mount(&mock)
        .await;

    let state = Arc::new(bridge::AppState::from_config(test_config(&mock)).await.unwrap());
    state.store.put(stored_record(3600)).await.unwrap();
    let app = bridge::api::router(state);

    let (status, body) = request_json(
        app,
        axum::http::Request::get("/pipelines/Sales%20Pipeline/tasks")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["error"]["available_pipelines"][0],
        "Client Software Development Pipeline"
    );
}

#[tokio::test]
async fn expired_session_gets_a_remediation_hint() {
    let mock = MockServer::start().await;
    let state = Arc::new(bridge::AppState::from_config(test_config(&mock)).await.unwrap());
    state.store.put(stored_record(-5)).await.unwrap();
    let app = bridge::api::router(state);

    let (status, body) = request_json(
        app,
        axum::http::Request::get("/pipelines")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);
    assert!(body["error"]["remediation"]
        .as_str()
        .unwrap()
        .contains("/oauth/init"));
}

#[tokio::test]
async fn structured_query_filters_opportunities_and_limits_tasks() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/opportunities/pipelines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pipelines": [
                {"id": "p1", "name": "Client Software Development Pipeline", "stages": []}
            ]
        })))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/opportunities/search"))
        .and(query_param("status", "open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "opportunities": [
                {
                    "id": "o1",
                    "name": "Project TechCEO",
                    "status": "open",
                    "tasks": [
                        {"id": "t1", "title": "Done already", "completed": true},
                        {"id": "t2", "title": "Call", "completed": false},
                        {"id": "t3", "title": "Email", "completed": false}
                    ]
                },
                {
                    "id": "o2",
                    "name": "Unrelated",
                    "status": "open",
                    "tasks": [{"id": "t4", "title": "Skip me", "completed": false}]
                }
            ]
        })))
        .mount(&mock)
        .await;

    let state = Arc::new(bridge::AppState::from_config(test_config(&mock)).await.unwrap());
    state.store.put(stored_record(3600)).await.unwrap();
    let app = bridge::api::router(state);

    let payload = json!({
        "interpretation": {
            "opportunity_names": ["techceo"],
            "task_limit": 1
        }
    });
    let (status, body) = request_json(
        app,
        axum::http::Request::post("/tasks/query")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(payload.to_string()))
            .unwrap(),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["tasks_count"], 1);
    assert_eq!(body["tasks"][0]["id"], "t2");
    assert_eq!(body["tasks"][0]["opportunity_id"], "o1");
}
