#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    middleware::from_fn_with_state,
    response::Response,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use meterline_core::AppError;
use meterline_server::account::InMemoryAccountRepository;
use meterline_server::api::ApiError;
use meterline_server::app_state::AppState;
use meterline_server::config::AppConfig;
use meterline_server::middleware::{error_boundary, track_request};
use meterline_server::obs::{MetricsProvider, PrometheusProvider};
use meterline_server::router::build_router;

const MISSING: &str = "550e8400-e29b-41d4-a716-446655440000";

fn state_with_provider() -> (AppState, Arc<PrometheusProvider>) {
    let cfg = AppConfig::default();
    let provider = Arc::new(PrometheusProvider::new(&cfg.metrics).unwrap());
    let dynp: Arc<dyn MetricsProvider> = provider.clone();
    let state = AppState::with_parts(cfg, Some(dynp), Arc::new(InMemoryAccountRepository::new()));
    (state, provider)
}

fn app() -> (Router, Arc<PrometheusProvider>) {
    let (state, provider) = state_with_provider();
    (build_router(state), provider)
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(resp: Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn missing_account_is_measured_once() {
    let (app, p) = app();
    let resp = app
        .oneshot(get_req(&format!("/api/v1/account/{MISSING}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body = body_json(resp).await;
    assert_eq!(body["statusCode"], 404);
    assert_eq!(body["error"], "NOT_FOUND");
    assert_eq!(body["message"], "Account not found");
    assert!(body["timestamp"].is_string());

    assert_eq!(
        p.http_requests_total().get(&["GET", "/account/:id", "404"]),
        Some(1)
    );
    assert_eq!(
        p.http_exceptions_total()
            .get(&["GET", "/account/:id", "NotFoundError"]),
        Some(1)
    );
    assert_eq!(p.http_exceptions_total().series_count(), 1);
    assert_eq!(
        p.http_requests_in_progress().get(&["GET", "/account/:id"]),
        Some(0.0)
    );
    let snap = p
        .http_request_duration()
        .snapshot(&["GET", "/account/:id"])
        .unwrap();
    assert_eq!(snap.count, 1);
}

#[tokio::test]
async fn invalid_uuid_is_a_bad_request() {
    let (app, p) = app();
    let resp = app.oneshot(get_req("/api/v1/account/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "BAD_REQUEST");
    assert_eq!(
        p.http_exceptions_total()
            .get(&["GET", "/account/:id", "InvalidArgumentError"]),
        Some(1)
    );
}

#[tokio::test]
async fn account_lifecycle_records_success_and_business_counters() {
    let (app, p) = app();

    let resp = app
        .clone()
        .oneshot(json_req(
            "POST",
            "/api/v1/account",
            json!({ "name": "  Savings ", "number": 12.346 }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    assert_eq!(created["name"], "Savings");
    assert_eq!(created["number"], 12.35);
    let id = created["id"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(json_req(
            "PUT",
            &format!("/api/v1/account/{id}"),
            json!({ "name": "Checking", "number": 1.0, "description": "main" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["description"], "main");

    let resp = app.clone().oneshot(get_req("/api/v1/account")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await.as_array().unwrap().len(), 1);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/account/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    assert_eq!(
        p.http_requests_total().get(&["POST", "/account", "201"]),
        Some(1)
    );
    assert_eq!(
        p.http_requests_total().get(&["DELETE", "/account/:id", "204"]),
        Some(1)
    );
    assert_eq!(p.http_exceptions_total().series_count(), 0);
    assert_eq!(
        p.custom_counter("account_created").unwrap().get(&["create"]),
        Some(1)
    );
    assert_eq!(
        p.custom_counter("account_deleted").unwrap().get(&["delete"]),
        Some(1)
    );
    assert_eq!(
        p.custom_counter("database_operations").unwrap().get(&["update"]),
        Some(1)
    );
}

#[tokio::test]
async fn malformed_body_is_an_invalid_request() {
    let (app, p) = app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/account")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        p.http_exceptions_total()
            .get(&["POST", "/account", "InvalidRequestError"]),
        Some(1)
    );
}

#[tokio::test]
async fn validation_failure_counts_business_error() {
    let (app, p) = app();
    let resp = app
        .oneshot(json_req("POST", "/api/v1/account", json!({ "name": "  ", "number": 1 })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        p.custom_counter("business_validation_errors")
            .unwrap()
            .get(&["InvalidArgumentError"]),
        Some(1)
    );
}

#[tokio::test]
async fn unrouted_request_is_counted_by_the_hook_only() {
    let (app, p) = app();
    let resp = app.oneshot(get_req("/api/v1/nothing/42")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["message"], "Cannot GET /api/v1/nothing/42");

    assert_eq!(
        p.http_exceptions_total()
            .get(&["GET", "/unmatched", "NotFoundError"]),
        Some(1)
    );
    assert_eq!(p.http_requests_total().series_count(), 0);
    assert_eq!(p.http_requests_in_progress().series_count(), 0);
}

#[tokio::test]
async fn metrics_endpoint_serves_exposition_without_self_measuring() {
    let (app, p) = app();
    app.clone()
        .oneshot(get_req(&format!("/api/v1/account/{MISSING}")))
        .await
        .unwrap();

    let resp = app.oneshot(get_req("/metrics")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let h = resp.headers();
    assert_eq!(h[header::CONTENT_TYPE], "text/plain; version=0.0.4; charset=utf-8");
    assert_eq!(h[header::CACHE_CONTROL], "no-store, no-cache, must-revalidate");
    assert_eq!(h[header::PRAGMA], "no-cache");
    assert_eq!(h[header::EXPIRES], "0");

    let text = body_text(resp).await;
    assert!(text.contains(
        "http_requests_total{method=\"GET\",path=\"/account/:id\",status_code=\"404\"} 1"
    ));
    assert!(text.contains("database_connection_status{database_name=\"meterline-db\"} 1"));
    assert!(text.contains("meterline_process_resident_memory_bytes"));

    assert!(p.http_requests_total().get(&["GET", "/metrics", "200"]).is_none());
}

#[tokio::test]
async fn health_reports_uptime_and_provider() {
    let (app, p) = app();
    let resp = app.oneshot(get_req("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["metrics_provider"], "prometheus");
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);
    assert!(body["memory"]["rss_bytes"].is_u64());
    assert_eq!(p.http_requests_total().series_count(), 0);
}

#[tokio::test]
async fn upgrade_requests_pass_through_unmeasured() {
    let (app, p) = app();
    let req = Request::builder()
        .uri("/api/v1/account")
        .header(header::UPGRADE, "websocket")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(p.http_requests_total().series_count(), 0);
    assert_eq!(p.http_requests_in_progress().series_count(), 0);
}

#[tokio::test]
async fn concurrent_requests_leave_in_progress_at_zero() {
    let (app, p) = app();
    let reqs = (0..32).map(|i| {
        let app = app.clone();
        async move {
            let uri = if i % 2 == 0 {
                "/api/v1/account".to_string()
            } else {
                format!("/api/v1/account/{MISSING}")
            };
            app.oneshot(get_req(&uri)).await.unwrap().status()
        }
    });
    let statuses = futures_util::future::join_all(reqs).await;
    assert_eq!(statuses.len(), 32);

    assert_eq!(p.http_requests_total().get(&["GET", "/account", "200"]), Some(16));
    assert_eq!(
        p.http_requests_total().get(&["GET", "/account/:id", "404"]),
        Some(16)
    );
    assert_eq!(p.http_requests_in_progress().get(&["GET", "/account"]), Some(0.0));
    assert_eq!(
        p.http_requests_in_progress().get(&["GET", "/account/:id"]),
        Some(0.0)
    );
}

#[tokio::test]
async fn disabled_metrics_leave_business_routes_working() {
    let mut cfg = AppConfig::default();
    cfg.metrics.enabled = false;
    let app = build_router(AppState::new(cfg).unwrap());

    let resp = app.clone().oneshot(get_req("/metrics")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .clone()
        .oneshot(json_req("POST", "/api/v1/account", json!({ "name": "a", "number": 2 })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app.oneshot(get_req("/health")).await.unwrap();
    assert_eq!(body_json(resp).await["metrics_provider"], "disabled");
}

async fn timed_out() -> Result<&'static str, ApiError> {
    Err(ApiError(AppError::Timeout {
        message: "upstream slow".into(),
        status: Some(504),
    }))
}

async fn exploding() -> &'static str {
    panic!("request timed out while waiting on lock")
}

async fn stalled() -> &'static str {
    tokio::time::sleep(Duration::from_secs(30)).await;
    "late"
}

fn fixture_router(state: AppState) -> Router {
    Router::new()
        .route("/fixture/timeout", get(timed_out))
        .route("/fixture/panic", get(exploding))
        .route("/fixture/stalled", get(stalled))
        .route_layer(from_fn_with_state(state.clone(), track_request))
        .layer(from_fn_with_state(state.clone(), error_boundary))
        .with_state(state)
}

#[tokio::test]
async fn explicit_status_wins_over_variant_mapping() {
    let (state, p) = state_with_provider();
    let resp = fixture_router(state)
        .oneshot(get_req("/fixture/timeout"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(
        p.http_requests_total().get(&["GET", "/fixture/timeout", "504"]),
        Some(1)
    );
    assert_eq!(
        p.http_exceptions_total()
            .get(&["GET", "/fixture/timeout", "TimeoutError"]),
        Some(1)
    );
}

#[tokio::test]
async fn handler_panic_becomes_500_and_is_counted_once() {
    let (state, p) = state_with_provider();
    let resp = fixture_router(state)
        .oneshot(get_req("/fixture/panic"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await["error"], "INTERNAL");

    assert_eq!(
        p.http_requests_total().get(&["GET", "/fixture/panic", "500"]),
        Some(1)
    );
    assert_eq!(
        p.http_exceptions_total()
            .get(&["GET", "/fixture/panic", "TimeoutError"]),
        Some(1)
    );
    assert_eq!(p.http_exceptions_total().series_count(), 1);
    assert_eq!(
        p.http_requests_in_progress().get(&["GET", "/fixture/panic"]),
        Some(0.0)
    );
}

#[tokio::test]
async fn dropped_request_releases_in_progress() {
    let (state, p) = state_with_provider();
    let pending = fixture_router(state).oneshot(get_req("/fixture/stalled"));
    let res = tokio::time::timeout(Duration::from_millis(50), pending).await;
    assert!(res.is_err(), "handler should still be pending");

    assert_eq!(
        p.http_requests_in_progress().get(&["GET", "/fixture/stalled"]),
        Some(0.0)
    );
    assert_eq!(p.http_requests_total().series_count(), 0);
}

#[tokio::test]
async fn unrouted_paths_share_one_label() {
    let (app, p) = app();
    for i in 0..20 {
        let resp = app
            .clone()
            .oneshot(get_req(&format!("/scan/x{i}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
    assert_eq!(p.http_exceptions_total().series_count(), 1);
    assert_eq!(
        p.http_exceptions_total()
            .get(&["GET", "/unmatched", "NotFoundError"]),
        Some(20)
    );
}

#[tokio::test]
async fn extension_methods_share_one_label() {
    let (app, p) = app();
    for i in 0..10 {
        let req = Request::builder()
            .method(format!("M{i}X").as_str())
            .uri("/api/v1/account")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
    assert_eq!(p.http_requests_total().series_count(), 1);
    assert_eq!(
        p.http_requests_total().get(&["OTHER", "/account", "405"]),
        Some(10)
    );
}

#[tokio::test]
async fn metrics_path_under_api_is_not_self_measured() {
    let mut cfg = AppConfig::default();
    cfg.metrics.path = "/api/metrics".to_string();
    cfg.validate().unwrap();
    let provider = Arc::new(PrometheusProvider::new(&cfg.metrics).unwrap());
    let dynp: Arc<dyn MetricsProvider> = provider.clone();
    let app = build_router(AppState::with_parts(
        cfg,
        Some(dynp),
        Arc::new(InMemoryAccountRepository::new()),
    ));

    let resp = app.oneshot(get_req("/api/metrics")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(provider.http_requests_total().series_count(), 0);
    assert_eq!(provider.http_requests_in_progress().series_count(), 0);
}
