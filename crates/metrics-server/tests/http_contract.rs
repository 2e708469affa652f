//! Exercises the HTTP surface end-to-end against an in-memory-backed
//! router, driving requests through `tower::ServiceExt::oneshot` rather
//! than a real listener.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use metrics_core::{Metric, MetricWire};
use metrics_server::config::ServerConfig;
use metrics_server::state::AppState;
use metrics_server::storage::MemoryRepo;
use metrics_server::{router, storage};
use tower::ServiceExt;

fn test_config(key: &str) -> ServerConfig {
    ServerConfig {
        server_address: "127.0.0.1:0".into(),
        store_interval: Duration::from_secs(300),
        store_file: None,
        restore: false,
        key: key.to_string(),
        db_dsn: None,
        private_key: None,
        trusted_subnet: None,
        grpc_address: "127.0.0.1:3200".into(),
        grpc_enabled: false,
    }
}

fn test_app(key: &str) -> axum::Router {
    let repo: Arc<dyn storage::Repository> = Arc::new(MemoryRepo::new());
    let state = AppState {
        repo,
        cfg: Arc::new(test_config(key)),
    };
    router::build(state)
}

fn test_app_with_cfg(cfg: ServerConfig) -> axum::Router {
    let repo: Arc<dyn storage::Repository> = Arc::new(MemoryRepo::new());
    let state = AppState {
        repo,
        cfg: Arc::new(cfg),
    };
    router::build(state)
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn gauge_upsert_and_read_via_url() {
    let app = test_app("");

    let res = app
        .clone()
        .oneshot(
            Request::post("/update/gauge/Custom3/77.7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "Metric saved");

    let res = app
        .oneshot(
            Request::get("/value/gauge/Custom3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "77.7");
}

#[tokio::test]
async fn counter_accumulation_via_json() {
    let app = test_app("");

    for delta in [5, 7] {
        let res = app
            .clone()
            .oneshot(
                Request::post("/update/")
                    .header("content-type", "application/json")
                    .body(Body::from(format!(
                        r#"{{"id":"PollCount","type":"counter","delta":{delta}}}"#
                    )))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = app
        .oneshot(
            Request::post("/value/")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"id":"PollCount","type":"counter"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains(r#""delta":12"#));
}

#[tokio::test]
async fn type_mismatch_is_rejected() {
    let app = test_app("");

    let res = app
        .clone()
        .oneshot(
            Request::post("/update/")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"id":"X","type":"gauge","value":1.0}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(
            Request::post("/update/")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"id":"X","type":"counter","delta":1}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signed_update_with_wrong_hash_is_rejected() {
    let app = test_app("test");

    let res = app
        .oneshot(
            Request::post("/update/")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"id":"G","type":"gauge","value":7.77,"hash":"deadbeef"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_metric_is_not_found() {
    let app = test_app("");
    let res = app
        .oneshot(
            Request::get("/value/gauge/DoesNotExist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn correctly_signed_update_is_accepted() {
    let app = test_app("test");

    let mut m = Metric::gauge("Custom3", 77.7);
    m.fill_hash("test").unwrap();
    let body = serde_json::to_vec(&MetricWire::from(&m)).unwrap();

    let res = app
        .oneshot(
            Request::post("/update/")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn trusted_subnet_admits_and_rejects_by_real_ip() {
    let mut cfg = test_config("");
    cfg.trusted_subnet = Some("10.0.0.0/8".parse().unwrap());
    let app = test_app_with_cfg(cfg);

    let res = app
        .clone()
        .oneshot(
            Request::get("/ping")
                .header("x-real-ip", "10.1.2.3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(
            Request::get("/ping")
                .header("x-real-ip", "192.168.0.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ping_and_index_are_reachable() {
    let app = test_app("");

    let res = app
        .clone()
        .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "ok");

    app.oneshot(
        Request::post("/update/gauge/Alive/1")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
}
