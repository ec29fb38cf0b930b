//! Integration tests for API routes.
//!
//! Uses `tower::ServiceExt` to test Axum routes without a real HTTP server.
//! The scheduler runs with an empty monitor set, so no network is touched.
//!
//! ```bash
//! cargo test -p beacon-api --test integration
//! ```

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use beacon_api::routes::create_router;
use beacon_api::state::AppState;
use beacon_common::config::AppConfig;
use beacon_common::types::{Notification, Source};
use beacon_engine::store::NOTIFICATIONS_FILE;
use beacon_engine::{NotificationStore, Scheduler};
use beacon_notifier::{DeliveryGuard, LogSink};

// ============================================================
// Helpers
// ============================================================

struct TestApp {
    state: AppState,
    store: Arc<NotificationStore>,
    _dir: tempfile::TempDir,
}

fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        data_dir: dir.path().to_path_buf(),
        github_token: "ghp_secret".to_string(),
        ..AppConfig::default()
    };
    let store = Arc::new(NotificationStore::load(dir.path().join(NOTIFICATIONS_FILE)));
    let guard = Arc::new(DeliveryGuard::new(Arc::new(LogSink)));
    let scheduler = Scheduler::new(
        config,
        store.clone(),
        guard,
        Box::new(|_: &AppConfig| Vec::new()),
    );

    TestApp {
        state: AppState::new(Arc::new(scheduler)),
        store,
        _dir: dir,
    }
}

fn router(app: &TestApp) -> Router {
    create_router(app.state.clone())
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn put_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

// ============================================================
// Routes
// ============================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();
    let response = router(&app).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "beacon-api");
}

#[tokio::test]
async fn test_status_reflects_lifecycle() {
    let app = test_app();

    let response = router(&app).oneshot(get("/api/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["state"], "stopped");
    assert_eq!(json["running"], false);
    assert_eq!(json["poll_interval_secs"], 60);

    app.state.scheduler.start();
    let json = body_json(router(&app).oneshot(get("/api/status")).await.unwrap()).await;
    assert_eq!(json["state"], "running");
    assert_eq!(json["running"], true);

    app.state.scheduler.stop().await;
}

#[tokio::test]
async fn test_check_requires_running_scheduler() {
    let app = test_app();
    let check = || {
        Request::builder()
            .method("POST")
            .uri("/api/check")
            .body(Body::empty())
            .unwrap()
    };

    let response = router(&app).oneshot(check()).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("not running"));

    app.state.scheduler.start();
    let response = router(&app).oneshot(check()).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["triggered"], true);

    app.state.scheduler.stop().await;
}

#[tokio::test]
async fn test_notifications_returns_store_snapshot() {
    let app = test_app();
    app.store.add(&[
        Notification {
            id: "github_2".to_string(),
            title: "[o/r] Second".to_string(),
            content: "Second".to_string(),
            link: "https://github.com/o/r/issues/2".to_string(),
            source: Source::Github,
            time: 1_700_000_100,
        },
        Notification {
            id: "community_article_1".to_string(),
            title: "First".to_string(),
            content: "Preview".to_string(),
            link: "https://ld246.com/article/1".to_string(),
            source: Source::Community,
            time: 1_700_000_000,
        },
    ]);

    let response = router(&app)
        .oneshot(get("/api/notifications"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], "github_2");
    assert_eq!(items[1]["source"], "community");
}

#[tokio::test]
async fn test_config_update_validates_and_redacts() {
    let app = test_app();

    let response = router(&app)
        .oneshot(put_json(
            "/api/config",
            serde_json::json!({"poll_interval_secs": 5}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.state.scheduler.config().poll_interval_secs, 60);

    let response = router(&app)
        .oneshot(put_json(
            "/api/config",
            serde_json::json!({"poll_interval_secs": 120, "community_token": " tok "}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["poll_interval_secs"], 120);
    assert_eq!(json["github_token"], "***");
    assert_eq!(json["community_token"], "***");

    let config = app.state.scheduler.config();
    assert_eq!(config.poll_interval_secs, 120);
    assert_eq!(config.community_token, "tok");
    assert_eq!(config.github_token, "ghp_secret");
}
