mod support;

use std::time::Duration;

use axum::http::StatusCode;
use support::{TestApp, body_string};
use yatube::cache::CacheConfig;

#[tokio::test]
async fn index_serves_stale_copy_until_cleared() {
    let app = TestApp::new();
    let author = app.user("leo").await;
    app.post(&author, "before-cache", None).await;

    let first = body_string(app.get("/", None).await).await;
    assert!(first.contains("before-cache"));

    app.post(&author, "after-cache", None).await;
    let cached = body_string(app.get("/", None).await).await;
    assert_eq!(cached, first);
    assert!(!cached.contains("after-cache"));

    app.state.cache.clear();
    let fresh = body_string(app.get("/", None).await).await;
    assert!(fresh.contains("after-cache"));
}

#[tokio::test]
async fn other_pages_are_never_cached() {
    let app = TestApp::new();
    let author = app.user("leo").await;
    app.post(&author, "first", None).await;

    let _ = app.get("/profile/leo/", None).await;
    app.post(&author, "second", None).await;
    let html = body_string(app.get("/profile/leo/", None).await).await;
    assert!(html.contains("second"));
    assert!(app.state.cache.store.is_empty());
}

#[tokio::test]
async fn viewers_get_separate_entries() {
    let app = TestApp::new();
    let (_, cookie) = app.sign_in("leo").await;

    let anonymous = body_string(app.get("/", None).await).await;
    let signed_in = body_string(app.get("/", Some(&cookie)).await).await;
    assert!(!anonymous.contains("Log out"));
    assert!(signed_in.contains("Log out"));
    assert_eq!(app.state.cache.store.len(), 2);
}

#[tokio::test]
async fn disabled_cache_always_renders() {
    let app = TestApp::with_cache(CacheConfig {
        enable_response_cache: false,
        ..Default::default()
    });
    let author = app.user("leo").await;

    let _ = app.get("/", None).await;
    app.post(&author, "visible-at-once", None).await;
    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("visible-at-once"));
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let app = TestApp::with_cache(CacheConfig {
        response_ttl: Duration::from_millis(50),
        ..Default::default()
    });
    let author = app.user("leo").await;

    let _ = app.get("/", None).await;
    app.post(&author, "after-expiry", None).await;
    tokio::time::sleep(Duration::from_millis(120)).await;

    let html = body_string(app.get("/", None).await).await;
    assert!(html.contains("after-expiry"));
}
