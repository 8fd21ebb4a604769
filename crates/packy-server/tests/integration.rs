use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use http_body_util::BodyExt;
use packy_core::savestate::SaveState;
use packy_core::{ActionType, Config, Flag, Maintainer, PackageStore};
use packy_server::{build_router, AppState};
use tokio::sync::RwLock;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Store with alice owning three packages, one flagged per action.
fn seeded_state() -> AppState {
    let store = Arc::new(PackageStore::open_in_memory().unwrap());
    let now = Utc::now();
    for (pkg, owner) in [
        ("python-foo", "alice"),
        ("python-bar", "alice"),
        ("zstd", "alice"),
        ("lonely", "orphan"),
    ] {
        store.upsert_ownership(pkg, owner, now).unwrap();
    }
    store
        .set_flag("python-foo", ActionType::Move, Flag::Grace)
        .unwrap();
    store.set_flag("zstd", ActionType::Update, Flag::New).unwrap();

    let save_state = SaveState {
        last_sync: Some(now),
        moves: vec!["python-foo".into()],
        updates: vec!["zstd".into()],
    };
    let config = Config {
        maintainers: vec![Maintainer::named("bob"), Maintainer::named("alice")],
        ..Config::default()
    };
    AppState::new(&config, store, Arc::new(RwLock::new(save_state)))
}

/// Send a GET request via `oneshot` and return (status, raw body).
async fn get_raw(app: axum::Router, uri: &str) -> (StatusCode, String) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned())
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = get_raw(app, uri).await;
    let json = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Value of the sample `name{labels..}` in a Prometheus text exposition.
fn gauge(body: &str, name: &str, labels: &[(&str, &str)]) -> Option<i64> {
    body.lines()
        .filter(|l| !l.starts_with('#'))
        .filter(|l| l.starts_with(&format!("{name}{{")))
        .find(|l| {
            labels
                .iter()
                .all(|(k, v)| l.contains(&format!("{k}=\"{v}\"")))
        })
        .and_then(|l| l.rsplit(' ').next())
        .and_then(|v| v.parse().ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn healthcheck_says_healthy() {
    let (status, body) = get_raw(build_router(seeded_state()), "/healthcheck").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Healthy");
}

#[tokio::test]
async fn robots_disallows_api() {
    let (status, body) = get_raw(build_router(seeded_state()), "/robots.txt").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Disallow: /api/"));
    assert!(body.contains("Disallow: /metrics"));
}

#[tokio::test]
async fn metrics_report_pending_and_watched_gauges() {
    let (status, body) = get_raw(build_router(seeded_state()), "/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let pending = "artixpackages_pending_packages";
    let watched = "artixpackages_watched_packages";
    assert!(body.contains(&format!("# TYPE {pending} gauge")));
    assert_eq!(
        gauge(&body, pending, &[("maintainer", "alice"), ("action", "move")]),
        Some(1)
    );
    assert_eq!(
        gauge(&body, pending, &[("maintainer", "alice"), ("action", "update")]),
        Some(1)
    );
    assert_eq!(
        gauge(&body, pending, &[("maintainer", "bob"), ("action", "move")]),
        Some(0)
    );
    assert_eq!(gauge(&body, watched, &[("maintainer", "alice")]), Some(3));
    assert_eq!(gauge(&body, watched, &[("maintainer", "bob")]), Some(0));
    // Orphans are not a configured maintainer.
    assert_eq!(gauge(&body, watched, &[("maintainer", "orphan")]), None);
}

#[tokio::test]
async fn metrics_any_totals_follow_the_snapshot() {
    let state = seeded_state();
    state.save_state.write().await.updates = vec!["a".into(), "b".into(), "c".into()];
    let (_, body) = get_raw(build_router(state), "/metrics").await;
    let pending = "artixpackages_pending_packages";
    assert_eq!(
        gauge(&body, pending, &[("maintainer", "any"), ("action", "move")]),
        Some(1)
    );
    assert_eq!(
        gauge(&body, pending, &[("maintainer", "any"), ("action", "update")]),
        Some(3)
    );
}

#[tokio::test]
async fn metrics_use_the_configured_prefix() {
    let mut state = seeded_state();
    state.metric_prefix = std::sync::Arc::from("packy_");
    let (status, body) = get_raw(build_router(state), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gauge(&body, "packy_watched_packages", &[("maintainer", "alice")]), Some(3));
    assert!(!body.contains("artixpackages_"));
}

#[tokio::test]
async fn state_exposes_snapshot_and_sorted_maintainers() {
    let (status, json) = get(build_router(seeded_state()), "/api/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["move"], serde_json::json!(["python-foo"]));
    assert_eq!(json["update"], serde_json::json!(["zstd"]));
    assert_eq!(json["maintainers"], serde_json::json!(["alice", "bob"]));
    assert!(json["last-sync"].is_string());
}

#[tokio::test]
async fn maintainer_view_lists_flagged_packages() {
    let (status, json) = get(build_router(seeded_state()), "/api/maintainers/alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["maintainer"], "alice");
    assert_eq!(json["packages_owned"], 3);
    let moves = json["moves"].as_array().unwrap();
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0]["package"], "python-foo");
    assert_eq!(moves[0]["move_flag"], "grace");
    let updates = json["updates"].as_array().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["package"], "zstd");
    assert_eq!(updates[0]["update_flag"], "new");
}

#[tokio::test]
async fn maintainer_owning_nothing_is_404() {
    let (status, json) = get(build_router(seeded_state()), "/api/maintainers/bob").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("bob"));
}

#[tokio::test]
async fn packages_list_and_prefix_filter() {
    let app = build_router(seeded_state());
    let (status, json) = get(app.clone(), "/api/packages").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 4);

    let (status, json) = get(app, "/api/packages?starts_with=python-").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!(["python-bar", "python-foo"]));
}

#[tokio::test]
async fn package_lookup_and_404() {
    let app = build_router(seeded_state());
    let (status, json) = get(app.clone(), "/api/packages/lonely").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["maintainer"], "orphan");
    assert_eq!(json["update_flag"], "idle");

    let (status, json) = get(app, "/api/packages/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn state_reflects_scheduler_writes() {
    let state = seeded_state();
    state.save_state.write().await.moves = vec!["new-one".into()];
    let (_, json) = get(build_router(state), "/api/state").await;
    assert_eq!(json["move"], serde_json::json!(["new-one"]));
}
