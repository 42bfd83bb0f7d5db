//! End-to-end tests: client → gateway → mock policy authority + mock backends.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;

mod common;

#[tokio::test]
async fn test_ping_pong() {
    let backend = common::start_programmable_backend(|request| async move {
        match (request.path.as_str(), request.body.as_slice()) {
            ("/GET", b"ping") => (200, "pong".to_string()),
            _ => (400, "unexpected".to_string()),
        }
    })
    .await;
    let policy = common::start_mock_policy(&[("svc", 1_000)]).await;
    let gw = common::spawn_gateway(common::config(policy, &[("svc", backend)])).await;

    let res = common::client()
        .post(gw.url("/svc/GET"))
        .body("ping")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "pong");

    gw.shutdown.trigger();
}

#[tokio::test]
async fn test_unknown_service_is_not_found() {
    let policy = common::start_mock_policy(&[("ghost", 1_000)]).await;
    let gw = common::spawn_gateway(common::config(policy, &[])).await;

    let res = common::client()
        .post(gw.url("/ghost/anything"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unknown_service");

    gw.shutdown.trigger();
}

#[tokio::test]
async fn test_missing_policy_never_reaches_backend() {
    let calls = Arc::new(AtomicU32::new(0));
    let counted = calls.clone();
    let backend = common::start_programmable_backend(move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
        async { (200, "ok".to_string()) }
    })
    .await;
    let policy = common::start_mock_policy(&[]).await;
    let gw = common::spawn_gateway(common::config(policy, &[("svc", backend)])).await;

    let res = common::client().post(gw.url("/svc/m")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "policy_unavailable");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    gw.shutdown.trigger();
}

#[tokio::test]
async fn test_breaker_opens_after_three_failures() {
    let calls = Arc::new(AtomicU32::new(0));
    let counted = calls.clone();
    let backend = common::start_programmable_backend(move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
        async { (500, "boom".to_string()) }
    })
    .await;
    let policy = common::start_mock_policy(&[("svc", 1_000)]).await;
    let gw = common::spawn_gateway(common::config(policy, &[("svc", backend)])).await;
    let client = common::client();

    for _ in 0..3 {
        let res = client.post(gw.url("/svc/m")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }

    for _ in 0..5 {
        let res = client.post(gw.url("/svc/m")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(res.headers().contains_key("retry-after"));
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "breaker_open");
        assert!(!body["message"].as_str().unwrap().contains("500"));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let health: serde_json::Value = client
        .get(gw.url("/healthz"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["services"]["svc"]["breaker"], "open");

    gw.shutdown.trigger();
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let backend = common::start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        (200, "late".to_string())
    })
    .await;
    let policy = common::start_mock_policy(&[("slow", 50)]).await;
    let gw = common::spawn_gateway(common::config(policy, &[("slow", backend)])).await;

    let started = Instant::now();
    let res = common::client().post(gw.url("/slow/m")).send().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");

    gw.shutdown.trigger();
}

#[tokio::test]
async fn test_services_are_isolated() {
    let bad = common::start_mock_backend(503, "down").await;
    let good = common::start_mock_backend(200, "fine").await;
    let policy = common::start_mock_policy(&[("bad", 1_000), ("good", 1_000)]).await;
    let gw = common::spawn_gateway(common::config(policy, &[("bad", bad), ("good", good)])).await;
    let client = common::client();

    for _ in 0..4 {
        let _ = client.post(gw.url("/bad/m")).send().await.unwrap();
    }
    let res = client.post(gw.url("/bad/m")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = client.post(gw.url("/good/m")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "fine");

    gw.shutdown.trigger();
}

#[tokio::test]
async fn test_graceful_shutdown_stops_server() {
    let policy = common::start_mock_policy(&[]).await;
    let gw = common::spawn_gateway(common::config(policy, &[])).await;

    let res = common::client().get(gw.url("/healthz")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    gw.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), gw.task)
        .await
        .expect("server did not stop")
        .unwrap();
}
