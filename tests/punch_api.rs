//! Integration tests for the punch API.
//!
//! Drives the router in-process with an in-memory grant store and allow-set.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use punchgate::config::BYPASS_KEY;
use punchgate::policy::chain::StaticKeyCheck;
use punchgate::{
    create_app, MemoryAllowSet, MemoryGrantStore, PunchConfig, PunchManager, ValidatorChain,
};
use serde::Deserialize;
use tower::ServiceExt;

const WEEK: Duration = Duration::from_secs(604_800);

/// Error body returned by `/punch`.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

struct Gateway {
    app: Router,
    store: Arc<MemoryGrantStore>,
    allow: Arc<MemoryAllowSet>,
}

fn gateway(config: PunchConfig) -> Gateway {
    let store = Arc::new(MemoryGrantStore::default());
    let allow = Arc::new(MemoryAllowSet::default());
    let manager = PunchManager::with_admitter(config, store.clone(), allow.clone())
        .expect("valid config");
    Gateway {
        app: create_app(Arc::new(manager)),
        store,
        allow,
    }
}

fn caller() -> IpAddr {
    "203.0.113.5".parse().unwrap()
}

async fn punch(app: &Router, body: impl Into<Body>) -> Response {
    let mut request = Request::builder()
        .method("POST")
        .uri("/punch")
        .header("content-type", "application/json")
        .body(body.into())
        .expect("failed to build request");
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::new(caller(), 40000)));
    app.clone().oneshot(request).await.expect("request failed")
}

async fn error_of(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice::<ErrorResponse>(&body)
        .expect("failed to parse error body")
        .error
}

/// A stored key with a short TTL is accepted and renewed to a full week.
#[tokio::test]
async fn test_stored_key_admits_and_renews() {
    let gw = gateway(PunchConfig::default());
    gw.store
        .insert("ipset:abc123", Some(Duration::from_secs(10)));

    let response = punch(&gw.app, r#"{"key":"abc123"}"#).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(gw.allow.contains("vault-allow", caller()));
    let ttl = gw.store.ttl("ipset:abc123").expect("grant should still exist");
    assert!(ttl > WEEK - Duration::from_secs(5), "ttl was {:?}", ttl);
}

/// The bypass key works with an empty store and still triggers admission.
#[tokio::test]
async fn test_bypass_key_with_empty_store() {
    let gw = gateway(PunchConfig::default());

    let response = punch(&gw.app, format!(r#"{{"key":"{}"}}"#, BYPASS_KEY)).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(gw.allow.admission_calls(), 1);
    assert!(gw.allow.contains("vault-allow", caller()));
}

/// The bypass key works even when the store is unreachable.
#[tokio::test]
async fn test_bypass_key_with_store_offline() {
    let gw = gateway(PunchConfig::default());
    gw.store.set_offline(true);

    let response = punch(&gw.app, format!(r#"{{"key":"{}"}}"#, BYPASS_KEY)).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(gw.allow.contains("vault-allow", caller()));
}

/// Unknown keys are rejected without touching the packet filter.
#[tokio::test]
async fn test_unknown_keys_never_admit() {
    let gw = gateway(PunchConfig::default());
    gw.store.insert("ipset:someone-else", None);

    for key in ["abc123", "6e65ede4", "ipset:someone-else", " "] {
        let response = punch(&gw.app, format!(r#"{{"key":"{}"}}"#, key)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "key {:?}", key);
        assert_eq!(error_of(response).await, "key invalid");
    }
    assert_eq!(gw.allow.admission_calls(), 0);
}

/// A body without `key` is "key missing" and never admits.
#[tokio::test]
async fn test_missing_key_field() {
    let gw = gateway(PunchConfig::default());

    let response = punch(&gw.app, r#"{"token":"abc123"}"#).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(response).await, "key missing");
    assert_eq!(gw.allow.admission_calls(), 0);
}

/// An empty body is treated exactly like a missing key.
#[tokio::test]
async fn test_empty_body() {
    let gw = gateway(PunchConfig::default());

    let response = punch(&gw.app, Body::empty()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(response).await, "key missing");
    assert_eq!(gw.allow.admission_calls(), 0);
}

/// An empty key string is treated like a missing key.
#[tokio::test]
async fn test_empty_key_string() {
    let gw = gateway(PunchConfig::default());

    let response = punch(&gw.app, r#"{"key":""}"#).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(response).await, "key missing");
}

/// Repeated knocks keep one entry and refresh its timeout.
#[tokio::test]
async fn test_repeated_knocks_are_idempotent() {
    let gw = gateway(PunchConfig {
        set_timeout: Some(600),
        ..PunchConfig::default()
    });
    let body = format!(r#"{{"key":"{}"}}"#, BYPASS_KEY);

    for _ in 0..3 {
        let response = punch(&gw.app, body.clone()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    assert_eq!(gw.allow.members("vault-allow"), vec![caller()]);
    let remaining = gw
        .allow
        .remaining("vault-allow", caller())
        .expect("member should carry a timeout");
    assert!(remaining > Duration::from_secs(595), "remaining was {:?}", remaining);
    assert_eq!(gw.allow.admission_calls(), 3);
}

/// A broken packet filter does not change the HTTP contract.
#[tokio::test]
async fn test_admission_failure_still_returns_204() {
    let gw = gateway(PunchConfig::default());
    gw.allow.set_failing(true);

    let response = punch(&gw.app, format!(r#"{{"key":"{}"}}"#, BYPASS_KEY)).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(gw.allow.admission_calls(), 1);
    assert!(gw.allow.members("vault-allow").is_empty());
}

/// A store outage surfaces as its own error, never as success or "key invalid".
#[tokio::test]
async fn test_store_outage_is_distinct() {
    let gw = gateway(PunchConfig::default());
    gw.store.insert("ipset:abc123", None);
    gw.store.set_offline(true);

    let response = punch(&gw.app, r#"{"key":"abc123"}"#).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_of(response).await, "store unavailable");
    assert_eq!(gw.allow.admission_calls(), 0);
}

/// With the bypass disabled the literal is just another unknown key.
#[tokio::test]
async fn test_disabled_bypass_key() {
    let gw = gateway(PunchConfig {
        bypass_key: None,
        ..PunchConfig::default()
    });

    let response = punch(&gw.app, format!(r#"{{"key":"{}"}}"#, BYPASS_KEY)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(gw.allow.admission_calls(), 0);
}

/// Extra authorities plug into the chain without touching the handler.
#[tokio::test]
async fn test_custom_chain() {
    let store = Arc::new(MemoryGrantStore::default());
    let allow = Arc::new(MemoryAllowSet::default());
    let chain = ValidatorChain::from_config(&PunchConfig::default(), store.clone())
        .with_check(Arc::new(StaticKeyCheck::new(["ops-key"])));
    let manager = PunchManager::with_chain(PunchConfig::default(), store, chain, allow.clone());
    let app = create_app(Arc::new(manager));

    let response = punch(&app, r#"{"key":"ops-key"}"#).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(allow.contains("vault-allow", caller()));
}
