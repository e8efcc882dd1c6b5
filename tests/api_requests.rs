//! Request flows that exercise the write-conflict retry path end to end.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use tokio::task::JoinSet;
use tower::ServiceExt;

use credit_ledger::api::create_router;
use credit_ledger::app::{AppState, RetryPolicy};
use credit_ledger::domain::{BalanceResponse, ErrorResponse};
use credit_ledger::test_utils::MockLedgerStore;

fn create_test_state(retry_policy: RetryPolicy) -> (Arc<MockLedgerStore>, Arc<AppState>) {
    let store = Arc::new(MockLedgerStore::new());
    let state = AppState::new(Arc::clone(&store) as _).with_retry_policy(retry_policy);
    (store, Arc::new(state))
}

fn payment(txn_id: &str, sub: &str, credits: u32) -> Request<Body> {
    let body = format!(r#"{{"txnID":"{txn_id}","sub":"{sub}","credits":{credits}}}"#);
    Request::builder()
        .method("POST")
        .uri("/payment")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn balance_of(router: axum::Router, sub: &str) -> Decimal {
    let request = Request::builder()
        .uri(format!("/balance/{sub}"))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let balance: BalanceResponse = serde_json::from_slice(&body_bytes).unwrap();
    balance.balance
}

#[tokio::test]
async fn test_injected_conflicts_are_invisible_to_the_client() {
    let (store, state) = create_test_state(RetryPolicy::default());
    let router = create_router(state);
    store.inject_conflicts(2);

    let response = router.clone().oneshot(payment("tx1", "userA", 10)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(store.begin_count(), 3);
    assert_eq!(store.commit_count(), 1);
    assert_eq!(balance_of(router, "userA").await, Decimal::from(10));
}

#[tokio::test]
async fn test_persistent_conflict_exhausts_the_budget() {
    let (store, state) = create_test_state(RetryPolicy::new(3, Duration::from_secs(10)));
    let router = create_router(state);
    store.always_conflict(true);

    let response = router.clone().oneshot(payment("tx1", "userA", 10)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let error: ErrorResponse = serde_json::from_slice(&body_bytes).unwrap();
    assert!(error.message.contains("Write conflict"));

    assert_eq!(store.begin_count(), 3);
    assert_eq!(store.rollback_count(), 3);
    assert_eq!(store.commit_count(), 0);
    assert!(!store.has_user("userA"));
    assert_eq!(balance_of(router, "userA").await, Decimal::ZERO);
}

#[tokio::test]
async fn test_begin_failure_is_internal_error() {
    let (store, state) = create_test_state(RetryPolicy::default());
    let router = create_router(state);
    store.fail_begin(true);

    let response = router.oneshot(payment("tx1", "userA", 10)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(store.begin_count(), 1);
    assert!(store.committed_txns().is_empty());
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let store = Arc::new(MockLedgerStore::new());
    let state = AppState::new(Arc::clone(&store) as _).with_max_body_bytes(16);
    let router = create_router(Arc::new(state));

    let body = r#"{"txnID":"tx1","sub":"userA","credits":10}"#;
    let request = Request::builder()
        .method("POST")
        .uri("/payment")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(store.begin_count(), 0);
}

#[tokio::test]
async fn test_oversized_body_without_content_length_rejected() {
    let store = Arc::new(MockLedgerStore::new());
    let state = AppState::new(Arc::clone(&store) as _).with_max_body_bytes(16);
    let router = create_router(Arc::new(state));

    // No Content-Length header, so the limit is only hit while streaming
    let request = Request::builder()
        .method("POST")
        .uri("/payment")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"txnID":"tx1","sub":"userA","credits":10}"#))
        .unwrap();
    assert!(request.headers().get(header::CONTENT_LENGTH).is_none());

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let error: ErrorResponse = serde_json::from_slice(&body_bytes).unwrap();
    assert!(error.message.contains("Request body too large"));
    assert_eq!(store.begin_count(), 0);
    assert!(!store.has_user("userA"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_payments_lose_no_updates() {
    let (store, state) = create_test_state(RetryPolicy::default());
    let router = create_router(state);
    store.inject_conflicts(3);

    let mut tasks = JoinSet::new();
    for i in 0..20 {
        let router = router.clone();
        tasks.spawn(async move {
            router
                .oneshot(payment(&format!("tx{i}"), "userA", 1))
                .await
                .unwrap()
                .status()
        });
    }
    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::NO_CONTENT);
    }

    assert_eq!(store.committed_txns().len(), 20);
    assert_eq!(store.commit_count(), 20);
    assert_eq!(balance_of(router, "userA").await, Decimal::from(20));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replays_credit_once() {
    let (store, state) = create_test_state(RetryPolicy::default());
    let router = create_router(state);

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let router = router.clone();
        tasks.spawn(async move {
            router
                .oneshot(payment("tx1", "userA", 5))
                .await
                .unwrap()
                .status()
        });
    }
    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::NO_CONTENT);
    }

    assert_eq!(store.committed_txns().len(), 1);
    assert_eq!(balance_of(router, "userA").await, Decimal::from(5));
}
