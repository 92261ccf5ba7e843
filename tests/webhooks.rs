//! Webhook channel tests: signature policy, retry-storm avoidance, and
//! duplicate delivery handling.

use axum::{body::Body, http::Request};
use tower::ServiceExt;

#[path = "common/mod.rs"]
mod common;
use common::*;

fn captured_event(order_id: &str, payment_id: &str) -> String {
    serde_json::json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "order_id": order_id,
                    "status": "captured"
                }
            }
        }
    })
    .to_string()
}

fn webhook_request(body: &str, sig: &str, event_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook/razorpay")
        .header("content-type", "application/json")
        .header("x-razorpay-signature", sig);
    if let Some(id) = event_id {
        builder = builder.header("x-razorpay-event-id", id);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_valid_webhook_settles_order() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway.clone());

    let order = {
        let mut conn = state.db.get().unwrap();
        let (user, _) = create_test_user(&conn, "buyer@test.com");
        let product = create_test_product(&conn, "Notes", 199.0);
        create_pending_order(&mut conn, &user.id, &product, "order_g1")
    };

    gateway.script_payment("pay_1", "order_g1", PaymentState::Captured);

    let body = captured_event("order_g1", "pay_1");
    let sig = signature::sign_webhook_body(body.as_bytes(), TEST_WEBHOOK_SECRET);

    let response = webhook_app(state.clone())
        .oneshot(webhook_request(&body, &sig, Some("evt_1")))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let conn = state.db.get().unwrap();
    let stored = queries::get_order_by_id(&conn, &order.id).unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_tampered_signature_is_rejected_without_mutation() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway.clone());

    let order = {
        let mut conn = state.db.get().unwrap();
        let (user, _) = create_test_user(&conn, "buyer@test.com");
        let product = create_test_product(&conn, "Notes", 199.0);
        create_pending_order(&mut conn, &user.id, &product, "order_g1")
    };

    gateway.script_payment("pay_1", "order_g1", PaymentState::Captured);

    let body = captured_event("order_g1", "pay_1");
    let mut sig = signature::sign_webhook_body(body.as_bytes(), TEST_WEBHOOK_SECRET);
    let last = sig.pop().unwrap();
    sig.push(if last == 'f' { 'e' } else { 'f' });

    let response = webhook_app(state.clone())
        .oneshot(webhook_request(&body, &sig, None))
        .await
        .unwrap();

    // Signature mismatch is the only 400 this endpoint ever returns.
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(gateway.fetches(), 0);

    let conn = state.db.get().unwrap();
    let stored = queries::get_order_by_id(&conn, &order.id).unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_unknown_order_is_acked_to_stop_retries() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);

    let body = captured_event("order_we_never_opened", "pay_1");
    let sig = signature::sign_webhook_body(body.as_bytes(), TEST_WEBHOOK_SECRET);

    let response = webhook_app(state)
        .oneshot(webhook_request(&body, &sig, None))
        .await
        .unwrap();

    // 200, not 404: erroring would make the gateway retry forever.
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_delivery_short_circuits() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway.clone());

    {
        let mut conn = state.db.get().unwrap();
        let (user, _) = create_test_user(&conn, "buyer@test.com");
        let product = create_test_product(&conn, "Notes", 199.0);
        create_pending_order(&mut conn, &user.id, &product, "order_g1");
    }

    gateway.script_payment("pay_1", "order_g1", PaymentState::Captured);

    let body = captured_event("order_g1", "pay_1");
    let sig = signature::sign_webhook_body(body.as_bytes(), TEST_WEBHOOK_SECRET);

    let first = webhook_app(state.clone())
        .oneshot(webhook_request(&body, &sig, Some("evt_dup")))
        .await
        .unwrap();
    assert_eq!(first.status(), axum::http::StatusCode::OK);
    assert_eq!(gateway.fetches(), 1);

    // At-least-once delivery: the same event arrives again.
    let second = webhook_app(state.clone())
        .oneshot(webhook_request(&body, &sig, Some("evt_dup")))
        .await
        .unwrap();
    assert_eq!(second.status(), axum::http::StatusCode::OK);
    assert_eq!(gateway.fetches(), 1, "replayed event must not re-query the gateway");

    let conn = state.db.get().unwrap();
    let order = queries::get_order_by_gateway_ref(&conn, "razorpay", "order_g1")
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_irrelevant_event_types_are_ignored() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway.clone());

    let body = serde_json::json!({
        "event": "payment.downtime.started",
        "payload": { "payment": { "entity": { "id": "x", "order_id": "y" } } }
    })
    .to_string();
    let sig = signature::sign_webhook_body(body.as_bytes(), TEST_WEBHOOK_SECRET);

    let response = webhook_app(state)
        .oneshot(webhook_request(&body, &sig, None))
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::OK);
    assert_eq!(gateway.fetches(), 0);
}

#[tokio::test]
async fn test_missing_signature_header_is_rejected() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);

    let body = captured_event("order_g1", "pay_1");
    let response = webhook_app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/razorpay")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

/// Verify and webhook firing for the same order, exercised at the HTTP
/// layer with both channels' inputs valid.
#[tokio::test]
async fn test_webhook_after_verify_is_a_no_op() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway.clone());

    {
        let mut conn = state.db.get().unwrap();
        let (user, _) = create_test_user(&conn, "buyer@test.com");
        let product = create_test_product(&conn, "Notes", 199.0);
        create_pending_order(&mut conn, &user.id, &product, "order_g1");
    }

    gateway.script_payment("pay_1", "order_g1", PaymentState::Captured);

    // Channel (a): client verify.
    let claim = studyshelf::reconcile::PaymentClaim {
        gateway_order_id: "order_g1".to_string(),
        gateway_payment_id: "pay_1".to_string(),
    };
    let first = studyshelf::reconcile::settle_confirmation(&state, &claim)
        .await
        .unwrap();
    let studyshelf::reconcile::Outcome::Settled { paid_at, .. } = first else {
        panic!("verify should settle");
    };

    // Channel (b): the webhook lands afterwards.
    let body = captured_event("order_g1", "pay_1");
    let sig = signature::sign_webhook_body(body.as_bytes(), TEST_WEBHOOK_SECRET);
    let response = webhook_app(state.clone())
        .oneshot(webhook_request(&body, &sig, Some("evt_late")))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    // The loser changed nothing.
    assert_eq!(gateway.fetches(), 1);
    let conn = state.db.get().unwrap();
    let order = queries::get_order_by_gateway_ref(&conn, "razorpay", "order_g1")
        .unwrap()
        .unwrap();
    assert_eq!(order.paid_at, Some(paid_at));
}
