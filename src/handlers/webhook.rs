use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::db::{queries, AppState};
use crate::reconcile::{self, Outcome, PaymentClaim};
use crate::signature;

/// Result type for webhook operations: status plus a short reason string.
type WebhookResult = (StatusCode, &'static str);

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    payload: WebhookPayload,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    payment: PaymentWrapper,
}

#[derive(Debug, Deserialize)]
struct PaymentWrapper {
    entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: String,
}

/// Gateway-pushed confirmation channel.
///
/// Delivery is at-least-once and may arrive before, after, or concurrently
/// with the client's verify call. Response policy: 400 only on a signature
/// mismatch; once the signature checks out, everything - including an order
/// we do not know about - is acked with 200 so the gateway's retry backoff
/// never escalates into a thundering herd.
pub async fn handle_razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    process_webhook(&state, &headers, &body).await
}

async fn process_webhook(state: &AppState, headers: &HeaderMap, body: &Bytes) -> WebhookResult {
    let Some(provided) = headers
        .get("x-razorpay-signature")
        .and_then(|v| v.to_str().ok())
    else {
        return (StatusCode::BAD_REQUEST, "Missing signature header");
    };

    if !signature::verify_webhook_signature(body, provided, &state.webhook_secret) {
        tracing::warn!("Webhook rejected: signature mismatch");
        return (StatusCode::BAD_REQUEST, "Invalid signature");
    }

    // Signature-valid from here on: never answer 4xx again.

    let envelope: WebhookEnvelope = match serde_json::from_slice(body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Webhook body unparseable after valid signature: {}", e);
            return (StatusCode::OK, "Ignored");
        }
    };

    match envelope.event.as_str() {
        "payment.captured" | "payment.failed" => {}
        other => {
            tracing::debug!("Ignoring webhook event type {}", other);
            return (StatusCode::OK, "Ignored");
        }
    }

    let event_id = headers
        .get("x-razorpay-event-id")
        .and_then(|v| v.to_str().ok());

    // At-least-once delivery dedup. Only a short-circuit: settlement itself
    // is idempotent, so a concurrent duplicate slipping past this check is
    // harmless. The event is recorded only after processing succeeds, so a
    // transient failure leaves the redelivery fully effective.
    if let Some(event_id) = event_id {
        match state
            .db
            .get()
            .map_err(crate::error::AppError::from)
            .and_then(|conn| queries::has_webhook_event(&conn, state.gateway.name(), event_id))
        {
            Ok(false) => {}
            Ok(true) => return (StatusCode::OK, "Already processed"),
            Err(e) => {
                tracing::error!("DB error checking webhook event: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
            }
        }
    }

    let claim = PaymentClaim {
        gateway_order_id: envelope.payload.payment.entity.order_id.clone(),
        gateway_payment_id: envelope.payload.payment.entity.id.clone(),
    };

    let result = match reconcile::settle_confirmation(state, &claim).await {
        Ok(Outcome::UnknownOrder) => {
            // Acked so the gateway stops retrying, but logged distinctly: a
            // genuinely lost or misrouted webhook surfaces only here.
            tracing::warn!(
                "Webhook for unknown order {} (payment {}) acknowledged without state change",
                claim.gateway_order_id,
                claim.gateway_payment_id
            );
            (StatusCode::OK, "Order unknown")
        }
        Ok(Outcome::Settled { order_id, newly_settled, .. }) => {
            if newly_settled {
                tracing::info!("Webhook settled order {}", order_id);
            }
            (StatusCode::OK, "OK")
        }
        Ok(Outcome::Failed { .. }) => (StatusCode::OK, "OK"),
        Ok(Outcome::Pending { .. }) => (StatusCode::OK, "Not captured yet"),
        Err(crate::error::AppError::GatewayMismatch(detail)) => {
            // Replay defense fired: ack without state change.
            tracing::warn!("Webhook gateway mismatch ignored: {}", detail);
            (StatusCode::OK, "Mismatch ignored")
        }
        Err(e) => {
            // Transient failure (gateway or storage): a 5xx makes the
            // gateway redeliver, which is what we want here.
            tracing::error!("Webhook processing error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Processing error");
        }
    };

    if let Some(event_id) = event_id {
        if let Ok(conn) = state.db.get() {
            if let Err(e) = queries::try_record_webhook_event(&conn, state.gateway.name(), event_id)
            {
                tracing::warn!("Failed to record webhook event {}: {}", event_id, e);
            }
        }
    }

    result
}
