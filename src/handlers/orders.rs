use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::auth::AuthedUser;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::Json;
use crate::gateway::CreateGatewayOrder;
use crate::id::EntityType;
use crate::models::{NewOrder, NewOrderItem};
use crate::reconcile::{self, Outcome, PaymentClaim};
use crate::signature;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub product_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    /// Gateway order reference the client drives the payment UI with.
    pub gateway_order_id: String,
    /// Amount in the smallest currency unit, exactly as opened.
    pub amount: i64,
    pub currency: String,
    /// Gateway key id for the client-side checkout widget.
    pub key_id: String,
}

/// Open a payment order for a single product.
///
/// The catalog is read first and the gateway contacted second; the local
/// pending order is persisted only after the gateway accepts, so a gateway
/// failure leaves no orphaned rows. The order item snapshots title, category,
/// price, and asset reference as observed right now.
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthedUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>> {
    let product = {
        let conn = state.db.get()?;
        queries::get_live_product(&conn, &request.product_id)?
            .or_not_found(msg::PRODUCT_NOT_FOUND)?
    };

    if !product.active {
        return Err(AppError::BadRequest(msg::PRODUCT_NOT_PURCHASABLE.into()));
    }
    if !product.price.is_finite() || product.price <= 0.0 {
        return Err(AppError::BadRequest(msg::INVALID_PRICE.into()));
    }

    // Smallest currency unit (paise for INR).
    let amount_minor = (product.price * 100.0).round() as i64;
    let receipt = EntityType::Receipt.gen_id();

    let gateway_order = state
        .gateway
        .create_order(&CreateGatewayOrder {
            amount_minor,
            currency: product.currency.clone(),
            receipt: receipt.clone(),
            notes: vec![
                ("user_id".to_string(), user.id.clone()),
                ("product_id".to_string(), product.id.clone()),
            ],
        })
        .await?;

    let order = {
        let mut conn = state.db.get()?;
        queries::create_pending_order(
            &mut conn,
            &NewOrder {
                user_id: user.id,
                amount_minor,
                currency: product.currency.clone(),
                gateway: state.gateway.name().to_string(),
                gateway_order_id: gateway_order.id.clone(),
                receipt,
                item: NewOrderItem {
                    product_id: product.id.clone(),
                    title: product.title.clone(),
                    category: product.category.clone(),
                    price: product.price,
                    asset_key: product.asset_key.clone(),
                },
            },
        )?
    };

    tracing::info!(
        "opened order {} (gateway ref {}) for product {} at {} {}",
        order.id,
        order.gateway_order_id,
        product.id,
        amount_minor,
        order.currency
    );

    Ok(Json(CreateOrderResponse {
        order_id: order.id,
        gateway_order_id: order.gateway_order_id,
        amount: order.amount_minor,
        currency: order.currency,
        key_id: state.gateway_key_id.clone(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    /// HMAC-SHA256 over "{gateway_order_id}|{gateway_payment_id}".
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// Client-triggered confirmation channel.
///
/// Verifies the checkout signature, then runs the shared reconciliation
/// routine. Racing against the webhook channel is safe: whichever caller
/// loses observes the winner's result.
pub async fn verify_payment(
    State(state): State<AppState>,
    _user: AuthedUser,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    if !signature::verify_checkout_signature(
        &request.gateway_order_id,
        &request.gateway_payment_id,
        &request.signature,
        &state.gateway_key_secret,
    ) {
        return Err(AppError::SignatureInvalid);
    }

    let claim = PaymentClaim {
        gateway_order_id: request.gateway_order_id,
        gateway_payment_id: request.gateway_payment_id,
    };

    match reconcile::settle_confirmation(&state, &claim).await? {
        Outcome::UnknownOrder => Err(AppError::NotFound(msg::ORDER_NOT_FOUND.into())),
        Outcome::Settled {
            paid_at, expires_at, ..
        } => Ok(Json(VerifyResponse {
            status: "paid",
            paid_at: Some(paid_at),
            expires_at: Some(expires_at),
        })),
        Outcome::Failed { .. } => Ok(Json(VerifyResponse {
            status: "failed",
            paid_at: None,
            expires_at: None,
        })),
        Outcome::Pending { .. } => Ok(Json(VerifyResponse {
            status: "pending",
            paid_at: None,
            expires_at: None,
        })),
    }
}
