//! Payment reconciliation.
//!
//! Two independent channels can confirm the same payment: the paying client's
//! verify call and the gateway's webhook push, in any order, any number of
//! times. Both funnel into `settle_confirmation` after their channel-specific
//! signature check, so whichever caller wins the race produces the same
//! result and the loser's call becomes a no-op.

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::models::OrderStatus;

/// Entitlement window granted on payment.
pub const ACCESS_VALID_DAYS: i64 = 365;

const SECONDS_PER_DAY: i64 = 86400;

/// A confirmation claim whose signature has already been verified. The
/// claimed payment status is deliberately absent: the gateway is re-queried
/// as the source of truth.
#[derive(Debug, Clone)]
pub struct PaymentClaim {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
}

/// Result of running a confirmation claim against the order store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No local order for this gateway reference. The webhook path acks this
    /// as success to avoid a retry storm; the verify path surfaces 404.
    UnknownOrder,
    /// The order is paid - either by this call or by an earlier one. Both
    /// winners and losers of the confirmation race see identical timestamps.
    Settled {
        order_id: String,
        paid_at: i64,
        expires_at: i64,
        /// True only for the call that performed the transition.
        newly_settled: bool,
    },
    /// The gateway reported the payment failed and the order was (or already
    /// had been) marked failed.
    Failed { order_id: String },
    /// The gateway has not captured the payment yet; the order stays pending
    /// and the caller should retry later.
    Pending { order_id: String },
}

/// Advance an order based on a verified confirmation claim.
///
/// Exactly one real-world outcome per order, regardless of how many times or
/// in what interleaving this runs:
/// 1. unknown reference -> no state change;
/// 2. already paid -> return the stored timestamps without querying the
///    gateway again (idempotency short-circuit);
/// 3. otherwise query the gateway for the payment and require that the
///    payment's order reference matches this order - a valid payment for
///    order A presented against order B is rejected;
/// 4. settle through a conditional update that only fires while the order is
///    still pending. A lost race falls through to rereading the winner's
///    result.
pub async fn settle_confirmation(state: &AppState, claim: &PaymentClaim) -> Result<Outcome> {
    let gateway_name = state.gateway.name();

    let order = {
        let conn = state.db.get()?;
        queries::get_order_by_gateway_ref(&conn, gateway_name, &claim.gateway_order_id)?
    };

    let Some(order) = order else {
        return Ok(Outcome::UnknownOrder);
    };

    if order.status == OrderStatus::Paid {
        return Ok(Outcome::Settled {
            order_id: order.id,
            paid_at: order.paid_at.unwrap_or_default(),
            expires_at: order.expires_at.unwrap_or_default(),
            newly_settled: false,
        });
    }

    // Independent confirmation: never trust the caller's claimed status.
    let payment = state.gateway.fetch_payment(&claim.gateway_payment_id).await?;

    if payment.order_id != order.gateway_order_id {
        return Err(AppError::GatewayMismatch(format!(
            "payment {} belongs to gateway order {}, not {}",
            payment.id, payment.order_id, order.gateway_order_id
        )));
    }

    let conn = state.db.get()?;

    if payment.status.is_settled() {
        let paid_at = chrono::Utc::now().timestamp();
        let expires_at = paid_at + ACCESS_VALID_DAYS * SECONDS_PER_DAY;

        if queries::try_mark_order_paid(&conn, &order.id, &payment.id, paid_at, expires_at)? {
            tracing::info!(
                "order {} settled as paid (payment {}, expires {})",
                order.id,
                payment.id,
                expires_at
            );
            return Ok(Outcome::Settled {
                order_id: order.id,
                paid_at,
                expires_at,
                newly_settled: true,
            });
        }

        // Lost the race to the other channel; report the winner's result.
        let settled = queries::get_order_by_id(&conn, &order.id)?
            .ok_or_else(|| AppError::Internal("order vanished mid-confirmation".into()))?;
        return Ok(Outcome::Settled {
            order_id: settled.id,
            paid_at: settled.paid_at.unwrap_or_default(),
            expires_at: settled.expires_at.unwrap_or_default(),
            newly_settled: false,
        });
    }

    if payment.status == crate::gateway::PaymentState::Failed {
        // Guarded by status = 'pending': never downgrades a paid order.
        queries::try_mark_order_failed(&conn, &order.id, &payment.id)?;
        tracing::info!("order {} marked failed (payment {})", order.id, payment.id);
        return Ok(Outcome::Failed { order_id: order.id });
    }

    // Anything else (created, refunded) leaves the order pending.
    Ok(Outcome::Pending { order_id: order.id })
}
