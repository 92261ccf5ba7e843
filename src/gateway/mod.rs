//! Payment gateway adapter.
//!
//! The Order Creator and the Reconciliation Engine talk to the gateway only
//! through this trait, so both can be exercised against a scripted gateway in
//! tests and the reconciliation logic stays a single command shared by the
//! verify handler and the webhook consumer.

mod razorpay;

pub use razorpay::RazorpayClient;

use async_trait::async_trait;

use crate::error::Result;

/// Request to open a gateway-side order for a single purchase.
#[derive(Debug, Clone)]
pub struct CreateGatewayOrder {
    /// Amount in the smallest currency unit (paise for INR).
    pub amount_minor: i64,
    pub currency: String,
    /// Uniquely generated receipt token.
    pub receipt: String,
    /// Metadata linking the gateway order back to (user, product).
    pub notes: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct GatewayOrder {
    pub id: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// Payment status as reported by the gateway's own query API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Created,
    Authorized,
    Captured,
    Refunded,
    Failed,
}

impl PaymentState {
    /// Whether this state settles the order as paid.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Captured | Self::Authorized)
    }
}

#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub id: String,
    /// The gateway order this payment belongs to. Reconciliation checks it
    /// against the local order's reference to block replayed confirmations.
    pub order_id: String,
    pub status: PaymentState,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Gateway name for storage and logging (e.g. "razorpay").
    fn name(&self) -> &'static str;

    /// Open an order on the gateway. Failures are retryable; no local state
    /// may be persisted before this succeeds.
    async fn create_order(&self, req: &CreateGatewayOrder) -> Result<GatewayOrder>;

    /// Query the gateway's own record of a payment. This is the independent
    /// source of truth for reconciliation; the caller's claimed status is
    /// never trusted alone.
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment>;
}
