use serde::{Deserialize, Serialize};

/// Order state machine: `pending -> {paid, failed}` via automated
/// reconciliation; `paid -> {refunded, cancelled}` only by administrative
/// action. Transitions out of `pending` are terminal for reconciliation -
/// once paid, `paid_at`/`expires_at` never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    /// Amount in the smallest currency unit (paise for INR), exactly what
    /// was opened with the gateway.
    pub amount_minor: i64,
    pub currency: String,
    pub gateway: String,
    /// The gateway's order reference. Unique per (gateway, reference).
    pub gateway_order_id: String,
    /// The gateway's payment reference, set on first confirmation.
    pub gateway_payment_id: Option<String>,
    /// Receipt token generated at order-open time.
    pub receipt: String,
    pub paid_at: Option<i64>,
    /// Entitlement deadline. Set together with `paid_at`, exactly once.
    pub expires_at: Option<i64>,
    pub created_at: i64,
}

impl Order {
    /// A paid order past its deadline is functionally expired without any
    /// stored-status change.
    pub fn entitles_at(&self, now: i64) -> bool {
        self.status == OrderStatus::Paid && self.expires_at.map(|e| e > now).unwrap_or(false)
    }
}

/// Point-in-time copy of the catalog entry bought by an order. Immutable
/// after creation: later edits or deletion of the product must not alter
/// what a paying customer bought or can still download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub title: String,
    pub category: String,
    pub price: f64,
    /// Asset reference at purchase time. May be empty for products sold
    /// before their material was uploaded.
    pub asset_key: Option<String>,
    pub created_at: i64,
}

/// Everything the Order Creator persists after the gateway accepts the order.
#[derive(Debug)]
pub struct NewOrder {
    pub user_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub gateway: String,
    pub gateway_order_id: String,
    pub receipt: String,
    pub item: NewOrderItem,
}

#[derive(Debug)]
pub struct NewOrderItem {
    pub product_id: String,
    pub title: String,
    pub category: String,
    pub price: f64,
    pub asset_key: Option<String>,
}
