//! Prefixed ID generation for StudyShelf entities.
//!
//! All IDs use an `ss_` brand prefix to guarantee collision avoidance with
//! payment gateway IDs (Razorpay's `order_`, `pay_`, `rfnd_`, etc.).
//!
//! Format: `ss_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &[
    "ss_usr_",
    "ss_ses_",
    "ss_prod_",
    "ss_ord_",
    "ss_itm_",
    "ss_evt_",
    "ss_rcpt_",
];

/// Validate that a string is a valid StudyShelf prefixed ID.
///
/// This is a cheap check to reject garbage before hitting the database.
/// Validates format: `ss_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];

    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs in StudyShelf.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    User,
    Session,
    Product,
    Order,
    OrderItem,
    WebhookEvent,
    /// Receipt tokens handed to the gateway at order-open time.
    Receipt,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::User => "ss_usr",
            Self::Session => "ss_ses",
            Self::Product => "ss_prod",
            Self::Order => "ss_ord",
            Self::OrderItem => "ss_itm",
            Self::WebhookEvent => "ss_evt",
            Self::Receipt => "ss_rcpt",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
