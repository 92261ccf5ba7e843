use serde::{Deserialize, Serialize};

use crate::error::{msg, AppError, Result};

/// Catalog availability of a product, orthogonal to the trash lifecycle.
///
/// A `coming_soon` product can be sold before its asset is uploaded; the
/// download resolver turns that into a "processing" answer instead of a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    ComingSoon,
    OutOfStock,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::ComingSoon => "coming_soon",
            Self::OutOfStock => "out_of_stock",
        }
    }
}

impl std::str::FromStr for Availability {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "coming_soon" => Ok(Self::ComingSoon),
            "out_of_stock" => Ok(Self::OutOfStock),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub category: String,
    pub description: Option<String>,
    /// Display price in major currency units. The gateway amount is derived
    /// as `round(price * 100)` at order-open time.
    pub price: f64,
    pub currency: String,
    /// Object-storage key of the protected asset. Empty/absent for products
    /// whose material has not been uploaded yet.
    pub asset_key: Option<String>,
    pub availability: Availability,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
    /// Soft delete timestamp (None = live, Some = in trash since this time)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
}

impl Product {
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub asset_key: Option<String>,
    #[serde(default = "default_availability")]
    pub availability: Availability,
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_availability() -> Availability {
    Availability::Available
}

impl CreateProduct {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::BadRequest("Title must not be empty".into()));
        }
        if self.category.trim().is_empty() {
            return Err(AppError::BadRequest("Category must not be empty".into()));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(AppError::BadRequest(msg::INVALID_PRICE.into()));
        }
        Ok(())
    }
}
