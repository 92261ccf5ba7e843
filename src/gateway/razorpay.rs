use reqwest::Client;
use serde::Deserialize;

use crate::error::{AppError, Result};

use super::{CreateGatewayOrder, GatewayOrder, GatewayPayment, PaymentGateway, PaymentState};

const API_BASE: &str = "https://api.razorpay.com/v1";

#[derive(Debug, Clone)]
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(key_id: &str, key_secret: &str) -> Self {
        Self {
            client: Client::new(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RazorpayOrder {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayPayment {
    id: String,
    order_id: String,
    status: String,
}

fn parse_state(status: &str) -> PaymentState {
    match status {
        "captured" => PaymentState::Captured,
        "authorized" => PaymentState::Authorized,
        "refunded" => PaymentState::Refunded,
        "failed" => PaymentState::Failed,
        _ => PaymentState::Created,
    }
}

#[async_trait::async_trait]
impl PaymentGateway for RazorpayClient {
    fn name(&self) -> &'static str {
        "razorpay"
    }

    async fn create_order(&self, req: &CreateGatewayOrder) -> Result<GatewayOrder> {
        let mut notes = serde_json::Map::new();
        for (k, v) in &req.notes {
            notes.insert(k.clone(), serde_json::Value::String(v.clone()));
        }

        let body = serde_json::json!({
            "amount": req.amount_minor,
            "currency": req.currency,
            "receipt": req.receipt,
            "notes": notes,
        });

        let response = self
            .client
            .post(format!("{}/orders", API_BASE))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("order create request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "order create returned {}: {}",
                status, error_text
            )));
        }

        let order: RazorpayOrder = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("invalid order create response: {}", e)))?;

        Ok(GatewayOrder {
            id: order.id,
            amount_minor: order.amount,
            currency: order.currency,
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment> {
        let response = self
            .client
            .get(format!("{}/payments/{}", API_BASE, payment_id))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("payment fetch request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "payment fetch returned {}: {}",
                status, error_text
            )));
        }

        let payment: RazorpayPayment = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("invalid payment fetch response: {}", e)))?;

        Ok(GatewayPayment {
            id: payment.id,
            order_id: payment.order_id,
            status: parse_state(&payment.status),
        })
    }
}
