mod catalog;
mod downloads;
mod orders;
mod webhook;

pub use catalog::*;
pub use downloads::*;
pub use orders::*;
pub use webhook::*;

use axum::{
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::config::RateLimits;
use crate::db::AppState;
use crate::rate_limit;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Customer-facing endpoints, rate limited per IP.
pub fn public_router(limits: RateLimits) -> Router<AppState> {
    // Order creation opens a gateway order per request, so it gets the
    // strict tier; verify and downloads only do crypto/DB work.
    let strict = Router::new()
        .route("/orders", post(create_order))
        .layer(rate_limit::strict_layer(limits.strict_rpm));

    let standard = Router::new()
        .route("/orders/verify", post(verify_payment))
        .route("/downloads/{product_id}", get(resolve_download))
        .layer(rate_limit::standard_layer(limits.standard_rpm));

    Router::new()
        .route("/health", get(health))
        .merge(strict)
        .merge(standard)
}

/// Gateway-facing endpoints (signature auth, no session).
pub fn webhook_router() -> Router<AppState> {
    Router::new().route("/webhook/razorpay", post(handle_razorpay_webhook))
}

/// Operator endpoints (bearer secret auth): catalog lifecycle and sweep.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/products", post(create_catalog_product).get(list_catalog_products))
        .route("/admin/products/{id}", delete(trash_catalog_product))
        .route("/admin/products/{id}/restore", post(restore_catalog_product))
        .route("/admin/products/{id}/purge", delete(purge_catalog_product))
        .route("/admin/trash/sweep", get(sweep_trash))
}
