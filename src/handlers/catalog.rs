use axum::{extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};

use crate::auth::require_operator;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{CreateProduct, Product};

/// Operator label recorded on trash operations, from the x-operator header.
fn operator_label(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-operator")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

pub async fn create_catalog_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreateProduct>,
) -> Result<Json<Product>> {
    require_operator(&headers, &state.operator_secret)?;
    input.validate()?;

    let conn = state.db.get()?;
    let product = queries::create_product(&conn, &input)?;

    tracing::info!("catalog: created product {} ({})", product.id, product.title);
    Ok(Json(product))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_trashed: bool,
}

pub async fn list_catalog_products(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Product>>> {
    require_operator(&headers, &state.operator_secret)?;

    let conn = state.db.get()?;
    Ok(Json(queries::list_products(&conn, query.include_trashed)?))
}

#[derive(Debug, Serialize)]
pub struct LifecycleResponse {
    pub id: String,
    pub state: &'static str,
}

/// Soft-delete: the product disappears from the storefront and from order
/// creation, while existing entitlements keep resolving via their snapshots.
pub async fn trash_catalog_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>> {
    require_operator(&headers, &state.operator_secret)?;

    let conn = state.db.get()?;
    if !queries::trash_product(&conn, &id, operator_label(&headers).as_deref())? {
        // Either unknown or already in the trash.
        queries::get_product_any(&conn, &id)?.or_not_found(msg::PRODUCT_NOT_FOUND)?;
        return Err(AppError::Conflict("Product is already in the trash".into()));
    }

    tracing::info!("catalog: trashed product {}", id);
    Ok(Json(LifecycleResponse { id, state: "trashed" }))
}

pub async fn restore_catalog_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>> {
    require_operator(&headers, &state.operator_secret)?;

    let conn = state.db.get()?;
    if !queries::restore_product(&conn, &id)? {
        queries::get_product_any(&conn, &id)?.or_not_found(msg::PRODUCT_NOT_FOUND)?;
        return Err(AppError::Conflict("Product is not in the trash".into()));
    }

    tracing::info!("catalog: restored product {}", id);
    Ok(Json(LifecycleResponse { id, state: "active" }))
}

/// Hard-delete, permitted only on trashed products. Destructive and
/// irreversible; entitlement resolution survives through order snapshots.
pub async fn purge_catalog_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>> {
    require_operator(&headers, &state.operator_secret)?;

    let conn = state.db.get()?;
    if !queries::purge_product(&conn, &id)? {
        queries::get_product_any(&conn, &id)?.or_not_found(msg::PRODUCT_NOT_FOUND)?;
        return Err(AppError::Conflict(msg::PURGE_REQUIRES_TRASH.into()));
    }

    tracing::info!("catalog: purged product {}", id);
    Ok(Json(LifecycleResponse { id, state: "purged" }))
}

#[derive(Debug, Deserialize)]
pub struct SweepQuery {
    /// "1"/"true" previews the sweep without mutating anything.
    #[serde(default, rename = "dryRun")]
    pub dry_run: Option<String>,
}

impl SweepQuery {
    fn is_dry_run(&self) -> bool {
        matches!(self.dry_run.as_deref(), Some("1") | Some("true"))
    }
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub would_delete: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_count: Option<usize>,
}

/// Retention sweep over the trash. Dry-run reports the count it would purge
/// without mutating anything; a live run deletes exactly that set. Rerunning
/// finds nothing to do.
pub async fn sweep_trash(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SweepQuery>,
) -> Result<Json<SweepResponse>> {
    require_operator(&headers, &state.operator_secret)?;

    let conn = state.db.get()?;

    if query.is_dry_run() {
        let count = queries::count_purgeable_products(&conn, state.trash_retention_days)?;
        return Ok(Json(SweepResponse {
            would_delete: Some(count),
            deleted_count: None,
        }));
    }

    let deleted = queries::purge_expired_trash(&conn, state.trash_retention_days)?;
    if deleted > 0 {
        tracing::info!("catalog sweep purged {} trashed products", deleted);
    }
    Ok(Json(SweepResponse {
        would_delete: None,
        deleted_count: Some(deleted),
    }))
}
