use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::AuthedUser;
use crate::db::AppState;
use crate::entitlement::{self, DownloadIntent, Resolution};
use crate::error::{msg, AppError, Result};
use crate::extractors::{Json, Path, Query};

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// "view" for inline preview, "download" for attachment. Defaults to
    /// download.
    #[serde(default)]
    pub intent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadReady {
    pub url: String,
    pub expires_in: u64,
}

#[derive(Debug, Serialize)]
pub struct DownloadPending {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_seconds: Option<i64>,
}

/// Resolve a download for an owned product.
///
/// 200 with a signed URL when the asset is deliverable; 202 with a structured
/// payload when the caller owns the product but it is not ready yet
/// (deliberately not 404 - "you don't own this" is 403, "not ready yet" is
/// 202); 403 when no unexpired paid order covers the product. The URL lives
/// for about a minute, so clients must resolve fresh on every attempt.
pub async fn resolve_download(
    State(state): State<AppState>,
    user: AuthedUser,
    Path(product_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<axum::response::Response> {
    let intent = match query.intent.as_deref() {
        None => DownloadIntent::Download,
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::BadRequest(msg::INVALID_INTENT.into()))?,
    };

    let conn = state.db.get()?;
    let resolution = entitlement::resolve_download(
        &conn,
        &state.store,
        &user.id,
        &product_id,
        intent,
        Utc::now().timestamp(),
        state.preparation_window_secs,
        state.download_ttl_secs,
    )?;

    let response = match resolution {
        Resolution::Ready { url, expires_in } => {
            Json(DownloadReady { url, expires_in }).into_response()
        }
        Resolution::Processing { retry_in_seconds } => (
            StatusCode::ACCEPTED,
            Json(DownloadPending {
                status: "processing",
                retry_in_seconds: Some(retry_in_seconds),
            }),
        )
            .into_response(),
        Resolution::CompensationPending => (
            StatusCode::ACCEPTED,
            Json(DownloadPending {
                status: "compensation_pending",
                retry_in_seconds: None,
            }),
        )
            .into_response(),
        Resolution::NotReady => (
            StatusCode::ACCEPTED,
            Json(DownloadPending {
                status: "not_ready",
                retry_in_seconds: None,
            }),
        )
            .into_response(),
        Resolution::Denied => {
            return Err(AppError::Forbidden(msg::NO_ACTIVE_ACCESS.into()));
        }
    };

    Ok(response)
}
