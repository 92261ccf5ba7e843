//! Identity boundary.
//!
//! Session issuance lives outside this system; what arrives here is a bearer
//! token whose SHA-256 hash maps to a user row. The `AuthedUser` extractor is
//! the only identity surface the core sees - a resolved user id passed
//! explicitly into each operation.

use axum::{extract::FromRequestParts, http::request::Parts};
use sha2::{Digest, Sha256};

use crate::db::{queries, AppState};
use crate::error::{msg, AppError};

/// Hash a bearer token for database lookups. Tokens are never stored raw.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"studyshelf-v1:");
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a fresh session token (dev seed and tests; production tokens
/// come from the identity service).
pub fn generate_session_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("ss_tok_{}", hex::encode(bytes))
}

/// Extract a Bearer token from the Authorization header.
pub fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// The verified identity of the calling customer.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: String,
    pub email: String,
}

impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;

        let conn = state.db.get()?;
        let user = queries::get_user_by_session(&conn, &hash_token(token))?
            .ok_or_else(|| {
                tracing::debug!("{}", msg::INVALID_SESSION);
                AppError::Unauthorized
            })?;

        Ok(AuthedUser {
            id: user.id,
            email: user.email,
        })
    }
}

/// Guard for the operator endpoints (catalog lifecycle, purge sweep).
/// Compares the presented bearer token against the configured secret in
/// constant time.
pub fn require_operator(headers: &axum::http::HeaderMap, operator_secret: &str) -> Result<(), AppError> {
    use subtle::ConstantTimeEq;

    if operator_secret.is_empty() {
        return Err(AppError::Unauthorized);
    }

    let token = extract_bearer_token(headers).ok_or(AppError::Unauthorized)?;

    let a = token.as_bytes();
    let b = operator_secret.as_bytes();
    if a.len() != b.len() || !bool::from(a.ct_eq(b)) {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}
