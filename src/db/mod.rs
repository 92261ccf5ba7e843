mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::gateway::PaymentGateway;
use crate::storage::ObjectStore;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers.
///
/// All request-scoped context (identity, secrets) is resolved once here or in
/// extractors and passed explicitly into operations; nothing reads config
/// ambiently.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Payment gateway adapter. Trait object so tests can script outcomes.
    pub gateway: Arc<dyn PaymentGateway>,
    /// Object storage presigner for delivery URLs.
    pub store: ObjectStore,
    /// Gateway key id, handed to clients for the payment UI.
    pub gateway_key_id: String,
    /// Signs checkout confirmations; verified constant-time.
    pub gateway_key_secret: String,
    /// Signs webhook bodies; separate secret from the API key.
    pub webhook_secret: String,
    /// Bearer secret for catalog lifecycle and sweep endpoints.
    pub operator_secret: String,
    pub download_ttl_secs: u64,
    pub preparation_window_secs: i64,
    pub trash_retention_days: i64,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
