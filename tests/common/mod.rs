//! Test utilities and fixtures for StudyShelf integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::routing::{delete, get, post};
use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use studyshelf::auth::{self, hash_token};
pub use studyshelf::db::{init_db, queries, AppState};
pub use studyshelf::error::{AppError, Result};
pub use studyshelf::gateway::{
    CreateGatewayOrder, GatewayOrder, GatewayPayment, PaymentGateway, PaymentState,
};
pub use studyshelf::handlers::{
    create_catalog_product, create_order, handle_razorpay_webhook, list_catalog_products,
    purge_catalog_product, resolve_download, restore_catalog_product, sweep_trash,
    trash_catalog_product, verify_payment,
};
pub use studyshelf::models::*;
pub use studyshelf::reconcile;
pub use studyshelf::signature;
pub use studyshelf::storage::ObjectStore;

pub const TEST_KEY_SECRET: &str = "test_key_secret";
pub const TEST_WEBHOOK_SECRET: &str = "test_webhook_secret";
pub const TEST_OPERATOR_SECRET: &str = "test_operator_secret";

/// Scripted payment gateway. Tests register payments the gateway "knows
/// about" and can assert how often the status query API was hit.
pub struct MockGateway {
    payments: Mutex<HashMap<String, GatewayPayment>>,
    order_seq: AtomicUsize,
    pub fetch_count: AtomicUsize,
    pub fail_create: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            payments: Mutex::new(HashMap::new()),
            order_seq: AtomicUsize::new(0),
            fetch_count: AtomicUsize::new(0),
            fail_create: AtomicBool::new(false),
        })
    }

    /// Register a payment the gateway will report for `fetch_payment`.
    pub fn script_payment(&self, payment_id: &str, order_id: &str, status: PaymentState) {
        self.payments.lock().unwrap().insert(
            payment_id.to_string(),
            GatewayPayment {
                id: payment_id.to_string(),
                order_id: order_id.to_string(),
                status,
            },
        );
    }

    pub fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "razorpay"
    }

    async fn create_order(&self, req: &CreateGatewayOrder) -> Result<GatewayOrder> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(AppError::Gateway("scripted gateway outage".into()));
        }
        let n = self.order_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewayOrder {
            id: format!("order_mock{}", n),
            amount_minor: req.amount_minor,
            currency: req.currency.clone(),
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| AppError::Gateway(format!("unknown payment {}", payment_id)))
    }
}

pub fn test_store() -> ObjectStore {
    ObjectStore {
        endpoint: "https://s3.ap-south-1.amazonaws.com".to_string(),
        region: "ap-south-1".to_string(),
        bucket: "test-assets".to_string(),
        access_key: "AKIATEST".to_string(),
        secret_key: "test-storage-secret".to_string(),
    }
}

/// Create a test AppState backed by the given mock gateway.
///
/// The pool holds a single connection so every checkout sees the same
/// in-memory database.
pub fn create_test_app_state(gateway: Arc<MockGateway>) -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        gateway,
        store: test_store(),
        gateway_key_id: "rzp_test_key".to_string(),
        gateway_key_secret: TEST_KEY_SECRET.to_string(),
        webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
        operator_secret: TEST_OPERATOR_SECRET.to_string(),
        download_ttl_secs: 60,
        preparation_window_secs: 48 * 3600,
        trash_retention_days: 30,
    }
}

/// Router with all customer endpoints (without rate limiting for tests)
pub fn public_app(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/verify", post(verify_payment))
        .route("/downloads/{product_id}", get(resolve_download))
        .with_state(state)
}

pub fn webhook_app(state: AppState) -> Router {
    Router::new()
        .route("/webhook/razorpay", post(handle_razorpay_webhook))
        .with_state(state)
}

pub fn admin_app(state: AppState) -> Router {
    Router::new()
        .route("/admin/products", post(create_catalog_product).get(list_catalog_products))
        .route("/admin/products/{id}", delete(trash_catalog_product))
        .route("/admin/products/{id}/restore", post(restore_catalog_product))
        .route("/admin/products/{id}/purge", delete(purge_catalog_product))
        .route("/admin/trash/sweep", get(sweep_trash))
        .with_state(state)
}

/// Create a test user with a live session; returns the user and the raw
/// bearer token.
pub fn create_test_user(conn: &Connection, email: &str) -> (User, String) {
    let user = queries::create_user(
        conn,
        &CreateUser {
            email: email.to_string(),
            name: format!("Test User {}", email),
        },
    )
    .expect("Failed to create test user");

    let token = auth::generate_session_token();
    queries::create_session(conn, &user.id, &hash_token(&token), 3600)
        .expect("Failed to create test session");

    (user, token)
}

/// Create an available test product with an uploaded asset.
pub fn create_test_product(conn: &Connection, title: &str, price: f64) -> Product {
    create_test_product_with(conn, title, price, Some("assets/test.pdf"), Availability::Available)
}

pub fn create_test_product_with(
    conn: &Connection,
    title: &str,
    price: f64,
    asset_key: Option<&str>,
    availability: Availability,
) -> Product {
    queries::create_product(
        conn,
        &CreateProduct {
            title: title.to_string(),
            category: "notes".to_string(),
            description: None,
            price,
            currency: "INR".to_string(),
            asset_key: asset_key.map(String::from),
            availability,
        },
    )
    .expect("Failed to create test product")
}

/// Create a pending order snapshotting the given product.
pub fn create_pending_order(
    conn: &mut Connection,
    user_id: &str,
    product: &Product,
    gateway_order_id: &str,
) -> Order {
    queries::create_pending_order(
        conn,
        &NewOrder {
            user_id: user_id.to_string(),
            amount_minor: (product.price * 100.0).round() as i64,
            currency: product.currency.clone(),
            gateway: "razorpay".to_string(),
            gateway_order_id: gateway_order_id.to_string(),
            receipt: format!("rcpt_{}", gateway_order_id),
            item: NewOrderItem {
                product_id: product.id.clone(),
                title: product.title.clone(),
                category: product.category.clone(),
                price: product.price,
                asset_key: product.asset_key.clone(),
            },
        },
    )
    .expect("Failed to create test order")
}

/// Create an order already settled as paid with explicit timestamps.
pub fn create_paid_order(
    conn: &mut Connection,
    user_id: &str,
    product: &Product,
    gateway_order_id: &str,
    paid_at: i64,
    expires_at: i64,
) -> Order {
    let order = create_pending_order(conn, user_id, product, gateway_order_id);
    let claimed = queries::try_mark_order_paid(
        conn,
        &order.id,
        &format!("pay_{}", gateway_order_id),
        paid_at,
        expires_at,
    )
    .expect("Failed to mark test order paid");
    assert!(claimed, "test order should have been pending");
    queries::get_order_by_id(conn, &order.id)
        .expect("Failed to reread test order")
        .expect("test order should exist")
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub const ONE_DAY: i64 = 86400;
pub const ONE_YEAR: i64 = 365 * 86400;
