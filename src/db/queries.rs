use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    query_all, query_one, ORDER_COLS, ORDER_ITEM_COLS, PRODUCT_COLS, USER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

const SECONDS_PER_DAY: i64 = 86400;

// ============ Users & Sessions ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let id = EntityType::User.gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO users (id, email, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![&id, &email, &input.name, now],
    )?;

    Ok(User {
        id,
        email,
        name: input.name.clone(),
        created_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

/// Record a session issued by the identity service. `token_hash` is the
/// SHA-256 of the bearer token; the token itself is never stored.
pub fn create_session(
    conn: &Connection,
    user_id: &str,
    token_hash: &str,
    ttl_secs: i64,
) -> Result<Session> {
    let id = EntityType::Session.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token_hash, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, user_id, token_hash, now, now + ttl_secs],
    )?;

    Ok(Session {
        id,
        user_id: user_id.to_string(),
        token_hash: token_hash.to_string(),
        created_at: now,
        expires_at: now + ttl_secs,
    })
}

/// Resolve an unexpired session token hash to its user.
pub fn get_user_by_session(conn: &Connection, token_hash: &str) -> Result<Option<User>> {
    query_one(
        conn,
        "SELECT u.id, u.email, u.name, u.created_at
         FROM sessions s JOIN users u ON u.id = s.user_id
         WHERE s.token_hash = ?1 AND s.expires_at > ?2",
        &[&token_hash, &now()],
    )
}

// ============ Products ============

pub fn create_product(conn: &Connection, input: &CreateProduct) -> Result<Product> {
    let id = EntityType::Product.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO products (id, title, category, description, price, currency, asset_key, availability, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)",
        params![
            &id,
            &input.title,
            &input.category,
            &input.description,
            input.price,
            &input.currency,
            &input.asset_key,
            input.availability.as_str(),
            now
        ],
    )?;

    Ok(Product {
        id,
        title: input.title.clone(),
        category: input.category.clone(),
        description: input.description.clone(),
        price: input.price,
        currency: input.currency.clone(),
        asset_key: input.asset_key.clone(),
        availability: input.availability,
        active: true,
        created_at: now,
        updated_at: now,
        deleted_at: None,
        deleted_by: None,
    })
}

/// Get a product the storefront may still sell: not in trash.
pub fn get_live_product(conn: &Connection, id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM products WHERE id = ?1 AND deleted_at IS NULL",
            PRODUCT_COLS
        ),
        &[&id],
    )
}

/// Get a product regardless of trash state. Entitlement resolution reads
/// through this: a purchased-but-trashed product must still resolve.
pub fn get_product_any(conn: &Connection, id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        &[&id],
    )
}

pub fn list_products(conn: &Connection, include_trashed: bool) -> Result<Vec<Product>> {
    let filter = if include_trashed {
        ""
    } else {
        "WHERE deleted_at IS NULL"
    };
    query_all(
        conn,
        &format!(
            "SELECT {} FROM products {} ORDER BY created_at DESC",
            PRODUCT_COLS, filter
        ),
        &[],
    )
}

/// Move a live product to the trash. Returns false if the product does not
/// exist or is already trashed.
pub fn trash_product(conn: &Connection, id: &str, deleted_by: Option<&str>) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE products SET deleted_at = ?1, deleted_by = ?2, updated_at = ?1
         WHERE id = ?3 AND deleted_at IS NULL",
        params![now(), deleted_by, id],
    )?;
    Ok(affected > 0)
}

/// Bring a product back from the trash. Returns false if it was not trashed.
pub fn restore_product(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE products SET deleted_at = NULL, deleted_by = NULL, updated_at = ?1
         WHERE id = ?2 AND deleted_at IS NOT NULL",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

/// Permanently delete a trashed product. The `deleted_at IS NOT NULL` guard
/// makes purging a live product impossible at the storage layer; callers
/// translate a false return into a conflict when the product still exists.
pub fn purge_product(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM products WHERE id = ?1 AND deleted_at IS NOT NULL",
        params![id],
    )?;
    Ok(affected > 0)
}

/// Count trashed products whose retention window has elapsed.
pub fn count_purgeable_products(conn: &Connection, retention_days: i64) -> Result<i64> {
    let cutoff = now() - retention_days * SECONDS_PER_DAY;
    let count = conn.query_row(
        "SELECT COUNT(*) FROM products WHERE deleted_at IS NOT NULL AND deleted_at < ?1",
        params![cutoff],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Permanently delete trashed products older than the retention window.
/// Idempotent: a rerun finds nothing left to delete.
pub fn purge_expired_trash(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - retention_days * SECONDS_PER_DAY;
    let deleted = conn.execute(
        "DELETE FROM products WHERE deleted_at IS NOT NULL AND deleted_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

// ============ Orders ============

/// Persist the pending order and its snapshot item atomically. Called only
/// after the gateway has accepted the order, so a gateway-side failure never
/// leaves an orphaned pending row.
pub fn create_pending_order(conn: &mut Connection, new_order: &NewOrder) -> Result<Order> {
    let order_id = EntityType::Order.gen_id();
    let item_id = EntityType::OrderItem.gen_id();
    let now = now();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO orders (id, user_id, status, amount_minor, currency, gateway, gateway_order_id, receipt, created_at)
         VALUES (?1, ?2, 'pending', ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &order_id,
            &new_order.user_id,
            new_order.amount_minor,
            &new_order.currency,
            &new_order.gateway,
            &new_order.gateway_order_id,
            &new_order.receipt,
            now
        ],
    )?;
    tx.execute(
        "INSERT INTO order_items (id, order_id, product_id, title, category, price, asset_key, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &item_id,
            &order_id,
            &new_order.item.product_id,
            &new_order.item.title,
            &new_order.item.category,
            new_order.item.price,
            &new_order.item.asset_key,
            now
        ],
    )?;
    tx.commit()?;

    Ok(Order {
        id: order_id,
        user_id: new_order.user_id.clone(),
        status: OrderStatus::Pending,
        amount_minor: new_order.amount_minor,
        currency: new_order.currency.clone(),
        gateway: new_order.gateway.clone(),
        gateway_order_id: new_order.gateway_order_id.clone(),
        gateway_payment_id: None,
        receipt: new_order.receipt.clone(),
        paid_at: None,
        expires_at: None,
        created_at: now,
    })
}

pub fn get_order_by_id(conn: &Connection, id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        &[&id],
    )
}

/// Look up the local order for an external reference. The unique index on
/// (gateway, gateway_order_id) guarantees at most one row.
pub fn get_order_by_gateway_ref(
    conn: &Connection,
    gateway: &str,
    gateway_order_id: &str,
) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE gateway = ?1 AND gateway_order_id = ?2",
            ORDER_COLS
        ),
        &[&gateway, &gateway_order_id],
    )
}

/// Atomically transition an order from pending to paid.
///
/// Compare-and-swap on the status column closes the race between the two
/// confirmation channels: only one caller observes `true`, and paid_at /
/// expires_at are written exactly once.
pub fn try_mark_order_paid(
    conn: &Connection,
    order_id: &str,
    gateway_payment_id: &str,
    paid_at: i64,
    expires_at: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = 'paid', gateway_payment_id = ?1, paid_at = ?2, expires_at = ?3
         WHERE id = ?4 AND status = 'pending'",
        params![gateway_payment_id, paid_at, expires_at, order_id],
    )?;
    Ok(affected > 0)
}

/// Atomically transition an order from pending to failed. The status guard
/// means a late failure report can never downgrade an already-paid order.
pub fn try_mark_order_failed(
    conn: &Connection,
    order_id: &str,
    gateway_payment_id: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = 'failed', gateway_payment_id = ?1
         WHERE id = ?2 AND status = 'pending'",
        params![gateway_payment_id, order_id],
    )?;
    Ok(affected > 0)
}

/// Find the order that entitles a user to a product right now: paid, owned
/// by the user, containing the product, deadline strictly in the future.
/// Returns the order together with its matching snapshot item.
pub fn find_entitled_order(
    conn: &Connection,
    user_id: &str,
    product_id: &str,
    now: i64,
) -> Result<Option<(Order, OrderItem)>> {
    let order: Option<Order> = query_one(
        conn,
        &format!(
            "SELECT {} FROM orders
             WHERE user_id = ?1 AND status = 'paid' AND expires_at > ?2
               AND EXISTS (SELECT 1 FROM order_items i
                           WHERE i.order_id = orders.id AND i.product_id = ?3)
             ORDER BY paid_at DESC LIMIT 1",
            ORDER_COLS
        ),
        &[&user_id, &now, &product_id],
    )?;

    let Some(order) = order else {
        return Ok(None);
    };

    let item: Option<OrderItem> = query_one(
        conn,
        &format!(
            "SELECT {} FROM order_items WHERE order_id = ?1 AND product_id = ?2 LIMIT 1",
            ORDER_ITEM_COLS
        ),
        &[&order.id, &product_id],
    )?;

    match item {
        Some(item) => Ok(Some((order, item))),
        None => Ok(None),
    }
}

pub fn get_items_for_order(conn: &Connection, order_id: &str) -> Result<Vec<OrderItem>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM order_items WHERE order_id = ?1 ORDER BY created_at",
            ORDER_ITEM_COLS
        ),
        &[&order_id],
    )
}

// ============ Webhook Event Deduplication ============

/// Whether a webhook event id has already been processed.
pub fn has_webhook_event(conn: &Connection, gateway: &str, event_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM webhook_events WHERE gateway = ?1 AND event_id = ?2",
        params![gateway, event_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Atomically record a webhook event, returning true if this is a new event.
/// Returns false if the event was already processed (at-least-once delivery).
pub fn try_record_webhook_event(conn: &Connection, gateway: &str, event_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (id, gateway, event_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![EntityType::WebhookEvent.gen_id(), gateway, event_id, now()],
    )?;
    Ok(affected > 0)
}

/// Purge old webhook events beyond the retention period. They only exist for
/// delivery dedup; the gateway retries for a few days at most.
pub fn purge_old_webhook_events(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - retention_days * SECONDS_PER_DAY;
    let deleted = conn.execute(
        "DELETE FROM webhook_events WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}
