//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, name, created_at";

pub const PRODUCT_COLS: &str = "id, title, category, description, price, currency, asset_key, availability, active, created_at, updated_at, deleted_at, deleted_by";

pub const ORDER_COLS: &str = "id, user_id, status, amount_minor, currency, gateway, gateway_order_id, gateway_payment_id, receipt, paid_at, expires_at, created_at";

pub const ORDER_ITEM_COLS: &str =
    "id, order_id, product_id, title, category, price, asset_key, created_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl FromRow for Product {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Product {
            id: row.get(0)?,
            title: row.get(1)?,
            category: row.get(2)?,
            description: row.get(3)?,
            price: row.get(4)?,
            currency: row.get(5)?,
            asset_key: row.get(6)?,
            availability: parse_enum(row, 7, "availability")?,
            active: row.get::<_, i64>(8)? != 0,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            deleted_at: row.get(11)?,
            deleted_by: row.get(12)?,
        })
    }
}

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            user_id: row.get(1)?,
            status: parse_enum(row, 2, "status")?,
            amount_minor: row.get(3)?,
            currency: row.get(4)?,
            gateway: row.get(5)?,
            gateway_order_id: row.get(6)?,
            gateway_payment_id: row.get(7)?,
            receipt: row.get(8)?,
            paid_at: row.get(9)?,
            expires_at: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

impl FromRow for OrderItem {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OrderItem {
            id: row.get(0)?,
            order_id: row.get(1)?,
            product_id: row.get(2)?,
            title: row.get(3)?,
            category: row.get(4)?,
            price: row.get(5)?,
            asset_key: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}
