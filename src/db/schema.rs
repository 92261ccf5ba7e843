use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Users (identity is issued elsewhere; we only consume it)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

        -- Sessions (bearer token hash -> user), seeded by the identity service
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token_hash TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_token ON sessions(token_hash);

        -- Products (study materials)
        -- Soft delete: deleted_at = timestamp when trashed, NULL = live.
        -- Trashed products disappear from the storefront and from order
        -- creation, but never from entitlement resolution.
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT,
            price REAL NOT NULL,
            currency TEXT NOT NULL DEFAULT 'INR',
            asset_key TEXT,
            availability TEXT NOT NULL DEFAULT 'available'
                CHECK (availability IN ('available', 'coming_soon', 'out_of_stock')),
            active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,
            deleted_by TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_products_live ON products(id) WHERE deleted_at IS NULL;
        CREATE INDEX IF NOT EXISTS idx_products_trash ON products(deleted_at) WHERE deleted_at IS NOT NULL;

        -- Orders (single source of truth for entitlement)
        -- paid_at/expires_at are written exactly once by the conditional
        -- pending -> paid transition and never updated afterwards.
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'paid', 'failed', 'refunded', 'cancelled')),
            amount_minor INTEGER NOT NULL,
            currency TEXT NOT NULL,
            gateway TEXT NOT NULL,
            gateway_order_id TEXT NOT NULL,
            gateway_payment_id TEXT,
            receipt TEXT NOT NULL,
            paid_at INTEGER,
            expires_at INTEGER,
            created_at INTEGER NOT NULL,
            UNIQUE(gateway, gateway_order_id)
        );
        CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id);
        CREATE INDEX IF NOT EXISTS idx_orders_entitlement ON orders(user_id, status, expires_at);

        -- Order items (immutable purchase-time snapshots of catalog data)
        CREATE TABLE IF NOT EXISTS order_items (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            product_id TEXT NOT NULL,
            title TEXT NOT NULL,
            category TEXT NOT NULL,
            price REAL NOT NULL,
            asset_key TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id);
        CREATE INDEX IF NOT EXISTS idx_order_items_product ON order_items(product_id);

        -- Webhook events (at-least-once delivery dedup)
        CREATE TABLE IF NOT EXISTS webhook_events (
            id TEXT PRIMARY KEY,
            gateway TEXT NOT NULL,
            event_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(gateway, event_id)
        );
        CREATE INDEX IF NOT EXISTS idx_webhook_events_lookup ON webhook_events(gateway, event_id);
        "#,
    )?;
    Ok(())
}
