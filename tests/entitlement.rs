//! Entitlement resolution tests: expiry edges, snapshot isolation, and the
//! structured not-ready answers.

#[path = "common/mod.rs"]
mod common;

use common::*;
use studyshelf::entitlement::{resolve_download, DownloadIntent, Resolution};

const PREP_WINDOW: i64 = 48 * 3600;

fn resolve(
    conn: &rusqlite::Connection,
    user_id: &str,
    product_id: &str,
    at: i64,
) -> Resolution {
    resolve_download(
        conn,
        &test_store(),
        user_id,
        product_id,
        DownloadIntent::Download,
        at,
        PREP_WINDOW,
        60,
    )
    .expect("resolution should not error")
}

#[test]
fn test_paid_unexpired_order_yields_signed_url() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let mut conn = state.db.get().unwrap();

    let (user, _) = create_test_user(&conn, "buyer@test.com");
    let product = create_test_product(&conn, "Notes", 199.0);
    let t = now();
    create_paid_order(&mut conn, &user.id, &product, "order_g1", t, t + ONE_YEAR);

    let resolution = resolve(&conn, &user.id, &product.id, t);
    let Resolution::Ready { url, expires_in } = resolution else {
        panic!("expected Ready, got {:?}", resolution);
    };
    assert_eq!(expires_in, 60);
    assert!(url.contains("/test-assets/assets/test.pdf?"));
    assert!(url.contains("response-content-disposition=attachment"));
}

#[test]
fn test_view_intent_uses_inline_disposition() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let mut conn = state.db.get().unwrap();

    let (user, _) = create_test_user(&conn, "buyer@test.com");
    let product = create_test_product(&conn, "Notes", 199.0);
    let t = now();
    create_paid_order(&mut conn, &user.id, &product, "order_g1", t, t + ONE_YEAR);

    let resolution = resolve_download(
        &conn,
        &test_store(),
        &user.id,
        &product.id,
        DownloadIntent::View,
        t,
        PREP_WINDOW,
        60,
    )
    .unwrap();

    let Resolution::Ready { url, .. } = resolution else {
        panic!("expected Ready");
    };
    assert!(url.contains("response-content-disposition=inline"));
}

#[test]
fn test_no_order_is_denied() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let conn = state.db.get().unwrap();

    let (user, _) = create_test_user(&conn, "buyer@test.com");
    let product = create_test_product(&conn, "Notes", 199.0);

    assert_eq!(resolve(&conn, &user.id, &product.id, now()), Resolution::Denied);
}

#[test]
fn test_expired_order_is_denied_not_not_ready() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let mut conn = state.db.get().unwrap();

    let (user, _) = create_test_user(&conn, "buyer@test.com");
    let product = create_test_product(&conn, "Notes", 199.0);
    let t = now();
    // Deadline one second in the past: functionally expired, status unchanged.
    create_paid_order(&mut conn, &user.id, &product, "order_g1", t - ONE_YEAR, t - 1);

    assert_eq!(resolve(&conn, &user.id, &product.id, t), Resolution::Denied);

    let order = queries::get_order_by_gateway_ref(&conn, "razorpay", "order_g1")
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid, "expiry never rewrites stored status");
}

#[test]
fn test_expiry_boundary_is_strict() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let mut conn = state.db.get().unwrap();

    let (user, _) = create_test_user(&conn, "buyer@test.com");
    let product = create_test_product(&conn, "Notes", 199.0);
    let t = now();
    create_paid_order(&mut conn, &user.id, &product, "order_g1", t - ONE_YEAR, t);

    // expires_at == now is already expired; one second earlier is not.
    assert_eq!(resolve(&conn, &user.id, &product.id, t), Resolution::Denied);
    assert!(matches!(
        resolve(&conn, &user.id, &product.id, t - 1),
        Resolution::Ready { .. }
    ));
}

#[test]
fn test_pending_order_grants_nothing() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let mut conn = state.db.get().unwrap();

    let (user, _) = create_test_user(&conn, "buyer@test.com");
    let product = create_test_product(&conn, "Notes", 199.0);
    create_pending_order(&mut conn, &user.id, &product, "order_g1");

    assert_eq!(resolve(&conn, &user.id, &product.id, now()), Resolution::Denied);
}

#[test]
fn test_other_users_order_grants_nothing() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let mut conn = state.db.get().unwrap();

    let (owner, _) = create_test_user(&conn, "owner@test.com");
    let (other, _) = create_test_user(&conn, "other@test.com");
    let product = create_test_product(&conn, "Notes", 199.0);
    let t = now();
    create_paid_order(&mut conn, &owner.id, &product, "order_g1", t, t + ONE_YEAR);

    assert_eq!(resolve(&conn, &other.id, &product.id, t), Resolution::Denied);
}

#[test]
fn test_snapshot_survives_catalog_edits() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let mut conn = state.db.get().unwrap();

    let (user, _) = create_test_user(&conn, "buyer@test.com");
    let product = create_test_product_with(
        &conn,
        "Notes",
        199.0,
        Some("assets/v1.pdf"),
        Availability::Available,
    );
    let t = now();
    create_paid_order(&mut conn, &user.id, &product, "order_g1", t, t + ONE_YEAR);

    // The catalog moves on after the purchase.
    conn.execute(
        "UPDATE products SET price = 999.0, asset_key = 'assets/v2.pdf' WHERE id = ?1",
        [&product.id],
    )
    .unwrap();

    let Resolution::Ready { url, .. } = resolve(&conn, &user.id, &product.id, t) else {
        panic!("expected Ready");
    };
    assert!(
        url.contains("assets/v1.pdf"),
        "resolution must use the purchase-time snapshot, got {}",
        url
    );

    let items = queries::get_items_for_order(
        &conn,
        &queries::get_order_by_gateway_ref(&conn, "razorpay", "order_g1")
            .unwrap()
            .unwrap()
            .id,
    )
    .unwrap();
    assert_eq!(items[0].price, 199.0);
}

#[test]
fn test_trashed_product_still_resolves_via_snapshot() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let mut conn = state.db.get().unwrap();

    let (user, _) = create_test_user(&conn, "buyer@test.com");
    let product = create_test_product(&conn, "Notes", 199.0);
    let t = now();
    create_paid_order(&mut conn, &user.id, &product, "order_g1", t, t + ONE_YEAR);

    queries::trash_product(&conn, &product.id, Some("ops")).unwrap();

    assert!(matches!(
        resolve(&conn, &user.id, &product.id, t),
        Resolution::Ready { .. }
    ));
}

#[test]
fn test_legacy_order_falls_back_to_live_catalog() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let mut conn = state.db.get().unwrap();

    let (user, _) = create_test_user(&conn, "buyer@test.com");
    let product = create_test_product(&conn, "Notes", 199.0);
    let t = now();
    let order = create_paid_order(&mut conn, &user.id, &product, "order_g1", t, t + ONE_YEAR);

    // Erase the snapshot, as for orders predating snapshotting.
    conn.execute(
        "UPDATE order_items SET asset_key = NULL WHERE order_id = ?1",
        [&order.id],
    )
    .unwrap();

    let Resolution::Ready { url, .. } = resolve(&conn, &user.id, &product.id, t) else {
        panic!("expected fallback to the live catalog asset");
    };
    assert!(url.contains("assets/test.pdf"));
}

#[test]
fn test_coming_soon_reports_processing_with_eta() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let mut conn = state.db.get().unwrap();

    let (user, _) = create_test_user(&conn, "buyer@test.com");
    let product =
        create_test_product_with(&conn, "Mock Series", 499.0, None, Availability::ComingSoon);
    let paid_at = now() - 3600;
    create_paid_order(&mut conn, &user.id, &product, "order_g1", paid_at, paid_at + ONE_YEAR);

    let t = now();
    let resolution = resolve(&conn, &user.id, &product.id, t);
    let Resolution::Processing { retry_in_seconds } = resolution else {
        panic!("expected Processing, got {:?}", resolution);
    };
    assert_eq!(retry_in_seconds, paid_at + PREP_WINDOW - t);
}

#[test]
fn test_overdue_coming_soon_clamps_eta_to_zero() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let mut conn = state.db.get().unwrap();

    let (user, _) = create_test_user(&conn, "buyer@test.com");
    let product =
        create_test_product_with(&conn, "Mock Series", 499.0, None, Availability::ComingSoon);
    let paid_at = now() - PREP_WINDOW - ONE_DAY;
    create_paid_order(&mut conn, &user.id, &product, "order_g1", paid_at, paid_at + ONE_YEAR);

    assert_eq!(
        resolve(&conn, &user.id, &product.id, now()),
        Resolution::Processing { retry_in_seconds: 0 }
    );
}

#[test]
fn test_out_of_stock_reports_compensation_pending() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let mut conn = state.db.get().unwrap();

    let (user, _) = create_test_user(&conn, "buyer@test.com");
    let product =
        create_test_product_with(&conn, "Print Bundle", 799.0, None, Availability::OutOfStock);
    let t = now();
    create_paid_order(&mut conn, &user.id, &product, "order_g1", t, t + ONE_YEAR);

    assert_eq!(
        resolve(&conn, &user.id, &product.id, t),
        Resolution::CompensationPending
    );
}

#[test]
fn test_available_without_asset_is_transiently_not_ready() {
    let gateway = MockGateway::new();
    let state = create_test_app_state(gateway);
    let mut conn = state.db.get().unwrap();

    let (user, _) = create_test_user(&conn, "buyer@test.com");
    let product =
        create_test_product_with(&conn, "Notes", 199.0, None, Availability::Available);
    let t = now();
    create_paid_order(&mut conn, &user.id, &product, "order_g1", t, t + ONE_YEAR);

    assert_eq!(resolve(&conn, &user.id, &product.id, t), Resolution::NotReady);
}
