//! Signature verification for both payment confirmation channels.
//!
//! The gateway signs two different things with two different secrets:
//! - checkout confirmations: HMAC-SHA256 over `"{order_id}|{payment_id}"`
//!   under the API key secret, submitted by the paying client after the
//!   in-browser payment completes;
//! - webhook deliveries: HMAC-SHA256 over the raw event body under a
//!   dedicated webhook secret, carried in the `x-razorpay-signature` header.
//!
//! Both comparisons are constant-time. A timing leak here would let an
//! attacker forge a confirmation byte-by-byte.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

fn hmac_hex(secret: &str, message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison of a provided hex signature against the expected
/// one. The length check is not constant-time, but signature length is not
/// secret (always 64 hex chars for SHA-256).
fn matches_expected(expected_hex: &str, provided_hex: &str) -> bool {
    let expected = expected_hex.as_bytes();
    let provided = provided_hex.as_bytes();

    if expected.len() != provided.len() {
        return false;
    }

    expected.ct_eq(provided).into()
}

/// Verify a client-submitted checkout confirmation signature.
pub fn verify_checkout_signature(
    gateway_order_id: &str,
    gateway_payment_id: &str,
    provided_hex: &str,
    key_secret: &str,
) -> bool {
    let message = format!("{}|{}", gateway_order_id, gateway_payment_id);
    matches_expected(&hmac_hex(key_secret, message.as_bytes()), provided_hex)
}

/// Verify a webhook body signature.
pub fn verify_webhook_signature(body: &[u8], provided_hex: &str, webhook_secret: &str) -> bool {
    matches_expected(&hmac_hex(webhook_secret, body), provided_hex)
}

/// Compute a checkout confirmation signature. Test fixtures and the dev seed
/// use this; the production signer is the gateway itself.
pub fn sign_checkout(gateway_order_id: &str, gateway_payment_id: &str, key_secret: &str) -> String {
    hmac_hex(key_secret, format!("{}|{}", gateway_order_id, gateway_payment_id).as_bytes())
}

/// Compute a webhook body signature (see `sign_checkout` for intended use).
pub fn sign_webhook_body(body: &[u8], webhook_secret: &str) -> String {
    hmac_hex(webhook_secret, body)
}
