//! Entitlement resolution.
//!
//! Entitlement is derived, never stored: a user may download a product iff an
//! unexpired paid order of theirs contains it. The asset reference comes from
//! the order's own snapshot first; the live catalog is only a fallback for
//! legacy orders that predate snapshotting, which keeps trashed or edited
//! products resolvable for customers who already paid.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::Result;
use crate::models::Availability;
use crate::storage::ObjectStore;

/// What the caller intends to do with the URL; drives content-disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadIntent {
    /// Inline preview in the browser.
    View,
    /// Save-as attachment.
    Download,
}

impl std::str::FromStr for DownloadIntent {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "view" | "inline" => Ok(Self::View),
            "download" | "attachment" => Ok(Self::Download),
            _ => Err(()),
        }
    }
}

/// Outcome of a download resolution. Everything except `Denied` means the
/// caller owns the product; the non-`Ready` variants distinguish why the
/// asset cannot be handed out right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A signed, short-lived capability URL for the asset.
    Ready { url: String, expires_in: u64 },
    /// The material is still being prepared; retry after the given seconds.
    Processing { retry_in_seconds: i64 },
    /// The product ran out before the asset existed; compensation pending.
    CompensationPending,
    /// Owned but transiently missing an asset reference.
    NotReady,
    /// No unexpired paid order covers this product.
    Denied,
}

/// Resolve a (user, product) pair into a download decision.
///
/// `now` is passed in rather than read from the clock so expiry edges are
/// testable to the second.
pub fn resolve_download(
    conn: &Connection,
    store: &ObjectStore,
    user_id: &str,
    product_id: &str,
    intent: DownloadIntent,
    now: i64,
    preparation_window_secs: i64,
    ttl_secs: u64,
) -> Result<Resolution> {
    let Some((order, item)) = queries::find_entitled_order(conn, user_id, product_id, now)? else {
        return Ok(Resolution::Denied);
    };

    // Snapshot first; live catalog only for legacy orders without one. The
    // live read deliberately ignores trash state.
    let snapshot_key = item.asset_key.filter(|k| !k.is_empty());
    let (asset_key, live_product) = match snapshot_key {
        Some(key) => (Some(key), None),
        None => {
            let product = queries::get_product_any(conn, product_id)?;
            let key = product
                .as_ref()
                .and_then(|p| p.asset_key.clone())
                .filter(|k| !k.is_empty());
            (key, product)
        }
    };

    let Some(asset_key) = asset_key else {
        // Owned but no asset anywhere: answer by availability, not by error.
        // A fully purged product has no availability left to consult.
        let availability = live_product.map(|p| p.availability);

        return Ok(match availability {
            Some(Availability::ComingSoon) => {
                let ready_at = order.paid_at.unwrap_or(now) + preparation_window_secs;
                Resolution::Processing {
                    retry_in_seconds: (ready_at - now).max(0),
                }
            }
            Some(Availability::OutOfStock) => Resolution::CompensationPending,
            _ => Resolution::NotReady,
        });
    };

    let disposition = match intent {
        DownloadIntent::View => format!("inline; filename=\"{}\"", item.title),
        DownloadIntent::Download => format!("attachment; filename=\"{}\"", item.title),
    };

    let url = store.presigned_get_url(&asset_key, ttl_secs, Some(&disposition));

    Ok(Resolution::Ready {
        url,
        expires_in: ttl_secs,
    })
}
