// Convert a raw venue book into the canonical L1 Snapshot.
// Only the first (best) level of each side is kept.

use chrono::{DateTime, Utc};

use crate::market_data::adapters::coinbase_types::{RawBook, RawLevel};
use crate::market_data::adapters::FetchError;
use crate::model::{Level, Side, Snapshot};

pub fn to_snapshot(
    product_id: &str,
    raw: &RawBook,
    fetched_at: DateTime<Utc>,
) -> Result<Snapshot, FetchError> {
    let best_bid = best_level(product_id, Side::Bid, raw.bids.as_deref())?;
    let best_ask = best_level(product_id, Side::Ask, raw.asks.as_deref())?;

    Snapshot::new(product_id, raw.sequence_string(), best_bid, best_ask, fetched_at).map_err(|e| {
        FetchError::Malformed { product_id: product_id.to_string(), reason: e.to_string() }
    })
}

fn best_level(product_id: &str, side: Side, levels: Option<&[RawLevel]>) -> Result<Level, FetchError> {
    let levels = levels.ok_or_else(|| FetchError::Malformed {
        product_id: product_id.to_string(),
        reason: format!("missing {side}s"),
    })?;
    let RawLevel(price, size, orders) = levels.first().ok_or_else(|| FetchError::EmptySide {
        product_id: product_id.to_string(),
        side,
    })?;
    Ok(Level::new(price.clone(), size.clone(), *orders))
}
