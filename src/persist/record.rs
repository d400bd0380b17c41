//! Pure conversions between `Snapshot` and its stored record.
//!
//! This file MUST NOT talk to a backend. Only struct <-> struct <-> JSON mapping lives here.

use crate::model::timestamp::{format_timestamp, is_representable, parse_timestamp};
use crate::model::{Level, Snapshot, SnapshotResult};
use crate::persist::types::{PersistError, PersistResult, SnapshotRecord};

impl From<&Snapshot> for SnapshotRecord {
    fn from(snap: &Snapshot) -> Self {
        let level = |l: &Level| (l.price.clone(), l.size.clone(), l.order_count);
        SnapshotRecord {
            sequence: snap.sequence.clone().unwrap_or_default(),
            bids: level(&snap.best_bid),
            asks: level(&snap.best_ask),
            timestamp: format_timestamp(&snap.timestamp),
            product_id: Some(snap.product_id.clone()),
        }
    }
}

impl SnapshotRecord {
    /// Rebuild a validated `Snapshot`. Records written without a product id take
    /// `fallback_product_id` (the index they were read from).
    pub fn into_snapshot(self, fallback_product_id: &str) -> SnapshotResult<Snapshot> {
        let timestamp = parse_timestamp(&self.timestamp)?;
        let product_id = self.product_id.unwrap_or_else(|| fallback_product_id.to_string());
        let (bid_px, bid_sz, bid_n) = self.bids;
        let (ask_px, ask_sz, ask_n) = self.asks;
        Snapshot::new(
            product_id,
            Some(self.sequence),
            Level::new(bid_px, bid_sz, bid_n),
            Level::new(ask_px, ask_sz, ask_n),
            timestamp,
        )
    }
}

/// Snapshot -> stored JSON member. Refuses anything `deserialize` could not read back.
pub fn serialize(snap: &Snapshot) -> PersistResult<String> {
    let failure = |reason: String| PersistError::SerializationFailure {
        product_id: snap.product_id.clone(),
        reason,
    };
    // fields are public, so a snapshot may have been edited after `Snapshot::new`
    if !is_representable(&snap.timestamp) {
        return Err(failure(format!(
            "timestamp {} cannot be stored as YYYY-MM-DDTHH:MM:SS.ffffff",
            format_timestamp(&snap.timestamp)
        )));
    }
    serde_json::to_string(&SnapshotRecord::from(snap)).map_err(|e| failure(e.to_string()))
}

/// Stored JSON member -> Snapshot. `key` is the index the member came from.
pub fn deserialize(member: &str, key: &str, fallback_product_id: &str) -> PersistResult<Snapshot> {
    let mismatch = |reason: String| PersistError::FormatMismatch { key: key.to_string(), reason };

    let record: SnapshotRecord =
        serde_json::from_str(member).map_err(|e| mismatch(e.to_string()))?;
    record
        .into_snapshot(fallback_product_id)
        .map_err(|e| mismatch(e.to_string()))
}
