use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("failed to serialize snapshot for {product_id}: {reason}")]
    SerializationFailure { product_id: String, reason: String },

    #[error("record under {key} does not match the snapshot format: {reason}")]
    FormatMismatch { key: String, reason: String },

    #[error("snapshot for {snapshot_product} cannot be indexed under {product_id}")]
    ProductMismatch { product_id: String, snapshot_product: String },

    #[error("score {score} for {key} is not a number")]
    InvalidScore { key: String, score: f64 },
}

impl From<sled::Error> for PersistError {
    fn from(err: sled::Error) -> Self {
        PersistError::StoreUnavailable(err.to_string())
    }
}

pub type PersistResult<T> = Result<T, PersistError>;

/// (price, size, order count) as stored.
pub type RecordLevel = (String, String, u64);

/// Persisted form of a snapshot. Field order is the on-disk order and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    #[serde(default)]
    pub sequence: String,
    #[serde(deserialize_with = "flat_or_nested_level")]
    pub bids: RecordLevel,
    #[serde(deserialize_with = "flat_or_nested_level")]
    pub asks: RecordLevel,
    pub timestamp: String,
    #[serde(rename = "productId", default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

// Older writers stored the whole one-element side (`[[price, size, count]]`).
#[derive(Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Flat(RecordLevel),
    Nested(Vec<RecordLevel>),
}

fn flat_or_nested_level<'de, D>(deserializer: D) -> Result<RecordLevel, D::Error>
where
    D: Deserializer<'de>,
{
    match LevelRepr::deserialize(deserializer)? {
        LevelRepr::Flat(level) => Ok(level),
        LevelRepr::Nested(levels) => levels
            .into_iter()
            .next()
            .ok_or_else(|| serde::de::Error::custom("empty level list")),
    }
}
