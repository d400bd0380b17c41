use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("malformed timestamp {raw:?}: expected YYYY-MM-DDTHH:MM:SS.ffffff")]
    MalformedTimestamp { raw: String },

    #[error("timestamp year {year} does not fit YYYY-MM-DDTHH:MM:SS.ffffff")]
    TimestampOutOfRange { year: i32 },

    #[error("product id must not be empty")]
    EmptyProductId,

    #[error("invalid {side} level: {reason}")]
    InvalidLevel { side: Side, reason: String },
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// One side of the top of book: (price, size, order count).
/// Price and size stay decimal strings exactly as the venue sent them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub price: String,
    pub size: String,
    pub order_count: u64,
}

impl Level {
    pub fn new(price: impl Into<String>, size: impl Into<String>, order_count: u64) -> Self {
        Self { price: price.into(), size: size.into(), order_count }
    }
}

/// One L1 observation for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub product_id: String,
    /// Exchange counter, not assumed unique or gap-free.
    pub sequence: Option<String>,
    pub best_bid: Level,
    pub best_ask: Level,
    /// Event time, microsecond resolution, UTC.
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// Builds a snapshot, rejecting shapes that must never reach the store.
    pub fn new(
        product_id: impl Into<String>,
        sequence: Option<String>,
        best_bid: Level,
        best_ask: Level,
        timestamp: DateTime<Utc>,
    ) -> SnapshotResult<Self> {
        let product_id = product_id.into();
        if product_id.trim().is_empty() {
            return Err(SnapshotError::EmptyProductId);
        }
        validate_level(Side::Bid, &best_bid)?;
        validate_level(Side::Ask, &best_ask)?;
        if !super::timestamp::is_representable(&timestamp) {
            return Err(SnapshotError::TimestampOutOfRange { year: timestamp.year() });
        }

        Ok(Self {
            product_id,
            // "" and None mean the same thing on the wire
            sequence: sequence.filter(|s| !s.is_empty()),
            best_bid,
            best_ask,
            timestamp: super::timestamp::truncate_to_micros(timestamp),
        })
    }

    pub fn spread_is_crossed(&self) -> bool {
        match (self.best_bid.price.parse::<f64>(), self.best_ask.price.parse::<f64>()) {
            (Ok(bid), Ok(ask)) => bid > ask,
            _ => false,
        }
    }
}

fn validate_level(side: Side, level: &Level) -> SnapshotResult<()> {
    if !is_decimal(&level.price) {
        return Err(SnapshotError::InvalidLevel {
            side,
            reason: format!("price {:?} is not a decimal", level.price),
        });
    }
    if !is_decimal(&level.size) {
        return Err(SnapshotError::InvalidLevel {
            side,
            reason: format!("size {:?} is not a decimal", level.size),
        });
    }
    Ok(())
}

/// Plain unsigned decimal: digits, optionally one '.' with digits on at least one side.
pub fn is_decimal(s: &str) -> bool {
    let (integer_part, decimal_part) = match s.find('.') {
        Some(dot_pos) => (&s[..dot_pos], &s[dot_pos + 1..]),
        None => (s, ""),
    };
    if integer_part.is_empty() && decimal_part.is_empty() {
        return false;
    }
    integer_part.bytes().all(|b| b.is_ascii_digit())
        && decimal_part.bytes().all(|b| b.is_ascii_digit())
}
