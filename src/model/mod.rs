// Canonical L1 snapshot model
pub mod types;      // Snapshot, Level, validation errors
pub mod timestamp;  // event-time parsing, formatting and index scores

pub use timestamp::{format_timestamp, parse_timestamp, to_score, ScorePrecision};
pub use types::{Level, Side, Snapshot, SnapshotError, SnapshotResult};
