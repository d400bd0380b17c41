//! Polls an exchange for top-of-book (L1) data and keeps a per-product,
//! time-indexed history of snapshots that can be read back by latest or by range.

pub mod config;
pub mod market_data;
pub mod model;
pub mod persist;
pub mod products;
pub mod query;
pub mod telemetry;

pub use market_data::{BookFetcher, ExchangePoller, FetchError, PollReport};
pub use model::{Level, ScorePrecision, Snapshot, SnapshotError};
pub use persist::{IngestReport, PersistError, SortedSetBackend, TimeIndexedStore};
pub use query::{Query, QueryError, QueryFacade, QueryOutcome};
