// Market data module entrypoint
pub mod adapters;   // venue-specific fetchers (e.g. Coinbase)
pub mod normaliser; // raw book -> canonical Snapshot
pub mod poller;     // fans fetches out over the configured products

pub use adapters::{BookFetcher, FetchError};
pub use poller::{ExchangePoller, PollReport};
