// Poller fans a fetch out over every product and keeps whatever succeeded
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::market_data::adapters::{BookFetcher, FetchError};
use crate::market_data::normaliser;
use crate::model::{timestamp, Snapshot};
use crate::telemetry;

/// Result of one poll: snapshots for the products that worked, causes for the rest.
#[derive(Debug, Default)]
pub struct PollReport {
    pub snapshots: BTreeMap<String, Snapshot>,
    pub skipped: Vec<FetchError>,
}

pub struct ExchangePoller {
    fetcher: Arc<dyn BookFetcher>,
    timeout: Duration,
}

impl ExchangePoller {
    pub fn new(fetcher: Arc<dyn BookFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Fetch every product concurrently. Failures are logged and the product is
    /// left out; nothing here returns an error. Duplicate ids are fetched
    /// independently and the later one wins in the map.
    #[instrument(skip_all, fields(products = product_ids.len()))]
    pub async fn poll(&self, product_ids: &[String]) -> PollReport {
        let results = join_all(product_ids.iter().map(|id| self.poll_one(id))).await;

        let mut report = PollReport::default();
        for result in results {
            match result {
                Ok(snap) => {
                    report.snapshots.insert(snap.product_id.clone(), snap);
                }
                Err(e) => {
                    warn!(product_id = e.product_id(), error = %e, "Skipping product");
                    report.skipped.push(e);
                }
            }
        }

        telemetry::record_poll(report.snapshots.len(), report.skipped.len());
        info!(fetched = report.snapshots.len(), skipped = report.skipped.len(), "Poll finished");
        report
    }

    async fn poll_one(&self, product_id: &str) -> Result<Snapshot, FetchError> {
        let raw = tokio::time::timeout(self.timeout, self.fetcher.fetch(product_id))
            .await
            .map_err(|_| FetchError::Timeout { product_id: product_id.to_string(), after: self.timeout })??;

        // stamped at fetch completion, not with any venue-provided time
        let snap = normaliser::to_snapshot(product_id, &raw, timestamp::now())?;
        if snap.spread_is_crossed() {
            warn!(product_id, bid = %snap.best_bid.price, ask = %snap.best_ask.price, "Crossed top of book");
        }
        debug!(
            product_id,
            bid = %snap.best_bid.price,
            ask = %snap.best_ask.price,
            "Fetched top of book"
        );
        Ok(snap)
    }
}
