use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::model::{to_score, ScorePrecision, Snapshot};
use crate::persist::record;
use crate::persist::types::{PersistError, PersistResult};
use crate::persist::SortedSetBackend;
use crate::telemetry;

pub const DEFAULT_KEY_PREFIX: &str = "orderbook:index:";

/// Outcome of a batch insert: which products made it and which did not.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub stored: Vec<String>,
    pub failed: Vec<(String, PersistError)>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-product time index over a sorted-set backend.
///
/// Each product lives under `key_prefix + product_id`; members are serialized
/// snapshots scored by their event time. Reads always hand back fresh copies.
#[derive(Clone)]
pub struct TimeIndexedStore {
    backend: Arc<dyn SortedSetBackend>,
    key_prefix: String,
    precision: ScorePrecision,
}

impl TimeIndexedStore {
    pub fn new(backend: Arc<dyn SortedSetBackend>) -> Self {
        Self {
            backend,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            precision: ScorePrecision::default(),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_precision(mut self, precision: ScorePrecision) -> Self {
        self.precision = precision;
        self
    }

    pub fn precision(&self) -> ScorePrecision {
        self.precision
    }

    pub fn index_key(&self, product_id: &str) -> String {
        format!("{}{}", self.key_prefix, product_id)
    }

    pub fn score(&self, instant: &DateTime<Utc>) -> f64 {
        to_score(instant, self.precision)
    }

    /// Append one snapshot to `product_id`'s index. The snapshot must belong to
    /// that product, or it would be read back under the wrong label.
    pub async fn insert(&self, product_id: &str, snapshot: &Snapshot) -> PersistResult<()> {
        if snapshot.product_id != product_id {
            return Err(PersistError::ProductMismatch {
                product_id: product_id.to_string(),
                snapshot_product: snapshot.product_id.clone(),
            });
        }
        let member = record::serialize(snapshot)?;
        let score = self.score(&snapshot.timestamp);
        self.backend.add(&self.index_key(product_id), member, score).await
    }

    /// Insert every entry independently; one product failing never stops the rest.
    #[instrument(skip_all, fields(products = snapshots.len()))]
    pub async fn insert_all(&self, snapshots: &BTreeMap<String, Snapshot>) -> IngestReport {
        let results = join_all(
            snapshots
                .iter()
                .map(|(product_id, snap)| async move { (product_id, self.insert(product_id, snap).await) }),
        )
        .await;

        let mut report = IngestReport::default();
        for (product_id, result) in results {
            match result {
                Ok(()) => {
                    debug!(product_id = %product_id, "Stored snapshot");
                    report.stored.push(product_id.clone());
                }
                Err(e) => {
                    warn!(product_id = %product_id, error = %e, "Failed to store snapshot");
                    report.failed.push((product_id.clone(), e));
                }
            }
        }

        telemetry::record_ingest(report.stored.len(), report.failed.len());
        info!(stored = report.stored.len(), failed = report.failed.len(), "Ingested snapshots");
        report
    }

    /// Highest-scored snapshot for the product, `None` if it has none.
    pub async fn get_latest(&self, product_id: &str) -> PersistResult<Option<Snapshot>> {
        let key = self.index_key(product_id);
        match self.backend.reverse_top(&key).await? {
            Some(member) => Ok(Some(record::deserialize(&member, &key, product_id)?)),
            None => Ok(None),
        }
    }

    /// Snapshots scored within `[score(start), score(end)]`, ascending.
    pub async fn get_range(
        &self,
        product_id: &str,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> PersistResult<Vec<Snapshot>> {
        let key = self.index_key(product_id);
        let members = self
            .backend
            .range_by_score(&key, self.score(start), self.score(end))
            .await?;
        members
            .iter()
            .map(|member| record::deserialize(member, &key, product_id))
            .collect()
    }

    /// Product ids that currently hold at least one snapshot.
    pub async fn list_product_keys(&self) -> PersistResult<BTreeSet<String>> {
        let pattern = format!("{}*", self.key_prefix);
        let keys = self.backend.keys_matching(&pattern).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.key_prefix).map(str::to_string))
            .collect())
    }

    pub async fn close(&self) -> PersistResult<()> {
        self.backend.close().await
    }
}
