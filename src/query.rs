//! Read side: latest / range lookups over the time index.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use crate::model::{parse_timestamp, Snapshot};
use crate::persist::{PersistError, TimeIndexedStore};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("product id must not be empty")]
    EmptyProductId,

    #[error("malformed timestamp {raw:?}: expected YYYY-MM-DDTHH:MM:SS.ffffff")]
    MalformedTimestamp { raw: String },

    #[error("range query needs both a start and an end time")]
    IncompleteRange,

    #[error("query for {product_id} failed: {source}")]
    Store {
        product_id: String,
        #[source]
        source: PersistError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestQuery {
    pub product_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub product_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LatestQuery {
    pub fn new(product_id: &str) -> Result<Self, QueryError> {
        Ok(Self { product_id: checked_product(product_id)? })
    }
}

impl RangeQuery {
    pub fn parse(product_id: &str, start: &str, end: &str) -> Result<Self, QueryError> {
        Ok(Self {
            product_id: checked_product(product_id)?,
            start: bound(start)?,
            end: bound(end)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Latest(LatestQuery),
    Range(RangeQuery),
}

impl Query {
    pub fn latest(product_id: &str) -> Result<Self, QueryError> {
        LatestQuery::new(product_id).map(Query::Latest)
    }

    pub fn range(product_id: &str, start: &str, end: &str) -> Result<Self, QueryError> {
        RangeQuery::parse(product_id, start, end).map(Query::Range)
    }

    /// Both bounds -> range, neither -> latest, one alone is an error.
    pub fn from_args(product_id: &str, start: Option<&str>, end: Option<&str>) -> Result<Self, QueryError> {
        match (start, end) {
            (Some(start), Some(end)) => Query::range(product_id, start, end),
            (None, None) => Query::latest(product_id),
            _ => Err(QueryError::IncompleteRange),
        }
    }

    pub fn product_id(&self) -> &str {
        match self {
            Query::Latest(q) => &q.product_id,
            Query::Range(q) => &q.product_id,
        }
    }
}

fn checked_product(product_id: &str) -> Result<String, QueryError> {
    let product_id = product_id.trim();
    if product_id.is_empty() {
        return Err(QueryError::EmptyProductId);
    }
    Ok(product_id.to_string())
}

fn bound(raw: &str) -> Result<DateTime<Utc>, QueryError> {
    parse_timestamp(raw).map_err(|_| QueryError::MalformedTimestamp { raw: raw.to_string() })
}

/// What a query found. "Nothing" is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Latest(Option<Snapshot>),
    Range(Vec<Snapshot>),
}

impl QueryOutcome {
    pub fn is_empty(&self) -> bool {
        match self {
            QueryOutcome::Latest(snap) => snap.is_none(),
            QueryOutcome::Range(snaps) => snaps.is_empty(),
        }
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        match self {
            QueryOutcome::Latest(Some(snap)) => std::slice::from_ref(snap),
            QueryOutcome::Latest(None) => &[],
            QueryOutcome::Range(snaps) => snaps,
        }
    }
}

#[derive(Clone)]
pub struct QueryFacade {
    store: Arc<TimeIndexedStore>,
}

impl QueryFacade {
    pub fn new(store: Arc<TimeIndexedStore>) -> Self {
        Self { store }
    }

    pub async fn latest(&self, product_id: &str) -> Result<Option<Snapshot>, QueryError> {
        self.run_latest(&LatestQuery::new(product_id)?).await
    }

    pub async fn range(&self, product_id: &str, start: &str, end: &str) -> Result<Vec<Snapshot>, QueryError> {
        self.run_range(&RangeQuery::parse(product_id, start, end)?).await
    }

    #[instrument(skip(self), fields(product_id = query.product_id()))]
    pub async fn execute(&self, query: &Query) -> Result<QueryOutcome, QueryError> {
        match query {
            Query::Latest(q) => self.run_latest(q).await.map(QueryOutcome::Latest),
            Query::Range(q) => self.run_range(q).await.map(QueryOutcome::Range),
        }
    }

    async fn run_latest(&self, q: &LatestQuery) -> Result<Option<Snapshot>, QueryError> {
        self.store
            .get_latest(&q.product_id)
            .await
            .map_err(|source| QueryError::Store { product_id: q.product_id.clone(), source })
    }

    async fn run_range(&self, q: &RangeQuery) -> Result<Vec<Snapshot>, QueryError> {
        self.store
            .get_range(&q.product_id, &q.start, &q.end)
            .await
            .map_err(|source| QueryError::Store { product_id: q.product_id.clone(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Level;
    use crate::persist::{MemoryBackend, PersistResult, SortedSetBackend};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, BTreeSet};

    async fn facade_with_btc() -> QueryFacade {
        let store = Arc::new(TimeIndexedStore::new(Arc::new(MemoryBackend::new())));
        let snap = Snapshot::new(
            "BTC-USD",
            Some("12345".into()),
            Level::new("6247.58", "6.3578146", 2),
            Level::new("6251.52", "2", 1),
            parse_timestamp("2024-09-19T12:00:00.000000").unwrap(),
        )
        .unwrap();
        store
            .insert_all(&BTreeMap::from([("BTC-USD".to_string(), snap)]))
            .await;
        QueryFacade::new(store)
    }

    #[test]
    fn test_query_modes() {
        assert_eq!(
            Query::from_args("BTC-USD", None, None).unwrap(),
            Query::Latest(LatestQuery { product_id: "BTC-USD".into() })
        );
        assert!(matches!(
            Query::from_args("BTC-USD", Some("2024-09-19T12:00:00.000000"), Some("2024-09-19T12:00:01.000000")),
            Ok(Query::Range(_))
        ));
        assert!(matches!(
            Query::from_args("BTC-USD", Some("2024-09-19T12:00:00.000000"), None),
            Err(QueryError::IncompleteRange)
        ));
        assert!(matches!(Query::latest(" "), Err(QueryError::EmptyProductId)));
    }

    #[test]
    fn test_bad_bound_names_the_timestamp() {
        let err = Query::range("BTC-USD", "2024-09-19T12:00:00.000000", "noon").unwrap_err();
        assert!(matches!(
            &err,
            QueryError::MalformedTimestamp { raw } if raw == "noon"
        ));
        assert!(err.to_string().contains("noon"));
    }

    #[tokio::test]
    async fn test_latest_and_absent() {
        let facade = facade_with_btc().await;
        let snap = facade.latest("BTC-USD").await.unwrap().unwrap();
        assert_eq!(snap.sequence.as_deref(), Some("12345"));
        assert_eq!(facade.latest("DOGE-USD").await.unwrap(), None);
        assert!(matches!(facade.latest("").await, Err(QueryError::EmptyProductId)));
    }

    #[tokio::test]
    async fn test_range() {
        let facade = facade_with_btc().await;
        let hit = facade
            .range("BTC-USD", "2024-09-19T11:59:00.000000", "2024-09-19T12:06:00.000000")
            .await
            .unwrap();
        assert_eq!(hit.len(), 1);
        let miss = facade
            .range("BTC-USD", "2024-09-19T10:00:00.000000", "2024-09-19T11:00:00.000000")
            .await
            .unwrap();
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn test_outcome_shapes() {
        let facade = facade_with_btc().await;
        let outcome = facade.execute(&Query::latest("ETH-USD").unwrap()).await.unwrap();
        assert!(outcome.is_empty());
        assert!(outcome.snapshots().is_empty());
        let outcome = facade.execute(&Query::latest("BTC-USD").unwrap()).await.unwrap();
        assert_eq!(outcome.snapshots().len(), 1);
    }

    /// Backend whose reads always fail, as if the store went away after ingest.
    struct UnreachableBackend;

    #[async_trait]
    impl SortedSetBackend for UnreachableBackend {
        async fn add(&self, _key: &str, _member: String, _score: f64) -> PersistResult<()> {
            Ok(())
        }
        async fn range_by_score(&self, _key: &str, _min: f64, _max: f64) -> PersistResult<Vec<String>> {
            Err(PersistError::StoreUnavailable("connection reset".into()))
        }
        async fn reverse_top(&self, _key: &str) -> PersistResult<Option<String>> {
            Err(PersistError::StoreUnavailable("connection reset".into()))
        }
        async fn keys_matching(&self, _pattern: &str) -> PersistResult<BTreeSet<String>> {
            Err(PersistError::StoreUnavailable("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_not_an_empty_result() {
        let facade = QueryFacade::new(Arc::new(TimeIndexedStore::new(Arc::new(UnreachableBackend))));

        let err = facade.latest("BTC-USD").await.unwrap_err();
        assert!(matches!(
            &err,
            QueryError::Store { product_id, source: PersistError::StoreUnavailable(_) } if product_id == "BTC-USD"
        ));

        let err = facade
            .range("BTC-USD", "2024-09-19T11:59:00.000000", "2024-09-19T12:06:00.000000")
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            QueryError::Store { product_id, source: PersistError::StoreUnavailable(_) } if product_id == "BTC-USD"
        ));

        let err = facade.execute(&Query::latest("BTC-USD").unwrap()).await.unwrap_err();
        assert!(matches!(err, QueryError::Store { .. }));
    }
}
