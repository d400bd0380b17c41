// End-to-end: poll a scripted venue, ingest, and read back through the query facade
// on both backends.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use l1book_rs::market_data::adapters::coinbase_types::{RawBook, RawLevel};
use l1book_rs::model::parse_timestamp;
use l1book_rs::persist::{MemoryBackend, SledBackend};
use l1book_rs::{
    BookFetcher, ExchangePoller, FetchError, Level, QueryFacade, Snapshot, SortedSetBackend,
    TimeIndexedStore,
};

fn seed() -> BTreeMap<String, Snapshot> {
    let btc = Snapshot::new(
        "BTC-USD",
        Some("12345".into()),
        Level::new("6247.58", "6.3578146", 2),
        Level::new("6251.52", "2", 1),
        parse_timestamp("2024-09-19T12:00:00.000000").unwrap(),
    )
    .unwrap();
    let eth = Snapshot::new(
        "ETH-USD",
        Some("54321".into()),
        Level::new("3247.58", "2.3578146", 1),
        Level::new("3251.52", "1.5", 1),
        parse_timestamp("2024-09-19T12:05:00.000000").unwrap(),
    )
    .unwrap();
    BTreeMap::from([("BTC-USD".to_string(), btc), ("ETH-USD".to_string(), eth)])
}

async fn check_scenario(backend: Arc<dyn SortedSetBackend>) {
    let store = Arc::new(TimeIndexedStore::new(backend));
    let seed = seed();
    let report = store.insert_all(&seed).await;
    assert_eq!(report.stored, vec!["BTC-USD", "ETH-USD"]);

    let facade = QueryFacade::new(Arc::clone(&store));
    assert_eq!(facade.latest("BTC-USD").await.unwrap().as_ref(), seed.get("BTC-USD"));
    assert_eq!(facade.latest("ETH-USD").await.unwrap().unwrap().best_bid.price, "3247.58");

    let keys = store.list_product_keys().await.unwrap();
    assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["BTC-USD", "ETH-USD"]);

    let hit = facade
        .range("BTC-USD", "2024-09-19T11:59:00.000000", "2024-09-19T12:06:00.000000")
        .await
        .unwrap();
    assert_eq!(hit.len(), 1);
    assert_eq!(hit[0].sequence.as_deref(), Some("12345"));

    let miss = facade
        .range("BTC-USD", "2024-09-19T10:00:00.000000", "2024-09-19T11:00:00.000000")
        .await
        .unwrap();
    assert!(miss.is_empty());

    assert!(facade.range("BTC-USD", "not-a-date", "2024-09-19T11:00:00.000000").await.is_err());

    store.close().await.unwrap();
}

#[tokio::test]
async fn scenario_memory_backend() {
    check_scenario(Arc::new(MemoryBackend::new())).await;
}

#[tokio::test]
async fn scenario_sled_backend() {
    let dir = tempfile::tempdir().unwrap();
    check_scenario(Arc::new(SledBackend::open(dir.path()).unwrap())).await;
}

struct HalfBrokenVenue;

#[async_trait::async_trait]
impl BookFetcher for HalfBrokenVenue {
    async fn fetch(&self, product_id: &str) -> Result<RawBook, FetchError> {
        match product_id {
            "BTC-USD" => Ok(RawBook::new(
                vec![RawLevel::new("6247.58", "6.3578146", 2)],
                vec![RawLevel::new("6251.52", "2", 1)],
            )),
            "ETH-USD" => Ok(RawBook::new(vec![], vec![RawLevel::new("3251.52", "1.5", 1)])),
            other => Err(FetchError::Status { product_id: other.to_string(), status: 404 }),
        }
    }
}

#[tokio::test]
async fn poll_then_ingest_keeps_only_successes() {
    let poller = ExchangePoller::new(Arc::new(HalfBrokenVenue), Duration::from_secs(1));
    let store = TimeIndexedStore::new(Arc::new(MemoryBackend::new()));

    let ids: Vec<String> = ["BTC-USD", "ETH-USD", "XYZ-USD"].iter().map(|s| s.to_string()).collect();
    let polled = poller.poll(&ids).await;
    assert_eq!(polled.snapshots.len(), 1);
    assert_eq!(polled.skipped.len(), 2);

    let report = store.insert_all(&polled.snapshots).await;
    assert_eq!(report.stored, vec!["BTC-USD"]);

    let latest = store.get_latest("BTC-USD").await.unwrap().unwrap();
    assert_eq!(latest.best_ask, Level::new("6251.52", "2", 1));
    assert_eq!(store.get_latest("ETH-USD").await.unwrap(), None);
}
