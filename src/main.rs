use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info, warn};

use l1book_rs::config::Settings;
use l1book_rs::market_data::adapters::coinbase::CoinbaseAdapter;
use l1book_rs::market_data::ExchangePoller;
use l1book_rs::model::format_timestamp;
use l1book_rs::products::read_product_ids_from_csv;
use l1book_rs::query::{Query, QueryFacade, QueryOutcome};
use l1book_rs::{telemetry, Snapshot, TimeIndexedStore};

#[derive(Parser)]
#[command(name = "l1book", version, about = "Record and query L1 order book snapshots")]
struct Cli {
    /// Settings file (default: ./l1book.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured store directory
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch L1 data from the exchange and store it
    Fetch {
        /// CSV file whose first column holds product ids
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Product ids to fetch (ex: BTC-USD ETH-USD)
        #[arg(long, num_args = 1..)]
        product_ids: Vec<String>,

        /// Keep polling every N seconds until Ctrl-C
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Show the latest snapshot, or every snapshot in a time range
    Query {
        #[arg(long)]
        product_id: String,

        /// Range start (ex: 2024-09-19T12:00:00.000000)
        #[arg(long, requires = "end_time")]
        start_time: Option<String>,

        /// Range end, inclusive
        #[arg(long, requires = "start_time")]
        end_time: Option<String>,
    },
    /// List products that have stored snapshots
    Keys,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(path) = cli.store_path {
        settings.store_path = path;
    }
    telemetry::init_tracing(&settings.log_filter);
    telemetry::init_metrics(settings.metrics_port)?;

    let store = Arc::new(settings.open_store()?);

    let result = match cli.command {
        Command::Fetch { csv, product_ids, interval_secs } => {
            run_fetch(&settings, &store, csv, product_ids, interval_secs).await
        }
        Command::Query { product_id, start_time, end_time } => {
            run_query(&store, &product_id, start_time.as_deref(), end_time.as_deref()).await
        }
        Command::Keys => run_keys(&store).await,
    };

    store.close().await.context("failed to flush store")?;
    result
}

async fn run_fetch(
    settings: &Settings,
    store: &TimeIndexedStore,
    csv: Option<PathBuf>,
    explicit_ids: Vec<String>,
    interval_secs: Option<u64>,
) -> anyhow::Result<()> {
    // CSV ids first, then the ones given on the command line
    let mut product_ids = Vec::new();
    if let Some(path) = csv {
        let from_csv = read_product_ids_from_csv(&path)
            .with_context(|| format!("cannot read product ids from {}", path.display()))?;
        if from_csv.is_empty() {
            bail!("no valid product ids found in {}", path.display());
        }
        product_ids.extend(from_csv);
    }
    product_ids.extend(explicit_ids);
    if product_ids.is_empty() {
        bail!("no product ids provided (use --csv or --product-ids)");
    }

    let adapter = CoinbaseAdapter::new(
        &settings.base_url,
        &settings.url_path,
        settings.book_level,
        settings.request_timeout(),
    )?;
    let poller = ExchangePoller::new(Arc::new(adapter), settings.request_timeout());

    info!(products = ?product_ids, "Fetching order book data");
    let Some(secs) = interval_secs else {
        return poll_once(&poller, store, &product_ids).await;
    };

    let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
    loop {
        tokio::select! {
            _ = interval.tick() => poll_once(&poller, store, &product_ids).await?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                return Ok(());
            }
        }
    }
}

async fn poll_once(poller: &ExchangePoller, store: &TimeIndexedStore, product_ids: &[String]) -> anyhow::Result<()> {
    let polled = poller.poll(product_ids).await;
    let report = store.insert_all(&polled.snapshots).await;

    info!(
        stored = report.stored.len(),
        fetch_skipped = polled.skipped.len(),
        store_failed = report.failed.len(),
        "Stored order book data"
    );
    for (product_id, e) in &report.failed {
        error!(product_id = %product_id, error = %e, "Snapshot not stored");
    }
    // diagnostics only; a failed listing must not end the polling loop
    match store.list_product_keys().await {
        Ok(keys) => debug!(keys = ?keys, "Stored keys"),
        Err(e) => warn!(error = %e, "Could not list stored keys"),
    }
    Ok(())
}

async fn run_query(
    store: &Arc<TimeIndexedStore>,
    product_id: &str,
    start: Option<&str>,
    end: Option<&str>,
) -> anyhow::Result<()> {
    let query = Query::from_args(product_id, start, end)?;
    let facade = QueryFacade::new(Arc::clone(store));

    let outcome = facade.execute(&query).await?;
    if outcome.is_empty() {
        match &query {
            Query::Latest(q) => warn!(product_id = %q.product_id, "No data found"),
            Query::Range(q) => warn!(
                product_id = %q.product_id,
                start = %format_timestamp(&q.start),
                end = %format_timestamp(&q.end),
                "No data found in range"
            ),
        }
        return Ok(());
    }

    if let QueryOutcome::Range(snaps) = &outcome {
        println!("{} snapshot(s) for {}", snaps.len(), query.product_id());
    }
    for snap in outcome.snapshots() {
        print_snapshot(snap);
    }
    Ok(())
}

async fn run_keys(store: &TimeIndexedStore) -> anyhow::Result<()> {
    let keys = store.list_product_keys().await?;
    if keys.is_empty() {
        warn!("Store holds no snapshots");
    }
    for key in keys {
        println!("{key}");
    }
    Ok(())
}

fn print_snapshot(snap: &Snapshot) {
    println!("Product ID: {}", snap.product_id);
    println!("Timestamp:  {}", format_timestamp(&snap.timestamp));
    println!(
        "Bids:       price ${}, volume: {}, count: {}",
        snap.best_bid.price, snap.best_bid.size, snap.best_bid.order_count
    );
    println!(
        "Asks:       price ${}, volume: {}, count: {}",
        snap.best_ask.price, snap.best_ask.size, snap.best_ask.order_count
    );
    println!("Sequence:   {}", snap.sequence.as_deref().unwrap_or("-"));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use async_trait::async_trait;
    use l1book_rs::market_data::adapters::coinbase_types::{RawBook, RawLevel};
    use l1book_rs::persist::{MemoryBackend, PersistResult};
    use l1book_rs::{BookFetcher, FetchError, PersistError, SortedSetBackend};

    struct OneBook;

    #[async_trait]
    impl BookFetcher for OneBook {
        async fn fetch(&self, _product_id: &str) -> Result<RawBook, FetchError> {
            Ok(RawBook::new(
                vec![RawLevel::new("6247.58", "6.3578146", 2)],
                vec![RawLevel::new("6251.52", "2", 1)],
            ))
        }
    }

    /// Stores fine but cannot enumerate keys.
    struct NoListing(MemoryBackend);

    #[async_trait]
    impl SortedSetBackend for NoListing {
        async fn add(&self, key: &str, member: String, score: f64) -> PersistResult<()> {
            self.0.add(key, member, score).await
        }
        async fn range_by_score(&self, key: &str, min: f64, max: f64) -> PersistResult<Vec<String>> {
            self.0.range_by_score(key, min, max).await
        }
        async fn reverse_top(&self, key: &str) -> PersistResult<Option<String>> {
            self.0.reverse_top(key).await
        }
        async fn keys_matching(&self, _pattern: &str) -> PersistResult<BTreeSet<String>> {
            Err(PersistError::StoreUnavailable("scan refused".into()))
        }
    }

    #[tokio::test]
    async fn test_poll_once_survives_failed_key_listing() {
        let poller = ExchangePoller::new(Arc::new(OneBook), Duration::from_secs(1));
        let store = TimeIndexedStore::new(Arc::new(NoListing(MemoryBackend::new())));
        let ids = vec!["BTC-USD".to_string()];

        poll_once(&poller, &store, &ids).await.unwrap();
        poll_once(&poller, &store, &ids).await.unwrap();

        let start = l1book_rs::model::parse_timestamp("2000-01-01T00:00:00.0").unwrap();
        let end = l1book_rs::model::parse_timestamp("9999-01-01T00:00:00.0").unwrap();
        assert_eq!(store.get_range("BTC-USD", &start, &end).await.unwrap().len(), 2);
    }
}
