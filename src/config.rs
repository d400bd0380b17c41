//! Runtime settings: defaults, then `l1book.toml` (optional), then `L1BOOK_*` env vars.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::market_data::adapters::coinbase::{DEFAULT_BASE_URL, DEFAULT_URL_PATH};
use crate::model::ScorePrecision;
use crate::persist::store::DEFAULT_KEY_PREFIX;
use crate::persist::{MemoryBackend, SledBackend, SortedSetBackend, TimeIndexedStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sled,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub url_path: String,
    pub book_level: u8,
    pub request_timeout_ms: u64,
    pub store_backend: StoreBackend,
    pub store_path: PathBuf,
    pub key_prefix: String,
    pub score_precision: ScorePrecision,
    pub log_filter: String,
    pub metrics_port: u16,
}

impl Settings {
    /// `file` replaces the default `l1book.toml` lookup and must exist when given.
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let file_source = match file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("l1book").required(false),
        };

        let settings = config::Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("url_path", DEFAULT_URL_PATH)?
            .set_default("book_level", 1)?
            .set_default("request_timeout_ms", 5_000)?
            .set_default("store_backend", "sled")?
            .set_default("store_path", "./l1book-data")?
            .set_default("key_prefix", DEFAULT_KEY_PREFIX)?
            .set_default("score_precision", "seconds")?
            .set_default("log_filter", "info")?
            .set_default("metrics_port", 9000)?
            .add_source(file_source)
            .add_source(config::Environment::with_prefix("L1BOOK"))
            .build()
            .context("failed to read configuration")?;

        settings
            .try_deserialize()
            .context("invalid configuration")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Open the configured backend and wrap it in a store. The caller owns the
    /// handle and should `close` it when done.
    pub fn open_store(&self) -> anyhow::Result<TimeIndexedStore> {
        let backend: Arc<dyn SortedSetBackend> = match self.store_backend {
            StoreBackend::Sled => Arc::new(
                SledBackend::open(&self.store_path)
                    .with_context(|| format!("cannot open store at {}", self.store_path.display()))?,
            ),
            StoreBackend::Memory => Arc::new(MemoryBackend::new()),
        };
        Ok(TimeIndexedStore::new(backend)
            .with_key_prefix(self.key_prefix.clone())
            .with_precision(self.score_precision))
    }
}
