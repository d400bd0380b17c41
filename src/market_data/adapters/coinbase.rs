// Coinbase Exchange REST adapter (public product book, no auth)

use std::time::Duration;

use tracing::{debug, instrument};

use super::coinbase_types::RawBook;
use super::{BookFetcher, FetchError};

pub const DEFAULT_BASE_URL: &str = "https://api.exchange.coinbase.com";
pub const DEFAULT_URL_PATH: &str = "/products";

pub struct CoinbaseAdapter {
    client: reqwest::Client,
    pub base_url: String, // "https://api.exchange.coinbase.com"
    pub url_path: String, // "/products"
    pub level: u8,        // 1 => best bid/ask only
    pub timeout: Duration,
}

impl CoinbaseAdapter {
    pub fn new(base_url: &str, url_path: &str, level: u8, timeout: Duration) -> reqwest::Result<Self> {
        // Coinbase rejects requests without a User-Agent
        let client = reqwest::Client::builder()
            .user_agent(concat!("l1book-rs/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            url_path: url_path.to_string(),
            level,
            timeout,
        })
    }

    pub fn book_url(&self, product_id: &str) -> String {
        format!("{}{}/{}/book", self.base_url, self.url_path, product_id)
    }

    fn http_error(&self, product_id: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout { product_id: product_id.to_string(), after: self.timeout }
        } else {
            FetchError::Http { product_id: product_id.to_string(), source: err }
        }
    }
}

#[async_trait::async_trait]
impl BookFetcher for CoinbaseAdapter {
    #[instrument(skip(self), fields(level = self.level))]
    async fn fetch(&self, product_id: &str) -> Result<RawBook, FetchError> {
        let res = self
            .client
            .get(self.book_url(product_id))
            .query(&[("level", self.level)])
            .send()
            .await
            .map_err(|e| self.http_error(product_id, e))?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                product_id: product_id.to_string(),
                status: status.as_u16(),
            });
        }

        let body = res.bytes().await.map_err(|e| self.http_error(product_id, e))?;
        debug!(bytes = body.len(), "Received book");
        serde_json::from_slice(&body).map_err(|e| FetchError::Malformed {
            product_id: product_id.to_string(),
            reason: e.to_string(),
        })
    }
}
