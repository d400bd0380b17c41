// Shared fetch capability + errors for venue adapters

use std::time::Duration;

use thiserror::Error;

use crate::model::Side;
use coinbase_types::RawBook;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {product_id} failed: {source}")]
    Http {
        product_id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("exchange answered {status} for {product_id}")]
    Status { product_id: String, status: u16 },

    #[error("malformed book for {product_id}: {reason}")]
    Malformed { product_id: String, reason: String },

    #[error("no {side}s in book for {product_id}")]
    EmptySide { product_id: String, side: Side },

    #[error("fetch for {product_id} timed out after {after:?}")]
    Timeout { product_id: String, after: Duration },
}

impl FetchError {
    pub fn product_id(&self) -> &str {
        match self {
            FetchError::Http { product_id, .. }
            | FetchError::Status { product_id, .. }
            | FetchError::Malformed { product_id, .. }
            | FetchError::EmptySide { product_id, .. }
            | FetchError::Timeout { product_id, .. } => product_id,
        }
    }
}

/// Pulls the current top of book for one product.
#[async_trait::async_trait]
pub trait BookFetcher: Send + Sync {
    async fn fetch(&self, product_id: &str) -> Result<RawBook, FetchError>;
}

pub mod coinbase;
pub mod coinbase_types;
