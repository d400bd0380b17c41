pub mod types;
pub use types::*;
pub mod record;
pub mod memory;
pub mod sled_store;
pub mod store;

pub use memory::MemoryBackend;
pub use sled_store::SledBackend;
pub use store::{IngestReport, TimeIndexedStore};

use async_trait::async_trait;
use std::collections::BTreeSet;

/// Keyed sorted-multiset primitive the time index sits on.
///
/// Members under one key are ordered by score, then by insertion; equal scores
/// (and equal members) coexist.
#[async_trait]
pub trait SortedSetBackend: Send + Sync {
    async fn add(&self, key: &str, member: String, score: f64) -> PersistResult<()>;

    /// Members with `min <= score <= max`, ascending. Empty when `min > max`.
    async fn range_by_score(&self, key: &str, min: f64, max: f64) -> PersistResult<Vec<String>>;

    /// Highest-scored member; on a tie, the most recently added one.
    async fn reverse_top(&self, key: &str) -> PersistResult<Option<String>>;

    /// Non-empty keys matching a glob where `*` stands for any run of characters.
    async fn keys_matching(&self, pattern: &str) -> PersistResult<BTreeSet<String>>;

    async fn close(&self) -> PersistResult<()> {
        Ok(())
    }
}

pub(crate) fn glob_matches(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !key.starts_with(first) || key.len() < first.len() + last.len() || !key.ends_with(last) {
        return false;
    }

    let mut rest = &key[first.len()..key.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}
