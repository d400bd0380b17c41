use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::persist::types::{PersistError, PersistResult};
use crate::persist::{glob_matches, SortedSetBackend};

const DEFAULT_TREE: &[u8] = b"__sled__default";

/// On-disk backend: one sled tree per key. Tree keys are the score in an
/// order-preserving byte encoding followed by a big-endian insertion id, so
/// sled's lexicographic order is (score, insertion) order.
pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        info!(path = %path.display(), recovered = db.was_recovered(), "Opened sled store");
        Ok(Self { db })
    }

    pub fn temporary() -> PersistResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn existing_tree(&self, key: &str) -> PersistResult<Option<sled::Tree>> {
        let exists = self.db.tree_names().iter().any(|name| name.as_ref() == key.as_bytes());
        if !exists {
            return Ok(None);
        }
        Ok(Some(self.db.open_tree(key)?))
    }
}

/// Maps an f64 onto a u64 whose big-endian bytes sort like the float.
fn encode_score(score: f64) -> [u8; 8] {
    let bits = score.to_bits();
    let ordered = if bits >> 63 == 1 { !bits } else { bits | (1 << 63) };
    ordered.to_be_bytes()
}

fn entry_key(score: f64, id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&encode_score(score));
    key[8..].copy_from_slice(&id.to_be_bytes());
    key
}

fn member_from(key: &str, value: sled::IVec) -> PersistResult<String> {
    String::from_utf8(value.to_vec()).map_err(|e| PersistError::FormatMismatch {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl SortedSetBackend for SledBackend {
    async fn add(&self, key: &str, member: String, score: f64) -> PersistResult<()> {
        if score.is_nan() {
            return Err(PersistError::InvalidScore { key: key.to_string(), score });
        }
        let tree = self.db.open_tree(key)?;
        let id = self.db.generate_id()?;
        tree.insert(entry_key(score, id), member.into_bytes())?;
        debug!(key, score, id, "Added member");
        Ok(())
    }

    async fn range_by_score(&self, key: &str, min: f64, max: f64) -> PersistResult<Vec<String>> {
        if min.is_nan() || max.is_nan() || min > max {
            return Ok(Vec::new());
        }
        let Some(tree) = self.existing_tree(key)? else {
            return Ok(Vec::new());
        };

        let mut members = Vec::new();
        for entry in tree.range(entry_key(min, 0)..=entry_key(max, u64::MAX)) {
            let (_, value) = entry?;
            members.push(member_from(key, value)?);
        }
        Ok(members)
    }

    async fn reverse_top(&self, key: &str) -> PersistResult<Option<String>> {
        let Some(tree) = self.existing_tree(key)? else {
            return Ok(None);
        };
        tree.last()?
            .map(|(_, value)| member_from(key, value))
            .transpose()
    }

    async fn keys_matching(&self, pattern: &str) -> PersistResult<BTreeSet<String>> {
        let mut keys = BTreeSet::new();
        for name in self.db.tree_names() {
            if name.as_ref() == DEFAULT_TREE {
                continue;
            }
            let Ok(key) = std::str::from_utf8(&name) else {
                continue;
            };
            if glob_matches(pattern, key) && !self.db.open_tree(&name)?.is_empty() {
                keys.insert(key.to_string());
            }
        }
        Ok(keys)
    }

    async fn close(&self) -> PersistResult<()> {
        let bytes = self.db.flush_async().await?;
        debug!(bytes, "Flushed sled store");
        Ok(())
    }
}
