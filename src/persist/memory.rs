use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ordered_float::OrderedFloat;
use parking_lot::RwLock;

use crate::persist::types::{PersistError, PersistResult};
use crate::persist::{glob_matches, SortedSetBackend};

// (score, insertion id) -> member
type Index = BTreeMap<(OrderedFloat<f64>, u64), String>;

/// Process-local backend. Each key has its own lock, so writers on different
/// keys never contend beyond the brief key lookup.
#[derive(Default)]
pub struct MemoryBackend {
    indexes: RwLock<HashMap<String, Arc<RwLock<Index>>>>,
    next_id: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(&self, key: &str) -> Option<Arc<RwLock<Index>>> {
        self.indexes.read().get(key).cloned()
    }

    fn index_or_create(&self, key: &str) -> Arc<RwLock<Index>> {
        if let Some(index) = self.index(key) {
            return index;
        }
        Arc::clone(self.indexes.write().entry(key.to_string()).or_default())
    }
}

#[async_trait]
impl SortedSetBackend for MemoryBackend {
    async fn add(&self, key: &str, member: String, score: f64) -> PersistResult<()> {
        if score.is_nan() {
            return Err(PersistError::InvalidScore { key: key.to_string(), score });
        }
        let index = self.index_or_create(key);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        index.write().insert((OrderedFloat(score), id), member);
        Ok(())
    }

    async fn range_by_score(&self, key: &str, min: f64, max: f64) -> PersistResult<Vec<String>> {
        // BTreeMap::range panics on an inverted range
        if min.is_nan() || max.is_nan() || min > max {
            return Ok(Vec::new());
        }
        let Some(index) = self.index(key) else {
            return Ok(Vec::new());
        };
        let index = index.read();
        Ok(index
            .range((OrderedFloat(min), 0)..=(OrderedFloat(max), u64::MAX))
            .map(|(_, member)| member.clone())
            .collect())
    }

    async fn reverse_top(&self, key: &str) -> PersistResult<Option<String>> {
        let Some(index) = self.index(key) else {
            return Ok(None);
        };
        let top = index.read().values().next_back().cloned();
        Ok(top)
    }

    async fn keys_matching(&self, pattern: &str) -> PersistResult<BTreeSet<String>> {
        Ok(self
            .indexes
            .read()
            .iter()
            .filter(|(key, index)| glob_matches(pattern, key) && !index.read().is_empty())
            .map(|(key, _)| key.clone())
            .collect())
    }
}
