use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Coalesces concurrent identical fetches. The first caller for a key runs `fetch`;
/// concurrent callers for the same key await the same `OnceCell` instead of
/// issuing a duplicate request. The entry is dropped once the fetch
/// settles, so a later, independent call starts a fresh fetch rather than
/// replaying a stale cached value.
pub struct InFlightDedup<K, V> {
    inflight: DashMap<K, Arc<OnceCell<V>>>,
}

impl<K, V> InFlightDedup<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }

    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell.get_or_init(fetch).await.clone();
        self.inflight.remove(&key);
        result
    }
}

impl<K, V> Default for InFlightDedup<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
