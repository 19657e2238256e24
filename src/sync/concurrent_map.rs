//! Coroutine-safe get-or-compute map.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;

use crate::error::DiResult;
use crate::sync::ReentrantAsyncLock;

/// Task-safe collection of key/value pairs that can be accessed by many
/// tasks concurrently.
///
/// Reads never wait on the async lock. [`AsyncConcurrentMap::get_or_add`]
/// computes missing values *outside* the lock and inserts under it only if
/// the key is still absent, so the factory may run more than once under
/// contention but every caller observes the first inserted value. The
/// factory may acquire this map's lock again (it is reentrant) without
/// deadlocking.
pub struct AsyncConcurrentMap<K, V> {
    map: Mutex<HashMap<K, V>>,
    lock: ReentrantAsyncLock,
}

impl<K, V> AsyncConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
            lock: ReentrantAsyncLock::new(),
        }
    }

    /// Current value for `key`, without waiting.
    pub fn get(&self, key: &K) -> Option<V> {
        self.map.lock().unwrap().get(key).cloned()
    }

    /// Returns the stored value for `key`, computing and inserting it when
    /// absent. The first insertion wins; a losing computation's value is
    /// discarded.
    pub async fn get_or_add<F, Fut>(&self, key: K, value_factory: F) -> DiResult<V>
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = DiResult<V>>,
    {
        if let Some(existing) = self.get(&key) {
            return Ok(existing);
        }

        let value = value_factory(key.clone()).await?;

        let _guard = self.lock.acquire().await;
        let mut map = self.map.lock().unwrap();
        Ok(map.entry(key).or_insert(value).clone())
    }

    /// Inserts or replaces the value for `key`.
    pub async fn upsert(&self, key: K, value: V) {
        let _guard = self.lock.acquire().await;
        self.map.lock().unwrap().insert(key, value);
    }

    /// Removes the value for `key`, if present.
    pub async fn try_remove(&self, key: &K) {
        let _guard = self.lock.acquire().await;
        self.map.lock().unwrap().remove(key);
    }
}

impl<K, V> Default for AsyncConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
