//! Concurrency-safe, TTL-bounded, capacity-limited in-memory cache.
//!
//! Shared by the app/file/robots/sitemap handlers to short-circuit
//! repeated renders. A single `RwLock` guards the map and its sibling
//! min-heap of expiry entries (`heap`); `Get` takes the read lock and
//! never mutates on expiry (a timed-out entry is simply treated as a
//! miss and reaped later, by `Set`'s capacity eviction or the
//! background sweep).
//!
//! ## Why a heap at all
//!
//! `Set`/`SetWithTTL` can overwrite a key's expiry without touching any
//! heap entry pushed for an earlier write of the same key. Those old
//! entries go stale: a popped heap entry is only acted on if its
//! priority still matches the map's current expiry for that key
//! (invariant I3). This trades a little heap bloat for O(log n) pushes
//! instead of having to find-and-fix an arbitrary heap position on
//! every overwrite.

mod clock;
mod heap;

pub use clock::{Clock, ManualClock, SystemClock};
pub use heap::{HeapEntry, PriorityQueue};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

/// How often the background sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

struct Slot<V> {
    data: V,
    /// `None` means the entry never expires.
    expire: Option<i64>,
}

fn priority_of(expire: Option<i64>) -> i64 {
    expire.unwrap_or(i64::MAX)
}

struct Inner<V> {
    map: HashMap<String, Slot<V>>,
    heap: PriorityQueue,
}

impl<V> Inner<V> {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            heap: PriorityQueue::new(),
        }
    }

    /// Evicts earliest-expiring entries until `map.len() < max_size`,
    /// skipping stale heap entries. No-op if `max_size == 0` (unbounded).
    fn evict_to_fit(&mut self, max_size: usize) {
        if max_size == 0 {
            return;
        }
        while self.map.len() >= max_size {
            let Some(popped) = self.heap.pop() else {
                break;
            };
            let is_current = self
                .map
                .get(&popped.key)
                .map(|slot| priority_of(slot.expire) == popped.priority)
                .unwrap_or(false);
            if is_current {
                self.map.remove(&popped.key);
            }
        }
    }

    fn sweep(&mut self, now: i64) {
        while let Some(top) = self.heap.peek() {
            if top.priority > now {
                break;
            }
            let popped = self.heap.pop().expect("peeked entry must pop");
            let is_current = self
                .map
                .get(&popped.key)
                .map(|slot| priority_of(slot.expire) == popped.priority)
                .unwrap_or(false);
            if is_current {
                self.map.remove(&popped.key);
            }
        }
    }
}

/// A TTL-bounded, capacity-limited cache.
///
/// `max_ttl`: the ceiling every write's expiry is clamped to; `0` means
/// entries written via `set` never expire (though `set_with_ttl` may
/// still be given an explicit, unclamped ttl — see its doc comment).
/// `max_size`: `0` means unbounded.
pub struct TtlCache<V> {
    inner: Arc<RwLock<Inner<V>>>,
    max_ttl_secs: i64,
    max_size: usize,
    clock: Arc<dyn Clock>,
    sweep_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache and spawns its background sweep task on the
    /// current tokio runtime.
    pub fn new(max_ttl_secs: i64, max_size: usize) -> Self {
        Self::with_clock(max_ttl_secs, max_size, Arc::new(SystemClock))
    }

    /// Creates a cache with an injectable clock, for deterministic tests.
    pub fn with_clock(max_ttl_secs: i64, max_size: usize, clock: Arc<dyn Clock>) -> Self {
        let inner = Arc::new(RwLock::new(Inner::new()));
        let handle = {
            let inner = Arc::clone(&inner);
            let clock = Arc::clone(&clock);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
                loop {
                    ticker.tick().await;
                    let now = clock.now_secs();
                    inner.write().expect("cache lock poisoned").sweep(now);
                }
            })
        };
        Self {
            inner,
            max_ttl_secs,
            max_size,
            clock,
            sweep_handle: std::sync::Mutex::new(Some(handle)),
        }
    }

    fn effective_expire(&self, ttl_secs: Option<i64>) -> Option<i64> {
        let ttl = match ttl_secs {
            None => self.max_ttl_secs,
            Some(requested) if requested <= 0 => self.max_ttl_secs,
            Some(requested) => requested.min(self.max_ttl_secs),
        };
        if ttl > 0 {
            Some(self.clock.now_secs() + ttl)
        } else {
            None
        }
    }

    fn put(&self, key: String, value: V, expire: Option<i64>) {
        let mut inner = self.inner.write().expect("cache lock poisoned");
        if !inner.map.contains_key(&key) {
            inner.evict_to_fit(self.max_size);
        }
        inner.heap.push(HeapEntry {
            key: key.clone(),
            priority: priority_of(expire),
        });
        inner.map.insert(key, Slot { data: value, expire });
    }

    /// Inserts or updates `key`, expiring after `max_ttl_secs` (or never,
    /// if `max_ttl_secs <= 0`).
    pub fn set(&self, key: impl Into<String>, value: V) {
        let expire = self.effective_expire(None);
        self.put(key.into(), value, expire);
    }

    /// Inserts or updates `key` with an explicit ttl, clamped to
    /// `(0, max_ttl_secs]`. A non-positive `ttl_secs` is treated as
    /// `max_ttl_secs`.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl_secs: i64) {
        let expire = self.effective_expire(Some(ttl_secs));
        self.put(key.into(), value, expire);
    }

    /// Returns a clone of the value for `key`, or `None` on a miss or
    /// expired entry. Never mutates the cache.
    pub fn get(&self, key: &str) -> Option<V> {
        let inner = self.inner.read().expect("cache lock poisoned");
        let slot = inner.map.get(key)?;
        match slot.expire {
            Some(expire) if expire <= self.clock.now_secs() => None,
            _ => Some(slot.data.clone()),
        }
    }

    /// Removes `key`, if present.
    pub fn remove(&self, key: &str) {
        self.inner
            .write()
            .expect("cache lock poisoned")
            .map
            .remove(key);
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("cache lock poisoned");
        inner.map.clear();
        inner.heap = PriorityQueue::new();
    }

    /// Number of live entries (including not-yet-swept expired ones).
    pub fn len(&self) -> usize {
        self.inner.read().expect("cache lock poisoned").map.len()
    }

    /// Whether the cache holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops the background sweep and clears all storage.
    pub fn close(&self) {
        if let Some(handle) = self.sweep_handle.lock().expect("sweep lock poisoned").take() {
            handle.abort();
        }
        self.clear();
    }

    /// Runs one sweep pass immediately. Exposed for tests; the
    /// background task calls the same logic on a 15 minute timer.
    pub fn sweep_once(&self) {
        let now = self.clock.now_secs();
        self.inner.write().expect("cache lock poisoned").sweep(now);
    }
}

impl<V> Drop for TtlCache<V> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweep_handle.lock().expect("sweep lock poisoned").take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_clock(max_ttl: i64, max_size: usize) -> (TtlCache<i32>, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        let cache = TtlCache::with_clock(max_ttl, max_size, Arc::new(clock.clone()));
        (cache, clock)
    }

    #[tokio::test]
    async fn get_after_set_hits() {
        let (cache, _clock) = cache_with_clock(60, 0);
        cache.set("k", 1);
        assert_eq!(cache.get("k"), Some(1));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_without_mutation() {
        let (cache, clock) = cache_with_clock(10, 0);
        cache.set_with_ttl("k", 1, 10);
        clock.advance(11);
        assert_eq!(cache.get("k"), None);
        // still present internally until swept/evicted (I2: Get doesn't mutate)
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn ttl_non_positive_uses_max_ttl() {
        let (cache, clock) = cache_with_clock(10, 0);
        cache.set_with_ttl("k", 1, 0);
        clock.advance(9);
        assert_eq!(cache.get("k"), Some(1));
        clock.advance(2);
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test]
    async fn ttl_above_max_is_clamped() {
        let (cache, clock) = cache_with_clock(10, 0);
        cache.set_with_ttl("k", 1, 10_000);
        clock.advance(11);
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test]
    async fn capacity_is_enforced_on_new_keys() {
        let (cache, _clock) = cache_with_clock(60, 2);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);
        assert!(cache.len() <= 2);
    }

    #[tokio::test]
    async fn sweep_removes_expired_entries() {
        let (cache, clock) = cache_with_clock(5, 0);
        cache.set("k", 1);
        clock.advance(6);
        cache.sweep_once();
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let (cache, _clock) = cache_with_clock(60, 0);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.remove("a");
        assert_eq!(cache.get("a"), None);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
