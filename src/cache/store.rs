use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use metrics::{counter, gauge};

use super::config::CacheConfig;
use super::keys::ResponseKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

const METRIC_HIT: &str = "yatube_response_cache_hit_total";
const METRIC_MISS: &str = "yatube_response_cache_miss_total";
const METRIC_STORE: &str = "yatube_response_cache_store_total";
const METRIC_EXPIRED: &str = "yatube_response_cache_expired_total";
const METRIC_EVICT: &str = "yatube_response_cache_evict_total";
const METRIC_CLEAR: &str = "yatube_response_cache_clear_total";
const METRIC_ENTRIES: &str = "yatube_response_cache_entries";

/// A rendered response as kept in the cache.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[derive(Debug)]
struct Entry {
    response: CachedResponse,
    stored_at: Instant,
}

/// LRU of rendered responses with a fixed time-to-live.
pub struct ResponseStore {
    ttl: Duration,
    responses: RwLock<LruCache<ResponseKey, Entry>>,
}

impl ResponseStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: config.response_ttl,
            responses: RwLock::new(LruCache::new(config.response_limit_non_zero())),
        }
    }

    pub fn get(&self, key: &ResponseKey) -> Option<CachedResponse> {
        self.get_at(key, Instant::now())
    }

    /// Look up `key` as of `now`. Stale entries are removed and reported as misses.
    pub fn get_at(&self, key: &ResponseKey, now: Instant) -> Option<CachedResponse> {
        let mut responses = rw_write(&self.responses, SOURCE, "get");

        let fresh = match responses.get(key) {
            Some(entry) => now.saturating_duration_since(entry.stored_at) < self.ttl,
            None => {
                counter!(METRIC_MISS).increment(1);
                return None;
            }
        };

        if !fresh {
            responses.pop(key);
            counter!(METRIC_EXPIRED).increment(1);
            counter!(METRIC_MISS).increment(1);
            gauge!(METRIC_ENTRIES).set(responses.len() as f64);
            return None;
        }

        counter!(METRIC_HIT).increment(1);
        responses.get(key).map(|entry| entry.response.clone())
    }

    pub fn set(&self, key: ResponseKey, response: CachedResponse) {
        self.set_at(key, response, Instant::now());
    }

    pub fn set_at(&self, key: ResponseKey, response: CachedResponse, now: Instant) {
        let mut responses = rw_write(&self.responses, SOURCE, "set");
        let entry = Entry {
            response,
            stored_at: now,
        };
        if let Some((evicted, _)) = responses.push(key.clone(), entry)
            && evicted != key
        {
            counter!(METRIC_EVICT).increment(1);
        }
        counter!(METRIC_STORE).increment(1);
        gauge!(METRIC_ENTRIES).set(responses.len() as f64);
    }

    pub fn clear(&self) {
        let mut responses = rw_write(&self.responses, SOURCE, "clear");
        responses.clear();
        counter!(METRIC_CLEAR).increment(1);
        gauge!(METRIC_ENTRIES).set(0.0);
    }

    pub fn len(&self) -> usize {
        rw_read(&self.responses, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn page(body: &'static str) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: Bytes::from(body),
        }
    }

    fn store_with(ttl_secs: u64, limit: usize) -> ResponseStore {
        ResponseStore::new(&CacheConfig {
            response_ttl: Duration::from_secs(ttl_secs),
            response_limit: limit,
            ..Default::default()
        })
    }

    #[test]
    fn fresh_entry_is_served() {
        let store = store_with(20, 10);
        let key = ResponseKey::new("/", "", None);
        let start = Instant::now();

        assert!(store.get_at(&key, start).is_none());
        store.set_at(key.clone(), page("hello"), start);

        let cached = store
            .get_at(&key, start + Duration::from_secs(19))
            .expect("entry still fresh");
        assert_eq!(cached.status, 200);
        assert_eq!(cached.body, Bytes::from("hello"));
    }

    #[test]
    fn entry_expires_after_ttl() {
        let store = store_with(20, 10);
        let key = ResponseKey::new("/", "page=2", None);
        let start = Instant::now();

        store.set_at(key.clone(), page("old"), start);
        assert!(store.get_at(&key, start + Duration::from_secs(20)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let store = store_with(20, 10);
        store.set(ResponseKey::new("/", "", None), page("a"));
        store.set(ResponseKey::new("/", "", Some(1)), page("b"));
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn least_recent_entry_is_evicted() {
        let store = store_with(20, 2);
        let first = ResponseKey::new("/", "page=1", None);
        let second = ResponseKey::new("/", "page=2", None);
        let third = ResponseKey::new("/", "page=3", None);

        store.set(first.clone(), page("1"));
        store.set(second.clone(), page("2"));
        store.set(third.clone(), page("3"));

        assert!(store.get(&first).is_none());
        assert!(store.get(&second).is_some());
        assert!(store.get(&third).is_some());
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let store = store_with(20, 10);
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.responses.write().expect("lock");
            panic!("poison the lock");
        }));

        let key = ResponseKey::new("/", "", None);
        store.set(key.clone(), page("after"));
        assert!(store.get(&key).is_some());
    }
}
