//! Response cache for the public index.
//!
//! Rendered index pages are kept for a short time-to-live so that busy
//! front pages do not hit the database on every request. Entries are keyed
//! by path, query string and viewer, and can be dropped explicitly through
//! [`CacheState::clear`].
//!
//! ```toml
//! [cache]
//! enable_response_cache = true
//! response_ttl_seconds = 20
//! response_limit = 200
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

use std::sync::Arc;

pub use config::CacheConfig;
pub use keys::{ResponseKey, hash_query};
pub use middleware::response_cache_layer;
pub use store::{CachedResponse, ResponseStore};

/// Shared cache state for the middleware and for explicit invalidation.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<ResponseStore>,
}

impl CacheState {
    pub fn new(config: CacheConfig) -> Self {
        let store = Arc::new(ResponseStore::new(&config));
        Self { config, store }
    }

    /// Drop every cached response.
    pub fn clear(&self) {
        self.store.clear();
    }
}
