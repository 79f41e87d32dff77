//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_RESPONSE_TTL_SECS: u64 = 20;
const DEFAULT_RESPONSE_LIMIT: usize = 200;
const DEFAULT_RESPONSE_BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Enable the response cache.
    pub enable_response_cache: bool,
    /// How long a cached response stays fresh.
    pub response_ttl: Duration,
    /// Maximum cached responses before LRU eviction.
    pub response_limit: usize,
    /// Responses with larger bodies are served but not cached.
    pub response_body_limit_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_response_cache: true,
            response_ttl: Duration::from_secs(DEFAULT_RESPONSE_TTL_SECS),
            response_limit: DEFAULT_RESPONSE_LIMIT,
            response_body_limit_bytes: DEFAULT_RESPONSE_BODY_LIMIT_BYTES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enable_response_cache: settings.enable_response_cache,
            response_ttl: settings.response_ttl,
            response_limit: settings.response_limit.get(),
            response_body_limit_bytes: settings.response_body_limit_bytes.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the response limit as NonZeroUsize, clamping to 1 if zero.
    pub fn response_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.response_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
