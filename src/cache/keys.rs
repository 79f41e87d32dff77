use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Identity of a cached response.
///
/// The viewer is part of the key because the page chrome differs between
/// anonymous visitors and signed-in users.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseKey {
    pub path: String,
    pub query_hash: u64,
    pub viewer: Option<i64>,
}

impl ResponseKey {
    pub fn new(path: impl Into<String>, query: &str, viewer: Option<i64>) -> Self {
        Self {
            path: path.into(),
            query_hash: hash_query(query),
            viewer,
        }
    }
}

/// Hash a query string for response cache keys.
pub fn hash_query(query: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}
