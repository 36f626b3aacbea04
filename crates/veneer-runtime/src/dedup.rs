//! Request deduplication: canonical hashing and a short-TTL replay cache.
//!
//! Two requests that differ only in JSON key order or query-string order
//! collapse to the same cache key. A probe hit replays the stored response;
//! stores are fire-and-forget and any internal failure degrades to a miss.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Response triple stored for replay.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

/// Canonical form of one request, hashed into the cache key.
#[derive(Debug, Clone)]
pub struct CanonicalRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Value,
}

impl CanonicalRequest {
    /// SHA-256 over the key-sorted `{method, path, query, body}` tree.
    pub fn hash(&self) -> String {
        let query_value = Value::Object(
            self.query
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect::<Map<String, Value>>(),
        );
        let canonical = Value::Object(Map::from_iter([
            ("method".to_string(), Value::String(self.method.clone())),
            ("path".to_string(), Value::String(self.path.clone())),
            ("query".to_string(), sort_keys(&query_value)),
            ("body".to_string(), sort_keys(&self.body)),
        ]));

        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Recursively sort object keys; arrays keep their order.
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            // serde_json::Map preserves insertion order, so inserting in
            // sorted key order yields a deterministic serialization.
            let sorted: Map<String, Value> = keys
                .into_iter()
                .map(|k| (k.clone(), sort_keys(&map[k])))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// In-memory replay cache with a fixed TTL window.
///
/// Writes are keyed by content hash, so concurrent writes to the same key
/// are idempotent; last-write-wins is acceptable and no read-modify-write
/// occurs.
pub struct ReplayCache {
    entries: Mutex<HashMap<String, (CachedResponse, Instant)>>,
    ttl: Duration,
}

impl ReplayCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn make_key(endpoint_id: &str, request: &CanonicalRequest) -> String {
        format!("dedup:{}:{}", endpoint_id, request.hash())
    }

    /// Look up a previously stored response for an identical request.
    pub fn probe(&self, endpoint_id: &str, request: &CanonicalRequest) -> Option<CachedResponse> {
        let key = Self::make_key(endpoint_id, request);
        let entries = self.entries.lock();
        match entries.get(&key) {
            Some((response, stored_at)) if stored_at.elapsed() < self.ttl => {
                tracing::debug!(key = %key, "duplicate request detected");
                Some(response.clone())
            }
            _ => None,
        }
    }

    /// Store a response for replay. Expired entries for the written key are
    /// cleaned up opportunistically while the lock is held.
    pub fn store(&self, endpoint_id: &str, request: &CanonicalRequest, response: CachedResponse) {
        let key = Self::make_key(endpoint_id, request);
        let mut entries = self.entries.lock();
        entries.retain(|_, (_, stored_at)| stored_at.elapsed() < self.ttl);
        entries.insert(key, (response, Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value, query: &[(&str, &str)]) -> CanonicalRequest {
        CanonicalRequest {
            method: "POST".to_string(),
            path: "/orders".to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body,
        }
    }

    fn response() -> CachedResponse {
        CachedResponse {
            status: 201,
            headers: HashMap::new(),
            body: json!({"ok": true}),
        }
    }

    #[test]
    fn test_key_order_insensitive_hash() {
        let a = request(json!({"a": 1, "b": 2}), &[("x", "1"), ("y", "2")]);
        let b = request(json!({"b": 2, "a": 1}), &[("y", "2"), ("x", "1")]);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_different_bodies_hash_differently() {
        let a = request(json!({"a": 1}), &[]);
        let b = request(json!({"a": 2}), &[]);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_array_order_matters() {
        let a = request(json!({"items": [1, 2]}), &[]);
        let b = request(json!({"items": [2, 1]}), &[]);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_nested_key_sorting() {
        let a = request(json!({"outer": {"z": 1, "a": {"y": 2, "b": 3}}}), &[]);
        let b = request(json!({"outer": {"a": {"b": 3, "y": 2}, "z": 1}}), &[]);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_probe_miss_then_hit() {
        let cache = ReplayCache::new(Duration::from_secs(60));
        let req = request(json!({"a": 1}), &[]);

        assert!(cache.probe("ep-1", &req).is_none());
        cache.store("ep-1", &req, response());
        assert_eq!(cache.probe("ep-1", &req), Some(response()));
    }

    #[test]
    fn test_scoped_by_endpoint() {
        let cache = ReplayCache::new(Duration::from_secs(60));
        let req = request(json!({"a": 1}), &[]);
        cache.store("ep-1", &req, response());
        assert!(cache.probe("ep-2", &req).is_none());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = ReplayCache::new(Duration::from_millis(20));
        let req = request(json!({"a": 1}), &[]);
        cache.store("ep-1", &req, response());
        assert!(cache.probe("ep-1", &req).is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.probe("ep-1", &req).is_none());
    }
}
