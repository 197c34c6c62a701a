//! Prompt Cache & Deduplicator (C6): a content-addressed cache keyed
//! on a hash of the canonical request, with strict LRU eviction and a
//! background expiry sweep.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sentry_core::Timestamp;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, PipelineResult};

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_millis(30_000);
/// Default maximum resident entries.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;
/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Recursively sort object keys so two structurally-equal JSON values
/// always serialize identically regardless of field insertion order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: Map<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect::<std::collections::BTreeMap<_, _>>().into_iter().collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Compute the 16-hex-digit cache key for `req`, optionally scoped to
/// an owner/session identifier and a quantized timestamp bucket.
///
/// # Errors
///
/// Returns [`PipelineError::Canonicalize`] if `req` cannot be
/// serialized to JSON.
pub fn compute_key<T: Serialize>(
    req: &T,
    owner_session: Option<&str>,
    timestamp_bucket: Option<i64>,
) -> PipelineResult<String> {
    let value = serde_json::to_value(req).map_err(|e| PipelineError::Canonicalize(e.to_string()))?;
    let canonical = canonicalize(value);
    let mut payload =
        serde_json::to_vec(&canonical).map_err(|e| PipelineError::Canonicalize(e.to_string()))?;
    if let Some(scope) = owner_session {
        payload.extend_from_slice(scope.as_bytes());
    }
    if let Some(bucket) = timestamp_bucket {
        payload.extend_from_slice(&bucket.to_le_bytes());
    }
    let digest = Sha256::digest(&payload);
    Ok(hex::encode(digest)[..16].to_string())
}

struct Entry<V> {
    value: V,
    created_at: Timestamp,
    expires_at: Timestamp,
    hit_count: u64,
}

/// Outcome of probing the cache for a key.
#[derive(Debug, Clone)]
pub struct CheckResult<V> {
    /// Whether a live (unexpired) entry exists for the key.
    pub duplicate: bool,
    /// The cached value, if `duplicate` is true.
    pub cached: Option<V>,
}

/// Point-in-time counters for cache attribution.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Successful lookups.
    pub hits: u64,
    /// Lookups that found nothing live.
    pub misses: u64,
    /// Entries evicted to respect capacity.
    pub evictions: u64,
    /// Current resident entry count.
    pub size: usize,
}

/// A content-addressed, capacity-bounded, TTL-expiring cache.
pub struct PromptCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    order: Mutex<VecDeque<String>>,
    max_entries: usize,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> PromptCache<V> {
    /// Build a cache with the given capacity and default entry TTL.
    #[must_use]
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
            max_entries,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Check whether `key` has a live cached value.
    pub async fn check(&self, key: &str) -> CheckResult<V> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(entry) if Timestamp::now().unix_timestamp() < entry.expires_at.unix_timestamp() => {
                entry.hit_count += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                CheckResult { duplicate: true, cached: Some(entry.value.clone()) }
            }
            Some(_) => {
                entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                CheckResult { duplicate: false, cached: None }
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                CheckResult { duplicate: false, cached: None }
            }
        }
    }

    /// Insert or overwrite `key` with `value`, expiring after `ttl`
    /// (or the cache's default). Evicts the least-recently-inserted
    /// entry first if this insertion exceeds capacity.
    pub async fn cache(&self, key: String, value: V, ttl: Option<Duration>) {
        let ttl_secs = ttl.unwrap_or(self.default_ttl).as_secs_f64();
        let now = Timestamp::now();
        let entry = Entry {
            value,
            created_at: now,
            expires_at: now.plus_seconds(ttl_secs as i64),
            hit_count: 0,
        };

        let mut entries = self.entries.lock().await;
        let mut order = self.order.lock().await;
        if !entries.contains_key(&key) {
            order.push_back(key.clone());
        }
        entries.insert(key, entry);

        while entries.len() > self.max_entries {
            if let Some(oldest) = order.pop_front() {
                entries.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            } else {
                break;
            }
        }
    }

    /// Return the cached value for `key` if live; otherwise call
    /// `producer`, cache its result under `key`, and return it. Two
    /// calls with the same key within `ttl` invoke `producer` at most
    /// once between them (serialized by the cache's internal lock).
    pub async fn dedupe<F, Fut>(&self, key: String, ttl: Option<Duration>, producer: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = V>,
    {
        if let CheckResult { duplicate: true, cached: Some(value) } = self.check(&key).await {
            return value;
        }
        let value = producer().await;
        self.cache(key, value.clone(), ttl).await;
        value
    }

    /// Remove every expired entry. Returns the count removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Timestamp::now().unix_timestamp();
        let mut entries = self.entries.lock().await;
        let mut order = self.order.lock().await;
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.expires_at.unix_timestamp() <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        order.retain(|k| entries.contains_key(k));
        expired.len()
    }

    /// Current hit/miss/eviction/size counters.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.entries.lock().await.len(),
        }
    }
}

/// Spawn the background sweep task. The returned [`CancellationToken`]
/// stops the loop before its next tick; the in-flight sweep, if any,
/// still completes.
pub fn spawn_sweeper<V>(
    cache: std::sync::Arc<PromptCache<V>>,
    interval: Duration,
) -> CancellationToken
where
    V: Clone + Send + Sync + 'static,
{
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = child.cancelled() => break,
                () = tokio::time::sleep(interval) => {
                    let removed = cache.sweep_expired().await;
                    if removed > 0 {
                        tracing::debug!(removed, "prompt cache sweep removed expired entries");
                    }
                }
            }
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_key_is_order_independent() {
        let a = compute_key(&json!({"b": 1, "a": 2}), None, None).unwrap();
        let b = compute_key(&json!({"a": 2, "b": 1}), None, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn owner_session_scoping_changes_the_key() {
        let a = compute_key(&json!({"q": "hi"}), Some("session-1"), None).unwrap();
        let b = compute_key(&json!({"q": "hi"}), Some("session-2"), None).unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn cache_hit_increments_counters() {
        let cache = PromptCache::new(10, DEFAULT_TTL);
        cache.cache("k".into(), "v".to_string(), None).await;
        let result = cache.check("k").await;
        assert!(result.duplicate);
        assert_eq!(result.cached.as_deref(), Some("v"));
        assert_eq!(cache.stats().await.hits, 1);
    }

    #[tokio::test]
    async fn eviction_is_strict_lru_by_insertion() {
        let cache = PromptCache::new(2, DEFAULT_TTL);
        cache.cache("a".into(), 1, None).await;
        cache.cache("b".into(), 2, None).await;
        cache.cache("c".into(), 3, None).await;
        assert!(!cache.check("a").await.duplicate);
        assert!(cache.check("b").await.duplicate);
        assert!(cache.check("c").await.duplicate);
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn expired_entries_are_swept() {
        let cache = PromptCache::new(10, Duration::from_millis(0));
        cache.cache("k".into(), 1, Some(Duration::from_millis(0))).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        let removed = cache.sweep_expired().await;
        assert_eq!(removed, 1);
        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test]
    async fn dedupe_invokes_producer_once_within_ttl() {
        let cache = std::sync::Arc::new(PromptCache::new(10, DEFAULT_TTL));
        let calls = std::sync::Arc::new(AtomicU64::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            cache
                .dedupe("k".into(), None, || async move {
                    calls.fetch_add(1, Ordering::Relaxed);
                    "produced".to_string()
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
