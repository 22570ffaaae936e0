//! Response Cache (C4).
//!
//! Caches model responses keyed by a fingerprint of the request, with
//! single-flight coalescing: concurrent callers for the same fingerprint
//! await one in-flight call instead of dispatching duplicates. Built on
//! `dashmap`, already part of the dependency stack but previously unused.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Fingerprint of a cacheable request: model + normalized messages + decoding
/// params. Two logically identical requests hash to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(pub String);

impl CacheKey {
    pub fn fingerprint(parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update(b"\0");
        }
        Self(format!("{:x}", hasher.finalize()))
    }
}

#[derive(Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

enum Slot<V> {
    Ready(Entry<V>),
    InFlight(Arc<Notify>),
}

/// TTL cache with single-flight request coalescing.
pub struct ResponseCache<V: Clone + Send + Sync + 'static> {
    slots: DashMap<CacheKey, Slot<V>>,
    ttl: Duration,
    max_entries: usize,
}

pub enum CacheLookup<V> {
    Hit(V),
    Miss,
}

impl<V: Clone + Send + Sync + 'static> ResponseCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            slots: DashMap::new(),
            ttl,
            max_entries,
        }
    }

    /// Look up `key`. If another caller is already computing it, wait for
    /// that computation instead of triggering a second one; the caller whose
    /// lookup first observes `Miss` is responsible for calling `put` (or
    /// `abandon` on failure) to release waiters.
    pub async fn get_or_wait(&self, key: &CacheKey) -> CacheLookup<V> {
        loop {
            if let Some(slot) = self.slots.get(key) {
                match &*slot {
                    Slot::Ready(entry) => {
                        if entry.expires_at > Instant::now() {
                            return CacheLookup::Hit(entry.value.clone());
                        }
                        drop(slot);
                        self.slots.remove(key);
                        continue;
                    }
                    Slot::InFlight(notify) => {
                        let notify = notify.clone();
                        drop(slot);
                        notify.notified().await;
                        continue;
                    }
                }
            }

            // Nobody holds this key: claim it as in-flight on behalf of the
            // caller, who must follow up with `put` or `abandon`.
            match self.slots.entry(key.clone()) {
                dashmap::mapref::entry::Entry::Vacant(v) => {
                    v.insert(Slot::InFlight(Arc::new(Notify::new())));
                    return CacheLookup::Miss;
                }
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
            }
        }
    }

    /// Populate the cache after a successful compute, waking any coalesced
    /// waiters.
    pub fn put(&self, key: CacheKey, value: V) {
        if self.slots.len() >= self.max_entries {
            self.evict_oldest();
        }
        let notify = match self.slots.get(&key) {
            Some(slot) => match &*slot {
                Slot::InFlight(n) => Some(n.clone()),
                Slot::Ready(_) => None,
            },
            None => None,
        };
        self.slots.insert(
            key,
            Slot::Ready(Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            }),
        );
        if let Some(notify) = notify {
            notify.notify_waiters();
        }
    }

    /// Release an in-flight claim after a failed compute, without caching a
    /// result, waking waiters so they retry the compute themselves.
    pub fn abandon(&self, key: &CacheKey) {
        if let Some((_, Slot::InFlight(notify))) = self.slots.remove(key) {
            notify.notify_waiters();
        }
    }

    fn evict_oldest(&self) {
        if let Some(oldest_key) = self
            .slots
            .iter()
            .filter_map(|entry| match entry.value() {
                Slot::Ready(e) => Some((entry.key().clone(), e.expires_at)),
                Slot::InFlight(_) => None,
            })
            .min_by_key(|(_, expires_at)| *expires_at)
            .map(|(k, _)| k)
        {
            self.slots.remove(&oldest_key);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_then_put_then_hit() {
        let cache: ResponseCache<String> = ResponseCache::new(Duration::from_secs(60), 16);
        let key = CacheKey::fingerprint(&["gpt-4o", "hello"]);

        match cache.get_or_wait(&key).await {
            CacheLookup::Miss => {}
            CacheLookup::Hit(_) => panic!("expected miss on first lookup"),
        }
        cache.put(key.clone(), "cached answer".to_string());

        match cache.get_or_wait(&key).await {
            CacheLookup::Hit(v) => assert_eq!(v, "cached answer"),
            CacheLookup::Miss => panic!("expected hit after put"),
        }
    }

    #[tokio::test]
    async fn expired_entry_is_treated_as_miss() {
        let cache: ResponseCache<String> = ResponseCache::new(Duration::from_millis(1), 16);
        let key = CacheKey::fingerprint(&["m", "q"]);
        cache.put(key.clone(), "v".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;

        match cache.get_or_wait(&key).await {
            CacheLookup::Miss => {}
            CacheLookup::Hit(_) => panic!("expected expired entry to miss"),
        }
    }

    #[tokio::test]
    async fn concurrent_waiters_coalesce_on_single_flight() {
        let cache: Arc<ResponseCache<String>> = Arc::new(ResponseCache::new(Duration::from_secs(60), 16));
        let key = CacheKey::fingerprint(&["m", "q"]);

        // First caller claims the in-flight slot.
        assert!(matches!(cache.get_or_wait(&key).await, CacheLookup::Miss));

        let waiter_cache = cache.clone();
        let waiter_key = key.clone();
        let waiter = tokio::spawn(async move { waiter_cache.get_or_wait(&waiter_key).await });

        tokio::task::yield_now().await;
        cache.put(key.clone(), "computed".to_string());

        match waiter.await.unwrap() {
            CacheLookup::Hit(v) => assert_eq!(v, "computed"),
            CacheLookup::Miss => panic!("waiter should have observed the computed value"),
        }
    }

    #[test]
    fn fingerprint_is_stable_and_order_sensitive() {
        let a = CacheKey::fingerprint(&["gpt-4o", "hello"]);
        let b = CacheKey::fingerprint(&["gpt-4o", "hello"]);
        let c = CacheKey::fingerprint(&["hello", "gpt-4o"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
