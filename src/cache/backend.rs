//! The cache storage contract and the in-memory backend.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tokio::time::Instant;

/// A backend connectivity failure.
///
/// Never conflated with a miss: a miss is `Ok(None)`, an unreachable
/// backend is `Err`. The read-through core decides what happens next
/// according to its [`FailurePolicy`](crate::cache::FailurePolicy).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Abstract storage for cache entries, keyed by the strings the
/// [`KeyBuilder`](crate::cache::KeyBuilder) produces.
///
/// # Contract
///
/// - Safe to call concurrently from many in-flight requests.
/// - `get` on an expired key behaves exactly like a miss, whether expiry
///   is native (Redis TTLs) or computed by the implementation.
/// - `set` is last-writer-wins under concurrent writers to the same key;
///   there are no merge semantics.
/// - `clear` removes every entry whose key starts with `prefix` and
///   returns how many were removed. Pass a full key to remove one entry,
///   or a namespace prefix to remove a cache user's whole keyspace.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch the blob stored under `key`, or `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError>;

    /// Store `blob` under `key`, replacing any prior value, expiring
    /// after `ttl`.
    async fn set(&self, key: &str, blob: Bytes, ttl: Duration) -> Result<(), BackendError>;

    /// Remove all entries whose key starts with `prefix`; returns the
    /// number removed.
    async fn clear(&self, prefix: &str) -> Result<u64, BackendError>;
}

// What the memory backend holds per key.
struct Stored {
    blob: Bytes,
    expires_at: Instant,
}

/// Process-local cache backend over a concurrent map.
///
/// Expiry is computed: reads past the deadline behave as misses and evict
/// the entry in passing. Uses `tokio::time::Instant`, so tests can drive
/// expiry with a paused clock.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bytes::Bytes;
/// use cachet::cache::{CacheBackend, MemoryBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let backend = MemoryBackend::new();
/// backend.set("k", Bytes::from_static(b"v"), Duration::from_secs(10)).await.unwrap();
/// assert!(backend.get("k").await.unwrap().is_some());
/// # }
/// ```
#[derive(Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Stored>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, including not-yet-evicted
    /// expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError> {
        if let Some(stored) = self.entries.get(key) {
            if Instant::now() < stored.expires_at {
                return Ok(Some(stored.blob.clone()));
            }
            drop(stored);
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, blob: Bytes, ttl: Duration) -> Result<(), BackendError> {
        self.entries.insert(
            key.to_owned(),
            Stored {
                blob,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn clear(&self, prefix: &str) -> Result<u64, BackendError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - self.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_on_unknown_key() {
        let backend = MemoryBackend::new();
        assert!(backend.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_get() {
        let backend = MemoryBackend::new();
        backend
            .set("k", Bytes::from_static(b"v"), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(
            backend.get("k").await.unwrap(),
            Some(Bytes::from_static(b"v"))
        );
    }

    #[tokio::test]
    async fn overwrite_is_last_writer_wins() {
        let backend = MemoryBackend::new();
        backend
            .set("k", Bytes::from_static(b"old"), Duration::from_secs(10))
            .await
            .unwrap();
        backend
            .set("k", Bytes::from_static(b"new"), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(
            backend.get("k").await.unwrap(),
            Some(Bytes::from_static(b"new"))
        );
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_get_behaves_as_miss() {
        let backend = MemoryBackend::new();
        backend
            .set("k", Bytes::from_static(b"v"), Duration::from_secs(1))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_millis(1500)).await;

        assert!(backend.get("k").await.unwrap().is_none());
        // The expired entry was evicted in passing.
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn clear_by_prefix_counts() {
        let backend = MemoryBackend::new();
        for key in ["ns:a", "ns:b", "other:c"] {
            backend
                .set(key, Bytes::from_static(b"v"), Duration::from_secs(10))
                .await
                .unwrap();
        }

        assert_eq!(backend.clear("ns:").await.unwrap(), 2);
        assert!(backend.get("ns:a").await.unwrap().is_none());
        assert!(backend.get("other:c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn clear_single_key() {
        let backend = MemoryBackend::new();
        backend
            .set("ns:a", Bytes::from_static(b"v"), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(backend.clear("ns:a").await.unwrap(), 1);
        assert_eq!(backend.clear("ns:a").await.unwrap(), 0);
    }
}
