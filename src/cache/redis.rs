//! Redis-backed cache storage.
//!
//! Expiry is native: entries are written with `SET ... EX`, so Redis owns
//! eviction and an expired `GET` is simply a miss. One [`redis::Client`]
//! is created per backend at startup; each operation obtains a
//! multiplexed connection from it.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};

use super::backend::{BackendError, CacheBackend};

/// Cache backend over a Redis instance.
///
/// # Examples
///
/// ```rust,no_run
/// use cachet::cache::RedisBackend;
///
/// let backend = RedisBackend::new("redis://localhost:6381")?;
/// # Ok::<(), cachet::cache::BackendError>(())
/// ```
pub struct RedisBackend {
    client: Client,
}

impl RedisBackend {
    /// Creates a backend for the given connection URL
    /// (`redis://host:port`). The URL is validated here; the TCP
    /// connection is established lazily on first use.
    ///
    /// # Errors
    ///
    /// [`BackendError::Unavailable`] when the URL cannot be parsed.
    pub fn new(url: &str) -> Result<Self, BackendError> {
        let client = Client::open(url)
            .map_err(|e| BackendError::Unavailable(format!("invalid redis URL {url}: {e}")))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, BackendError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError> {
        let mut conn = self.connection().await?;
        let blob: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| BackendError::Unavailable(format!("GET failed: {e}")))?;
        Ok(blob.map(Bytes::from))
    }

    async fn set(&self, key: &str, blob: Bytes, ttl: Duration) -> Result<(), BackendError> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, blob.as_ref(), seconds)
            .await
            .map_err(|e| BackendError::Unavailable(format!("SET EX failed: {e}")))?;
        Ok(())
    }

    async fn clear(&self, prefix: &str) -> Result<u64, BackendError> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", prefix.replace('*', "\\*").replace('?', "\\?"));
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut conn)
            .await
            .map_err(|e| BackendError::Unavailable(format!("KEYS failed: {e}")))?;

        if keys.is_empty() {
            return Ok(0);
        }

        let removed: u64 = conn
            .del(keys)
            .await
            .map_err(|e| BackendError::Unavailable(format!("DEL failed: {e}")))?;
        Ok(removed)
    }
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_url_constructs() {
        assert!(RedisBackend::new("redis://localhost:6381").is_ok());
    }

    #[test]
    fn invalid_url_is_unavailable() {
        let err = RedisBackend::new("not-a-url").unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }

    // Note: these tests require a Redis server on localhost:6381.

    #[tokio::test]
    #[ignore] // Requires Redis server
    async fn set_get_clear_round_trip() {
        let backend = RedisBackend::new("redis://localhost:6381").unwrap();

        backend
            .set(
                "cachet-test:k",
                Bytes::from_static(b"v"),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(
            backend.get("cachet-test:k").await.unwrap(),
            Some(Bytes::from_static(b"v"))
        );

        assert_eq!(backend.clear("cachet-test:").await.unwrap(), 1);
        assert!(backend.get("cachet-test:k").await.unwrap().is_none());
    }
}
