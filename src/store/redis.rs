//! Durable record storage over Redis hashes.
//!
//! Each record lives at `{schema}:{id}` as one hash of canonical field
//! strings. Typing is restored on read by running the stored fields back
//! through the schema.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};

use super::{Record, RecordSchema, RecordStore, StoreError, new_record_id};

/// Redis-backed [`RecordStore`] for one record schema.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use cachet::store::{FieldKind, FieldSpec, RecordSchema, RedisRecordStore};
///
/// let schema = Arc::new(
///     RecordSchema::new("customer")
///         .field(FieldSpec::required("email", FieldKind::Email)),
/// );
/// let store = RedisRecordStore::new("redis://localhost:6380", schema)?;
/// # Ok::<(), cachet::store::StoreError>(())
/// ```
pub struct RedisRecordStore {
    client: Client,
    schema: Arc<RecordSchema>,
}

impl RedisRecordStore {
    /// Creates a store for `schema` records at the given connection URL.
    /// The URL is validated here; the connection is established lazily.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] when the URL cannot be parsed.
    pub fn new(url: &str, schema: Arc<RecordSchema>) -> Result<Self, StoreError> {
        let client = Client::open(url)
            .map_err(|e| StoreError::Unavailable(format!("invalid redis URL {url}: {e}")))?;
        Ok(Self { client, schema })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn key(&self, id: &str) -> String {
        format!("{}:{}", self.schema.name(), id)
    }
}

#[async_trait]
impl RecordStore for RedisRecordStore {
    async fn save(&self, record: Record) -> Result<String, StoreError> {
        let id = new_record_id();
        let fields: Vec<(String, String)> = record
            .canonical_fields()
            .map(|(name, value)| (name.to_owned(), value))
            .collect();

        let mut conn = self.connection().await?;
        let _: () = conn
            .hset_multiple(self.key(&id), &fields)
            .await
            .map_err(|e| StoreError::Unavailable(format!("HSET failed: {e}")))?;
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Record, StoreError> {
        let mut conn = self.connection().await?;
        let stored: HashMap<String, String> = conn
            .hgetall(self.key(id))
            .await
            .map_err(|e| StoreError::Unavailable(format!("HGETALL failed: {e}")))?;

        // Redis answers an empty hash for a missing key.
        if stored.is_empty() {
            return Err(StoreError::NotFound(id.to_owned()));
        }

        self.schema
            .from_canonical(stored.iter().map(|(n, v)| (n.as_str(), v.as_str())))
            .map_err(StoreError::Corrupt)
    }

    async fn all_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}:*", self.schema.name());
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("KEYS failed: {e}")))?;

        let prefix = format!("{}:", self.schema.name());
        let mut ids: Vec<String> = keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_owned))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl std::fmt::Debug for RedisRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRecordStore")
            .field("schema", &self.schema.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldKind, FieldSpec};
    use serde_json::json;

    fn schema() -> Arc<RecordSchema> {
        Arc::new(
            RecordSchema::new("cachet-test-customer")
                .field(FieldSpec::required("email", FieldKind::Email))
                .field(FieldSpec::required("age", FieldKind::Integer)),
        )
    }

    #[test]
    fn valid_url_constructs() {
        assert!(RedisRecordStore::new("redis://localhost:6380", schema()).is_ok());
    }

    #[test]
    fn invalid_url_is_unavailable() {
        assert!(matches!(
            RedisRecordStore::new("not-a-url", schema()),
            Err(StoreError::Unavailable(_))
        ));
    }

    // Note: these tests require a Redis server on localhost:6380.

    #[tokio::test]
    #[ignore] // Requires Redis server
    async fn save_get_list_round_trip() {
        let schema = schema();
        let store = RedisRecordStore::new("redis://localhost:6380", schema.clone()).unwrap();

        let record = schema
            .validate(&json!({"email": "a@example.com", "age": 38}))
            .unwrap();
        let id = store.save(record.clone()).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap(), record);
        assert!(store.all_ids().await.unwrap().contains(&id));
    }

    #[tokio::test]
    #[ignore] // Requires Redis server
    async fn missing_record_is_not_found() {
        let store = RedisRecordStore::new("redis://localhost:6380", schema()).unwrap();
        assert!(matches!(
            store.get("no-such-id").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
