//! Process-local record store, for tests and single-node demos.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Record, RecordStore, StoreError, new_record_id};

/// In-memory [`RecordStore`] over a concurrent map.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: DashMap<String, Record>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no records are held.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn save(&self, record: Record) -> Result<String, StoreError> {
        let id = new_record_id();
        self.records.insert(id.clone(), record);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Record, StoreError> {
        self.records
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))
    }

    async fn all_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.records.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldKind, FieldSpec, RecordSchema};
    use serde_json::json;

    fn sample_record() -> Record {
        RecordSchema::new("customer")
            .field(FieldSpec::required("email", FieldKind::Email))
            .validate(&json!({"email": "a@example.com"}))
            .unwrap()
    }

    #[tokio::test]
    async fn save_assigns_distinct_ids() {
        let store = MemoryRecordStore::new();
        let a = store.save(sample_record()).await.unwrap();
        let b = store.save(sample_record()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn get_round_trips() {
        let store = MemoryRecordStore::new();
        let record = sample_record();
        let id = store.save(record.clone()).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let store = MemoryRecordStore::new();
        assert!(matches!(
            store.get("nope").await,
            Err(StoreError::NotFound(id)) if id == "nope"
        ));
    }

    #[tokio::test]
    async fn all_ids_lists_everything() {
        let store = MemoryRecordStore::new();
        let a = store.save(sample_record()).await.unwrap();
        let b = store.save(sample_record()).await.unwrap();
        let ids = store.all_ids().await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a));
        assert!(ids.contains(&b));
    }
}
