use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;
use seedline_storage::{ModelStorage, StorageError};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub type RowKey = String; // Format: "RecordType/id"

pub(crate) fn make_row_key(record_type: &str, id: &str) -> RowKey {
    format!("{record_type}/{id}")
}

/// Renders a row id as a string key; integer ids are accepted as-is.
pub(crate) fn row_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// In-memory application data model using papaya lock-free HashMap.
///
/// Rows are stored under `RecordType/id` keys together with an insertion
/// sequence so that `list` returns rows in creation order.
#[derive(Debug)]
pub struct InMemoryModelStorage {
    data: Arc<PapayaHashMap<RowKey, (u64, Value)>>,
    /// Atomic counter used to order rows by creation
    sequence: AtomicU64,
}

impl Default for InMemoryModelStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryModelStorage {
    /// Creates an empty data model.
    pub fn new() -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            sequence: AtomicU64::new(1),
        }
    }

    /// Number of rows of the given record type.
    pub fn count(&self, record_type: &str) -> usize {
        let prefix = format!("{record_type}/");
        let guard = self.data.pin();
        guard.iter().filter(|(key, _)| key.starts_with(&prefix)).count()
    }
}

#[async_trait]
impl ModelStorage for InMemoryModelStorage {
    async fn list(&self, record_type: &str) -> Result<Vec<Value>, StorageError> {
        let prefix = format!("{record_type}/");
        let guard = self.data.pin();
        let mut rows: Vec<(u64, Value)> = guard
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, row)| row.clone())
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn create(&self, record_type: &str, mut row: Value) -> Result<Value, StorageError> {
        if !row.is_object() {
            return Err(StorageError::invalid_record(format!(
                "{record_type} row must be a JSON object"
            )));
        }
        let id = match row_id(&row) {
            Some(id) => id,
            None => {
                let generated = uuid::Uuid::new_v4().to_string();
                row["id"] = Value::String(generated.clone());
                generated
            }
        };

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let guard = self.data.pin();
        if guard
            .try_insert(make_row_key(record_type, &id), (seq, row.clone()))
            .is_err()
        {
            return Err(StorageError::already_exists(record_type, id));
        }
        Ok(row)
    }

    async fn delete(&self, record_type: &str, id: &str) -> Result<bool, StorageError> {
        let guard = self.data.pin();
        Ok(guard.remove(&make_row_key(record_type, id)).is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_list_in_creation_order() {
        let storage = InMemoryModelStorage::new();
        storage
            .create("Product", json!({"id": "b", "key": "PULSE_PORTAL"}))
            .await
            .unwrap();
        storage
            .create("Product", json!({"id": "a", "key": "PULSE_SIGINT"}))
            .await
            .unwrap();
        storage
            .create("ServiceLevel", json!({"key": "FREE"}))
            .await
            .unwrap();

        let products = storage.list("Product").await.unwrap();
        let keys: Vec<&str> = products.iter().map(|p| p["key"].as_str().unwrap()).collect();
        assert_eq!(keys, vec!["PULSE_PORTAL", "PULSE_SIGINT"]);
        assert_eq!(storage.count("ServiceLevel"), 1);
    }

    #[tokio::test]
    async fn test_create_generates_id_when_missing() {
        let storage = InMemoryModelStorage::new();
        let created = storage.create("UserType", json!({"key": "customer"})).await.unwrap();
        let id = created["id"].as_str().unwrap();
        assert!(!id.is_empty());
        assert!(storage.delete("UserType", id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_integer_id_conflicts() {
        let storage = InMemoryModelStorage::new();
        storage.create("Migration", json!({"id": 1, "name": "a"})).await.unwrap();
        let err = storage
            .create("Migration", json!({"id": 1, "name": "b"}))
            .await
            .unwrap_err();
        assert!(err.is_already_exists());

        assert!(storage.delete("Migration", "1").await.unwrap());
        assert!(!storage.delete("Migration", "1").await.unwrap());
    }

    #[tokio::test]
    async fn test_non_object_rows_are_rejected() {
        let storage = InMemoryModelStorage::new();
        let err = storage.create("Product", json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord { .. }));
    }
}
