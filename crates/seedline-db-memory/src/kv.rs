use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;
use seedline_storage::{Item, KeyValueTable, StorageError};
use std::sync::Arc;

/// In-memory key-value table using papaya lock-free HashMap.
///
/// `put_if_absent` maps onto papaya's atomic `try_insert`, so concurrent
/// conditional creates against the same key have exactly one winner.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKvTable {
    data: Arc<PapayaHashMap<String, Item>>,
}

impl InMemoryKvTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items currently stored.
    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    /// Returns `true` if the table holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueTable for InMemoryKvTable {
    async fn put_if_absent(&self, key: &str, item: Item) -> Result<bool, StorageError> {
        let guard = self.data.pin();
        Ok(guard.try_insert(key.to_string(), item).is_ok())
    }

    async fn get(&self, key: &str) -> Result<Option<Item>, StorageError> {
        let guard = self.data.pin();
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: &str, item: Item) -> Result<(), StorageError> {
        let guard = self.data.pin();
        guard.insert(key.to_string(), item);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let guard = self.data.pin();
        Ok(guard.remove(key).is_some())
    }

    async fn scan(&self) -> Result<Vec<(String, Item)>, StorageError> {
        let guard = self.data.pin();
        let mut items: Vec<(String, Item)> = guard
            .iter()
            .map(|(key, item)| (key.clone(), item.clone()))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(items)
    }

    fn backend_name(&self) -> &'static str {
        "memory-kv"
    }
}
