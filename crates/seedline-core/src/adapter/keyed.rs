use std::sync::Arc;

use async_trait::async_trait;
use seedline_storage::{
    AppliedIds, AppliedMigration, KeyValueTable, MigrationStateStore, NewAppliedMigration,
    StorageError, migration_key, parse_migration_key,
};
use tracing::warn;

/// Applied state kept as one `migration#<id>` item per migration.
///
/// The lock item shares the table and is ignored by every read here.
pub struct KeyedStateStore<T: ?Sized> {
    table: Arc<T>,
}

impl<T: KeyValueTable + ?Sized> KeyedStateStore<T> {
    pub fn new(table: Arc<T>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<T> {
        &self.table
    }
}

impl<T: ?Sized> Clone for KeyedStateStore<T> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

#[async_trait]
impl<T: KeyValueTable + ?Sized> MigrationStateStore for KeyedStateStore<T> {
    async fn list_applied_ids(&self) -> Result<AppliedIds, StorageError> {
        let items = self.table.scan().await?;
        let ids = items
            .iter()
            .filter_map(|(key, _)| parse_migration_key(key))
            .collect();
        Ok(AppliedIds::from_unsorted(ids))
    }

    async fn record_applied(&self, migration: NewAppliedMigration) -> Result<(), StorageError> {
        let record = AppliedMigration::now(&migration);
        self.table
            .put(&migration_key(record.id), record.to_item()?)
            .await
    }

    async fn list_applied(&self) -> Result<Vec<AppliedMigration>, StorageError> {
        let items = self.table.scan().await?;
        let mut records: Vec<AppliedMigration> = items
            .iter()
            .filter_map(|(key, item)| {
                let id = parse_migration_key(key)?;
                match AppliedMigration::from_item(id, item) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Skipping unreadable applied record");
                        None
                    }
                }
            })
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn delete_applied(&self, id: i64) -> Result<bool, StorageError> {
        self.table.delete(&migration_key(id)).await
    }

    fn adapter_name(&self) -> &'static str {
        "keyed"
    }
}
