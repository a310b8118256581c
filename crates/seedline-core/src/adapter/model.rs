use std::sync::Arc;

use async_trait::async_trait;
use seedline_storage::{
    AppliedIds, AppliedMigration, MIGRATION_RECORD_TYPE, MigrationStateStore, ModelStorage,
    NewAppliedMigration, StorageError,
};
use serde_json::Value;
use tracing::{debug, warn};

fn row_migration_id(row: &Value) -> Option<i64> {
    match row.get("id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Applied state kept as `Migration` rows in the application data model.
pub struct ModelStateStore<M: ?Sized> {
    data: Arc<M>,
}

impl<M: ModelStorage + ?Sized> ModelStateStore<M> {
    pub fn new(data: Arc<M>) -> Self {
        Self { data }
    }
}

impl<M: ?Sized> Clone for ModelStateStore<M> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

#[async_trait]
impl<M: ModelStorage + ?Sized> MigrationStateStore for ModelStateStore<M> {
    async fn list_applied_ids(&self) -> Result<AppliedIds, StorageError> {
        let rows = self.data.list(MIGRATION_RECORD_TYPE).await?;
        let ids = rows.iter().filter_map(row_migration_id).collect();
        Ok(AppliedIds::from_unsorted(ids))
    }

    async fn record_applied(&self, migration: NewAppliedMigration) -> Result<(), StorageError> {
        let row = AppliedMigration::now(&migration).to_row()?;
        match self.data.create(MIGRATION_RECORD_TYPE, row.clone()).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_already_exists() => {
                // A leftover row from an interrupted attempt; replace it.
                debug!(id = migration.id, "Replacing existing applied row");
                self.data
                    .delete(MIGRATION_RECORD_TYPE, &migration.id.to_string())
                    .await?;
                self.data.create(MIGRATION_RECORD_TYPE, row).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn list_applied(&self) -> Result<Vec<AppliedMigration>, StorageError> {
        let rows = self.data.list(MIGRATION_RECORD_TYPE).await?;
        let mut records: Vec<AppliedMigration> = rows
            .iter()
            .filter_map(|row| match AppliedMigration::from_row(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable applied row");
                    None
                }
            })
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn delete_applied(&self, id: i64) -> Result<bool, StorageError> {
        self.data
            .delete(MIGRATION_RECORD_TYPE, &id.to_string())
            .await
    }

    fn adapter_name(&self) -> &'static str {
        "model"
    }
}
