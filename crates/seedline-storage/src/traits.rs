//! Storage traits for the Seedline storage abstraction layer.
//!
//! Two store primitives are defined here (a key-value table and an application
//! data model) together with the migration state contract that the runner is
//! written against.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::types::{AppliedIds, AppliedMigration, Item, NewAppliedMigration};

/// A key-value table offering atomic single-item conditional writes.
///
/// This is the only coordination primitive Seedline relies on: there are no
/// multi-item transactions and no built-in leases. Implementations must be
/// thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use seedline_storage::{KeyValueTable, StorageError, Item};
///
/// async fn claim(table: &dyn KeyValueTable, item: Item) -> Result<bool, StorageError> {
///     table.put_if_absent("lock", item).await
/// }
/// ```
#[async_trait]
pub trait KeyValueTable: Send + Sync {
    /// Creates the item only if no item exists under `key`.
    ///
    /// Returns `Ok(false)` if the key is already present; the existing item is
    /// left untouched. This must be atomic with respect to concurrent callers.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for an existing key.
    async fn put_if_absent(&self, key: &str, item: Item) -> Result<bool, StorageError>;

    /// Reads the item stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing items.
    async fn get(&self, key: &str) -> Result<Option<Item>, StorageError>;

    /// Writes the item unconditionally, replacing any existing item.
    async fn put(&self, key: &str, item: Item) -> Result<(), StorageError>;

    /// Deletes the item unconditionally.
    ///
    /// Returns `Ok(false)` if there was nothing to delete.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Returns every item in the table with its key.
    ///
    /// Tables used by Seedline are small (one item per migration plus the
    /// lock), so a full scan is acceptable.
    async fn scan(&self) -> Result<Vec<(String, Item)>, StorageError>;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Application data-model client.
///
/// Rows are JSON objects grouped by record type. This is also the opaque
/// data-access handle that migration bodies receive.
#[async_trait]
pub trait ModelStorage: Send + Sync {
    /// Lists every row of a record type.
    async fn list(&self, record_type: &str) -> Result<Vec<Value>, StorageError>;

    /// Creates a new row and returns it as stored.
    ///
    /// If the row has no `id`, the backend generates one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if a row with the same id exists.
    /// Returns `StorageError::InvalidRecord` if the row is not a JSON object.
    async fn create(&self, record_type: &str, row: Value) -> Result<Value, StorageError>;

    /// Deletes a row by id. Returns `Ok(false)` if it did not exist.
    async fn delete(&self, record_type: &str, id: &str) -> Result<bool, StorageError>;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Tracks which migrations have been applied.
///
/// Every operation must be safe to retry: a caller re-invoking a run after a
/// crash must not be corrupted by a partially written previous attempt.
#[async_trait]
pub trait MigrationStateStore: Send + Sync {
    /// Returns the ids of all applied migrations.
    async fn list_applied_ids(&self) -> Result<AppliedIds, StorageError>;

    /// Records a migration as applied, stamped with the current time.
    async fn record_applied(&self, migration: NewAppliedMigration) -> Result<(), StorageError>;

    /// Returns the full applied records, sorted by id.
    async fn list_applied(&self) -> Result<Vec<AppliedMigration>, StorageError>;

    /// Deletes the applied record for `id`, making it eligible again.
    ///
    /// Returns `Ok(false)` if no record existed.
    async fn delete_applied(&self, id: i64) -> Result<bool, StorageError>;

    /// Returns the name of this adapter for logging/debugging.
    fn adapter_name(&self) -> &'static str;
}
