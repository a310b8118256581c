//! # seedline-storage
//!
//! Storage abstraction layer for Seedline.
//!
//! This crate defines the traits and types that all storage backends must implement.
//! It does not contain any implementations - those are provided by separate crates.
//!
//! ## Overview
//!
//! - [`KeyValueTable`]: an item-per-key table with atomic conditional create.
//!   Holds the lock lease and, for the keyed adapter, one item per applied migration.
//! - [`ModelStorage`]: the application data model (rows grouped by record type).
//!   Migration bodies receive it as their data-access handle.
//! - [`MigrationStateStore`]: "which migrations have applied" and "record this one".
//!
//! ## Example
//!
//! ```ignore
//! use seedline_storage::{MigrationStateStore, StorageError};
//!
//! async fn latest_applied(store: &dyn MigrationStateStore) -> Result<Option<i64>, StorageError> {
//!     Ok(store.list_applied_ids().await?.latest())
//! }
//! ```

mod error;
mod traits;
mod types;

// Re-export everything from submodules
pub use error::StorageError;
pub use traits::{KeyValueTable, MigrationStateStore, ModelStorage};
pub use types::{
    AppliedIds, AppliedMigration, Item, LOCK_KEY, LockRecord, MIGRATION_KEY_PREFIX,
    MIGRATION_RECORD_TYPE, NewAppliedMigration, migration_key, parse_migration_key,
};

/// Type alias for a shared key-value table.
pub type DynKeyValueTable = std::sync::Arc<dyn KeyValueTable>;

/// Type alias for a shared data-model client.
pub type DynModelStorage = std::sync::Arc<dyn ModelStorage>;

/// Type alias for a shared migration state store.
pub type DynStateStore = std::sync::Arc<dyn MigrationStateStore>;
