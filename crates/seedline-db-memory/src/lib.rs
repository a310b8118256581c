//! In-memory storage backends for Seedline.
//!
//! This crate provides in-memory implementations of the `KeyValueTable` and
//! `ModelStorage` traits from `seedline-storage`, using papaya lock-free
//! HashMap for concurrent access.
//!
//! # Example
//!
//! ```ignore
//! use seedline_db_memory::InMemoryKvTable;
//! use seedline_storage::KeyValueTable;
//!
//! let table = InMemoryKvTable::new();
//! let created = table.put_if_absent("lock", item).await?;
//! ```

pub mod kv;
pub mod model;

// Re-export the storage traits for convenience
pub use seedline_storage::{KeyValueTable, ModelStorage, StorageError};

pub use kv::InMemoryKvTable;
pub use model::{InMemoryModelStorage, RowKey};

/// Creates a shared in-memory key-value table.
pub fn create_kv_table() -> seedline_storage::DynKeyValueTable {
    std::sync::Arc::new(InMemoryKvTable::new())
}

/// Creates a shared in-memory data model.
pub fn create_model_storage() -> seedline_storage::DynModelStorage {
    std::sync::Arc::new(InMemoryModelStorage::new())
}
