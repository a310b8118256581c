//! Backend selection from configuration.

use std::sync::Arc;

use seedline_core::{KeyedStateStore, ModelStateStore};
use seedline_db_memory::{InMemoryKvTable, InMemoryModelStorage};
use seedline_db_postgres::PostgresBackend;
use seedline_storage::{DynKeyValueTable, DynModelStorage, DynStateStore, StorageError};
use tracing::info;

use crate::config::{StateAdapter, StorageBackend, StorageConfig};

/// The key-value table (lock and keyed state) and the application data model.
#[derive(Clone)]
pub struct StorageHandles {
    pub kv: DynKeyValueTable,
    pub data: DynModelStorage,
}

impl StorageHandles {
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(InMemoryKvTable::new()),
            data: Arc::new(InMemoryModelStorage::new()),
        }
    }

    /// The applied-state adapter selected by `adapter`.
    pub fn state_store(&self, adapter: StateAdapter) -> DynStateStore {
        match adapter {
            StateAdapter::Keyed => Arc::new(KeyedStateStore::new(self.kv.clone())),
            StateAdapter::Model => Arc::new(ModelStateStore::new(self.data.clone())),
        }
    }
}

/// Opens the configured backend.
pub async fn connect(cfg: &StorageConfig) -> Result<StorageHandles, StorageError> {
    match cfg.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage");
            Ok(StorageHandles::in_memory())
        }
        StorageBackend::Postgres => {
            let pg = cfg.postgres.as_ref().ok_or_else(|| {
                StorageError::connection_error("storage.postgres section is missing")
            })?;
            let backend = PostgresBackend::new(pg.to_backend_config()).await?;
            info!("Using PostgreSQL storage");
            Ok(StorageHandles {
                kv: Arc::new(backend.kv_table()),
                data: Arc::new(backend.model_storage()),
            })
        }
    }
}
