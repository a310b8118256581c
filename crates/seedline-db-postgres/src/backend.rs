use sqlx_postgres::PgPool;

use seedline_storage::StorageError;

use crate::config::PostgresConfig;
use crate::kv::PostgresKvTable;
use crate::model::PostgresModelStorage;
use crate::{migrations, pool};

/// Shared connection pool from which the table and data-model handles are made.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Connects with the given configuration.
    ///
    /// This will:
    /// 1. Create a connection pool
    /// 2. Create the state and record tables (if configured)
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created
    /// or if the schema setup fails.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Wraps an existing connection pool. Tables are not created.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Key-value table handle.
    #[must_use]
    pub fn kv_table(&self) -> PostgresKvTable {
        PostgresKvTable::new(self.pool.clone())
    }

    /// Data-model handle.
    #[must_use]
    pub fn model_storage(&self) -> PostgresModelStorage {
        PostgresModelStorage::new(self.pool.clone())
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
