//! Key-value table on top of the `seedline_state` table.

use async_trait::async_trait;
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;

use seedline_storage::{Item, KeyValueTable, StorageError};

use crate::error::map_query_error;

fn into_item(key: &str, value: Value) -> Result<Item, StorageError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::invalid_record(format!(
            "item {key} is not a JSON object: {other}"
        ))),
    }
}

/// PostgreSQL-backed key-value table.
///
/// `put_if_absent` relies on the primary key: `INSERT .. ON CONFLICT DO NOTHING`
/// affects exactly one row for the single winner of a race.
#[derive(Debug, Clone)]
pub struct PostgresKvTable {
    pool: PgPool,
}

impl PostgresKvTable {
    /// Creates a table handle on an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueTable for PostgresKvTable {
    async fn put_if_absent(&self, key: &str, item: Item) -> Result<bool, StorageError> {
        let result = query(
            "INSERT INTO seedline_state (pk, item) VALUES ($1, $2) ON CONFLICT (pk) DO NOTHING",
        )
        .bind(key)
        .bind(Value::Object(item))
        .execute(&self.pool)
        .await
        .map_err(|e| map_query_error("conditional put", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, key: &str) -> Result<Option<Item>, StorageError> {
        let row: Option<(Value,)> = query_as("SELECT item FROM seedline_state WHERE pk = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_query_error("get", e))?;

        row.map(|(value,)| into_item(key, value)).transpose()
    }

    async fn put(&self, key: &str, item: Item) -> Result<(), StorageError> {
        query(
            r#"INSERT INTO seedline_state (pk, item) VALUES ($1, $2)
               ON CONFLICT (pk) DO UPDATE SET item = EXCLUDED.item, updated_at = now()"#,
        )
        .bind(key)
        .bind(Value::Object(item))
        .execute(&self.pool)
        .await
        .map_err(|e| map_query_error("put", e))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let result = query("DELETE FROM seedline_state WHERE pk = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| map_query_error("delete", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn scan(&self) -> Result<Vec<(String, Item)>, StorageError> {
        let rows: Vec<(String, Value)> =
            query_as("SELECT pk, item FROM seedline_state ORDER BY pk")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_query_error("scan", e))?;

        rows.into_iter()
            .map(|(key, value)| {
                let item = into_item(&key, value)?;
                Ok((key, item))
            })
            .collect()
    }

    fn backend_name(&self) -> &'static str {
        "postgres-kv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_item_rejects_non_objects() {
        let item = into_item("lock", json!({"expiresAt": 10})).unwrap();
        assert_eq!(item["expiresAt"], 10);

        let err = into_item("lock", json!("nope")).unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord { .. }));
    }
}
