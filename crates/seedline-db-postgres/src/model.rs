//! Application data model on top of the `seedline_record` table.

use async_trait::async_trait;
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use uuid::Uuid;

use seedline_storage::{ModelStorage, StorageError};

use crate::error::map_query_error;

/// Renders a row id as a string; integer ids are accepted.
fn row_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// PostgreSQL-backed data model.
///
/// Rows are keyed by `(record_type, id)` and listed in insertion order.
#[derive(Debug, Clone)]
pub struct PostgresModelStorage {
    pool: PgPool,
}

impl PostgresModelStorage {
    /// Creates a data-model handle on an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModelStorage for PostgresModelStorage {
    async fn list(&self, record_type: &str) -> Result<Vec<Value>, StorageError> {
        let rows: Vec<(Value,)> =
            query_as("SELECT data FROM seedline_record WHERE record_type = $1 ORDER BY seq")
                .bind(record_type)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_query_error("list", e))?;

        Ok(rows.into_iter().map(|(data,)| data).collect())
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
                let generated = Uuid::new_v4().to_string();
                row["id"] = Value::String(generated.clone());
                generated
            }
        };

        let result = query(
            r#"INSERT INTO seedline_record (record_type, id, data) VALUES ($1, $2, $3)
               ON CONFLICT (record_type, id) DO NOTHING"#,
        )
        .bind(record_type)
        .bind(&id)
        .bind(&row)
        .execute(&self.pool)
        .await
        .map_err(|e| map_query_error("create", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::already_exists(record_type, id));
        }
        Ok(row)
    }

    async fn delete(&self, record_type: &str, id: &str) -> Result<bool, StorageError> {
        let result = query("DELETE FROM seedline_record WHERE record_type = $1 AND id = $2")
            .bind(record_type)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_query_error("delete", e))?;

        Ok(result.rows_affected() > 0)
    }

    fn backend_name(&self) -> &'static str {
        "postgres-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_id_accepts_strings_and_numbers() {
        assert_eq!(row_id(&json!({"id": "abc"})), Some("abc".to_string()));
        assert_eq!(row_id(&json!({"id": 7})), Some("7".to_string()));
        assert_eq!(row_id(&json!({"id": ""})), None);
        assert_eq!(row_id(&json!({"key": "x"})), None);
    }
}
