//! Migrations shipped with the server.
//!
//! Append new migrations with the next id; never renumber or remove one that
//! has been deployed.

mod m001_seed_default_metadata;
mod m002_add_pulse_products;

use seedline_core::{Catalog, CatalogError, MigrationDefinition};
use seedline_storage::ModelStorage;
use serde_json::{Map, Value};
use tracing::info;

pub use m001_seed_default_metadata::SeedDefaultMetadata;
pub use m002_add_pulse_products::AddPulseProducts;

/// The built-in catalog.
pub fn catalog() -> Result<Catalog, CatalogError> {
    Catalog::new([
        MigrationDefinition::new(1, "seed_default_metadata", SeedDefaultMetadata)
            .with_content_hash("application_user_types_v1"),
        MigrationDefinition::new(2, "add_pulse_products", AddPulseProducts)
            .with_content_hash("pulse_products_and_service_levels_v1"),
    ])
}

/// Creates each row whose `key` is not present yet, marked `active`.
///
/// Returns the number of rows created.
pub(crate) async fn ensure_by_key(
    data: &dyn ModelStorage,
    record_type: &str,
    rows: Vec<Map<String, Value>>,
) -> anyhow::Result<usize> {
    let existing = data.list(record_type).await?;
    let mut created = 0;
    for mut row in rows {
        let key = row.get("key").and_then(Value::as_str).unwrap_or_default();
        if existing.iter().any(|r| r["key"].as_str() == Some(key)) {
            continue;
        }
        info!(record_type, key, "Creating default row");
        row.insert("active".into(), Value::Bool(true));
        data.create(record_type, Value::Object(row)).await?;
        created += 1;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedline_core::{MigrationDefinition, checksum};
    use seedline_db_memory::InMemoryModelStorage;

    #[test]
    fn test_catalog_is_valid_and_ordered() {
        let catalog = catalog().unwrap();
        let ids: Vec<i64> = catalog.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(catalog.latest_id(), 2);

        let first: &MigrationDefinition = catalog.get(1).unwrap();
        assert_eq!(
            first.checksum(),
            checksum("seed_default_metadata", Some("application_user_types_v1"))
        );
    }

    #[tokio::test]
    async fn test_bodies_are_rerun_safe() {
        let data = InMemoryModelStorage::new();
        let catalog = catalog().unwrap();
        for _ in 0..2 {
            for m in catalog.iter() {
                m.body().up(&data).await.unwrap();
            }
        }
        assert_eq!(data.count("ApplicationType"), 5);
        assert_eq!(data.count("UserType"), 4);
        assert_eq!(data.count("Product"), 2);
        assert_eq!(data.count("ServiceLevel"), 3);
    }
}
