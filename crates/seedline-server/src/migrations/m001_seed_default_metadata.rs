use async_trait::async_trait;
use seedline_core::MigrationBody;
use seedline_storage::ModelStorage;
use serde_json::{Map, Value, json};

use super::ensure_by_key;

const APPLICATION_TYPES: &[(&str, &str, &str, i64)] = &[
    ("web_app", "Web Application", "Browser-accessed application", 1),
    ("api_service", "API / Service", "Backend or service API", 2),
    ("mobile", "Mobile App", "iOS/Android mobile application", 3),
    ("cloud", "Cloud / Infra", "Cloud or infrastructure component", 4),
    ("other", "Other", "Other / miscellaneous application type", 5),
];

const USER_TYPES: &[(&str, &str, &str, i64)] = &[
    ("customer", "Customer", "External customer users", 1),
    ("employee", "Employee", "Internal employees", 2),
    ("public", "Public", "General public audience", 3),
    ("restricted", "Restricted", "Limited privileged users", 4),
];

fn rows(defs: &[(&str, &str, &str, i64)]) -> Vec<Map<String, Value>> {
    defs.iter()
        .filter_map(|(key, label, description, rank)| {
            json!({ "key": key, "label": label, "description": description, "rank": rank })
                .as_object()
                .cloned()
        })
        .collect()
}

/// Default `ApplicationType` and `UserType` rows.
pub struct SeedDefaultMetadata;

#[async_trait]
impl MigrationBody for SeedDefaultMetadata {
    async fn up(&self, data: &dyn ModelStorage) -> anyhow::Result<()> {
        let app_types = ensure_by_key(data, "ApplicationType", rows(APPLICATION_TYPES)).await?;
        let user_types = ensure_by_key(data, "UserType", rows(USER_TYPES)).await?;
        tracing::info!(app_types, user_types, "Default metadata seeded");
        Ok(())
    }
}
