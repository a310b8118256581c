use async_trait::async_trait;
use seedline_core::MigrationBody;
use seedline_storage::ModelStorage;
use serde_json::{Map, Value, json};

use super::ensure_by_key;

fn object(value: Value) -> Option<Map<String, Value>> {
    value.as_object().cloned()
}

/// Pulse products and the standard service levels.
pub struct AddPulseProducts;

#[async_trait]
impl MigrationBody for AddPulseProducts {
    async fn up(&self, data: &dyn ModelStorage) -> anyhow::Result<()> {
        let products = [
            json!({
                "key": "PULSE_SIGINT",
                "name": "Pulse SigInt",
                "description": "Signals Intelligence collection & analytics platform",
            }),
            json!({
                "key": "PULSE_PORTAL",
                "name": "Pulse Portal",
                "description": "Unified Pulse web portal for management & insights",
            }),
        ];
        // Service levels are global, not per product.
        let service_levels = [
            json!({ "key": "FREE", "name": "Free", "description": "Community / evaluation tier", "rank": 1 }),
            json!({ "key": "PRO", "name": "Pro", "description": "Professional subscription tier", "rank": 2 }),
            json!({
                "key": "ENTERPRISE",
                "name": "Enterprise",
                "description": "Enterprise-grade tier with advanced features",
                "rank": 3,
            }),
        ];

        ensure_by_key(data, "Product", products.into_iter().filter_map(object).collect()).await?;
        ensure_by_key(
            data,
            "ServiceLevel",
            service_levels.into_iter().filter_map(object).collect(),
        )
        .await?;
        Ok(())
    }
}
