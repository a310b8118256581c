//! Sequential, halt-on-first-failure migration execution.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures_util::FutureExt;
use seedline_storage::{MigrationStateStore, ModelStorage, NewAppliedMigration, StorageError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::catalog::{Catalog, MigrationDefinition};

/// The migration that stopped a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedMigration {
    pub id: i64,
    pub name: String,
    pub error: String,
}

/// Outcome of one runner invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Size of the catalog.
    pub attempted: usize,
    pub applied: usize,
    pub skipped: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<FailedMigration>,
    /// Highest id in the catalog, whether or not it ran.
    pub latest_id: i64,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

async fn apply(
    migration: &MigrationDefinition,
    checksum: &str,
    store: &dyn MigrationStateStore,
    data: &dyn ModelStorage,
) -> anyhow::Result<()> {
    migration.body().up(data).await?;
    store
        .record_applied(NewAppliedMigration {
            id: migration.id,
            name: migration.name.clone(),
            checksum: checksum.to_string(),
        })
        .await?;
    Ok(())
}

/// Applies every pending migration in ascending id order.
///
/// Applied ids are re-read from `store` on every call. A failing body or
/// applied-record write stops the run and is reported in
/// [`Summary::failed`]; later migrations stay pending. Only a failure to
/// read the applied set is returned as an error.
pub async fn run_migrations(
    catalog: &Catalog,
    store: &dyn MigrationStateStore,
    data: &dyn ModelStorage,
) -> Result<Summary, StorageError> {
    let started = Instant::now();
    info!(
        total = catalog.len(),
        adapter = store.adapter_name(),
        "Starting migration run"
    );

    let applied_ids = store.list_applied_ids().await?;
    debug!(count = applied_ids.ids.len(), "Loaded applied migrations");

    let mut applied = 0;
    let mut skipped = 0;
    let mut failed = None;

    for migration in catalog.iter() {
        if applied_ids.contains(migration.id) {
            skipped += 1;
            debug!(id = migration.id, name = %migration.name, "Skip already applied");
            continue;
        }

        let checksum = migration.checksum();
        info!(id = migration.id, name = %migration.name, "Applying migration");

        let outcome = AssertUnwindSafe(apply(migration, &checksum, store, data))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(anyhow::anyhow!(
                    "migration panicked: {}",
                    panic_message(payload.as_ref())
                ))
            });

        match outcome {
            Ok(()) => {
                applied += 1;
                info!(id = migration.id, name = %migration.name, %checksum, "Applied migration");
            }
            Err(e) => {
                let failure = FailedMigration {
                    id: migration.id,
                    name: migration.name.clone(),
                    error: format!("{e:#}"),
                };
                error!(id = failure.id, name = %failure.name, error = %failure.error, "Migration failed");
                failed = Some(failure);
                break;
            }
        }
    }

    info!(
        applied,
        skipped,
        failed = u8::from(failed.is_some()),
        duration_ms = started.elapsed().as_millis() as u64,
        "Migration run complete"
    );

    Ok(Summary {
        attempted: catalog.len(),
        applied,
        skipped,
        failed,
        latest_id: catalog.latest_id(),
    })
}
