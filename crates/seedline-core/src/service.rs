//! Trigger orchestration: lock, purge, run, release.

use std::collections::HashSet;
use std::sync::Arc;

use seedline_storage::{
    AppliedMigration, DynKeyValueTable, DynModelStorage, DynStateStore, KeyValueTable, LockRecord,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::catalog::Catalog;
use crate::error::Result;
use crate::lock::{LockAcquisition, LockOptions, MigrationLock};
use crate::runner::{Summary, run_migrations};

/// Options for a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunRequest {
    /// Replace a live lock holder.
    pub takeover: bool,
    /// Ids whose applied records are deleted before the run.
    pub rerun_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub summary: Summary,
    pub takeover: bool,
    pub rerun_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunReport),
    /// Another run holds a live lease; nothing was done.
    Locked { takeover_requested: bool },
}

/// Read-only view of applied state and the lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub migrations: Vec<AppliedMigration>,
    pub lock: Option<LockRecord>,
}

fn dedup_preserving_order(ids: Vec<i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Runs the catalog under the migration lock.
#[derive(Clone)]
pub struct MigrationService {
    catalog: Arc<Catalog>,
    store: DynStateStore,
    data: DynModelStorage,
    lock: MigrationLock<dyn KeyValueTable>,
}

impl MigrationService {
    /// `lock_table` holds the lease; it may be the same table the keyed
    /// adapter stores applied records in.
    pub fn new(
        catalog: Catalog,
        store: DynStateStore,
        data: DynModelStorage,
        lock_table: DynKeyValueTable,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            store,
            data,
            lock: MigrationLock::new(lock_table),
        }
    }

    #[must_use]
    pub fn with_lease_secs(mut self, lease_secs: i64) -> Self {
        self.lock = self.lock.with_lease_secs(lease_secs);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn adapter_name(&self) -> &'static str {
        self.store.adapter_name()
    }

    /// Acquires the lock, purges re-run ids, runs pending migrations and
    /// releases the lock.
    ///
    /// Release is attempted whenever the lock was acquired, including when
    /// the purge or the applied-id read fails. Release errors are logged and
    /// dropped; the lease then expires on its own.
    #[instrument(skip(self), fields(adapter = self.store.adapter_name()))]
    pub async fn run(&self, request: RunRequest) -> Result<RunOutcome> {
        let rerun_ids = dedup_preserving_order(request.rerun_ids);

        let acquisition = self
            .lock
            .acquire(LockOptions {
                force_takeover: request.takeover,
            })
            .await?;
        if let LockAcquisition::Denied { existing } = &acquisition {
            info!(
                expires_at = existing.expires_at,
                takeover_requested = request.takeover,
                "Run refused, lock is held"
            );
            return Ok(RunOutcome::Locked {
                takeover_requested: request.takeover,
            });
        }

        let result = self.run_locked(&rerun_ids).await;

        if let Err(e) = self.lock.release().await {
            warn!(error = %e, "Failed to release migration lock");
        }

        Ok(RunOutcome::Completed(RunReport {
            summary: result?,
            takeover: request.takeover,
            rerun_ids,
        }))
    }

    async fn run_locked(&self, rerun_ids: &[i64]) -> Result<Summary> {
        for &id in rerun_ids {
            if self.store.delete_applied(id).await? {
                info!(id, "Purged applied record for re-run");
            } else {
                debug!(id, "No applied record to purge");
            }
        }

        Ok(run_migrations(&self.catalog, self.store.as_ref(), self.data.as_ref()).await?)
    }

    /// Applied records (ascending id) and the current lease.
    pub async fn state(&self) -> Result<StateSnapshot> {
        let migrations = self.store.list_applied().await?;
        let lock = self.lock.current().await?;
        Ok(StateSnapshot { migrations, lock })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        assert_eq!(dedup_preserving_order(vec![3, 1, 3, 2, 1]), vec![3, 1, 2]);
        assert!(dedup_preserving_order(Vec::new()).is_empty());
    }

    #[test]
    fn test_request_defaults() {
        let request: RunRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, RunRequest::default());

        let request: RunRequest =
            serde_json::from_str(r#"{"takeover": true, "rerunIds": [2]}"#).unwrap();
        assert!(request.takeover);
        assert_eq!(request.rerun_ids, vec![2]);
    }
}
