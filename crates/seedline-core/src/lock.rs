//! Advisory lease stored as the singleton `lock` item.
//!
//! The lease is acquired with an atomic conditional create. An existing lease
//! is replaced only when it has expired or the caller forces a takeover. This
//! is a lease, not a linearizable mutex: two callers racing at the instant of
//! expiry may both take over.

use std::sync::Arc;

use seedline_storage::{KeyValueTable, LOCK_KEY, LockRecord, StorageError};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Lease length in seconds.
pub const LEASE_DURATION_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockOptions {
    /// Replace a live holder.
    pub force_takeover: bool,
}

/// Result of an acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockAcquisition {
    /// The lock was free.
    Acquired(LockRecord),
    /// An expired or forcibly replaced holder was overwritten.
    TookOver {
        record: LockRecord,
        previous: LockRecord,
    },
    /// Another holder owns a live lease.
    Denied { existing: LockRecord },
}

impl LockAcquisition {
    pub fn is_acquired(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }

    /// The lease now held by this caller, if any.
    pub fn record(&self) -> Option<&LockRecord> {
        match self {
            Self::Acquired(record) | Self::TookOver { record, .. } => Some(record),
            Self::Denied { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakeoverDecision {
    TakeOver { forced: bool },
    Deny,
}

/// Decides whether an existing lease may be replaced.
///
/// A lease without a known expiry is never stale; only a forced takeover
/// replaces it.
pub fn decide_takeover(existing: &LockRecord, now_epoch: i64, force: bool) -> TakeoverDecision {
    if force || existing.is_expired_at(now_epoch) {
        TakeoverDecision::TakeOver { forced: force }
    } else {
        TakeoverDecision::Deny
    }
}

/// The migration lock over a key-value table.
pub struct MigrationLock<T: ?Sized> {
    table: Arc<T>,
    lease_secs: i64,
}

impl<T: ?Sized> Clone for MigrationLock<T> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            lease_secs: self.lease_secs,
        }
    }
}

impl<T: KeyValueTable + ?Sized> MigrationLock<T> {
    pub fn new(table: Arc<T>) -> Self {
        Self {
            table,
            lease_secs: LEASE_DURATION_SECS,
        }
    }

    #[must_use]
    pub fn with_lease_secs(mut self, lease_secs: i64) -> Self {
        self.lease_secs = lease_secs;
        self
    }

    pub async fn acquire(&self, options: LockOptions) -> Result<LockAcquisition, StorageError> {
        self.acquire_at(options, OffsetDateTime::now_utc()).await
    }

    /// Acquires the lock as of `now`.
    pub async fn acquire_at(
        &self,
        options: LockOptions,
        now: OffsetDateTime,
    ) -> Result<LockAcquisition, StorageError> {
        let fresh = LockRecord::fresh(now, self.lease_secs);
        let mut retried = false;

        loop {
            if self.table.put_if_absent(LOCK_KEY, fresh.to_item()?).await? {
                info!(expires_at = fresh.expires_at, "Lock acquired");
                return Ok(LockAcquisition::Acquired(fresh));
            }

            let Some(item) = self.table.get(LOCK_KEY).await? else {
                if retried {
                    warn!("Lock changed hands twice during acquisition");
                    return Ok(LockAcquisition::Denied {
                        existing: LockRecord::unreadable(),
                    });
                }
                // Released between the create and the read.
                debug!("Lock vanished, retrying conditional create");
                retried = true;
                continue;
            };

            let existing = LockRecord::from_item(&item).unwrap_or_else(|e| {
                warn!(error = %e, "Existing lock is unreadable");
                LockRecord::unreadable()
            });

            return match decide_takeover(&existing, now.unix_timestamp(), options.force_takeover) {
                TakeoverDecision::TakeOver { forced } => {
                    let record = LockRecord::takeover(now, self.lease_secs, forced);
                    self.table.put(LOCK_KEY, record.to_item()?).await?;
                    warn!(
                        forced,
                        previous_expires_at = existing.expires_at,
                        "Lock taken over"
                    );
                    Ok(LockAcquisition::TookOver {
                        record,
                        previous: existing,
                    })
                }
                TakeoverDecision::Deny => {
                    info!(expires_at = existing.expires_at, "Lock held by another run");
                    Ok(LockAcquisition::Denied { existing })
                }
            };
        }
    }

    /// Deletes the lease unconditionally.
    ///
    /// Returns `Ok(false)` if there was no lease to delete.
    pub async fn release(&self) -> Result<bool, StorageError> {
        let released = self.table.delete(LOCK_KEY).await?;
        debug!(released, "Lock released");
        Ok(released)
    }

    /// Reads the current lease without touching it.
    pub async fn current(&self) -> Result<Option<LockRecord>, StorageError> {
        Ok(self.table.get(LOCK_KEY).await?.map(|item| {
            LockRecord::from_item(&item).unwrap_or_else(|_| LockRecord::unreadable())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use seedline_db_memory::InMemoryKvTable;
    use seedline_storage::Item;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::macros::datetime;

    fn stale_lease(now: OffsetDateTime) -> LockRecord {
        LockRecord::fresh(now - time::Duration::seconds(600), LEASE_DURATION_SECS)
    }

    #[test]
    fn test_decide_takeover() {
        let now = datetime!(2025-01-01 12:00 UTC);
        let live = LockRecord::fresh(now, LEASE_DURATION_SECS);
        let epoch = now.unix_timestamp();

        assert_eq!(decide_takeover(&live, epoch, false), TakeoverDecision::Deny);
        assert_eq!(
            decide_takeover(&live, epoch, true),
            TakeoverDecision::TakeOver { forced: true }
        );
        assert_eq!(
            decide_takeover(&stale_lease(now), epoch, false),
            TakeoverDecision::TakeOver { forced: false }
        );
        // Expiry is strict.
        assert_eq!(
            decide_takeover(&live, live.expires_at, false),
            TakeoverDecision::Deny
        );
        assert_eq!(
            decide_takeover(&LockRecord::unreadable(), i64::MAX, false),
            TakeoverDecision::Deny
        );
    }

    #[tokio::test]
    async fn test_concurrent_acquire_has_one_winner() {
        let lock = MigrationLock::new(Arc::new(InMemoryKvTable::new()));
        let (a, b) = tokio::join!(
            lock.acquire(LockOptions::default()),
            lock.acquire(LockOptions::default())
        );
        let outcomes = [a.unwrap(), b.unwrap()];
        assert_eq!(outcomes.iter().filter(|o| o.is_acquired()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|o| matches!(o, LockAcquisition::Denied { .. }))
        );
    }

    #[tokio::test]
    async fn test_stale_lease_is_taken_over() {
        let table = Arc::new(InMemoryKvTable::new());
        let now = datetime!(2025-01-01 12:00 UTC);
        table
            .put(LOCK_KEY, stale_lease(now).to_item().unwrap())
            .await
            .unwrap();

        let lock = MigrationLock::new(table);
        let outcome = lock.acquire_at(LockOptions::default(), now).await.unwrap();
        let LockAcquisition::TookOver { record, .. } = outcome else {
            panic!("expected takeover, got {outcome:?}");
        };
        assert_eq!(record.takeover_at, Some(now));
        assert_eq!(record.forced, Some(false));
        assert_eq!(lock.current().await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_forced_takeover_of_live_lease() {
        let table = Arc::new(InMemoryKvTable::new());
        let lock = MigrationLock::new(table);
        let now = datetime!(2025-01-01 12:00 UTC);

        assert!(
            lock.acquire_at(LockOptions::default(), now)
                .await
                .unwrap()
                .is_acquired()
        );
        let denied = lock.acquire_at(LockOptions::default(), now).await.unwrap();
        assert!(matches!(denied, LockAcquisition::Denied { .. }));

        let forced = lock
            .acquire_at(LockOptions { force_takeover: true }, now)
            .await
            .unwrap();
        assert_eq!(forced.record().and_then(|r| r.forced), Some(true));
    }

    #[tokio::test]
    async fn test_unreadable_lock_is_not_stale() {
        let table = Arc::new(InMemoryKvTable::new());
        let mut junk = Item::new();
        junk.insert("acquiredAt".into(), serde_json::json!(42));
        table.put(LOCK_KEY, junk).await.unwrap();

        let lock = MigrationLock::new(table);
        let outcome = lock.acquire(LockOptions::default()).await.unwrap();
        assert_eq!(
            outcome,
            LockAcquisition::Denied {
                existing: LockRecord::unreadable()
            }
        );
    }

    #[tokio::test]
    async fn test_release_frees_the_lock() {
        let lock = MigrationLock::new(Arc::new(InMemoryKvTable::new()));
        lock.acquire(LockOptions::default()).await.unwrap();
        assert!(lock.release().await.unwrap());
        assert!(!lock.release().await.unwrap());
        assert!(lock.current().await.unwrap().is_none());
        assert!(
            lock.acquire(LockOptions::default())
                .await
                .unwrap()
                .is_acquired()
        );
    }

    /// Reports a conflict on the first conditional create, then nothing on read.
    struct VanishingTable {
        inner: InMemoryKvTable,
        conflicts: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueTable for VanishingTable {
        async fn put_if_absent(&self, key: &str, item: Item) -> Result<bool, StorageError> {
            if self.conflicts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(false);
            }
            self.inner.put_if_absent(key, item).await
        }
        async fn get(&self, key: &str) -> Result<Option<Item>, StorageError> {
            self.inner.get(key).await
        }
        async fn put(&self, key: &str, item: Item) -> Result<(), StorageError> {
            self.inner.put(key, item).await
        }
        async fn delete(&self, key: &str) -> Result<bool, StorageError> {
            self.inner.delete(key).await
        }
        async fn scan(&self) -> Result<Vec<(String, Item)>, StorageError> {
            self.inner.scan().await
        }
        fn backend_name(&self) -> &'static str {
            "vanishing"
        }
    }

    #[tokio::test]
    async fn test_retries_once_when_lock_vanishes() {
        let table = Arc::new(VanishingTable {
            inner: InMemoryKvTable::new(),
            conflicts: AtomicUsize::new(0),
        });
        let lock = MigrationLock::new(table.clone());
        let outcome = lock.acquire(LockOptions::default()).await.unwrap();
        assert!(matches!(outcome, LockAcquisition::Acquired(_)));
        assert_eq!(table.conflicts.load(Ordering::SeqCst), 2);
    }
}
