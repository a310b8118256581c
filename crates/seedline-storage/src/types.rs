//! Shared record types for the Seedline storage abstraction layer.
//!
//! This module contains the persisted shapes (applied migration records and the
//! lock lease) together with the key layout used by key-value backends.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::error::StorageError;

/// A single item in a key-value table: a flat JSON attribute map.
pub type Item = Map<String, Value>;

/// Key of the singleton lock item.
pub const LOCK_KEY: &str = "lock";

/// Prefix of every applied-migration item key (`migration#<id>`).
pub const MIGRATION_KEY_PREFIX: &str = "migration#";

/// Record type name used by data-model backends for applied migrations.
pub const MIGRATION_RECORD_TYPE: &str = "Migration";

/// Builds the item key for an applied migration.
#[must_use]
pub fn migration_key(id: i64) -> String {
    format!("{MIGRATION_KEY_PREFIX}{id}")
}

/// Parses the migration id out of an item key.
///
/// Returns `None` for keys that are not `migration#<integer>`.
#[must_use]
pub fn parse_migration_key(key: &str) -> Option<i64> {
    key.strip_prefix(MIGRATION_KEY_PREFIX)?.parse().ok()
}

/// Input for recording a migration as applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppliedMigration {
    /// Migration id.
    pub id: i64,
    /// Migration name.
    pub name: String,
    /// Checksum computed from the migration name and content hash.
    pub checksum: String,
}

/// The set of applied migration ids as reported by a state store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedIds {
    /// Applied ids in ascending order, without duplicates.
    pub ids: Vec<i64>,
}

impl AppliedIds {
    /// Normalizes an arbitrary id list (sorted, de-duplicated).
    #[must_use]
    pub fn from_unsorted(mut ids: Vec<i64>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    /// Returns `true` if the given id is applied.
    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Highest applied id, if any.
    #[must_use]
    pub fn latest(&self) -> Option<i64> {
        self.ids.last().copied()
    }
}

/// Durable proof that a migration completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMigration {
    /// Migration id (natural key).
    pub id: i64,
    /// Migration name.
    pub name: String,
    /// When the migration completed.
    #[serde(with = "time::serde::rfc3339")]
    pub applied_at: OffsetDateTime,
    /// Checksum recorded at apply time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl AppliedMigration {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn now(input: &NewAppliedMigration) -> Self {
        Self {
            id: input.id,
            name: input.name.clone(),
            applied_at: OffsetDateTime::now_utc(),
            checksum: Some(input.checksum.clone()),
        }
    }

    /// Encodes the record as a key-value item (the id lives in the key).
    pub fn to_item(&self) -> Result<Item, StorageError> {
        let mut item = to_item(self)?;
        item.remove("id");
        Ok(item)
    }

    /// Decodes a key-value item stored under `migration#<id>`.
    pub fn from_item(id: i64, item: &Item) -> Result<Self, StorageError> {
        let mut item = item.clone();
        item.insert("id".into(), Value::from(id));
        Ok(serde_json::from_value(Value::Object(item))?)
    }

    /// Encodes the record as a data-model row.
    pub fn to_row(&self) -> Result<Value, StorageError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decodes a data-model row.
    ///
    /// Rows written by other tooling may carry the id as a string.
    pub fn from_row(row: &Value) -> Result<Self, StorageError> {
        let mut row = row.clone();
        if let Some(id) = row.get("id").and_then(Value::as_str) {
            let parsed: i64 = id
                .parse()
                .map_err(|_| StorageError::invalid_record(format!("non-numeric migration id '{id}'")))?;
            row["id"] = Value::from(parsed);
        }
        Ok(serde_json::from_value(row)?)
    }
}

fn unix_epoch() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

/// The singleton advisory lease item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    /// When the current holder took the lease.
    #[serde(with = "time::serde::rfc3339", default = "unix_epoch")]
    pub acquired_at: OffsetDateTime,
    /// Lease expiry in epoch seconds; `0` means unknown.
    #[serde(default)]
    pub expires_at: i64,
    /// Set when the previous holder was replaced.
    #[serde(
        with = "time::serde::rfc3339::option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub takeover_at: Option<OffsetDateTime>,
    /// Whether the replacement was an explicit forced takeover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced: Option<bool>,
}

impl LockRecord {
    /// Creates a fresh lease starting at `now`.
    #[must_use]
    pub fn fresh(now: OffsetDateTime, lease_secs: i64) -> Self {
        Self {
            acquired_at: now,
            expires_at: now.unix_timestamp() + lease_secs,
            takeover_at: None,
            forced: None,
        }
    }

    /// Creates a lease that replaces an existing holder.
    #[must_use]
    pub fn takeover(now: OffsetDateTime, lease_secs: i64, forced: bool) -> Self {
        Self {
            takeover_at: Some(now),
            forced: Some(forced),
            ..Self::fresh(now, lease_secs)
        }
    }

    /// Placeholder for a lock item whose attributes cannot be decoded.
    ///
    /// It carries no expiry and is therefore never considered stale.
    #[must_use]
    pub fn unreadable() -> Self {
        Self {
            acquired_at: OffsetDateTime::UNIX_EPOCH,
            expires_at: 0,
            takeover_at: None,
            forced: None,
        }
    }

    /// Returns `true` if the lease has a known expiry strictly before `now_epoch`.
    #[must_use]
    pub fn is_expired_at(&self, now_epoch: i64) -> bool {
        self.expires_at != 0 && now_epoch > self.expires_at
    }

    /// Encodes the lease as a key-value item.
    pub fn to_item(&self) -> Result<Item, StorageError> {
        to_item(self)
    }

    /// Decodes the lease from a key-value item.
    pub fn from_item(item: &Item) -> Result<Self, StorageError> {
        Ok(serde_json::from_value(Value::Object(item.clone()))?)
    }
}

fn to_item<T: Serialize>(value: &T) -> Result<Item, StorageError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::invalid_record(format!(
            "expected an object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_migration_key_layout() {
        assert_eq!(migration_key(7), "migration#7");
        assert_eq!(parse_migration_key("migration#7"), Some(7));
        assert_eq!(parse_migration_key("migration#"), None);
        assert_eq!(parse_migration_key("migration#abc"), None);
        assert_eq!(parse_migration_key("lock"), None);
        assert_eq!(parse_migration_key("other#3"), None);
    }

    #[test]
    fn test_applied_ids_normalized() {
        let ids = AppliedIds::from_unsorted(vec![3, 1, 3, 2]);
        assert_eq!(ids.ids, vec![1, 2, 3]);
        assert!(ids.contains(2));
        assert!(!ids.contains(4));
        assert_eq!(ids.latest(), Some(3));
        assert_eq!(AppliedIds::default().latest(), None);
    }

    #[test]
    fn test_applied_item_keeps_id_in_key() {
        let record = AppliedMigration {
            id: 2,
            name: "add_pulse_products".into(),
            applied_at: datetime!(2025-01-02 03:04:05 UTC),
            checksum: Some("deadbeef".into()),
        };
        let item = record.to_item().unwrap();
        assert!(!item.contains_key("id"));
        assert_eq!(item["name"], "add_pulse_products");
        assert_eq!(item["appliedAt"], "2025-01-02T03:04:05Z");

        let decoded = AppliedMigration::from_item(2, &item).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_applied_row_accepts_string_id() {
        let row = json!({
            "id": "5",
            "name": "seed",
            "appliedAt": "2025-01-02T03:04:05Z",
        });
        let decoded = AppliedMigration::from_row(&row).unwrap();
        assert_eq!(decoded.id, 5);
        assert_eq!(decoded.checksum, None);

        let bad = json!({ "id": "five", "name": "seed", "appliedAt": "2025-01-02T03:04:05Z" });
        assert!(AppliedMigration::from_row(&bad).is_err());
    }

    #[test]
    fn test_lock_record_expiry() {
        let now = datetime!(2025-01-01 00:00:00 UTC);
        let lock = LockRecord::fresh(now, 300);
        assert_eq!(lock.expires_at, now.unix_timestamp() + 300);
        assert!(!lock.is_expired_at(lock.expires_at));
        assert!(lock.is_expired_at(lock.expires_at + 1));
        assert!(!LockRecord::unreadable().is_expired_at(i64::MAX));
    }

    #[test]
    fn test_lock_record_item_shape() {
        let now = datetime!(2025-01-01 00:00:00 UTC);
        let fresh = LockRecord::fresh(now, 300).to_item().unwrap();
        assert!(fresh.contains_key("acquiredAt"));
        assert!(fresh.contains_key("expiresAt"));
        assert!(!fresh.contains_key("takeoverAt"));
        assert!(!fresh.contains_key("forced"));

        let taken = LockRecord::takeover(now, 300, true);
        let item = taken.to_item().unwrap();
        assert_eq!(item["forced"], true);
        assert_eq!(LockRecord::from_item(&item).unwrap(), taken);
    }

    #[test]
    fn test_lock_record_missing_expiry_defaults_to_zero() {
        let item = json!({ "acquiredAt": "2025-01-01T00:00:00Z" });
        let Value::Object(item) = item else { unreachable!() };
        let lock = LockRecord::from_item(&item).unwrap();
        assert_eq!(lock.expires_at, 0);
    }
}
