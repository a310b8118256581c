//! # seedline-core
//!
//! Runs an ordered catalog of one-time data migrations exactly once across
//! concurrent triggers.
//!
//! - [`Catalog`]: migrations in ascending id order.
//! - [`run_migrations`]: applies pending migrations, halting on first failure.
//! - [`KeyedStateStore`] / [`ModelStateStore`]: the two applied-state adapters.
//! - [`MigrationLock`]: lease over the `lock` item with stale and forced takeover.
//! - [`MigrationService`]: lock, purge re-run ids, run, release.

pub mod adapter;
pub mod catalog;
pub mod checksum;
pub mod error;
pub mod lock;
pub mod runner;
pub mod service;

pub use adapter::{KeyedStateStore, ModelStateStore};
pub use catalog::{Catalog, MigrationBody, MigrationDefinition};
pub use checksum::checksum;
pub use error::{CatalogError, Result, ServiceError};
pub use lock::{
    LEASE_DURATION_SECS, LockAcquisition, LockOptions, MigrationLock, TakeoverDecision,
    decide_takeover,
};
pub use runner::{FailedMigration, Summary, run_migrations};
pub use service::{MigrationService, RunOutcome, RunReport, RunRequest, StateSnapshot};
