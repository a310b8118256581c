use seedline_storage::StorageError;
use thiserror::Error;

/// Errors raised while assembling a migration catalog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Migration id must be positive: {id} ({name})")]
    NonPositiveId { id: i64, name: String },

    #[error("Duplicate migration id: {id}")]
    DuplicateId { id: i64 },

    #[error("Duplicate migration name: {name}")]
    DuplicateName { name: String },
}

/// Errors surfaced by the migration service.
///
/// Lock contention and migration body failures are outcomes, not errors;
/// only an unreachable or misbehaving store ends up here.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
