//! The ordered set of migrations an application ships with.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use seedline_storage::ModelStorage;

use crate::checksum::checksum;
use crate::error::CatalogError;

/// The work a migration performs.
///
/// A body may be re-invoked after a crash that happened before its applied
/// record was written, so it must tolerate running more than once (create
/// rows only after checking they are missing).
#[async_trait]
pub trait MigrationBody: Send + Sync {
    async fn up(&self, data: &dyn ModelStorage) -> anyhow::Result<()>;
}

struct FnBody<F>(F);

#[async_trait]
impl<F> MigrationBody for FnBody<F>
where
    F: for<'a> Fn(&'a dyn ModelStorage) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync,
{
    async fn up(&self, data: &dyn ModelStorage) -> anyhow::Result<()> {
        (self.0)(data).await
    }
}

/// A single migration: id, name, body and optional content hash.
#[derive(Clone)]
pub struct MigrationDefinition {
    pub id: i64,
    pub name: String,
    /// Stable summary of the intended effect. Only feeds the checksum.
    pub content_hash: Option<String>,
    body: Arc<dyn MigrationBody>,
}

impl MigrationDefinition {
    pub fn new(id: i64, name: impl Into<String>, body: impl MigrationBody + 'static) -> Self {
        Self {
            id,
            name: name.into(),
            content_hash: None,
            body: Arc::new(body),
        }
    }

    /// Builds a definition from a closure.
    ///
    /// ```ignore
    /// MigrationDefinition::from_fn(3, "noop", |_data| Box::pin(async { Ok(()) }));
    /// ```
    pub fn from_fn<F>(id: i64, name: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(&'a dyn ModelStorage) -> BoxFuture<'a, anyhow::Result<()>>
            + Send
            + Sync
            + 'static,
    {
        Self::new(id, name, FnBody(f))
    }

    #[must_use]
    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn checksum(&self) -> String {
        checksum(&self.name, self.content_hash.as_deref())
    }

    pub fn body(&self) -> &dyn MigrationBody {
        self.body.as_ref()
    }
}

impl fmt::Debug for MigrationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// Migrations in ascending id order.
///
/// Ids are positive and unique, names are unique. The catalog is fixed once
/// built and is never mutated at runtime.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    migrations: Vec<MigrationDefinition>,
}

impl Catalog {
    pub fn new(
        migrations: impl IntoIterator<Item = MigrationDefinition>,
    ) -> Result<Self, CatalogError> {
        let mut migrations: Vec<MigrationDefinition> = migrations.into_iter().collect();

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for m in &migrations {
            if m.id <= 0 {
                return Err(CatalogError::NonPositiveId {
                    id: m.id,
                    name: m.name.clone(),
                });
            }
            if !ids.insert(m.id) {
                return Err(CatalogError::DuplicateId { id: m.id });
            }
            if !names.insert(m.name.as_str()) {
                return Err(CatalogError::DuplicateName {
                    name: m.name.clone(),
                });
            }
        }

        migrations.sort_by_key(|m| m.id);
        Ok(Self { migrations })
    }

    pub fn iter(&self) -> impl Iterator<Item = &MigrationDefinition> {
        self.migrations.iter()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&MigrationDefinition> {
        self.migrations
            .binary_search_by_key(&id, |m| m.id)
            .ok()
            .map(|idx| &self.migrations[idx])
    }

    /// Highest id in the catalog, or 0 when empty.
    pub fn latest_id(&self) -> i64 {
        self.migrations.last().map(|m| m.id).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(id: i64, name: &str) -> MigrationDefinition {
        MigrationDefinition::from_fn(id, name, |_data| Box::pin(async { Ok(()) }))
    }

    #[test]
    fn test_catalog_sorts_by_id() {
        let catalog = Catalog::new([noop(3, "c"), noop(1, "a"), noop(2, "b")]).unwrap();
        let ids: Vec<i64> = catalog.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(catalog.latest_id(), 3);
        assert_eq!(catalog.get(2).map(|m| m.name.as_str()), Some("b"));
        assert!(catalog.get(4).is_none());
    }

    #[test]
    fn test_empty_catalog_latest_is_zero() {
        let catalog = Catalog::new(Vec::new()).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.latest_id(), 0);
    }

    #[test]
    fn test_rejects_invalid_definitions() {
        assert_eq!(
            Catalog::new([noop(0, "zero")]).unwrap_err(),
            CatalogError::NonPositiveId {
                id: 0,
                name: "zero".into()
            }
        );
        assert_eq!(
            Catalog::new([noop(1, "a"), noop(1, "b")]).unwrap_err(),
            CatalogError::DuplicateId { id: 1 }
        );
        assert_eq!(
            Catalog::new([noop(1, "a"), noop(2, "a")]).unwrap_err(),
            CatalogError::DuplicateName { name: "a".into() }
        );
    }

    #[test]
    fn test_definition_checksum_uses_content_hash() {
        let plain = noop(1, "seed_default_metadata");
        let hashed = plain.clone().with_content_hash("application_user_types_v1");
        assert_eq!(plain.checksum(), "c74ffac2");
        assert_eq!(hashed.checksum(), "6b109c34");
    }
}
