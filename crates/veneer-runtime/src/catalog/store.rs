//! Catalog resolution: the external store boundary and its TTL cache layer.
//!
//! The runtime treats the store as opaque: a hit may come from the fast
//! cache, a miss triggers a backing read and a repopulate with a fixed TTL.
//! Tenant-less lookups resolve by globally unique slug and always go to the
//! backing store, so uniqueness is judged on live data.

use super::types::Catalog;
use crate::error::RuntimeError;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// External catalog store collaborator.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Resolve a catalog by (tenant, slug).
    ///
    /// Fails with `CatalogNotFound` when absent or inactive, and with
    /// `AmbiguousTenant` when the tenant is omitted and the slug is not
    /// globally unique.
    async fn fetch(&self, tenant: Option<&str>, slug: &str) -> Result<Arc<Catalog>, RuntimeError>;
}

/// In-memory backing store used by tests and the demo server.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    catalogs: RwLock<Vec<Arc<Catalog>>>,
}

impl InMemoryCatalogStore {
    pub fn new(catalogs: Vec<Catalog>) -> Self {
        Self {
            catalogs: RwLock::new(catalogs.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn insert(&self, catalog: Catalog) {
        self.catalogs.write().push(Arc::new(catalog));
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn fetch(&self, tenant: Option<&str>, slug: &str) -> Result<Arc<Catalog>, RuntimeError> {
        let catalogs = self.catalogs.read();

        match tenant {
            Some(tenant) => catalogs
                .iter()
                .find(|c| c.slug == slug && c.tenant.as_deref() == Some(tenant) && c.active)
                .cloned()
                .ok_or(RuntimeError::CatalogNotFound),
            None => {
                let matches: Vec<&Arc<Catalog>> = catalogs
                    .iter()
                    .filter(|c| c.slug == slug && c.active)
                    .collect();
                match matches.as_slice() {
                    [] => Err(RuntimeError::CatalogNotFound),
                    [catalog] => Ok(Arc::clone(catalog)),
                    _ => Err(RuntimeError::AmbiguousTenant(slug.to_string())),
                }
            }
        }
    }
}

/// TTL caching decorator over any [`CatalogStore`].
///
/// Only (tenant, slug)-keyed lookups are cached; tenant-less resolution
/// depends on global uniqueness and always consults the backing store.
pub struct CachingCatalogStore {
    inner: Arc<dyn CatalogStore>,
    entries: Mutex<HashMap<String, (Arc<Catalog>, Instant)>>,
    ttl: Duration,
}

impl CachingCatalogStore {
    pub fn new(inner: Arc<dyn CatalogStore>, ttl: Duration) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl CatalogStore for CachingCatalogStore {
    async fn fetch(&self, tenant: Option<&str>, slug: &str) -> Result<Arc<Catalog>, RuntimeError> {
        let Some(tenant) = tenant else {
            return self.inner.fetch(None, slug).await;
        };

        let key = format!("catalog:{tenant}:{slug}");
        {
            let entries = self.entries.lock();
            if let Some((catalog, cached_at)) = entries.get(&key) {
                if cached_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(catalog));
                }
            }
        }

        let catalog = self.inner.fetch(Some(tenant), slug).await?;
        debug!(key = %key, "catalog cache repopulated");
        self.entries
            .lock()
            .insert(key, (Arc::clone(&catalog), Instant::now()));
        Ok(catalog)
    }
}
