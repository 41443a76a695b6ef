//! Read-through accessor, invalidation helper and the per-entity policy
//! table for the catalog cache.
//!
//! ## Cache Key Map
//!
//! | Key | TTL | Invalidated by |
//! |---|---|---|
//! | `cache:admin:types` | lists | site-type create/update/delete |
//! | `cache:admin:epochs` | lists | site-epoch create/update/delete |
//! | `cache:admin:adminDivisions` | lists | (no mutating endpoint) |
//! | `cache:admin:documents` | lists | document upload/delete |
//! | `cache:filters` | lists | any site-type or site-epoch mutation |
//! | `cache:point:<id>` | point | update/delete of that point |
//!
//! Handlers never spell key strings or key sets themselves: reads name a
//! [`CacheKey`], writes name a [`CatalogMutation`] and the table here
//! decides what gets dropped.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::backend::CacheBackend;
use crate::config::CacheConfig;

/// TTLs applied by the policy table.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub lists: Duration,
    pub point: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            lists: Duration::from_secs(3600),
            point: Duration::from_secs(300),
        }
    }
}

impl From<&CacheConfig> for CacheTtls {
    fn from(cfg: &CacheConfig) -> Self {
        Self {
            lists: Duration::from_secs(cfg.list_ttl_secs),
            point: Duration::from_secs(cfg.point_ttl_secs),
        }
    }
}

/// Every cacheable catalog read, one variant per logical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey {
    AdminTypes,
    AdminEpochs,
    AdminDivisions,
    AdminDocuments,
    Filters,
    Point(i32),
}

impl CacheKey {
    /// The backend key string. Keys are namespaced under `cache:` and no
    /// two distinct logical queries share one.
    pub fn key(&self) -> String {
        match self {
            CacheKey::AdminTypes => "cache:admin:types".to_string(),
            CacheKey::AdminEpochs => "cache:admin:epochs".to_string(),
            CacheKey::AdminDivisions => "cache:admin:adminDivisions".to_string(),
            CacheKey::AdminDocuments => "cache:admin:documents".to_string(),
            CacheKey::Filters => "cache:filters".to_string(),
            CacheKey::Point(id) => format!("cache:point:{id}"),
        }
    }

    fn ttl(&self, ttls: &CacheTtls) -> Duration {
        match self {
            CacheKey::Point(_) => ttls.point,
            _ => ttls.lists,
        }
    }
}

/// Every catalog mutation, mapped to the exact key set it must drop.
///
/// This table is the single source of truth for cache coherence: a new
/// cached list means a new [`CacheKey`] variant and a row here, wired at
/// every write path touching that list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogMutation {
    /// Create/update/delete of a site type.
    SiteType,
    /// Create/update/delete of a site epoch.
    SiteEpoch,
    /// Upload/delete of a document.
    Document,
    /// Update/delete of the given point.
    Point(i32),
}

impl CatalogMutation {
    /// The keys this mutation may have made stale. Reference mutations
    /// also cross-invalidate the combined public filters key.
    pub fn invalidates(&self) -> Vec<CacheKey> {
        match self {
            CatalogMutation::SiteType => vec![CacheKey::AdminTypes, CacheKey::Filters],
            CatalogMutation::SiteEpoch => vec![CacheKey::AdminEpochs, CacheKey::Filters],
            CatalogMutation::Document => vec![CacheKey::AdminDocuments],
            CatalogMutation::Point(id) => vec![CacheKey::Point(*id)],
        }
    }
}

/// Cache-aside access to the catalog: read-through population plus
/// post-commit invalidation, over an injected [`CacheBackend`].
#[derive(Clone)]
pub struct CatalogCache {
    backend: CacheBackend,
    ttls: CacheTtls,
}

impl CatalogCache {
    pub fn new(backend: CacheBackend, ttls: CacheTtls) -> Self {
        Self { backend, ttls }
    }

    /// The underlying backend (for health reporting).
    pub fn backend(&self) -> &CacheBackend {
        &self.backend
    }

    /// Read-through accessor.
    ///
    /// Tries the cache first and returns the stored value without invoking
    /// `loader` on a hit. On a miss (including an unusable backend or an
    /// entry that no longer deserializes) the loader provides the
    /// authoritative value, which is stored best-effort under the key's
    /// TTL and returned.
    ///
    /// Only the loader can fail; its error propagates unchanged. A cache
    /// store failure never surfaces as a read failure.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: CacheKey, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key_str = key.key();

        if let Some(raw) = self.backend.get(&key_str).await {
            match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    tracing::debug!(key = %key_str, "cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    // Should not happen in normal operation; drop the bad
                    // entry and fall through to a reload.
                    tracing::warn!(key = %key_str, error = %e, "undecodable cache entry, reloading");
                    self.backend.delete(std::slice::from_ref(&key_str)).await;
                }
            }
        } else {
            tracing::debug!(key = %key_str, "cache miss");
        }

        let value = loader().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => self.backend.set(&key_str, raw, key.ttl(&self.ttls)).await,
            Err(e) => {
                tracing::warn!(key = %key_str, error = %e, "failed to serialize value for cache");
            }
        }

        Ok(value)
    }

    /// Drops the given keys in one batched backend call. An empty set is a
    /// no-op; backend errors are logged and swallowed. Call this after the
    /// storage write commits and before responding.
    pub async fn invalidate(&self, keys: &[CacheKey]) {
        if keys.is_empty() {
            return;
        }
        let key_strings: Vec<String> = keys.iter().map(CacheKey::key).collect();
        self.backend.delete(&key_strings).await;
    }

    /// Invalidates everything the policy table names for the mutation.
    pub async fn invalidate_for(&self, mutation: CatalogMutation) {
        self.invalidate(&mutation.invalidates()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn local_cache() -> CatalogCache {
        CatalogCache::new(CacheBackend::new_local(), CacheTtls::default())
    }

    #[test]
    fn key_strings_match_the_policy_table() {
        assert_eq!(CacheKey::AdminTypes.key(), "cache:admin:types");
        assert_eq!(CacheKey::AdminEpochs.key(), "cache:admin:epochs");
        assert_eq!(CacheKey::AdminDivisions.key(), "cache:admin:adminDivisions");
        assert_eq!(CacheKey::AdminDocuments.key(), "cache:admin:documents");
        assert_eq!(CacheKey::Filters.key(), "cache:filters");
        assert_eq!(CacheKey::Point(42).key(), "cache:point:42");
    }

    #[test]
    fn mutations_map_to_their_key_sets() {
        assert_eq!(
            CatalogMutation::SiteType.invalidates(),
            vec![CacheKey::AdminTypes, CacheKey::Filters]
        );
        assert_eq!(
            CatalogMutation::SiteEpoch.invalidates(),
            vec![CacheKey::AdminEpochs, CacheKey::Filters]
        );
        assert_eq!(
            CatalogMutation::Document.invalidates(),
            vec![CacheKey::AdminDocuments]
        );
        assert_eq!(
            CatalogMutation::Point(7).invalidates(),
            vec![CacheKey::Point(7)]
        );
    }

    #[tokio::test]
    async fn loader_runs_at_most_once_while_cached() {
        let cache = local_cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Vec<i32> = cache
                .get_or_load(CacheKey::AdminTypes, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_backend_always_invokes_loader() {
        let cache = CatalogCache::new(CacheBackend::disabled(), CacheTtls::default());
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: i32 = cache
                .get_or_load(CacheKey::Filters, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(5)
                })
                .await
                .unwrap();
            assert_eq!(value, 5);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn loader_error_propagates_unchanged() {
        let cache = local_cache();
        let result: Result<i32, &str> = cache
            .get_or_load(CacheKey::Point(1), || async { Err("db down") })
            .await;
        assert_eq!(result.unwrap_err(), "db down");

        // Nothing was stored for the failed load.
        assert!(cache.backend().get("cache:point:1").await.is_none());
    }

    #[tokio::test]
    async fn invalidation_forces_a_reload() {
        let cache = local_cache();
        let calls = AtomicUsize::new(0);

        let load = || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(n)
        };
        let first: usize = cache.get_or_load(CacheKey::AdminEpochs, load).await.unwrap();
        assert_eq!(first, 0);

        cache.invalidate_for(CatalogMutation::SiteEpoch).await;

        let load2 = || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(n)
        };
        let second: usize = cache.get_or_load(CacheKey::AdminEpochs, load2).await.unwrap();
        assert_eq!(second, 1);
    }

    #[tokio::test]
    async fn type_mutation_also_drops_filters() {
        let cache = local_cache();

        let _: i32 = cache
            .get_or_load(CacheKey::Filters, || async { Ok::<_, Infallible>(1) })
            .await
            .unwrap();
        let _: i32 = cache
            .get_or_load(CacheKey::AdminTypes, || async { Ok::<_, Infallible>(2) })
            .await
            .unwrap();

        cache.invalidate_for(CatalogMutation::SiteType).await;

        assert!(cache.backend().get("cache:filters").await.is_none());
        assert!(cache.backend().get("cache:admin:types").await.is_none());
    }

    #[tokio::test]
    async fn empty_invalidation_is_a_noop() {
        let cache = local_cache();
        cache.invalidate(&[]).await;
    }

    #[tokio::test]
    async fn undecodable_entry_is_treated_as_a_miss() {
        let cache = local_cache();
        cache
            .backend()
            .set(
                "cache:admin:types",
                "not json at all".to_string(),
                Duration::from_secs(60),
            )
            .await;

        let value: Vec<i32> = cache
            .get_or_load(CacheKey::AdminTypes, || async {
                Ok::<_, Infallible>(vec![9])
            })
            .await
            .unwrap();
        assert_eq!(value, vec![9]);

        // The reload repopulated the key with a decodable entry.
        let raw = cache.backend().get("cache:admin:types").await.unwrap();
        assert_eq!(raw, "[9]");
    }
}
