pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;

pub use auth::{AuthConfig, AuthService};
pub use cache::{CacheBackend, CacheKey, CacheTtls, CatalogCache, CatalogMutation};
pub use config::{AppConfig, CacheConfig, PostgresStorageConfig, RedisConfig, ServerConfig};
pub use error::ApiError;
pub use observability::{apply_logging_level, init_tracing};
pub use server::{AppState, GeocatServer, ServerBuilder, build_app, build_router};

/// Create a cache backend based on configuration.
///
/// ## Cache Modes
///
/// - **Caching disabled**: every read goes straight to storage
/// - **Redis disabled**: local-only cache (DashMap), for development
/// - **Redis enabled**: deadpool pool behind the availability gate
///
/// ## Graceful Degradation
///
/// If Redis cannot be reached at startup the backend still comes up in
/// Redis mode but degraded: reads fall through to storage and the gate
/// re-probes after a cooldown, so the cache heals itself once Redis is
/// back. The server never refuses to start over an absent cache.
pub async fn create_cache_backend(cfg: &AppConfig) -> CacheBackend {
    use std::time::Duration;

    if !cfg.cache.enabled {
        tracing::info!("caching disabled, all reads go to storage");
        return CacheBackend::disabled();
    }

    if !cfg.redis.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return CacheBackend::new_local();
    }

    tracing::info!(url = %cfg.redis.url, "Connecting to Redis");

    // Create Redis pool configuration with bounded wait times so a dead
    // backend cannot stall request handling.
    let mut redis_config = deadpool_redis::Config::from_url(&cfg.redis.url);
    let pool_config = redis_config
        .pool
        .get_or_insert_with(deadpool_redis::PoolConfig::default);
    pool_config.max_size = cfg.redis.pool_size;
    pool_config.timeouts.wait = Some(Duration::from_millis(cfg.redis.timeout_ms));
    pool_config.timeouts.create = Some(Duration::from_millis(cfg.redis.timeout_ms));
    pool_config.timeouts.recycle = Some(Duration::from_millis(cfg.redis.timeout_ms));

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create Redis pool. Falling back to local cache.");
            return CacheBackend::new_local();
        }
    };

    let backend = CacheBackend::new_redis(pool.clone());

    // Probe once so the gate settles before the first request; failure
    // leaves the backend degraded, not absent.
    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis successfully");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unreachable at startup, cache degraded until it recovers");
        }
    }

    backend
}
