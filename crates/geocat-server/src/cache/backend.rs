//! Cache backend implementation: disabled, local (DashMap) or Redis.

use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How long a degraded Redis backend is left alone before the next call is
/// allowed to probe it again.
const REPROBE_COOLDOWN: Duration = Duration::from_secs(30);

/// A cached entry with TTL support, used by the local mode.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: String,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    /// Create a new cached entry.
    pub fn new(data: String, ttl: Duration) -> Self {
        Self {
            data,
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this entry has expired.
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Availability state of the Redis backend.
///
/// `Connecting → Ready` on the first successful operation; any backend
/// error drops to `Degraded`, from which the next call after a cooldown
/// probes again. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HealthState {
    Connecting = 0,
    Ready = 1,
    Degraded = 2,
    Closed = 3,
}

/// Internal availability gate for the Redis mode. Constructed only by
/// [`CacheBackend::new_redis`].
#[derive(Debug)]
pub struct Health {
    state: AtomicU8,
    last_failure: Mutex<Option<Instant>>,
}

impl Health {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(HealthState::Connecting as u8),
            last_failure: Mutex::new(None),
        }
    }

    fn snapshot(&self) -> HealthState {
        match self.state.load(Ordering::Relaxed) {
            0 => HealthState::Connecting,
            1 => HealthState::Ready,
            2 => HealthState::Degraded,
            _ => HealthState::Closed,
        }
    }

    /// Whether a cache operation should be attempted right now.
    fn usable(&self) -> bool {
        match self.snapshot() {
            HealthState::Connecting | HealthState::Ready => true,
            HealthState::Closed => false,
            HealthState::Degraded => {
                let last = self.last_failure.lock().expect("health lock poisoned");
                match *last {
                    Some(at) => at.elapsed() >= REPROBE_COOLDOWN,
                    None => true,
                }
            }
        }
    }

    fn mark_ready(&self) {
        if self.snapshot() != HealthState::Closed {
            self.state.store(HealthState::Ready as u8, Ordering::Relaxed);
        }
    }

    fn mark_degraded(&self) {
        if self.snapshot() != HealthState::Closed {
            self.state
                .store(HealthState::Degraded as u8, Ordering::Relaxed);
            *self.last_failure.lock().expect("health lock poisoned") = Some(Instant::now());
        }
    }

    fn mark_closed(&self) {
        self.state.store(HealthState::Closed as u8, Ordering::Relaxed);
    }
}

/// Catalog cache backend.
///
/// ## Modes
///
/// - **Disabled**: caching off; every read is a miss, writes no-op
/// - **Local**: single-instance in-process map (DashMap) with TTL
/// - **Redis**: shared Redis behind the availability gate
///
/// The backend stores serialized JSON strings; (de)serialization belongs to
/// the layer above.
#[derive(Clone)]
pub enum CacheBackend {
    /// Caching switched off entirely.
    Disabled,

    /// Single-instance: local DashMap only.
    Local(Arc<DashMap<String, CachedEntry>>),

    /// Shared Redis pool plus its health gate.
    Redis {
        pool: Pool,
        health: Arc<Health>,
    },
}

impl CacheBackend {
    /// Create a backend with caching disabled.
    pub fn disabled() -> Self {
        CacheBackend::Disabled
    }

    /// Create a new local-only cache backend.
    pub fn new_local() -> Self {
        CacheBackend::Local(Arc::new(DashMap::new()))
    }

    /// Create a new Redis-backed cache backend. The gate starts in
    /// `Connecting`; the first operation settles it.
    pub fn new_redis(pool: Pool) -> Self {
        CacheBackend::Redis {
            pool,
            health: Arc::new(Health::new()),
        }
    }

    /// Human-readable mode name, for logs and health endpoints.
    pub fn mode(&self) -> &'static str {
        match self {
            CacheBackend::Disabled => "disabled",
            CacheBackend::Local(_) => "local",
            CacheBackend::Redis { .. } => "redis",
        }
    }

    /// Whether the backend would currently attempt an operation.
    pub fn healthy(&self) -> bool {
        match self {
            CacheBackend::Disabled => false,
            CacheBackend::Local(_) => true,
            CacheBackend::Redis { health, .. } => health.usable(),
        }
    }

    /// Current gate state; `None` for non-Redis modes.
    pub fn health_state(&self) -> Option<HealthState> {
        match self {
            CacheBackend::Redis { health, .. } => Some(health.snapshot()),
            _ => None,
        }
    }

    /// Marks the backend closed; subsequent operations no-op. Local and
    /// disabled modes have no lifecycle.
    pub fn close(&self) {
        if let CacheBackend::Redis { health, .. } = self {
            health.mark_closed();
        }
    }

    /// Get a value from the cache. Any backend fault degrades to a miss.
    pub async fn get(&self, key: &str) -> Option<String> {
        match self {
            CacheBackend::Disabled => None,
            CacheBackend::Local(map) => {
                if let Some(entry) = map.get(key) {
                    if !entry.is_expired() {
                        return Some(entry.data.clone());
                    }
                    drop(entry);
                    map.remove(key);
                }
                None
            }
            CacheBackend::Redis { pool, health } => {
                if !health.usable() {
                    tracing::warn!(key = %key, "cache backend unavailable, treating GET as miss");
                    return None;
                }
                match pool.get().await {
                    Ok(mut conn) => match conn.get::<_, Option<String>>(key).await {
                        Ok(value) => {
                            health.mark_ready();
                            value
                        }
                        Err(e) => {
                            tracing::warn!(key = %key, error = %e, "Redis GET error");
                            health.mark_degraded();
                            None
                        }
                    },
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "failed to get Redis connection");
                        health.mark_degraded();
                        None
                    }
                }
            }
        }
    }

    /// Set a value with TTL. Failures are logged and swallowed; they must
    /// never fail the read that triggered the store.
    pub async fn set(&self, key: &str, value: String, ttl: Duration) {
        match self {
            CacheBackend::Disabled => {}
            CacheBackend::Local(map) => {
                map.insert(key.to_string(), CachedEntry::new(value, ttl));
            }
            CacheBackend::Redis { pool, health } => {
                if !health.usable() {
                    tracing::warn!(key = %key, "cache backend unavailable, skipping SET");
                    return;
                }
                match pool.get().await {
                    Ok(mut conn) => {
                        match conn
                            .set_ex::<_, _, ()>(key, value, ttl.as_secs())
                            .await
                        {
                            Ok(()) => {
                                health.mark_ready();
                                tracing::debug!(key = %key, ttl_secs = %ttl.as_secs(), "cache set");
                            }
                            Err(e) => {
                                tracing::warn!(key = %key, error = %e, "Redis SETEX error");
                                health.mark_degraded();
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "failed to get Redis connection");
                        health.mark_degraded();
                    }
                }
            }
        }
    }

    /// Delete the given keys in one batched call. Missing keys are fine;
    /// errors are logged and swallowed.
    pub async fn delete(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        match self {
            CacheBackend::Disabled => {}
            CacheBackend::Local(map) => {
                for key in keys {
                    map.remove(key);
                }
            }
            CacheBackend::Redis { pool, health } => {
                if !health.usable() {
                    tracing::warn!(keys = ?keys, "cache backend unavailable, skipping invalidation");
                    return;
                }
                match pool.get().await {
                    Ok(mut conn) => match conn.del::<_, i64>(keys.to_vec()).await {
                        Ok(removed) => {
                            health.mark_ready();
                            tracing::debug!(keys = ?keys, removed, "cache invalidated");
                        }
                        Err(e) => {
                            tracing::warn!(keys = ?keys, error = %e, "Redis DEL error");
                            health.mark_degraded();
                        }
                    },
                    Err(e) => {
                        tracing::warn!(keys = ?keys, error = %e, "failed to get Redis connection");
                        health.mark_degraded();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_get_set_roundtrip() {
        let cache = CacheBackend::new_local();
        cache
            .set("k", "\"v\"".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k").await.as_deref(), Some("\"v\""));
    }

    #[tokio::test]
    async fn local_expiry_is_a_miss() {
        let cache = CacheBackend::new_local();
        cache
            .set("k", "1".to_string(), Duration::from_millis(20))
            .await;
        assert!(cache.get("k").await.is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn local_delete_batch() {
        let cache = CacheBackend::new_local();
        cache.set("a", "1".into(), Duration::from_secs(60)).await;
        cache.set("b", "2".into(), Duration::from_secs(60)).await;
        cache.delete(&["a".to_string(), "b".to_string(), "missing".to_string()]).await;
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_none());
    }

    #[tokio::test]
    async fn empty_delete_is_a_noop() {
        let cache = CacheBackend::new_local();
        cache.delete(&[]).await;
        let disabled = CacheBackend::disabled();
        disabled.delete(&[]).await;
    }

    #[tokio::test]
    async fn disabled_backend_always_misses() {
        let cache = CacheBackend::disabled();
        cache.set("k", "1".into(), Duration::from_secs(60)).await;
        assert!(cache.get("k").await.is_none());
        assert!(!cache.healthy());
    }

    #[test]
    fn health_state_machine() {
        let health = Health::new();
        assert_eq!(health.snapshot(), HealthState::Connecting);
        assert!(health.usable());

        health.mark_ready();
        assert_eq!(health.snapshot(), HealthState::Ready);

        health.mark_degraded();
        assert_eq!(health.snapshot(), HealthState::Degraded);
        // Freshly degraded: inside the cooldown window.
        assert!(!health.usable());

        health.mark_closed();
        assert_eq!(health.snapshot(), HealthState::Closed);
        assert!(!health.usable());
        // Closed is terminal.
        health.mark_ready();
        assert_eq!(health.snapshot(), HealthState::Closed);
    }
}
