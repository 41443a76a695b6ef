//! Cache-aside layer for the catalog.
//!
//! ## Architecture
//!
//! - [`backend`] — the key-value backend: disabled, local (in-process map
//!   with TTL) or Redis behind an availability gate
//! - [`catalog`] — the read-through accessor (`get_or_load`), the batched
//!   invalidation helper and the per-entity key/TTL policy table
//!
//! ## Data flow
//!
//! ```text
//! read  → get_or_load(key) → backend GET → hit: stored JSON
//!                                        → miss: loader (DB) → SETEX → value
//! write → storage commit → invalidate(policy keys) → response
//! ```
//!
//! ## Graceful Degradation
//!
//! The cache is an optimization, never a dependency: with the backend
//! absent, down or timing out, reads degrade to storage fetches and
//! invalidations no-op. A backend fault is never surfaced to HTTP callers.

pub mod backend;
pub mod catalog;

pub use backend::{CacheBackend, CachedEntry, HealthState};
pub use catalog::{CacheKey, CacheTtls, CatalogCache, CatalogMutation};
