//! # geocat-storage
//!
//! Storage abstraction layer for the GeoCat server.
//!
//! This crate defines the trait and types that all storage backends must
//! implement. It does not contain any implementations - those are provided
//! by separate crates (`geocat-db-postgres` for the PostGIS backend).
//!
//! ## Overview
//!
//! The main trait is [`CatalogStorage`], which defines the contract for:
//! - Reference data (site types, epochs, administrative divisions)
//! - The point catalog (map reads, paginated admin reads, CRUD)
//! - Uploaded documents
//! - Coordinate location lookups
//!
//! ## Storage Backends
//!
//! To implement a storage backend, implement the [`CatalogStorage`] trait:
//!
//! ```ignore
//! use async_trait::async_trait;
//! use geocat_storage::{CatalogStorage, StorageError};
//!
//! struct MyStorage {
//!     // ...
//! }
//!
//! #[async_trait]
//! impl CatalogStorage for MyStorage {
//!     async fn list_site_types(&self) -> Result<Vec<geocat_core::SiteType>, StorageError> {
//!         // Implementation
//!     }
//!     // ... other methods
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::StorageError;
pub use traits::CatalogStorage;
pub use types::{NewDocument, NewPoint, NewSiteEpoch, NewSiteType, Page, PageParams};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a boxed storage trait object.
pub type DynStorage = std::sync::Arc<dyn CatalogStorage>;
