//! PostGIS implementation of the CatalogStorage trait.

use async_trait::async_trait;
use sqlx_postgres::PgPool;

use geocat_core::{
    AdminAreaFeature, AdminDivision, BoundingBox, Document, DocumentSummary, LocatedPlace, LonLat,
    PointDetail, PointFeature, PointGeometry, PointSummary, SiteEpoch, SiteType,
};
use geocat_storage::{
    CatalogStorage, NewDocument, NewPoint, NewSiteEpoch, NewSiteType, Page, PageParams,
    StorageError,
};

use crate::config::PostgresConfig;
use crate::migrations;
use crate::pool;
use crate::queries;

/// PostGIS storage backend for the catalog.
///
/// Persists the reference tables, the point catalog and document records in
/// PostgreSQL, relying on PostGIS for all geometry work (bbox filtering,
/// containment, distance ordering, GeoJSON serialization).
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a new `PostgresStorage` with the given configuration.
    ///
    /// This will:
    /// 1. Create a connection pool
    /// 2. Run migrations (if configured)
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created
    /// or if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Creates a new `PostgresStorage` from an existing connection pool.
    ///
    /// This allows sharing a connection pool between multiple components.
    /// Migrations are not run automatically when using this constructor.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStorage for PostgresStorage {
    async fn list_site_types(&self) -> Result<Vec<SiteType>, StorageError> {
        queries::reference::list_site_types(&self.pool).await
    }

    async fn create_site_type(&self, new: &NewSiteType) -> Result<SiteType, StorageError> {
        queries::reference::create_site_type(&self.pool, new).await
    }

    async fn update_site_type(
        &self,
        id: i32,
        new: &NewSiteType,
    ) -> Result<SiteType, StorageError> {
        queries::reference::update_site_type(&self.pool, id, new).await
    }

    async fn delete_site_type(&self, id: i32) -> Result<(), StorageError> {
        queries::reference::delete_site_type(&self.pool, id).await
    }

    async fn list_site_epochs(&self) -> Result<Vec<SiteEpoch>, StorageError> {
        queries::reference::list_site_epochs(&self.pool).await
    }

    async fn create_site_epoch(&self, new: &NewSiteEpoch) -> Result<SiteEpoch, StorageError> {
        queries::reference::create_site_epoch(&self.pool, new).await
    }

    async fn update_site_epoch(
        &self,
        id: i32,
        new: &NewSiteEpoch,
    ) -> Result<SiteEpoch, StorageError> {
        queries::reference::update_site_epoch(&self.pool, id, new).await
    }

    async fn delete_site_epoch(&self, id: i32) -> Result<(), StorageError> {
        queries::reference::delete_site_epoch(&self.pool, id).await
    }

    async fn list_admin_divisions(&self) -> Result<Vec<AdminDivision>, StorageError> {
        queries::reference::list_admin_divisions(&self.pool).await
    }

    async fn admin_areas_in_bbox(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<AdminAreaFeature>, StorageError> {
        queries::reference::admin_areas_in_bbox(&self.pool, bbox).await
    }

    async fn point_geometries(&self) -> Result<Vec<PointGeometry>, StorageError> {
        queries::points::point_geometries(&self.pool).await
    }

    async fn points_in_bbox(&self, bbox: &BoundingBox) -> Result<Vec<PointFeature>, StorageError> {
        queries::points::points_in_bbox(&self.pool, bbox).await
    }

    async fn get_point(&self, id: i32) -> Result<Option<PointDetail>, StorageError> {
        queries::points::get_point(&self.pool, id).await
    }

    async fn list_points(&self, params: &PageParams) -> Result<Page<PointSummary>, StorageError> {
        queries::points::list_points(&self.pool, params).await
    }

    async fn create_point(&self, new: &NewPoint) -> Result<PointDetail, StorageError> {
        queries::points::create_point(&self.pool, new).await
    }

    async fn update_point(&self, id: i32, new: &NewPoint) -> Result<PointDetail, StorageError> {
        queries::points::update_point(&self.pool, id, new).await
    }

    async fn delete_point(&self, id: i32) -> Result<(), StorageError> {
        queries::points::delete_point(&self.pool, id).await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StorageError> {
        queries::documents::list_documents(&self.pool).await
    }

    async fn create_document(&self, new: &NewDocument) -> Result<Document, StorageError> {
        queries::documents::create_document(&self.pool, new).await
    }

    async fn get_document(&self, id: i32) -> Result<Option<Document>, StorageError> {
        queries::documents::get_document(&self.pool, id).await
    }

    async fn delete_document(&self, id: i32) -> Result<Document, StorageError> {
        queries::documents::delete_document(&self.pool, id).await
    }

    async fn locate(&self, at: LonLat) -> Result<Option<LocatedPlace>, StorageError> {
        queries::location::locate(&self.pool, at).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        pool::test_connection(&self.pool)
            .await
            .map_err(StorageError::from)
    }
}
