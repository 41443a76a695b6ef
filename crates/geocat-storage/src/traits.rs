//! Storage trait for the catalog storage abstraction layer.

use async_trait::async_trait;

use geocat_core::{
    AdminAreaFeature, AdminDivision, BoundingBox, Document, DocumentSummary, LocatedPlace, LonLat,
    PointDetail, PointFeature, PointGeometry, PointSummary, SiteEpoch, SiteType,
};

use crate::error::StorageError;
use crate::types::{NewDocument, NewPoint, NewSiteEpoch, NewSiteType, Page, PageParams};

/// The storage contract all catalog backends must implement.
///
/// Reads that look up a single row by ID return `Ok(None)` when the row is
/// absent; `StorageError` is reserved for infrastructure problems and write
/// conflicts. Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait CatalogStorage: Send + Sync {
    // ==================== Site types ====================

    /// Lists all site types ordered by ID.
    async fn list_site_types(&self) -> Result<Vec<SiteType>, StorageError>;

    /// Creates a site type.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` when `type_value` is taken.
    async fn create_site_type(&self, new: &NewSiteType) -> Result<SiteType, StorageError>;

    /// Replaces a site type's value and label.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the ID does not exist and
    /// `StorageError::AlreadyExists` when the new `type_value` belongs to a
    /// different row.
    async fn update_site_type(&self, id: i32, new: &NewSiteType)
    -> Result<SiteType, StorageError>;

    /// Deletes a site type.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InUse` while any point references the type.
    async fn delete_site_type(&self, id: i32) -> Result<(), StorageError>;

    // ==================== Site epochs ====================

    /// Lists all site epochs ordered by ID.
    async fn list_site_epochs(&self) -> Result<Vec<SiteEpoch>, StorageError>;

    /// Creates a site epoch.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` when `epoch_value` is taken.
    async fn create_site_epoch(&self, new: &NewSiteEpoch) -> Result<SiteEpoch, StorageError>;

    /// Replaces a site epoch's value and label.
    async fn update_site_epoch(
        &self,
        id: i32,
        new: &NewSiteEpoch,
    ) -> Result<SiteEpoch, StorageError>;

    /// Deletes a site epoch.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InUse` while any point references the epoch.
    async fn delete_site_epoch(&self, id: i32) -> Result<(), StorageError>;

    // ==================== Administrative divisions ====================

    /// Lists divisions (id + name) ordered by name.
    async fn list_admin_divisions(&self) -> Result<Vec<AdminDivision>, StorageError>;

    /// Returns divisions whose boundary intersects the bounding box, with
    /// the boundary as a GeoJSON geometry.
    async fn admin_areas_in_bbox(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<AdminAreaFeature>, StorageError>;

    // ==================== Points ====================

    /// Returns every point's geometry.
    async fn point_geometries(&self) -> Result<Vec<PointGeometry>, StorageError>;

    /// Returns points within the bounding box for map rendering.
    async fn points_in_bbox(&self, bbox: &BoundingBox) -> Result<Vec<PointFeature>, StorageError>;

    /// Reads a fully joined point, or `None` if the ID does not exist.
    async fn get_point(&self, id: i32) -> Result<Option<PointDetail>, StorageError>;

    /// Paginated point summaries for the admin table, ordered by ID.
    async fn list_points(&self, params: &PageParams) -> Result<Page<PointSummary>, StorageError>;

    /// Creates a point and its document links, returning the joined read.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidInput` when a referenced type, epoch,
    /// division or document ID does not exist.
    async fn create_point(&self, new: &NewPoint) -> Result<PointDetail, StorageError>;

    /// Replaces a point's fields and (when `document_ids` is `Some`) its
    /// document links, in one transaction.
    async fn update_point(&self, id: i32, new: &NewPoint) -> Result<PointDetail, StorageError>;

    /// Deletes a point; its document links go with it.
    async fn delete_point(&self, id: i32) -> Result<(), StorageError>;

    // ==================== Documents ====================

    /// Lists document summaries, newest first.
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StorageError>;

    /// Registers an uploaded document.
    async fn create_document(&self, new: &NewDocument) -> Result<Document, StorageError>;

    /// Reads a document record, or `None` if the ID does not exist.
    async fn get_document(&self, id: i32) -> Result<Option<Document>, StorageError>;

    /// Deletes a document record and returns it, so the caller can remove
    /// the stored file afterwards.
    async fn delete_document(&self, id: i32) -> Result<Document, StorageError>;

    // ==================== Location ====================

    /// Finds the administrative division containing the coordinate and the
    /// nearest settlement. `None` means the coordinate is outside every
    /// mapped division.
    async fn locate(&self, at: LonLat) -> Result<Option<LocatedPlace>, StorageError>;

    // ==================== Health ====================

    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> Result<(), StorageError>;
}
