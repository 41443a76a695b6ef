//! Catalog entity types.
//!
//! These mirror the relational schema: reference tables (`site_types`,
//! `site_epochs`, `admin_divisions`), the point catalog (`sites_points`)
//! and uploaded documents. Joined read models (`PointDetail`,
//! `AdminAreaFeature`) carry labels resolved by the storage layer so the
//! server never re-queries for display names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A site classification (e.g. settlement, burial mound).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteType {
    pub id: i32,
    /// Stable machine value, unique across types.
    pub type_value: String,
    /// Human-readable label shown in filters and admin lists.
    pub label: Option<String>,
}

/// A historical epoch a site is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteEpoch {
    pub id: i32,
    pub epoch_value: String,
    pub label: Option<String>,
}

/// Administrative division list entry (id + display name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminDivision {
    pub id: i32,
    pub name: Option<String>,
}

/// An administrative division row selected for map rendering: the display
/// name plus its boundary as a GeoJSON geometry value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminAreaFeature {
    pub id: i32,
    pub name: Option<String>,
    pub geometry: Value,
}

/// Bare point geometry, as returned by the public all-points endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    pub geom: Value,
}

/// A point row selected for map rendering within a bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFeature {
    pub id: i32,
    pub name: String,
    pub type_id: i32,
    pub epoch_id: i32,
    pub geometry: Value,
}

/// Reference to a related row, as embedded in joined point reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: i32,
    pub label: Option<String>,
}

/// Reference to an administrative division, as embedded in joined reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionRef {
    pub id: i32,
    pub name: Option<String>,
}

/// Reference to an attached document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: i32,
    pub filename: String,
    pub description: Option<String>,
}

/// Fully joined point read model: coordinates extracted from the geometry,
/// labels resolved for type/epoch/division, attached documents included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointDetail {
    pub id: i32,
    pub name: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(rename = "type")]
    pub site_type: Option<EntityRef>,
    pub epoch: Option<EntityRef>,
    pub admin_division: Option<DivisionRef>,
    pub documents: Vec<DocumentRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Point list entry for the paginated admin table: joined labels, no
/// long description, no document links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSummary {
    pub id: i32,
    pub name: String,
    pub short_description: Option<String>,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(rename = "type")]
    pub site_type: Option<EntityRef>,
    pub epoch: Option<EntityRef>,
    pub admin_division: Option<DivisionRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored document record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: i32,
    /// Original filename as uploaded.
    pub filename: String,
    /// Stored name under the upload directory, unique.
    pub filepath: String,
    pub mimetype: String,
    pub size: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Document list entry for the cached admin list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: i32,
    pub filename: String,
    pub description: Option<String>,
    pub size: i64,
    pub mimetype: String,
    pub created_at: DateTime<Utc>,
}

/// Result of locating a coordinate inside a mapped division: the division's
/// display name and the nearest settlement, if any is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedPlace {
    pub division: Option<String>,
    pub settlement: Option<String>,
}
