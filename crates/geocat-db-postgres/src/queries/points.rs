//! Point catalog queries: map reads, joined detail reads, paginated admin
//! reads and CRUD.
//!
//! Coordinates are extracted with ST_X/ST_Y and geometries serialized with
//! ST_AsGeoJSON on the database side; point geometry is written as
//! `ST_SetSRID(ST_MakePoint(lon, lat), 4326)`.

use chrono::{DateTime, Utc};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;

use geocat_core::{
    BoundingBox, DivisionRef, DocumentRef, EntityRef, PointDetail, PointFeature, PointGeometry,
    PointSummary,
};
use geocat_storage::{NewPoint, Page, PageParams, StorageError};

use crate::error::is_foreign_key_violation;

type SummaryRow = (
    i32,            // p.id
    String,         // p.name
    Option<String>, // p.short_description
    f64,            // longitude
    f64,            // latitude
    i32,            // t.id
    Option<String>, // t.label
    i32,            // e.id
    Option<String>, // e.label
    Option<i32>,    // d.id
    Option<String>, // d.name
    DateTime<Utc>,  // p.created_at
    DateTime<Utc>,  // p.updated_at
);

type DetailRow = (
    i32,            // p.id
    String,         // p.name
    Option<String>, // p.short_description
    Option<String>, // p.description
    f64,            // longitude
    f64,            // latitude
    i32,            // t.id
    Option<String>, // t.label
    i32,            // e.id
    Option<String>, // e.label
    Option<i32>,    // d.id
    Option<String>, // d.name
    DateTime<Utc>,  // p.created_at
    DateTime<Utc>,  // p.updated_at
);

fn division_ref(id: Option<i32>, name: Option<String>) -> Option<DivisionRef> {
    id.map(|id| DivisionRef { id, name })
}

/// Returns every point's geometry as GeoJSON.
pub async fn point_geometries(pool: &PgPool) -> Result<Vec<PointGeometry>, StorageError> {
    let rows: Vec<(String,)> = query_as("SELECT ST_AsGeoJSON(geom) FROM sites_points")
        .fetch_all(pool)
        .await
        .map_err(|e| StorageError::internal(format!("Failed to query point geometries: {e}")))?;

    rows.into_iter()
        .map(|(geom,)| {
            let geom = serde_json::from_str(&geom)
                .map_err(|e| StorageError::internal(format!("Invalid point GeoJSON: {e}")))?;
            Ok(PointGeometry { geom })
        })
        .collect()
}

/// Returns points within the bounding box for map rendering.
pub async fn points_in_bbox(
    pool: &PgPool,
    bbox: &BoundingBox,
) -> Result<Vec<PointFeature>, StorageError> {
    let rows: Vec<(i32, String, i32, i32, String)> = query_as(
        r#"SELECT id, name, type_id, epoch_id, ST_AsGeoJSON(geom)
           FROM sites_points
           WHERE geom && ST_MakeEnvelope($1, $2, $3, $4, 4326)"#,
    )
    .bind(bbox.lon_min)
    .bind(bbox.lat_min)
    .bind(bbox.lon_max)
    .bind(bbox.lat_max)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::internal(format!("Failed to query points in bbox: {e}")))?;

    rows.into_iter()
        .map(|(id, name, type_id, epoch_id, geometry)| {
            let geometry = serde_json::from_str(&geometry).map_err(|e| {
                StorageError::internal(format!("Invalid GeoJSON for point {id}: {e}"))
            })?;
            Ok(PointFeature {
                id,
                name,
                type_id,
                epoch_id,
                geometry,
            })
        })
        .collect()
}

/// Reads a fully joined point, or `None` if the ID does not exist.
pub async fn get_point(pool: &PgPool, id: i32) -> Result<Option<PointDetail>, StorageError> {
    let row: Option<DetailRow> = query_as(
        r#"SELECT p.id, p.name, p.short_description, p.description,
                  ST_X(p.geom), ST_Y(p.geom),
                  t.id, t.label, e.id, e.label, d.id, d.name,
                  p.created_at, p.updated_at
           FROM sites_points p
           JOIN site_types t ON t.id = p.type_id
           JOIN site_epochs e ON e.id = p.epoch_id
           LEFT JOIN admin_divisions d ON d.id = p.admin_division_id
           WHERE p.id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::internal(format!("Failed to read point: {e}")))?;

    let Some((
        id,
        name,
        short_description,
        description,
        longitude,
        latitude,
        type_id,
        type_label,
        epoch_id,
        epoch_label,
        division_id,
        division_name,
        created_at,
        updated_at,
    )) = row
    else {
        return Ok(None);
    };

    let documents = point_documents(pool, id).await?;

    Ok(Some(PointDetail {
        id,
        name,
        short_description,
        description,
        longitude,
        latitude,
        site_type: Some(EntityRef {
            id: type_id,
            label: type_label,
        }),
        epoch: Some(EntityRef {
            id: epoch_id,
            label: epoch_label,
        }),
        admin_division: division_ref(division_id, division_name),
        documents,
        created_at,
        updated_at,
    }))
}

/// Paginated point summaries for the admin table, ordered by ID.
pub async fn list_points(
    pool: &PgPool,
    params: &PageParams,
) -> Result<Page<PointSummary>, StorageError> {
    let total_items: i64 = query_scalar("SELECT COUNT(*) FROM sites_points")
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::internal(format!("Failed to count points: {e}")))?;

    let rows: Vec<SummaryRow> = query_as(
        r#"SELECT p.id, p.name, p.short_description,
                  ST_X(p.geom), ST_Y(p.geom),
                  t.id, t.label, e.id, e.label, d.id, d.name,
                  p.created_at, p.updated_at
           FROM sites_points p
           JOIN site_types t ON t.id = p.type_id
           JOIN site_epochs e ON e.id = p.epoch_id
           LEFT JOIN admin_divisions d ON d.id = p.admin_division_id
           ORDER BY p.id ASC
           LIMIT $1 OFFSET $2"#,
    )
    .bind(i64::from(params.limit()))
    .bind(params.offset() as i64)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::internal(format!("Failed to list points: {e}")))?;

    let items = rows
        .into_iter()
        .map(
            |(
                id,
                name,
                short_description,
                longitude,
                latitude,
                type_id,
                type_label,
                epoch_id,
                epoch_label,
                division_id,
                division_name,
                created_at,
                updated_at,
            )| PointSummary {
                id,
                name,
                short_description,
                longitude,
                latitude,
                site_type: Some(EntityRef {
                    id: type_id,
                    label: type_label,
                }),
                epoch: Some(EntityRef {
                    id: epoch_id,
                    label: epoch_label,
                }),
                admin_division: division_ref(division_id, division_name),
                created_at,
                updated_at,
            },
        )
        .collect();

    Ok(Page::new(items, total_items, params))
}

/// Creates a point and its document links, returning the joined read.
pub async fn create_point(pool: &PgPool, new: &NewPoint) -> Result<PointDetail, StorageError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| StorageError::internal(format!("Failed to begin transaction: {e}")))?;

    let id: i32 = query_scalar(
        r#"INSERT INTO sites_points
               (geom, name, short_description, description, type_id, epoch_id, admin_division_id)
           VALUES (ST_SetSRID(ST_MakePoint($1, $2), 4326), $3, $4, $5, $6, $7, $8)
           RETURNING id"#,
    )
    .bind(new.longitude)
    .bind(new.latitude)
    .bind(&new.name)
    .bind(&new.short_description)
    .bind(&new.description)
    .bind(new.type_id)
    .bind(new.epoch_id)
    .bind(new.admin_division_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(map_point_write_error)?;

    if let Some(ref document_ids) = new.document_ids {
        link_documents(&mut tx, id, document_ids).await?;
    }

    tx.commit()
        .await
        .map_err(|e| StorageError::internal(format!("Failed to commit point create: {e}")))?;

    get_point(pool, id)
        .await?
        .ok_or_else(|| StorageError::internal(format!("Point {id} vanished after create")))
}

/// Replaces a point's fields and (when `document_ids` is `Some`) its
/// document links, in one transaction.
pub async fn update_point(
    pool: &PgPool,
    id: i32,
    new: &NewPoint,
) -> Result<PointDetail, StorageError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| StorageError::internal(format!("Failed to begin transaction: {e}")))?;

    let updated: Option<i32> = query_scalar(
        r#"UPDATE sites_points
           SET geom = ST_SetSRID(ST_MakePoint($2, $3), 4326),
               name = $4, short_description = $5, description = $6,
               type_id = $7, epoch_id = $8, admin_division_id = $9,
               updated_at = now()
           WHERE id = $1
           RETURNING id"#,
    )
    .bind(id)
    .bind(new.longitude)
    .bind(new.latitude)
    .bind(&new.name)
    .bind(&new.short_description)
    .bind(&new.description)
    .bind(new.type_id)
    .bind(new.epoch_id)
    .bind(new.admin_division_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(map_point_write_error)?;

    if updated.is_none() {
        return Err(StorageError::not_found("point", i64::from(id)));
    }

    if let Some(ref document_ids) = new.document_ids {
        query("DELETE FROM point_documents WHERE point_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::internal(format!("Failed to clear document links: {e}")))?;
        link_documents(&mut tx, id, document_ids).await?;
    }

    tx.commit()
        .await
        .map_err(|e| StorageError::internal(format!("Failed to commit point update: {e}")))?;

    get_point(pool, id)
        .await?
        .ok_or_else(|| StorageError::internal(format!("Point {id} vanished after update")))
}

/// Deletes a point; its document links cascade.
pub async fn delete_point(pool: &PgPool, id: i32) -> Result<(), StorageError> {
    let result = query("DELETE FROM sites_points WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::internal(format!("Failed to delete point: {e}")))?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("point", i64::from(id)));
    }

    Ok(())
}

async fn link_documents(
    tx: &mut sqlx_postgres::PgTransaction<'_>,
    point_id: i32,
    document_ids: &[i32],
) -> Result<(), StorageError> {
    for document_id in document_ids {
        query("INSERT INTO point_documents (point_id, document_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(point_id)
            .bind(document_id)
            .execute(&mut **tx)
            .await
            .map_err(map_point_write_error)?;
    }
    Ok(())
}

async fn point_documents(pool: &PgPool, point_id: i32) -> Result<Vec<DocumentRef>, StorageError> {
    let rows: Vec<(i32, String, Option<String>)> = query_as(
        r#"SELECT doc.id, doc.filename, doc.description
           FROM documents doc
           JOIN point_documents pd ON pd.document_id = doc.id
           WHERE pd.point_id = $1
           ORDER BY doc.id ASC"#,
    )
    .bind(point_id)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::internal(format!("Failed to list point documents: {e}")))?;

    Ok(rows
        .into_iter()
        .map(|(id, filename, description)| DocumentRef {
            id,
            filename,
            description,
        })
        .collect())
}

fn map_point_write_error(e: sqlx_core::error::Error) -> StorageError {
    if is_foreign_key_violation(&e) {
        StorageError::invalid_input(
            "referenced type, epoch, division or document does not exist",
        )
    } else {
        StorageError::internal(format!("Failed to write point: {e}"))
    }
}
