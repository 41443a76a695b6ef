//! Reference-table queries: site types, site epochs, administrative divisions.

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;

use geocat_core::{AdminAreaFeature, AdminDivision, BoundingBox, SiteEpoch, SiteType};
use geocat_storage::{NewSiteEpoch, NewSiteType, StorageError};

use crate::error::is_unique_violation;

/// Lists all site types ordered by ID.
pub async fn list_site_types(pool: &PgPool) -> Result<Vec<SiteType>, StorageError> {
    let rows: Vec<(i32, String, Option<String>)> =
        query_as("SELECT id, type_value, label FROM site_types ORDER BY id ASC")
            .fetch_all(pool)
            .await
            .map_err(|e| StorageError::internal(format!("Failed to list site types: {e}")))?;

    Ok(rows
        .into_iter()
        .map(|(id, type_value, label)| SiteType {
            id,
            type_value,
            label,
        })
        .collect())
}

/// Inserts a site type, mapping a unique violation on `type_value` to
/// `StorageError::AlreadyExists`.
pub async fn create_site_type(
    pool: &PgPool,
    new: &NewSiteType,
) -> Result<SiteType, StorageError> {
    let id: i32 =
        query_scalar("INSERT INTO site_types (type_value, label) VALUES ($1, $2) RETURNING id")
            .bind(&new.type_value)
            .bind(&new.label)
            .fetch_one(pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::already_exists("site type", &new.type_value)
                } else {
                    StorageError::internal(format!("Failed to create site type: {e}"))
                }
            })?;

    Ok(SiteType {
        id,
        type_value: new.type_value.clone(),
        label: new.label.clone(),
    })
}

/// Replaces a site type's value and label.
pub async fn update_site_type(
    pool: &PgPool,
    id: i32,
    new: &NewSiteType,
) -> Result<SiteType, StorageError> {
    let updated: Option<i32> =
        query_scalar("UPDATE site_types SET type_value = $2, label = $3 WHERE id = $1 RETURNING id")
            .bind(id)
            .bind(&new.type_value)
            .bind(&new.label)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::already_exists("site type", &new.type_value)
                } else {
                    StorageError::internal(format!("Failed to update site type: {e}"))
                }
            })?;

    match updated {
        Some(id) => Ok(SiteType {
            id,
            type_value: new.type_value.clone(),
            label: new.label.clone(),
        }),
        None => Err(StorageError::not_found("site type", i64::from(id))),
    }
}

/// Deletes a site type, refusing while points still reference it.
pub async fn delete_site_type(pool: &PgPool, id: i32) -> Result<(), StorageError> {
    let references: i64 = query_scalar("SELECT COUNT(*) FROM sites_points WHERE type_id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::internal(format!("Failed to count type references: {e}")))?;

    if references > 0 {
        return Err(StorageError::in_use("site type", i64::from(id), references));
    }

    let result = query("DELETE FROM site_types WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::internal(format!("Failed to delete site type: {e}")))?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("site type", i64::from(id)));
    }

    Ok(())
}

/// Lists all site epochs ordered by ID.
pub async fn list_site_epochs(pool: &PgPool) -> Result<Vec<SiteEpoch>, StorageError> {
    let rows: Vec<(i32, String, Option<String>)> =
        query_as("SELECT id, epoch_value, label FROM site_epochs ORDER BY id ASC")
            .fetch_all(pool)
            .await
            .map_err(|e| StorageError::internal(format!("Failed to list site epochs: {e}")))?;

    Ok(rows
        .into_iter()
        .map(|(id, epoch_value, label)| SiteEpoch {
            id,
            epoch_value,
            label,
        })
        .collect())
}

/// Inserts a site epoch, mapping a unique violation on `epoch_value` to
/// `StorageError::AlreadyExists`.
pub async fn create_site_epoch(
    pool: &PgPool,
    new: &NewSiteEpoch,
) -> Result<SiteEpoch, StorageError> {
    let id: i32 =
        query_scalar("INSERT INTO site_epochs (epoch_value, label) VALUES ($1, $2) RETURNING id")
            .bind(&new.epoch_value)
            .bind(&new.label)
            .fetch_one(pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::already_exists("site epoch", &new.epoch_value)
                } else {
                    StorageError::internal(format!("Failed to create site epoch: {e}"))
                }
            })?;

    Ok(SiteEpoch {
        id,
        epoch_value: new.epoch_value.clone(),
        label: new.label.clone(),
    })
}

/// Replaces a site epoch's value and label.
pub async fn update_site_epoch(
    pool: &PgPool,
    id: i32,
    new: &NewSiteEpoch,
) -> Result<SiteEpoch, StorageError> {
    let updated: Option<i32> = query_scalar(
        "UPDATE site_epochs SET epoch_value = $2, label = $3 WHERE id = $1 RETURNING id",
    )
    .bind(id)
    .bind(&new.epoch_value)
    .bind(&new.label)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            StorageError::already_exists("site epoch", &new.epoch_value)
        } else {
            StorageError::internal(format!("Failed to update site epoch: {e}"))
        }
    })?;

    match updated {
        Some(id) => Ok(SiteEpoch {
            id,
            epoch_value: new.epoch_value.clone(),
            label: new.label.clone(),
        }),
        None => Err(StorageError::not_found("site epoch", i64::from(id))),
    }
}

/// Deletes a site epoch, refusing while points still reference it.
pub async fn delete_site_epoch(pool: &PgPool, id: i32) -> Result<(), StorageError> {
    let references: i64 = query_scalar("SELECT COUNT(*) FROM sites_points WHERE epoch_id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::internal(format!("Failed to count epoch references: {e}")))?;

    if references > 0 {
        return Err(StorageError::in_use("site epoch", i64::from(id), references));
    }

    let result = query("DELETE FROM site_epochs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::internal(format!("Failed to delete site epoch: {e}")))?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("site epoch", i64::from(id)));
    }

    Ok(())
}

/// Lists divisions (id + name) ordered by name.
pub async fn list_admin_divisions(pool: &PgPool) -> Result<Vec<AdminDivision>, StorageError> {
    let rows: Vec<(i32, Option<String>)> =
        query_as("SELECT id, name FROM admin_divisions ORDER BY name ASC")
            .fetch_all(pool)
            .await
            .map_err(|e| StorageError::internal(format!("Failed to list divisions: {e}")))?;

    Ok(rows
        .into_iter()
        .map(|(id, name)| AdminDivision { id, name })
        .collect())
}

/// Returns divisions intersecting the bounding box with GeoJSON boundaries.
pub async fn admin_areas_in_bbox(
    pool: &PgPool,
    bbox: &BoundingBox,
) -> Result<Vec<AdminAreaFeature>, StorageError> {
    let rows: Vec<(i32, Option<String>, String)> = query_as(
        r#"SELECT id, name, ST_AsGeoJSON(geom)
           FROM admin_divisions
           WHERE geom IS NOT NULL
             AND geom && ST_MakeEnvelope($1, $2, $3, $4, 4326)"#,
    )
    .bind(bbox.lon_min)
    .bind(bbox.lat_min)
    .bind(bbox.lon_max)
    .bind(bbox.lat_max)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::internal(format!("Failed to query divisions in bbox: {e}")))?;

    rows.into_iter()
        .map(|(id, name, geometry)| {
            let geometry = serde_json::from_str(&geometry).map_err(|e| {
                StorageError::internal(format!("Invalid GeoJSON for division {id}: {e}"))
            })?;
            Ok(AdminAreaFeature { id, name, geometry })
        })
        .collect()
}
