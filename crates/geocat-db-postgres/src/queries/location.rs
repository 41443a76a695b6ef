//! Coordinate location queries: containing division + nearest settlement.

use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;

use geocat_core::{LocatedPlace, LonLat};
use geocat_storage::StorageError;

/// Finds the administrative division containing the coordinate and the
/// nearest settlement. Returns `None` when no division contains it.
pub async fn locate(pool: &PgPool, at: LonLat) -> Result<Option<LocatedPlace>, StorageError> {
    let division: Option<Option<String>> = query_scalar(
        r#"SELECT name FROM admin_divisions
           WHERE geom IS NOT NULL
             AND ST_Contains(geom, ST_SetSRID(ST_MakePoint($1, $2), 4326))
           LIMIT 1"#,
    )
    .bind(at.lon)
    .bind(at.lat)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::internal(format!("Failed to locate division: {e}")))?;

    let Some(division) = division else {
        return Ok(None);
    };

    let settlement: Option<Option<String>> = query_scalar(
        r#"SELECT name FROM settlements
           WHERE geom IS NOT NULL
           ORDER BY ST_Distance(geom, ST_SetSRID(ST_MakePoint($1, $2), 4326)) ASC
           LIMIT 1"#,
    )
    .bind(at.lon)
    .bind(at.lat)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::internal(format!("Failed to locate settlement: {e}")))?;

    Ok(Some(LocatedPlace {
        division,
        settlement: settlement.flatten(),
    }))
}
