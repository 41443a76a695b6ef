//! Public map-browsing handlers.
//!
//! The bbox endpoints (`/api/data`, `/api/adminAreas`) speak JSONP for the
//! map widget: the payload is wrapped in the caller-supplied callback and
//! served as `application/javascript`, including error payloads. The admin
//! area overlay additionally swaps coordinates to latitude-first order and
//! flattens MultiPolygon boundaries, as the widget expects.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use geocat_core::{BoundingBox, LonLat, PointDetail, PointGeometry, swap_geometry_axes};
use geocat_storage::CatalogStorage;

use crate::cache::CacheKey;
use crate::error::ApiError;
use crate::server::AppState;

/// Public point detail payload; this is what `cache:point:<id>` stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointInfo {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub site_type: Option<String>,
    pub epoch: Option<String>,
    pub admin_division_name: Option<String>,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl From<PointDetail> for PointInfo {
    fn from(detail: PointDetail) -> Self {
        Self {
            id: detail.id,
            name: detail.name,
            site_type: detail.site_type.and_then(|t| t.label),
            epoch: detail.epoch.and_then(|e| e.label),
            admin_division_name: detail.admin_division.and_then(|d| d.name),
            short_description: detail.short_description,
            description: detail.description,
            lat: detail.latitude,
            lon: detail.longitude,
        }
    }
}

/// GET /api/points - every point's geometry.
pub async fn get_points(
    State(state): State<AppState>,
) -> Result<Json<Vec<PointGeometry>>, ApiError> {
    Ok(Json(state.storage.point_geometries().await?))
}

/// GET /api/points/{id} - cached point detail.
pub async fn get_point_info(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<PointInfo>, ApiError> {
    let storage = state.storage.clone();
    let info = state
        .cache
        .get_or_load(CacheKey::Point(id), || async move {
            let detail = storage
                .get_point(id)
                .await?
                .ok_or_else(|| ApiError::NotFound("point not found".into()))?;
            Ok::<_, ApiError>(PointInfo::from(detail))
        })
        .await?;
    Ok(Json(info))
}

#[derive(Debug, Deserialize)]
pub struct JsonpQuery {
    pub bbox: Option<String>,
    pub callback: Option<String>,
}

/// GET /api/data?bbox=&callback= - points in bbox as a JSONP FeatureCollection.
pub async fn get_data(State(state): State<AppState>, Query(q): Query<JsonpQuery>) -> Response {
    let (bbox, callback) = match jsonp_params(&q) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    match state.storage.points_in_bbox(&bbox).await {
        Ok(points) => {
            let features: Vec<Value> = points
                .into_iter()
                .map(|p| {
                    json!({
                        "type": "Feature",
                        "id": p.id,
                        "geometry": p.geometry,
                        "properties": {
                            "iconCaption": p.name.clone(),
                            "hintContent": p.name,
                            "type": p.type_id,
                            "epoch": p.epoch_id,
                        }
                    })
                })
                .collect();
            jsonp(
                StatusCode::OK,
                &callback,
                &feature_collection(features),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to query points in bbox");
            jsonp_error(&callback)
        }
    }
}

/// GET /api/adminAreas?bbox=&callback= - division boundaries as a JSONP
/// FeatureCollection with latitude-first coordinates.
pub async fn get_admin_areas(
    State(state): State<AppState>,
    Query(q): Query<JsonpQuery>,
) -> Response {
    let (bbox, callback) = match jsonp_params(&q) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    match state.storage.admin_areas_in_bbox(&bbox).await {
        Ok(areas) => {
            let features: Vec<Value> = areas
                .into_iter()
                .map(|area| {
                    let mut geometry = area.geometry;
                    swap_geometry_axes(&mut geometry);
                    json!({
                        "type": "Feature",
                        "id": area.id,
                        "geometry": geometry,
                        "properties": {
                            "hintContent": area.name,
                        }
                    })
                })
                .collect();
            jsonp(
                StatusCode::OK,
                &callback,
                &feature_collection(features),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to query admin areas in bbox");
            jsonp_error(&callback)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

/// GET /api/check-location?lon=&lat= - containing division + nearest
/// settlement.
pub async fn check_location(
    State(state): State<AppState>,
    Query(q): Query<LocationQuery>,
) -> Result<Json<Value>, ApiError> {
    let (Some(lon), Some(lat)) = (q.lon, q.lat) else {
        return Err(ApiError::BadRequest(
            "longitude and latitude are required".into(),
        ));
    };
    if !lon.is_finite() || !lat.is_finite() {
        return Err(ApiError::BadRequest("invalid coordinates".into()));
    }

    match state.storage.locate(LonLat::new(lon, lat)).await? {
        Some(place) => Ok(Json(json!({
            "status": "inside",
            "name_ru": place.division,
            "name": place.settlement,
        }))),
        None => Ok(Json(json!({ "status": "outside" }))),
    }
}

/// Combined filter lists; this is what `cache:filters` stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersResponse {
    pub types: Vec<geocat_core::SiteType>,
    pub epochs: Vec<geocat_core::SiteEpoch>,
}

/// GET /api/filters - combined site types + epochs for the public filter UI.
pub async fn get_filters(State(state): State<AppState>) -> Result<Json<FiltersResponse>, ApiError> {
    let storage = state.storage.clone();
    let filters = state
        .cache
        .get_or_load(CacheKey::Filters, || async move {
            let types = storage.list_site_types().await?;
            let epochs = storage.list_site_epochs().await?;
            Ok::<_, ApiError>(FiltersResponse { types, epochs })
        })
        .await?;
    Ok(Json(filters))
}

/// GET /api/documents/{id}/download - stream the stored PDF inline.
pub async fn download_document(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, ApiError> {
    let document = state
        .storage
        .get_document(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("document not found".into()))?;

    // The stored filepath is a bare generated name; take its file_name
    // component anyway so a corrupted row cannot escape the upload dir.
    let stored_name = std::path::Path::new(&document.filepath)
        .file_name()
        .ok_or_else(|| ApiError::Internal("document has no stored file".into()))?;
    let path = state.uploads.dir.join(stored_name);

    let contents = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::error!(document_id = id, path = %path.display(), "stored file missing");
            return Err(ApiError::NotFound("document file not found".into()));
        }
        Err(e) => {
            tracing::error!(document_id = id, error = %e, "failed to read stored file");
            return Err(ApiError::Internal("failed to read document".into()));
        }
    };

    let disposition = format!(
        "inline; filename=\"{}\"",
        urlencoding::encode(&document.filename)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, document.mimetype),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        contents,
    )
        .into_response())
}

// ---- JSONP plumbing ----

fn jsonp_params(q: &JsonpQuery) -> Result<(BoundingBox, String), Response> {
    let (Some(bbox), Some(callback)) = (q.bbox.as_deref(), q.callback.as_deref()) else {
        return Err(
            (StatusCode::BAD_REQUEST, "Missing required parameters").into_response()
        );
    };
    if !valid_callback(callback) {
        return Err((StatusCode::BAD_REQUEST, "Invalid callback").into_response());
    }
    let bbox = BoundingBox::parse(bbox)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response())?;
    Ok((bbox, callback.to_string()))
}

/// Callback names are restricted to identifier-ish characters so the
/// wrapped response cannot inject script.
fn valid_callback(callback: &str) -> bool {
    !callback.is_empty()
        && callback
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
}

fn feature_collection(features: Vec<Value>) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn jsonp(status: StatusCode, callback: &str, payload: &Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/javascript")],
        format!("{callback}({payload})"),
    )
        .into_response()
}

fn jsonp_error(callback: &str) -> Response {
    jsonp(
        StatusCode::INTERNAL_SERVER_ERROR,
        callback,
        &json!({ "error": "Server error" }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_validation() {
        assert!(valid_callback("jsonp_cb1"));
        assert!(valid_callback("ymaps.loader$1"));
        assert!(!valid_callback(""));
        assert!(!valid_callback("alert(1);//"));
        assert!(!valid_callback("cb name"));
    }

    #[test]
    fn point_info_projection() {
        use geocat_core::{DivisionRef, EntityRef};
        let detail = PointDetail {
            id: 3,
            name: "Kalos Limen".into(),
            short_description: Some("short".into()),
            description: None,
            longitude: 32.7,
            latitude: 45.5,
            site_type: Some(EntityRef {
                id: 1,
                label: Some("Settlement".into()),
            }),
            epoch: Some(EntityRef {
                id: 2,
                label: None,
            }),
            admin_division: Some(DivisionRef {
                id: 9,
                name: Some("Chernomorsky".into()),
            }),
            documents: vec![],
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let info = PointInfo::from(detail);
        assert_eq!(info.site_type.as_deref(), Some("Settlement"));
        assert_eq!(info.epoch, None);
        assert_eq!(info.admin_division_name.as_deref(), Some("Chernomorsky"));
        assert_eq!(info.lat, 45.5);
        assert_eq!(info.lon, 32.7);
    }
}
