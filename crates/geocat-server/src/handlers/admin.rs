//! Admin catalog management handlers (behind the bearer-token gate).
//!
//! Every cached list read goes through the read-through accessor; every
//! mutation commits to storage first and then drops the keys the policy
//! table names, before the response is sent.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use geocat_core::{
    AdminDivision, Document, DocumentSummary, PointDetail, PointSummary, SiteEpoch, SiteType,
};
use geocat_storage::{
    CatalogStorage, NewDocument, NewPoint, NewSiteEpoch, NewSiteType, Page, PageParams,
};

use crate::cache::{CacheKey, CatalogMutation};
use crate::error::ApiError;
use crate::server::AppState;

// ==================== Site types ====================

#[derive(Debug, Deserialize)]
pub struct TypePayload {
    pub type_value: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EpochPayload {
    pub epoch_value: Option<String>,
    pub label: Option<String>,
}

fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::BadRequest(format!("field '{name}' is required"))),
    }
}

/// GET /api/admin/types - cached site-type list.
pub async fn list_types(State(state): State<AppState>) -> Result<Json<Vec<SiteType>>, ApiError> {
    let storage = state.storage.clone();
    let types = state
        .cache
        .get_or_load(CacheKey::AdminTypes, || async move {
            storage.list_site_types().await.map_err(ApiError::from)
        })
        .await?;
    Ok(Json(types))
}

/// POST /api/admin/types
pub async fn create_type(
    State(state): State<AppState>,
    Json(payload): Json<TypePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let new = NewSiteType {
        type_value: required(payload.type_value, "type_value")?,
        label: Some(required(payload.label, "label")?),
    };
    let created = state.storage.create_site_type(&new).await?;
    state.cache.invalidate_for(CatalogMutation::SiteType).await;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/admin/types/{id}
pub async fn update_type(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<TypePayload>,
) -> Result<Json<SiteType>, ApiError> {
    let new = NewSiteType {
        type_value: required(payload.type_value, "type_value")?,
        label: Some(required(payload.label, "label")?),
    };
    let updated = state.storage.update_site_type(id, &new).await?;
    state.cache.invalidate_for(CatalogMutation::SiteType).await;
    Ok(Json(updated))
}

/// DELETE /api/admin/types/{id}
pub async fn delete_type(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.storage.delete_site_type(id).await?;
    state.cache.invalidate_for(CatalogMutation::SiteType).await;
    Ok(Json(json!({ "message": "type deleted" })))
}

// ==================== Site epochs ====================

/// GET /api/admin/epochs - cached site-epoch list.
pub async fn list_epochs(State(state): State<AppState>) -> Result<Json<Vec<SiteEpoch>>, ApiError> {
    let storage = state.storage.clone();
    let epochs = state
        .cache
        .get_or_load(CacheKey::AdminEpochs, || async move {
            storage.list_site_epochs().await.map_err(ApiError::from)
        })
        .await?;
    Ok(Json(epochs))
}

/// POST /api/admin/epochs
pub async fn create_epoch(
    State(state): State<AppState>,
    Json(payload): Json<EpochPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let new = NewSiteEpoch {
        epoch_value: required(payload.epoch_value, "epoch_value")?,
        label: Some(required(payload.label, "label")?),
    };
    let created = state.storage.create_site_epoch(&new).await?;
    state.cache.invalidate_for(CatalogMutation::SiteEpoch).await;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/admin/epochs/{id}
pub async fn update_epoch(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<EpochPayload>,
) -> Result<Json<SiteEpoch>, ApiError> {
    let new = NewSiteEpoch {
        epoch_value: required(payload.epoch_value, "epoch_value")?,
        label: Some(required(payload.label, "label")?),
    };
    let updated = state.storage.update_site_epoch(id, &new).await?;
    state.cache.invalidate_for(CatalogMutation::SiteEpoch).await;
    Ok(Json(updated))
}

/// DELETE /api/admin/epochs/{id}
pub async fn delete_epoch(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.storage.delete_site_epoch(id).await?;
    state.cache.invalidate_for(CatalogMutation::SiteEpoch).await;
    Ok(Json(json!({ "message": "epoch deleted" })))
}

// ==================== Points ====================

#[derive(Debug, Deserialize)]
pub struct PointPayload {
    pub name: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub type_id: i32,
    pub epoch_id: i32,
    pub admin_division_id: Option<i32>,
    pub document_ids: Option<Vec<i32>>,
}

impl PointPayload {
    fn into_new_point(self) -> Result<NewPoint, ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::BadRequest("field 'name' is required".into()));
        }
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(ApiError::BadRequest("invalid coordinates".into()));
        }
        Ok(NewPoint {
            name: self.name,
            short_description: self.short_description,
            description: self.description,
            latitude: self.latitude,
            longitude: self.longitude,
            type_id: self.type_id,
            epoch_id: self.epoch_id,
            admin_division_id: self.admin_division_id,
            document_ids: self.document_ids,
        })
    }
}

/// GET /api/admin/points?page=&limit= - paginated table, NOT cached.
pub async fn list_points(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<PointSummary>>, ApiError> {
    Ok(Json(state.storage.list_points(&params).await?))
}

/// POST /api/admin/points
///
/// Creates don't invalidate anything: no list cache covers the point
/// collection and a fresh ID cannot have a stale detail entry.
pub async fn create_point(
    State(state): State<AppState>,
    Json(payload): Json<PointPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let new = payload.into_new_point()?;
    let created = state.storage.create_point(&new).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/admin/points/{id}
pub async fn update_point(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<PointPayload>,
) -> Result<Json<PointDetail>, ApiError> {
    let new = payload.into_new_point()?;
    let updated = state.storage.update_point(id, &new).await?;
    state.cache.invalidate_for(CatalogMutation::Point(id)).await;
    Ok(Json(updated))
}

/// DELETE /api/admin/points/{id}
pub async fn delete_point(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.storage.delete_point(id).await?;
    state.cache.invalidate_for(CatalogMutation::Point(id)).await;
    Ok(Json(json!({ "message": "point deleted" })))
}

// ==================== Administrative divisions ====================

/// GET /api/admin/admin-divisions - cached division list.
pub async fn list_admin_divisions(
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminDivision>>, ApiError> {
    let storage = state.storage.clone();
    let divisions = state
        .cache
        .get_or_load(CacheKey::AdminDivisions, || async move {
            storage.list_admin_divisions().await.map_err(ApiError::from)
        })
        .await?;
    Ok(Json(divisions))
}

// ==================== Documents ====================

/// GET /api/admin/documents - cached document list.
pub async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<DocumentSummary>>, ApiError> {
    let storage = state.storage.clone();
    let documents = state
        .cache
        .get_or_load(CacheKey::AdminDocuments, || async move {
            storage.list_documents().await.map_err(ApiError::from)
        })
        .await?;
    Ok(Json(documents))
}

/// POST /api/admin/documents - multipart PDF upload.
///
/// The file lands on disk first; if the database insert then fails the
/// stored file is removed again so disk and database stay in step.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut description: Option<String> = None;
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("document") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "document.pdf".to_string());
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_default();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
                file = Some((filename, content_type, data.to_vec()));
            }
            Some("description") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read field: {e}")))?;
                if !text.is_empty() {
                    description = Some(text);
                }
            }
            _ => {}
        }
    }

    let (filename, content_type, data) =
        file.ok_or_else(|| ApiError::BadRequest("no file was uploaded".into()))?;

    if content_type != "application/pdf" {
        return Err(ApiError::BadRequest("only PDF files are allowed".into()));
    }
    if data.len() > state.uploads.max_bytes {
        return Err(ApiError::BadRequest(format!(
            "file exceeds the {} byte limit",
            state.uploads.max_bytes
        )));
    }

    tokio::fs::create_dir_all(&state.uploads.dir)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to create upload dir: {e}")))?;

    let stored_name = format!("{}.pdf", Uuid::new_v4());
    let path = state.uploads.dir.join(&stored_name);
    tokio::fs::write(&path, &data)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to store upload: {e}")))?;

    let new = NewDocument {
        filename,
        filepath: stored_name,
        mimetype: content_type,
        size: data.len() as i64,
        description,
    };

    match state.storage.create_document(&new).await {
        Ok(document) => {
            state.cache.invalidate_for(CatalogMutation::Document).await;
            Ok((StatusCode::CREATED, Json(document)))
        }
        Err(e) => {
            if let Err(unlink_err) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %unlink_err,
                    "failed to remove stored file after database error");
            }
            Err(e.into())
        }
    }
}

/// DELETE /api/admin/documents/{id}
///
/// Removes the row first; the file unlink afterwards is best-effort, a
/// missing file is only logged.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let document: Document = state.storage.delete_document(id).await?;

    if let Some(stored_name) = std::path::Path::new(&document.filepath).file_name() {
        let path = state.uploads.dir.join(stored_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(document_id = id, path = %path.display(), "stored file already gone");
            }
            Err(e) => {
                tracing::error!(document_id = id, path = %path.display(), error = %e,
                    "failed to remove stored file");
            }
        }
    }

    state.cache.invalidate_for(CatalogMutation::Document).await;
    Ok(Json(json!({ "message": "document deleted" })))
}
