//! Document table queries.

use chrono::{DateTime, Utc};
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;

use geocat_core::{Document, DocumentSummary};
use geocat_storage::{NewDocument, StorageError};

use crate::error::is_unique_violation;

type DocumentRow = (
    i32,
    String,
    String,
    String,
    i64,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn into_document(row: DocumentRow) -> Document {
    let (id, filename, filepath, mimetype, size, description, created_at, updated_at) = row;
    Document {
        id,
        filename,
        filepath,
        mimetype,
        size,
        description,
        created_at,
        updated_at,
    }
}

/// Lists document summaries, newest first.
pub async fn list_documents(pool: &PgPool) -> Result<Vec<DocumentSummary>, StorageError> {
    let rows: Vec<(i32, String, Option<String>, i64, String, DateTime<Utc>)> = query_as(
        r#"SELECT id, filename, description, size, mimetype, created_at
           FROM documents
           ORDER BY created_at DESC"#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::internal(format!("Failed to list documents: {e}")))?;

    Ok(rows
        .into_iter()
        .map(
            |(id, filename, description, size, mimetype, created_at)| DocumentSummary {
                id,
                filename,
                description,
                size,
                mimetype,
                created_at,
            },
        )
        .collect())
}

/// Registers an uploaded document.
pub async fn create_document(pool: &PgPool, new: &NewDocument) -> Result<Document, StorageError> {
    let row: (i32, DateTime<Utc>, DateTime<Utc>) = query_as(
        r#"INSERT INTO documents (filename, filepath, mimetype, size, description)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING id, created_at, updated_at"#,
    )
    .bind(&new.filename)
    .bind(&new.filepath)
    .bind(&new.mimetype)
    .bind(new.size)
    .bind(&new.description)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            StorageError::already_exists("document", &new.filepath)
        } else {
            StorageError::internal(format!("Failed to create document: {e}"))
        }
    })?;

    Ok(Document {
        id: row.0,
        filename: new.filename.clone(),
        filepath: new.filepath.clone(),
        mimetype: new.mimetype.clone(),
        size: new.size,
        description: new.description.clone(),
        created_at: row.1,
        updated_at: row.2,
    })
}

/// Reads a document record, or `None` if the ID does not exist.
pub async fn get_document(pool: &PgPool, id: i32) -> Result<Option<Document>, StorageError> {
    let row: Option<DocumentRow> = query_as(
        r#"SELECT id, filename, filepath, mimetype, size, description, created_at, updated_at
           FROM documents
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::internal(format!("Failed to read document: {e}")))?;

    Ok(row.map(into_document))
}

/// Deletes a document record and returns it; point links cascade.
pub async fn delete_document(pool: &PgPool, id: i32) -> Result<Document, StorageError> {
    let row: Option<DocumentRow> = query_as(
        r#"DELETE FROM documents
           WHERE id = $1
           RETURNING id, filename, filepath, mimetype, size, description, created_at, updated_at"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::internal(format!("Failed to delete document: {e}")))?;

    row.map(into_document)
        .ok_or_else(|| StorageError::not_found("document", i64::from(id)))
}
