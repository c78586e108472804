use axum::extract::{Multipart, Path, Query};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::document::{Document, DocumentStatus};
use crate::database::models::user::UserRole;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};
use crate::services::storage;

use super::scope::{
    ensure_in_scope, require_franchise, require_role, resolve_scope, target_franchise, Scope,
};

const SORTABLE: &[&str] = &["title", "status", "size_bytes", "created_at"];

#[derive(Debug, Deserialize)]
pub struct DocumentFilters {
    pub franchise_id: Option<Uuid>,
    pub status: Option<String>,
    /// Substring match on document title
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentStatus {
    pub status: DocumentStatus,
}

async fn scoped_document(pool: &PgPool, scope: &Scope, id: Uuid) -> Result<Document, ApiError> {
    let document: Option<Document> =
        sqlx::query_as("SELECT * FROM documents WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let document = document.ok_or_else(|| ApiError::not_found("Document not found"))?;
    ensure_in_scope(scope, document.franchise_id)?;
    Ok(document)
}

/// GET /api/documents
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
    Query(filters): Query<DocumentFilters>,
) -> Result<ApiResponse<Paginated<Document>>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let mut query = SelectQuery::new("documents");
    scope.apply(&mut query, "franchise_id");
    if let Some(franchise_id) = filters.franchise_id {
        ensure_in_scope(&scope, franchise_id)?;
        query.and_eq_uuid("franchise_id", franchise_id);
    }
    if let Some(status) = filters.status.as_deref() {
        let status: DocumentStatus = status
            .parse()
            .map_err(|_| ApiError::bad_request("Unknown document status"))?;
        query.and_eq_status("status", status.as_str());
    }
    if let Some(q) = filters.q.as_deref() {
        query.and_ilike("title", q);
    }
    query
        .order(page.sort.as_deref(), page.order.as_deref(), SORTABLE, "created_at")?
        .paginate(&page);

    Ok(ApiResponse::success(query.fetch_paginated(&pool).await?))
}

/// GET /api/documents/:id
pub async fn get(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Document>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    Ok(ApiResponse::success(
        scoped_document(&pool, &scope, id).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub franchise_id: Option<Uuid>,
}

/// POST /api/documents - multipart upload with `title` and `file` fields.
/// The stored sha256 checksum lets clients verify integrity on download.
pub async fn upload(
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<ApiResponse<Document>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let franchise_id = target_franchise(&scope, params.franchise_id)?;
    require_franchise(&pool, &scope, franchise_id).await?;

    let mut title: Option<String> = None;
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Malformed multipart body"))?
    {
        match field.name() {
            Some("title") => {
                title = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| ApiError::bad_request("Invalid 'title' field"))?,
                );
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(|ct| ct.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::bad_request("Failed to read uploaded file"))?;
                file = Some((filename, content_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;
    let title = title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| filename.clone());

    let stored = storage::store("documents", &filename, &bytes).await?;

    let document: Document = sqlx::query_as(
        "INSERT INTO documents \
           (franchise_id, uploaded_by, title, file_path, content_type, size_bytes, checksum) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(franchise_id)
    .bind(auth.user_id)
    .bind(title.trim())
    .bind(&stored.path)
    .bind(&content_type)
    .bind(stored.size_bytes)
    .bind(&stored.checksum)
    .fetch_one(&pool)
    .await?;

    tracing::info!(document_id = %document.id, franchise_id = %franchise_id, "Uploaded document");

    Ok(ApiResponse::created(document))
}

/// GET /api/documents/:id/download - stream the stored bytes back.
pub async fn download(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let document = scoped_document(&pool, &scope, id).await?;

    let bytes = tokio::fs::read(storage::absolute_path(&document.file_path))
        .await
        .map_err(|e| {
            tracing::error!(document_id = %document.id, "Stored file missing: {}", e);
            ApiError::not_found("Stored file is no longer available")
        })?;

    let content_type = document
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document.title.replace('"', "")),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// PATCH /api/documents/:id/status - approve or reject.
pub async fn update_status(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDocumentStatus>,
) -> Result<ApiResponse<Document>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_document(&pool, &scope, id).await?;

    let document: Document = sqlx::query_as(
        "UPDATE documents SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.status)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(document))
}

/// DELETE /api/documents/:id - soft delete; stored bytes are kept.
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_document(&pool, &scope, id).await?;

    sqlx::query("UPDATE documents SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::success(json!({ "id": id })).with_message("Document deleted"))
}
