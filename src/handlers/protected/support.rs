use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::database::manager::DatabaseManager;
use crate::database::models::support::{SupportRequest, SupportStatus};
use crate::database::models::task::TaskPriority;
use crate::database::models::user::UserRole;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};

use super::scope::require_role;

const SORTABLE: &[&str] = &["subject", "status", "priority", "created_at"];

#[derive(Debug, Deserialize)]
pub struct SupportFilters {
    pub status: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSupportRequest {
    #[validate(length(min = 1, max = 200, message = "Subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, max = 10000, message = "Body is required"))]
    pub body: String,
    pub priority: Option<TaskPriority>,
    pub franchise_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSupportRequest {
    #[validate(length(min = 1, max = 200, message = "Subject is required"))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 10000, message = "Body is required"))]
    pub body: Option<String>,
    pub priority: Option<TaskPriority>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSupportStatus {
    pub status: SupportStatus,
}

/// Admins work the whole queue; everyone else sees only their own tickets.
async fn fetch_visible(
    pool: &PgPool,
    auth: &AuthUser,
    id: Uuid,
) -> Result<SupportRequest, ApiError> {
    let ticket: Option<SupportRequest> =
        sqlx::query_as("SELECT * FROM support_requests WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let ticket = ticket.ok_or_else(|| ApiError::not_found("Support request not found"))?;

    if auth.role != UserRole::Admin && ticket.opened_by != auth.user_id {
        return Err(ApiError::forbidden(
            "You do not have access to this support request",
        ));
    }
    Ok(ticket)
}

/// GET /api/support
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
    Query(filters): Query<SupportFilters>,
) -> Result<ApiResponse<Paginated<SupportRequest>>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let mut query = SelectQuery::new("support_requests");
    if auth.role != UserRole::Admin {
        query.and_eq_uuid("opened_by", auth.user_id);
    }
    if let Some(status) = filters.status.as_deref() {
        let status: SupportStatus = status
            .parse()
            .map_err(|_| ApiError::bad_request("Unknown support status"))?;
        query.and_eq_status("status", status.as_str());
    }
    if let Some(priority) = filters.priority.as_deref() {
        let priority: TaskPriority = priority
            .parse()
            .map_err(|_| ApiError::bad_request("Unknown priority"))?;
        query.and_eq_status("priority", priority.as_str());
    }
    query
        .order(page.sort.as_deref(), page.order.as_deref(), SORTABLE, "created_at")?
        .paginate(&page);

    Ok(ApiResponse::success(query.fetch_paginated(&pool).await?))
}

/// GET /api/support/:id
pub async fn get(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<SupportRequest>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    Ok(ApiResponse::success(fetch_visible(&pool, &auth, id).await?))
}

/// POST /api/support
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateSupportRequest>,
) -> Result<ApiResponse<SupportRequest>, ApiError> {
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;

    let ticket: SupportRequest = sqlx::query_as(
        "INSERT INTO support_requests (opened_by, franchise_id, subject, body, priority) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(auth.user_id)
    .bind(payload.franchise_id)
    .bind(payload.subject.trim())
    .bind(payload.body.trim())
    .bind(payload.priority.unwrap_or(TaskPriority::Medium))
    .fetch_one(&pool)
    .await?;

    tracing::info!(ticket_id = %ticket.id, "Opened support request");

    Ok(ApiResponse::created(ticket))
}

/// PATCH /api/support/:id - opener or admin edits an open ticket.
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSupportRequest>,
) -> Result<ApiResponse<SupportRequest>, ApiError> {
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;
    fetch_visible(&pool, &auth, id).await?;

    let ticket: SupportRequest = sqlx::query_as(
        "UPDATE support_requests SET \
           subject = COALESCE($2, subject), \
           body = COALESCE($3, body), \
           priority = COALESCE($4, priority), \
           updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.subject.as_deref().map(str::trim))
    .bind(payload.body.as_deref().map(str::trim))
    .bind(payload.priority)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(ticket))
}

/// PATCH /api/support/:id/status - admins only.
pub async fn update_status(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSupportStatus>,
) -> Result<ApiResponse<SupportRequest>, ApiError> {
    require_role(&auth, &[UserRole::Admin])?;

    let pool = DatabaseManager::pool().await?;
    fetch_visible(&pool, &auth, id).await?;

    let ticket: SupportRequest = sqlx::query_as(
        "UPDATE support_requests SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.status)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(ticket))
}

/// DELETE /api/support/:id - opener or admin.
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    fetch_visible(&pool, &auth, id).await?;

    sqlx::query("UPDATE support_requests SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::success(json!({ "id": id })).with_message("Support request deleted"))
}
