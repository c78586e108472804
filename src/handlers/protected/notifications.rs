//! Handlers for the current user's in-app notifications. Notifications are
//! user-scoped, not franchise-scoped: the bearer token is the only tenant key.

use axum::extract::{Path, Query};
use axum::Extension;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::notification::Notification;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};

#[derive(Debug, Deserialize)]
pub struct NotificationFilters {
    /// If `true`, return only unread notifications
    pub unread_only: Option<bool>,
}

/// GET /api/notifications
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
    Query(filters): Query<NotificationFilters>,
) -> Result<ApiResponse<Paginated<Notification>>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let mut query = SelectQuery::new("notifications");
    query.and_eq_uuid("user_id", auth.user_id);
    if filters.unread_only.unwrap_or(false) {
        query.and_is_null("read_at");
    }
    query
        .order(page.sort.as_deref(), page.order.as_deref(), &["created_at"], "created_at")?
        .paginate(&page);

    Ok(ApiResponse::success(query.fetch_paginated(&pool).await?))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Notification>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let notification: Option<Notification> = sqlx::query_as(
        "UPDATE notifications SET read_at = COALESCE(read_at, now()), updated_at = now() \
         WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL RETURNING *",
    )
    .bind(id)
    .bind(auth.user_id)
    .fetch_optional(&pool)
    .await?;

    notification
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found("Notification not found"))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let result = sqlx::query(
        "UPDATE notifications SET read_at = now(), updated_at = now() \
         WHERE user_id = $1 AND read_at IS NULL AND deleted_at IS NULL",
    )
    .bind(auth.user_id)
    .execute(&pool)
    .await?;

    Ok(ApiResponse::success(json!({
        "marked_read": result.rows_affected(),
    })))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications \
         WHERE user_id = $1 AND read_at IS NULL AND deleted_at IS NULL",
    )
    .bind(auth.user_id)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(json!({ "count": count })))
}
