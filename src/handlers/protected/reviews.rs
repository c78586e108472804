use std::collections::HashMap;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::review::Review;
use crate::database::models::user::UserRole;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};

use super::scope::{ensure_in_scope, require_role, resolve_scope};

#[derive(Debug, Deserialize)]
pub struct CreateReview {
    pub rating: i32,
    pub author_name: Option<String>,
    pub comment: Option<String>,
}

async fn unit_franchise(pool: &sqlx::PgPool, unit_id: Uuid) -> Result<Uuid, ApiError> {
    let franchise_id: Option<Uuid> =
        sqlx::query_scalar("SELECT franchise_id FROM units WHERE id = $1 AND deleted_at IS NULL")
            .bind(unit_id)
            .fetch_optional(pool)
            .await?;
    franchise_id.ok_or_else(|| ApiError::not_found("Unit not found"))
}

/// GET /api/units/:id/reviews
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Path(unit_id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> Result<ApiResponse<Paginated<Review>>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let franchise_id = unit_franchise(&pool, unit_id).await?;
    ensure_in_scope(&scope, franchise_id)?;

    let mut query = SelectQuery::new("reviews");
    query.and_eq_uuid("unit_id", unit_id);
    query
        .order(page.sort.as_deref(), page.order.as_deref(), &["rating", "created_at"], "created_at")?
        .paginate(&page);

    Ok(ApiResponse::success(query.fetch_paginated(&pool).await?))
}

/// POST /api/units/:id/reviews
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Path(unit_id): Path<Uuid>,
    Json(payload): Json<CreateReview>,
) -> Result<ApiResponse<Review>, ApiError> {
    if !(1..=5).contains(&payload.rating) {
        let mut errors = HashMap::new();
        errors.insert(
            "rating".to_string(),
            "Rating must be between 1 and 5".to_string(),
        );
        return Err(ApiError::unprocessable_entity("Validation failed", errors));
    }

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let franchise_id = unit_franchise(&pool, unit_id).await?;
    ensure_in_scope(&scope, franchise_id)?;

    let review: Review = sqlx::query_as(
        "INSERT INTO reviews (unit_id, rating, author_name, comment) \
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(unit_id)
    .bind(payload.rating)
    .bind(&payload.author_name)
    .bind(&payload.comment)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::created(review))
}

/// DELETE /api/reviews/:id
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let unit_id: Option<Uuid> =
        sqlx::query_scalar("SELECT unit_id FROM reviews WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&pool)
            .await?;
    let unit_id = unit_id.ok_or_else(|| ApiError::not_found("Review not found"))?;
    let franchise_id = unit_franchise(&pool, unit_id).await?;
    ensure_in_scope(&scope, franchise_id)?;

    sqlx::query("UPDATE reviews SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::success(json!({ "id": id })).with_message("Review deleted"))
}
