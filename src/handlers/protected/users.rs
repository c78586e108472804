use axum::extract::{Multipart, Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::auth::hash_password;
use crate::database::manager::DatabaseManager;
use crate::database::models::user::{User, UserRole};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};
use crate::services::storage;

use super::scope::{ensure_in_scope, require_franchise, require_role, resolve_scope};

const SORTABLE: &[&str] = &["name", "email", "role", "created_at"];

#[derive(Debug, Deserialize)]
pub struct UserFilters {
    pub franchise_id: Option<Uuid>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStaff {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    /// franchisee | broker | sales
    pub role: UserRole,
    pub franchise_id: Uuid,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUser {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

/// GET /api/users - staff listing, scoped to the caller's franchises.
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
    Query(filters): Query<UserFilters>,
) -> Result<ApiResponse<Paginated<User>>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let mut query = SelectQuery::new("users");
    scope.apply(&mut query, "franchise_id");
    if let Some(franchise_id) = filters.franchise_id {
        ensure_in_scope(&scope, franchise_id)?;
        query.and_eq_uuid("franchise_id", franchise_id);
    }
    if let Some(role) = filters.role.as_deref() {
        let role: UserRole = role
            .parse()
            .map_err(|_| ApiError::bad_request("Unknown role"))?;
        query.and_eq_status("role", role.as_str());
    }
    if let Some(active) = filters.is_active {
        query.and_eq_bool("is_active", active);
    }
    query
        .order(page.sort.as_deref(), page.order.as_deref(), SORTABLE, "created_at")?
        .paginate(&page);

    Ok(ApiResponse::success(query.fetch_paginated(&pool).await?))
}

/// POST /api/users - franchisor creates staff scoped to an owned franchise.
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateStaff>,
) -> Result<ApiResponse<User>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;
    payload.validate()?;

    if matches!(payload.role, UserRole::Admin | UserRole::Franchisor) {
        return Err(ApiError::forbidden(
            "Staff role must be franchisee, broker or sales",
        ));
    }

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    require_franchise(&pool, &scope, payload.franchise_id).await?;

    let email = payload.email.trim().to_lowercase();
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND deleted_at IS NULL)",
    )
    .bind(&email)
    .fetch_one(&pool)
    .await?;
    if taken {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let password_hash = hash_password(&payload.password)?;

    let user: User = sqlx::query_as(
        "INSERT INTO users (name, email, password_hash, role, phone, franchise_id) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(payload.name.trim())
    .bind(&email)
    .bind(&password_hash)
    .bind(payload.role)
    .bind(&payload.phone)
    .bind(payload.franchise_id)
    .fetch_one(&pool)
    .await?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "Created staff account");

    Ok(ApiResponse::created(user))
}

/// GET /api/users/:id - self, or staff inside the caller's scope.
pub async fn get(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<User>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let user: Option<User> =
        sqlx::query_as("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&pool)
            .await?;
    let user = user.ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.id != auth.user_id && auth.role != UserRole::Admin {
        let scope = resolve_scope(&pool, &auth).await?;
        match user.franchise_id {
            Some(franchise_id) => ensure_in_scope(&scope, franchise_id)?,
            None => return Err(ApiError::forbidden("You do not have access to this user")),
        }
    }

    Ok(ApiResponse::success(user))
}

/// PATCH /api/users/:id - self or admin.
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUser>,
) -> Result<ApiResponse<User>, ApiError> {
    payload.validate()?;

    if id != auth.user_id && auth.role != UserRole::Admin {
        return Err(ApiError::forbidden("You can only update your own profile"));
    }

    let pool = DatabaseManager::pool().await?;

    let user: Option<User> = sqlx::query_as(
        "UPDATE users SET \
           name = COALESCE($2, name), \
           phone = COALESCE($3, phone), \
           is_active = COALESCE($4, is_active), \
           updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL RETURNING *",
    )
    .bind(id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(&payload.phone)
    .bind(payload.is_active)
    .fetch_optional(&pool)
    .await?;

    user.map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// POST /api/users/:id/avatar - multipart upload, field name `file`.
pub async fn upload_avatar(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<ApiResponse<User>, ApiError> {
    if id != auth.user_id && auth.role != UserRole::Admin {
        return Err(ApiError::forbidden("You can only update your own avatar"));
    }

    let pool = DatabaseManager::pool().await?;

    let mut stored = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Malformed multipart body"))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|_| ApiError::bad_request("Failed to read uploaded file"))?;
            stored = Some(storage::store("avatars", &filename, &bytes).await?);
        }
    }
    let stored = stored.ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;

    let user: Option<User> = sqlx::query_as(
        "UPDATE users SET avatar_path = $2, updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL RETURNING *",
    )
    .bind(id)
    .bind(&stored.path)
    .fetch_optional(&pool)
    .await?;

    user.map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// DELETE /api/users/:id - admin deactivates and soft-deletes an account.
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    require_role(&auth, &[UserRole::Admin])?;

    let result = sqlx::query(
        "UPDATE users SET deleted_at = now(), is_active = FALSE, updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(&DatabaseManager::pool().await?)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(ApiResponse::success(json!({ "id": id })).with_message("User deleted"))
}
