use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::database::manager::DatabaseManager;
use crate::database::models::note::Note;
use crate::database::models::user::UserRole;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};

use super::scope::{ensure_in_scope, resolve_scope, Scope};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNote {
    /// Exactly one of user_id/lead_id must be set
    pub user_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    #[validate(length(min = 1, max = 5000, message = "Body is required"))]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteFilters {
    pub user_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
}

/// Check the caller may see the note target; leads resolve through their
/// franchise, users through franchise membership or self.
async fn check_target(
    pool: &PgPool,
    auth: &AuthUser,
    scope: &Scope,
    user_id: Option<Uuid>,
    lead_id: Option<Uuid>,
) -> Result<(), ApiError> {
    match (user_id, lead_id) {
        (Some(_), Some(_)) | (None, None) => Err(ApiError::bad_request(
            "Provide exactly one of user_id or lead_id",
        )),
        (None, Some(lead_id)) => {
            let franchise_id: Option<Uuid> = sqlx::query_scalar(
                "SELECT franchise_id FROM leads WHERE id = $1 AND deleted_at IS NULL",
            )
            .bind(lead_id)
            .fetch_optional(pool)
            .await?;
            let franchise_id = franchise_id.ok_or_else(|| ApiError::not_found("Lead not found"))?;
            ensure_in_scope(scope, franchise_id)
        }
        (Some(user_id), None) => {
            if user_id == auth.user_id || auth.role == UserRole::Admin {
                return Ok(());
            }
            let target_franchise: Option<Option<Uuid>> = sqlx::query_scalar(
                "SELECT franchise_id FROM users WHERE id = $1 AND deleted_at IS NULL",
            )
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
            let target_franchise =
                target_franchise.ok_or_else(|| ApiError::not_found("User not found"))?;
            match target_franchise {
                Some(franchise_id) => ensure_in_scope(scope, franchise_id),
                None => Err(ApiError::forbidden("You do not have access to this user")),
            }
        }
    }
}

/// GET /api/notes?lead_id=… or ?user_id=…
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
    Query(filters): Query<NoteFilters>,
) -> Result<ApiResponse<Paginated<Note>>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    check_target(&pool, &auth, &scope, filters.user_id, filters.lead_id).await?;

    let mut query = SelectQuery::new("notes");
    if let Some(user_id) = filters.user_id {
        query.and_eq_uuid("user_id", user_id);
    }
    if let Some(lead_id) = filters.lead_id {
        query.and_eq_uuid("lead_id", lead_id);
    }
    query
        .order(page.sort.as_deref(), page.order.as_deref(), &["created_at"], "created_at")?
        .paginate(&page);

    Ok(ApiResponse::success(query.fetch_paginated(&pool).await?))
}

/// POST /api/notes
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateNote>,
) -> Result<ApiResponse<Note>, ApiError> {
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    check_target(&pool, &auth, &scope, payload.user_id, payload.lead_id).await?;

    let note: Note = sqlx::query_as(
        "INSERT INTO notes (author_id, user_id, lead_id, body) \
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(auth.user_id)
    .bind(payload.user_id)
    .bind(payload.lead_id)
    .bind(payload.body.trim())
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::created(note))
}

/// DELETE /api/notes/:id - author or admin only.
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let note: Option<Note> =
        sqlx::query_as("SELECT * FROM notes WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&pool)
            .await?;
    let note = note.ok_or_else(|| ApiError::not_found("Note not found"))?;

    if note.author_id != auth.user_id && auth.role != UserRole::Admin {
        return Err(ApiError::forbidden("Only the author can delete a note"));
    }

    sqlx::query("UPDATE notes SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::success(json!({ "id": id })).with_message("Note deleted"))
}
