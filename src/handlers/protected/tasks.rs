use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::database::manager::DatabaseManager;
use crate::database::models::task::{Task, TaskPriority, TaskStatus};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};

use super::scope::{ensure_in_scope, require_franchise, resolve_scope, target_franchise, Scope};

const SORTABLE: &[&str] = &["title", "status", "priority", "due_on", "created_at"];

#[derive(Debug, Deserialize)]
pub struct TaskFilters {
    pub franchise_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_before: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTask {
    pub franchise_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    pub description: Option<String>,
    pub due_on: Option<NaiveDate>,
    pub priority: Option<TaskPriority>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTask {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_on: Option<NaiveDate>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<Uuid>,
    pub unit_id: Option<Uuid>,
}

async fn scoped_task(pool: &PgPool, scope: &Scope, id: Uuid) -> Result<Task, ApiError> {
    let task: Option<Task> =
        sqlx::query_as("SELECT * FROM tasks WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let task = task.ok_or_else(|| ApiError::not_found("Task not found"))?;
    ensure_in_scope(scope, task.franchise_id)?;
    Ok(task)
}

/// GET /api/tasks
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
    Query(filters): Query<TaskFilters>,
) -> Result<ApiResponse<Paginated<Task>>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let mut query = SelectQuery::new("tasks");
    scope.apply(&mut query, "franchise_id");
    if let Some(franchise_id) = filters.franchise_id {
        ensure_in_scope(&scope, franchise_id)?;
        query.and_eq_uuid("franchise_id", franchise_id);
    }
    if let Some(unit_id) = filters.unit_id {
        query.and_eq_uuid("unit_id", unit_id);
    }
    if let Some(assigned_to) = filters.assigned_to {
        query.and_eq_uuid("assigned_to", assigned_to);
    }
    if let Some(status) = filters.status.as_deref() {
        let status: TaskStatus = status
            .parse()
            .map_err(|_| ApiError::bad_request("Unknown task status"))?;
        query.and_eq_status("status", status.as_str());
    }
    if let Some(priority) = filters.priority.as_deref() {
        let priority: TaskPriority = priority
            .parse()
            .map_err(|_| ApiError::bad_request("Unknown task priority"))?;
        query.and_eq_status("priority", priority.as_str());
    }
    if let Some(due_before) = filters.due_before {
        query.and_date_to("due_on", due_before);
    }
    query
        .order(page.sort.as_deref(), page.order.as_deref(), SORTABLE, "created_at")?
        .paginate(&page);

    Ok(ApiResponse::success(query.fetch_paginated(&pool).await?))
}

/// GET /api/tasks/:id
pub async fn get(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Task>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    Ok(ApiResponse::success(scoped_task(&pool, &scope, id).await?))
}

/// POST /api/tasks
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateTask>,
) -> Result<ApiResponse<Task>, ApiError> {
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let franchise_id = target_franchise(&scope, payload.franchise_id)?;
    require_franchise(&pool, &scope, franchise_id).await?;

    let task: Task = sqlx::query_as(
        "INSERT INTO tasks (franchise_id, unit_id, assigned_to, title, description, due_on, priority) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(franchise_id)
    .bind(payload.unit_id)
    .bind(payload.assigned_to)
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.due_on)
    .bind(payload.priority.unwrap_or(TaskPriority::Medium))
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::created(task))
}

/// PATCH /api/tasks/:id
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTask>,
) -> Result<ApiResponse<Task>, ApiError> {
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_task(&pool, &scope, id).await?;

    let task: Task = sqlx::query_as(
        "UPDATE tasks SET \
           title = COALESCE($2, title), \
           description = COALESCE($3, description), \
           due_on = COALESCE($4, due_on), \
           priority = COALESCE($5, priority), \
           status = COALESCE($6, status), \
           assigned_to = COALESCE($7, assigned_to), \
           unit_id = COALESCE($8, unit_id), \
           completed_at = CASE WHEN $6::task_status = 'done' THEN now() ELSE completed_at END, \
           updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.title.as_deref().map(str::trim))
    .bind(&payload.description)
    .bind(payload.due_on)
    .bind(payload.priority)
    .bind(payload.status)
    .bind(payload.assigned_to)
    .bind(payload.unit_id)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(task))
}

/// POST /api/tasks/:id/complete
pub async fn complete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Task>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_task(&pool, &scope, id).await?;

    let task: Task = sqlx::query_as(
        "UPDATE tasks SET status = 'done', completed_at = now(), updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(task))
}

/// DELETE /api/tasks/:id - soft delete
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_task(&pool, &scope, id).await?;

    sqlx::query("UPDATE tasks SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::success(json!({ "id": id })).with_message("Task deleted"))
}
