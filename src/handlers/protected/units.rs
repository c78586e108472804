use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::hash_password;
use crate::database::manager::DatabaseManager;
use crate::database::models::unit::{Unit, UnitStatus};
use crate::database::models::user::{User, UserRole};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};
use crate::services::reports::{self, UnitPerformance};
use crate::stats::DateRange;

use super::scope::{ensure_in_scope, require_franchise, require_role, resolve_scope, Scope};

const SORTABLE: &[&str] = &["name", "city", "status", "opened_on", "created_at"];

#[derive(Debug, Deserialize)]
pub struct UnitFilters {
    pub franchise_id: Option<Uuid>,
    pub status: Option<String>,
    /// Substring match on unit name
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewFranchisee {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUnit {
    pub franchise_id: Uuid,
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub phone: Option<String>,
    pub opened_on: Option<NaiveDate>,
    pub status: Option<UnitStatus>,
    /// When present, a franchisee account is created together with the unit
    /// in one transaction.
    #[validate]
    pub franchisee: Option<NewFranchisee>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUnit {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub phone: Option<String>,
    pub opened_on: Option<NaiveDate>,
    pub status: Option<UnitStatus>,
    pub franchisee_id: Option<Uuid>,
}

async fn fetch_unit(pool: &PgPool, id: Uuid) -> Result<Unit, ApiError> {
    let unit: Option<Unit> =
        sqlx::query_as("SELECT * FROM units WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    unit.ok_or_else(|| ApiError::not_found("Unit not found"))
}

async fn scoped_unit(pool: &PgPool, scope: &Scope, id: Uuid) -> Result<Unit, ApiError> {
    let unit = fetch_unit(pool, id).await?;
    ensure_in_scope(scope, unit.franchise_id)?;
    Ok(unit)
}

/// GET /api/units
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
    Query(filters): Query<UnitFilters>,
) -> Result<ApiResponse<Paginated<Unit>>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let mut query = SelectQuery::new("units");
    scope.apply(&mut query, "franchise_id");
    if let Some(franchise_id) = filters.franchise_id {
        ensure_in_scope(&scope, franchise_id)?;
        query.and_eq_uuid("franchise_id", franchise_id);
    }
    if let Some(status) = filters.status.as_deref() {
        let status: UnitStatus = status
            .parse()
            .map_err(|_| ApiError::bad_request("Unknown unit status"))?;
        query.and_eq_status("status", status.as_str());
    }
    if let Some(q) = filters.q.as_deref() {
        query.and_ilike("name", q);
    }
    query
        .order(page.sort.as_deref(), page.order.as_deref(), SORTABLE, "created_at")?
        .paginate(&page);

    Ok(ApiResponse::success(query.fetch_paginated(&pool).await?))
}

/// GET /api/units/:id
pub async fn get(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Unit>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    Ok(ApiResponse::success(scoped_unit(&pool, &scope, id).await?))
}

/// POST /api/units
///
/// With a `franchisee` payload this creates the franchisee user and the unit
/// atomically: either both rows land or neither does.
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateUnit>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    require_franchise(&pool, &scope, payload.franchise_id).await?;

    let mut tx = pool.begin().await?;

    let franchisee: Option<User> = match &payload.franchisee {
        Some(new_franchisee) => {
            let email = new_franchisee.email.trim().to_lowercase();
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND deleted_at IS NULL)",
            )
            .bind(&email)
            .fetch_one(&mut *tx)
            .await?;
            if taken {
                return Err(ApiError::conflict("Email is already registered"));
            }

            let password_hash = hash_password(&new_franchisee.password)?;
            let user: User = sqlx::query_as(
                "INSERT INTO users (name, email, password_hash, role, franchise_id) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING *",
            )
            .bind(new_franchisee.name.trim())
            .bind(&email)
            .bind(&password_hash)
            .bind(UserRole::Franchisee)
            .bind(payload.franchise_id)
            .fetch_one(&mut *tx)
            .await?;
            Some(user)
        }
        None => None,
    };

    let unit: Unit = sqlx::query_as(
        "INSERT INTO units \
           (franchise_id, franchisee_id, name, address, city, region, phone, opened_on, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(payload.franchise_id)
    .bind(franchisee.as_ref().map(|u| u.id))
    .bind(payload.name.trim())
    .bind(&payload.address)
    .bind(&payload.city)
    .bind(&payload.region)
    .bind(&payload.phone)
    .bind(payload.opened_on)
    .bind(payload.status.unwrap_or(UnitStatus::Pending))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(unit_id = %unit.id, franchise_id = %unit.franchise_id, "Created unit");

    Ok(ApiResponse::created(serde_json::json!({
        "unit": unit,
        "franchisee": franchisee,
    })))
}

/// PATCH /api/units/:id
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUnit>,
) -> Result<ApiResponse<Unit>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor, UserRole::Franchisee])?;
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_unit(&pool, &scope, id).await?;

    let unit: Unit = sqlx::query_as(
        "UPDATE units SET \
           name = COALESCE($2, name), \
           address = COALESCE($3, address), \
           city = COALESCE($4, city), \
           region = COALESCE($5, region), \
           phone = COALESCE($6, phone), \
           opened_on = COALESCE($7, opened_on), \
           status = COALESCE($8, status), \
           franchisee_id = COALESCE($9, franchisee_id), \
           updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(&payload.address)
    .bind(&payload.city)
    .bind(&payload.region)
    .bind(&payload.phone)
    .bind(payload.opened_on)
    .bind(payload.status)
    .bind(payload.franchisee_id)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(unit))
}

/// DELETE /api/units/:id - soft delete
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_unit(&pool, &scope, id).await?;

    sqlx::query("UPDATE units SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::success(serde_json::json!({ "id": id })).with_message("Unit deleted"))
}

#[derive(Debug, Deserialize)]
pub struct PerformanceParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// GET /api/units/:id/performance - Real revenue/expense/net aggregates with
/// growth against the preceding window.
pub async fn performance(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Query(params): Query<PerformanceParams>,
) -> Result<ApiResponse<UnitPerformance>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_unit(&pool, &scope, id).await?;

    let today = Utc::now().date_naive();
    let range = match (params.from, params.to) {
        (Some(from), Some(to)) => DateRange::new(from, to)
            .ok_or_else(|| ApiError::bad_request("'from' must not be after 'to'"))?,
        (Some(from), None) => DateRange::new(from, today)
            .ok_or_else(|| ApiError::bad_request("'from' must not be in the future"))?,
        _ => DateRange::trailing_days(today, 30),
    };

    let perf = reports::unit_performance(&pool, id, range).await?;
    Ok(ApiResponse::success(perf))
}
