use std::collections::HashMap;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::revenue::{Revenue, RevenueStatus};
use crate::database::models::user::UserRole;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};
use crate::stats::{percent_change, DateRange};

use super::scope::{
    ensure_in_scope, require_franchise, require_role, resolve_scope, target_franchise, Scope,
};

const SORTABLE: &[&str] = &["amount", "status", "occurred_on", "created_at"];

fn validate_amount(amount: Decimal) -> Result<(), ApiError> {
    if amount <= Decimal::ZERO {
        let mut errors = HashMap::new();
        errors.insert(
            "amount".to_string(),
            "Amount must be greater than zero".to_string(),
        );
        return Err(ApiError::unprocessable_entity("Validation failed", errors));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct RevenueFilters {
    pub franchise_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRevenue {
    pub franchise_id: Option<Uuid>,
    pub unit_id: Uuid,
    pub amount: Decimal,
    pub category: Option<String>,
    pub occurred_on: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRevenue {
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub occurred_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRevenueStatus {
    pub status: RevenueStatus,
}

async fn scoped_revenue(pool: &PgPool, scope: &Scope, id: Uuid) -> Result<Revenue, ApiError> {
    let revenue: Option<Revenue> =
        sqlx::query_as("SELECT * FROM revenues WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let revenue = revenue.ok_or_else(|| ApiError::not_found("Revenue not found"))?;
    ensure_in_scope(scope, revenue.franchise_id)?;
    Ok(revenue)
}

/// GET /api/revenues
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
    Query(filters): Query<RevenueFilters>,
) -> Result<ApiResponse<Paginated<Revenue>>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let mut query = SelectQuery::new("revenues");
    scope.apply(&mut query, "franchise_id");
    if let Some(franchise_id) = filters.franchise_id {
        ensure_in_scope(&scope, franchise_id)?;
        query.and_eq_uuid("franchise_id", franchise_id);
    }
    if let Some(unit_id) = filters.unit_id {
        query.and_eq_uuid("unit_id", unit_id);
    }
    if let Some(status) = filters.status.as_deref() {
        let status: RevenueStatus = status
            .parse()
            .map_err(|_| ApiError::bad_request("Unknown revenue status"))?;
        query.and_eq_status("status", status.as_str());
    }
    if let Some(from) = filters.from {
        query.and_date_from("occurred_on", from);
    }
    if let Some(to) = filters.to {
        query.and_date_to("occurred_on", to);
    }
    query
        .order(page.sort.as_deref(), page.order.as_deref(), SORTABLE, "occurred_on")?
        .paginate(&page);

    Ok(ApiResponse::success(query.fetch_paginated(&pool).await?))
}

/// GET /api/revenues/:id
pub async fn get(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Revenue>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    Ok(ApiResponse::success(
        scoped_revenue(&pool, &scope, id).await?,
    ))
}

/// POST /api/revenues
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateRevenue>,
) -> Result<ApiResponse<Revenue>, ApiError> {
    validate_amount(payload.amount)?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let franchise_id = target_franchise(&scope, payload.franchise_id)?;
    require_franchise(&pool, &scope, franchise_id).await?;

    // The unit must belong to the same franchise
    let unit_franchise: Option<Uuid> =
        sqlx::query_scalar("SELECT franchise_id FROM units WHERE id = $1 AND deleted_at IS NULL")
            .bind(payload.unit_id)
            .fetch_optional(&pool)
            .await?;
    match unit_franchise {
        None => return Err(ApiError::not_found("Unit not found")),
        Some(owner) if owner != franchise_id => {
            return Err(ApiError::bad_request(
                "Unit does not belong to this franchise",
            ))
        }
        Some(_) => {}
    }

    let revenue: Revenue = sqlx::query_as(
        "INSERT INTO revenues (franchise_id, unit_id, amount, category, occurred_on, reported_by) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(franchise_id)
    .bind(payload.unit_id)
    .bind(payload.amount)
    .bind(&payload.category)
    .bind(payload.occurred_on)
    .bind(auth.user_id)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::created(revenue))
}

/// PATCH /api/revenues/:id
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRevenue>,
) -> Result<ApiResponse<Revenue>, ApiError> {
    if let Some(amount) = payload.amount {
        validate_amount(amount)?;
    }

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_revenue(&pool, &scope, id).await?;

    let revenue: Revenue = sqlx::query_as(
        "UPDATE revenues SET \
           amount = COALESCE($2, amount), \
           category = COALESCE($3, category), \
           occurred_on = COALESCE($4, occurred_on), \
           updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.amount)
    .bind(&payload.category)
    .bind(payload.occurred_on)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(revenue))
}

/// PATCH /api/revenues/:id/status - verify or dispute a reported figure.
pub async fn update_status(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRevenueStatus>,
) -> Result<ApiResponse<Revenue>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_revenue(&pool, &scope, id).await?;

    let revenue: Revenue = sqlx::query_as(
        "UPDATE revenues SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.status)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(revenue))
}

/// DELETE /api/revenues/:id - soft delete
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_revenue(&pool, &scope, id).await?;

    sqlx::query("UPDATE revenues SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::success(json!({ "id": id })).with_message("Revenue deleted"))
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, sqlx::FromRow)]
struct StatusSums {
    pending: Decimal,
    verified: Decimal,
    disputed: Decimal,
    total: Decimal,
}

async fn status_sums(
    pool: &PgPool,
    scope_ids: &Option<Vec<Uuid>>,
    range: &DateRange,
) -> Result<StatusSums, ApiError> {
    let sums: StatusSums = sqlx::query_as(
        "SELECT \
           COALESCE(SUM(amount) FILTER (WHERE status = 'pending'), 0) AS pending, \
           COALESCE(SUM(amount) FILTER (WHERE status = 'verified'), 0) AS verified, \
           COALESCE(SUM(amount) FILTER (WHERE status = 'disputed'), 0) AS disputed, \
           COALESCE(SUM(amount), 0) AS total \
         FROM revenues \
         WHERE deleted_at IS NULL \
           AND occurred_on BETWEEN $2 AND $3 \
           AND ($1::uuid[] IS NULL OR franchise_id = ANY($1))",
    )
    .bind(scope_ids)
    .bind(range.start)
    .bind(range.end)
    .fetch_one(pool)
    .await?;
    Ok(sums)
}

/// GET /api/revenues/summary - sums by status with period-over-period growth.
pub async fn summary(
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<SummaryParams>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let scope_ids = scope.ids();

    let today = Utc::now().date_naive();
    let range = match (params.from, params.to) {
        (Some(from), Some(to)) => DateRange::new(from, to)
            .ok_or_else(|| ApiError::bad_request("'from' must not be after 'to'"))?,
        _ => DateRange::trailing_days(today, 30),
    };

    let current = status_sums(&pool, &scope_ids, &range).await?;
    let previous = status_sums(&pool, &scope_ids, &range.previous()).await?;

    Ok(ApiResponse::success(json!({
        "period": { "from": range.start, "to": range.end },
        "current": {
            "pending": current.pending,
            "verified": current.verified,
            "disputed": current.disputed,
            "total": current.total,
        },
        "previous_total": previous.total,
        "growth_pct": percent_change(current.total, previous.total),
    })))
}
