use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::royalty::{Royalty, RoyaltyStatus};
use crate::database::models::user::UserRole;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};
use crate::services::royalty;
use crate::stats::DateRange;

use super::scope::{
    ensure_in_scope, require_franchise, require_role, resolve_scope, target_franchise, Scope,
};

const SORTABLE: &[&str] = &["period_start", "amount", "status", "created_at"];

#[derive(Debug, Deserialize)]
pub struct RoyaltyFilters {
    pub franchise_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRoyalties {
    pub franchise_id: Option<Uuid>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoyaltyStatus {
    pub status: RoyaltyStatus,
}

async fn scoped_royalty(pool: &PgPool, scope: &Scope, id: Uuid) -> Result<Royalty, ApiError> {
    let royalty: Option<Royalty> =
        sqlx::query_as("SELECT * FROM royalties WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let royalty = royalty.ok_or_else(|| ApiError::not_found("Royalty not found"))?;
    ensure_in_scope(scope, royalty.franchise_id)?;
    Ok(royalty)
}

/// GET /api/royalties
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
    Query(filters): Query<RoyaltyFilters>,
) -> Result<ApiResponse<Paginated<Royalty>>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let mut query = SelectQuery::new("royalties");
    scope.apply(&mut query, "franchise_id");
    if let Some(franchise_id) = filters.franchise_id {
        ensure_in_scope(&scope, franchise_id)?;
        query.and_eq_uuid("franchise_id", franchise_id);
    }
    if let Some(unit_id) = filters.unit_id {
        query.and_eq_uuid("unit_id", unit_id);
    }
    if let Some(status) = filters.status.as_deref() {
        let status: RoyaltyStatus = status
            .parse()
            .map_err(|_| ApiError::bad_request("Unknown royalty status"))?;
        query.and_eq_status("status", status.as_str());
    }
    if let Some(from) = filters.from {
        query.and_date_from("period_start", from);
    }
    if let Some(to) = filters.to {
        query.and_date_to("period_end", to);
    }
    query
        .order(page.sort.as_deref(), page.order.as_deref(), SORTABLE, "period_start")?
        .paginate(&page);

    Ok(ApiResponse::success(query.fetch_paginated(&pool).await?))
}

/// GET /api/royalties/:id
pub async fn get(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Royalty>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    Ok(ApiResponse::success(
        scoped_royalty(&pool, &scope, id).await?,
    ))
}

/// POST /api/royalties/generate
///
/// Compute royalties from verified revenues per unit over the period, at the
/// franchise's royalty rate, inside one transaction.
pub async fn generate(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<GenerateRoyalties>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let franchise_id = target_franchise(&scope, payload.franchise_id)?;
    let franchise = require_franchise(&pool, &scope, franchise_id).await?;

    let period = DateRange::new(payload.period_start, payload.period_end)
        .ok_or_else(|| ApiError::bad_request("period_start must not be after period_end"))?;

    let created = royalty::generate_for_franchise(&pool, &franchise, period).await?;
    let count = created.len();

    Ok(ApiResponse::created(json!({
        "created": created,
        "count": count,
    }))
    .with_message(format!("Generated {} royalties", count)))
}

/// PATCH /api/royalties/:id/status - due -> invoiced -> paid transitions.
pub async fn update_status(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoyaltyStatus>,
) -> Result<ApiResponse<Royalty>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_royalty(&pool, &scope, id).await?;

    let royalty: Royalty = sqlx::query_as(
        "UPDATE royalties SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.status)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(royalty))
}

/// GET /api/royalties/summary - outstanding vs collected totals.
pub async fn summary(
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let scope_ids = scope.ids();

    let (due, invoiced, paid): (Decimal, Decimal, Decimal) = sqlx::query_as(
        "SELECT \
           COALESCE(SUM(amount) FILTER (WHERE status = 'due'), 0), \
           COALESCE(SUM(amount) FILTER (WHERE status = 'invoiced'), 0), \
           COALESCE(SUM(amount) FILTER (WHERE status = 'paid'), 0) \
         FROM royalties \
         WHERE deleted_at IS NULL \
           AND ($1::uuid[] IS NULL OR franchise_id = ANY($1))",
    )
    .bind(&scope_ids)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(json!({
        "due": due,
        "invoiced": invoiced,
        "paid": paid,
        "outstanding": due + invoiced,
    })))
}
