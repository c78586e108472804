use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query};
use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::database::manager::DatabaseManager;
use crate::database::models::franchise::Franchise;
use crate::database::models::user::UserRole;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};
use crate::services::reports::{self, FranchiseStats};
use crate::services::storage;
use crate::stats::{DateRange, Granularity};

use super::scope::{require_franchise, require_role, resolve_scope};

const SORTABLE: &[&str] = &["name", "created_at", "updated_at", "royalty_rate"];

#[derive(Debug, Deserialize)]
pub struct FranchiseFilters {
    /// Case-insensitive substring match on the franchise name
    pub q: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFranchise {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub royalty_rate: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFranchise {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub royalty_rate: Option<Decimal>,
    pub is_active: Option<bool>,
}

fn validate_royalty_rate(rate: Decimal) -> Result<(), ApiError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        let mut errors = HashMap::new();
        errors.insert(
            "royalty_rate".to_string(),
            "Royalty rate must be between 0 and 100".to_string(),
        );
        return Err(ApiError::unprocessable_entity("Validation failed", errors));
    }
    Ok(())
}

/// GET /api/franchises
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
    Query(filters): Query<FranchiseFilters>,
) -> Result<ApiResponse<Paginated<Franchise>>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let mut query = SelectQuery::new("franchises");
    // The tenant column on the franchises table is its own id
    scope.apply(&mut query, "id");
    if let Some(q) = filters.q.as_deref() {
        query.and_ilike("name", q);
    }
    if let Some(active) = filters.is_active {
        query.and_eq_bool("is_active", active);
    }
    query
        .order(page.sort.as_deref(), page.order.as_deref(), SORTABLE, "created_at")?
        .paginate(&page);

    Ok(ApiResponse::success(query.fetch_paginated(&pool).await?))
}

/// GET /api/franchises/:id
pub async fn get(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Franchise>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let franchise = require_franchise(&pool, &scope, id).await?;
    Ok(ApiResponse::success(franchise))
}

/// POST /api/franchises
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateFranchise>,
) -> Result<ApiResponse<Franchise>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;
    payload.validate()?;
    validate_royalty_rate(payload.royalty_rate)?;

    let pool = DatabaseManager::pool().await?;

    let franchise: Franchise = sqlx::query_as(
        "INSERT INTO franchises (owner_id, name, industry, description, royalty_rate) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(auth.user_id)
    .bind(payload.name.trim())
    .bind(&payload.industry)
    .bind(&payload.description)
    .bind(payload.royalty_rate)
    .fetch_one(&pool)
    .await?;

    tracing::info!(franchise_id = %franchise.id, owner_id = %auth.user_id, "Created franchise");

    Ok(ApiResponse::created(franchise))
}

/// PATCH /api/franchises/:id
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFranchise>,
) -> Result<ApiResponse<Franchise>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;
    payload.validate()?;
    if let Some(rate) = payload.royalty_rate {
        validate_royalty_rate(rate)?;
    }

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    require_franchise(&pool, &scope, id).await?;

    let franchise: Franchise = sqlx::query_as(
        "UPDATE franchises SET \
           name = COALESCE($2, name), \
           industry = COALESCE($3, industry), \
           description = COALESCE($4, description), \
           royalty_rate = COALESCE($5, royalty_rate), \
           is_active = COALESCE($6, is_active), \
           updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(&payload.industry)
    .bind(&payload.description)
    .bind(payload.royalty_rate)
    .bind(payload.is_active)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(franchise))
}

/// DELETE /api/franchises/:id - soft delete
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    require_franchise(&pool, &scope, id).await?;

    sqlx::query("UPDATE franchises SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::success(serde_json::json!({ "id": id })).with_message("Franchise deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn royalty_rate_must_be_a_percentage() {
        assert!(validate_royalty_rate(Decimal::from(0)).is_ok());
        assert!(validate_royalty_rate(Decimal::from(100)).is_ok());
        assert!(validate_royalty_rate(Decimal::from(-1)).is_err());
        assert!(validate_royalty_rate(Decimal::from(101)).is_err());
    }

    #[test]
    fn rate_error_names_the_field() {
        let err = validate_royalty_rate(Decimal::from(250)).unwrap_err();
        assert_eq!(err.status_code(), 422);
        let body = err.to_json();
        assert!(body["errors"]["royalty_rate"].is_string());
    }
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    /// daily | monthly | yearly (default monthly)
    pub granularity: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// GET /api/franchises/:id/stats - Revenue series plus growth and lead
/// conversion for one franchise.
pub async fn stats(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Query(params): Query<StatsParams>,
) -> Result<ApiResponse<FranchiseStats>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    require_franchise(&pool, &scope, id).await?;

    let granularity = match params.granularity.as_deref() {
        None => Granularity::Monthly,
        Some(raw) => Granularity::parse(raw)
            .ok_or_else(|| ApiError::bad_request("granularity must be daily, monthly or yearly"))?,
    };

    let today = Utc::now().date_naive();
    let range = match (params.from, params.to) {
        (Some(from), Some(to)) => DateRange::new(from, to)
            .ok_or_else(|| ApiError::bad_request("'from' must not be after 'to'"))?,
        (Some(from), None) => DateRange::new(from, today)
            .ok_or_else(|| ApiError::bad_request("'from' must not be in the future"))?,
        _ => DateRange::trailing_days(today, 365),
    };

    let stats = reports::franchise_stats(&pool, id, granularity, range).await?;
    Ok(ApiResponse::success(stats))
}

/// POST /api/franchises/:id/logo - multipart upload, field name `file`.
pub async fn upload_logo(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<ApiResponse<Franchise>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    require_franchise(&pool, &scope, id).await?;

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
            stored = Some(storage::store("logos", &filename, &bytes).await?);
        }
    }
    let stored = stored.ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;

    let franchise: Franchise = sqlx::query_as(
        "UPDATE franchises SET logo_path = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&stored.path)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(franchise))
}
