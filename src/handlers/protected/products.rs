use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::database::manager::DatabaseManager;
use crate::database::models::product::Product;
use crate::database::models::user::UserRole;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};
use crate::services::{csv, storage};

use super::scope::{
    ensure_in_scope, require_franchise, require_role, resolve_scope, target_franchise, Scope,
};

const SORTABLE: &[&str] = &["name", "sku", "price", "created_at"];

const CSV_HEADER: &[&str] = &["name", "sku", "price", "is_active"];

fn validate_price(price: Decimal) -> Result<(), ApiError> {
    if price < Decimal::ZERO {
        let mut errors = HashMap::new();
        errors.insert(
            "price".to_string(),
            "Price must not be negative".to_string(),
        );
        return Err(ApiError::unprocessable_entity("Validation failed", errors));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ProductFilters {
    pub franchise_id: Option<Uuid>,
    pub is_active: Option<bool>,
    /// Substring match on product name
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProduct {
    pub franchise_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 64, message = "SKU is required"))]
    pub sku: String,
    pub price: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

async fn scoped_product(pool: &PgPool, scope: &Scope, id: Uuid) -> Result<Product, ApiError> {
    let product: Option<Product> =
        sqlx::query_as("SELECT * FROM products WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let product = product.ok_or_else(|| ApiError::not_found("Product not found"))?;
    ensure_in_scope(scope, product.franchise_id)?;
    Ok(product)
}

fn list_query(scope: &Scope, filters: &ProductFilters) -> Result<SelectQuery, ApiError> {
    let mut query = SelectQuery::new("products");
    scope.apply(&mut query, "franchise_id");
    if let Some(franchise_id) = filters.franchise_id {
        ensure_in_scope(scope, franchise_id)?;
        query.and_eq_uuid("franchise_id", franchise_id);
    }
    if let Some(active) = filters.is_active {
        query.and_eq_bool("is_active", active);
    }
    if let Some(q) = filters.q.as_deref() {
        query.and_ilike("name", q);
    }
    Ok(query)
}

/// GET /api/products
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
    Query(filters): Query<ProductFilters>,
) -> Result<ApiResponse<Paginated<Product>>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let mut query = list_query(&scope, &filters)?;
    query
        .order(page.sort.as_deref(), page.order.as_deref(), SORTABLE, "created_at")?
        .paginate(&page);

    Ok(ApiResponse::success(query.fetch_paginated(&pool).await?))
}

/// GET /api/products/:id
pub async fn get(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Product>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    Ok(ApiResponse::success(
        scoped_product(&pool, &scope, id).await?,
    ))
}

/// POST /api/products
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateProduct>,
) -> Result<ApiResponse<Product>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;
    payload.validate()?;
    validate_price(payload.price)?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let franchise_id = target_franchise(&scope, payload.franchise_id)?;
    require_franchise(&pool, &scope, franchise_id).await?;

    let sku = payload.sku.trim();
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM products \
         WHERE franchise_id = $1 AND sku = $2 AND deleted_at IS NULL)",
    )
    .bind(franchise_id)
    .bind(sku)
    .fetch_one(&pool)
    .await?;
    if taken {
        return Err(ApiError::conflict("SKU already exists for this franchise"));
    }

    let product: Product = sqlx::query_as(
        "INSERT INTO products (franchise_id, name, sku, price, description) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(franchise_id)
    .bind(payload.name.trim())
    .bind(sku)
    .bind(payload.price)
    .bind(&payload.description)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::created(product))
}

/// PATCH /api/products/:id
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProduct>,
) -> Result<ApiResponse<Product>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;
    payload.validate()?;
    if let Some(price) = payload.price {
        validate_price(price)?;
    }

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_product(&pool, &scope, id).await?;

    let product: Product = sqlx::query_as(
        "UPDATE products SET \
           name = COALESCE($2, name), \
           price = COALESCE($3, price), \
           description = COALESCE($4, description), \
           is_active = COALESCE($5, is_active), \
           updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.price)
    .bind(&payload.description)
    .bind(payload.is_active)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(product))
}

/// DELETE /api/products/:id - soft delete
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_product(&pool, &scope, id).await?;

    sqlx::query("UPDATE products SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::success(json!({ "id": id })).with_message("Product deleted"))
}

/// POST /api/products/:id/image - multipart upload, field name `file`.
pub async fn upload_image(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<ApiResponse<Product>, ApiError> {
    require_role(&auth, &[UserRole::Admin, UserRole::Franchisor])?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_product(&pool, &scope, id).await?;

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
            stored = Some(storage::store("products", &filename, &bytes).await?);
        }
    }
    let stored = stored.ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;

    let product: Product = sqlx::query_as(
        "UPDATE products SET image_path = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&stored.path)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(product))
}

/// GET /api/products/export - CSV with the fixed header, honoring filters.
pub async fn export(
    Extension(auth): Extension<AuthUser>,
    Query(filters): Query<ProductFilters>,
) -> Result<Response, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let mut query = list_query(&scope, &filters)?;
    query.order(Some("name"), Some("asc"), SORTABLE, "name")?;
    let products: Vec<Product> = query.fetch_all(&pool).await?;

    let rows: Vec<Vec<String>> = products
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                p.sku.clone(),
                p.price.to_string(),
                p.is_active.to_string(),
            ]
        })
        .collect();

    let body = csv::format_csv(CSV_HEADER, &rows);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"products.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}
