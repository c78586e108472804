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
use crate::database::models::transaction::{Transaction, TransactionKind, TransactionStatus};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};
use crate::stats::{percent_change, DateRange};

use super::scope::{ensure_in_scope, require_franchise, resolve_scope, target_franchise, Scope};

const SORTABLE: &[&str] = &["amount", "kind", "status", "occurred_on", "created_at"];

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
pub struct TransactionFilters {
    pub franchise_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransaction {
    pub franchise_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub status: Option<TransactionStatus>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub occurred_on: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTransaction {
    pub amount: Option<Decimal>,
    pub status: Option<TransactionStatus>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub occurred_on: Option<NaiveDate>,
}

async fn scoped_transaction(
    pool: &PgPool,
    scope: &Scope,
    id: Uuid,
) -> Result<Transaction, ApiError> {
    let transaction: Option<Transaction> =
        sqlx::query_as("SELECT * FROM transactions WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let transaction = transaction.ok_or_else(|| ApiError::not_found("Transaction not found"))?;
    ensure_in_scope(scope, transaction.franchise_id)?;
    Ok(transaction)
}

/// GET /api/transactions
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
    Query(filters): Query<TransactionFilters>,
) -> Result<ApiResponse<Paginated<Transaction>>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let mut query = SelectQuery::new("transactions");
    scope.apply(&mut query, "franchise_id");
    if let Some(franchise_id) = filters.franchise_id {
        ensure_in_scope(&scope, franchise_id)?;
        query.and_eq_uuid("franchise_id", franchise_id);
    }
    if let Some(unit_id) = filters.unit_id {
        query.and_eq_uuid("unit_id", unit_id);
    }
    if let Some(kind) = filters.kind.as_deref() {
        let kind: TransactionKind = kind
            .parse()
            .map_err(|_| ApiError::bad_request("Unknown transaction kind"))?;
        query.and_eq_status("kind", kind.as_str());
    }
    if let Some(status) = filters.status.as_deref() {
        let status: TransactionStatus = status
            .parse()
            .map_err(|_| ApiError::bad_request("Unknown transaction status"))?;
        query.and_eq_status("status", status.as_str());
    }
    if let Some(category) = filters.category.as_deref() {
        query.and_eq_text("category", category);
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

/// GET /api/transactions/:id
pub async fn get(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Transaction>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    Ok(ApiResponse::success(
        scoped_transaction(&pool, &scope, id).await?,
    ))
}

/// POST /api/transactions
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateTransaction>,
) -> Result<ApiResponse<Transaction>, ApiError> {
    validate_amount(payload.amount)?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let franchise_id = target_franchise(&scope, payload.franchise_id)?;
    require_franchise(&pool, &scope, franchise_id).await?;

    let transaction: Transaction = sqlx::query_as(
        "INSERT INTO transactions \
           (franchise_id, unit_id, amount, kind, status, category, description, occurred_on) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(franchise_id)
    .bind(payload.unit_id)
    .bind(payload.amount)
    .bind(payload.kind)
    .bind(payload.status.unwrap_or(TransactionStatus::Completed))
    .bind(&payload.category)
    .bind(&payload.description)
    .bind(payload.occurred_on)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::created(transaction))
}

/// PATCH /api/transactions/:id
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTransaction>,
) -> Result<ApiResponse<Transaction>, ApiError> {
    if let Some(amount) = payload.amount {
        validate_amount(amount)?;
    }

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_transaction(&pool, &scope, id).await?;

    let transaction: Transaction = sqlx::query_as(
        "UPDATE transactions SET \
           amount = COALESCE($2, amount), \
           status = COALESCE($3, status), \
           category = COALESCE($4, category), \
           description = COALESCE($5, description), \
           occurred_on = COALESCE($6, occurred_on), \
           updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.amount)
    .bind(payload.status)
    .bind(&payload.category)
    .bind(&payload.description)
    .bind(payload.occurred_on)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(transaction))
}

/// DELETE /api/transactions/:id - soft delete
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_transaction(&pool, &scope, id).await?;

    sqlx::query("UPDATE transactions SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::success(json!({ "id": id })).with_message("Transaction deleted"))
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, sqlx::FromRow)]
struct KindSums {
    income: Decimal,
    expense: Decimal,
}

async fn kind_sums(
    pool: &PgPool,
    scope_ids: &Option<Vec<Uuid>>,
    range: &DateRange,
) -> Result<KindSums, ApiError> {
    let sums: KindSums = sqlx::query_as(
        "SELECT \
           COALESCE(SUM(amount) FILTER (WHERE kind = 'income'), 0) AS income, \
           COALESCE(SUM(amount) FILTER (WHERE kind = 'expense'), 0) AS expense \
         FROM transactions \
         WHERE deleted_at IS NULL \
           AND status = 'completed' \
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

/// GET /api/transactions/summary - income/expense/net with growth against
/// the preceding window. Only completed transactions count.
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

    let current = kind_sums(&pool, &scope_ids, &range).await?;
    let previous = kind_sums(&pool, &scope_ids, &range.previous()).await?;

    let net = current.income - current.expense;
    let previous_net = previous.income - previous.expense;

    Ok(ApiResponse::success(json!({
        "period": { "from": range.start, "to": range.end },
        "income": current.income,
        "expense": current.expense,
        "net": net,
        "previous_net": previous_net,
        "growth_pct": percent_change(net, previous_net),
    })))
}
