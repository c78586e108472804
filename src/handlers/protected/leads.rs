use axum::extract::{Path, Query};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::database::manager::DatabaseManager;
use crate::database::models::lead::{Lead, LeadStatus};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::query::{PageParams, Paginated, SelectQuery};
use crate::services::csv;

use super::scope::{ensure_in_scope, require_franchise, resolve_scope, target_franchise, Scope};

const SORTABLE: &[&str] = &["name", "status", "source", "created_at", "updated_at"];

const CSV_HEADER: &[&str] = &["name", "email", "phone", "source", "status", "created_at"];

#[derive(Debug, Deserialize)]
pub struct LeadFilters {
    pub franchise_id: Option<Uuid>,
    pub status: Option<String>,
    pub source: Option<String>,
    pub assigned_to: Option<Uuid>,
    /// Substring match on lead name
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLead {
    pub franchise_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub status: Option<LeadStatus>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLead {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLeadStatus {
    pub status: LeadStatus,
}

async fn scoped_lead(pool: &PgPool, scope: &Scope, id: Uuid) -> Result<Lead, ApiError> {
    let lead: Option<Lead> =
        sqlx::query_as("SELECT * FROM leads WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let lead = lead.ok_or_else(|| ApiError::not_found("Lead not found"))?;
    ensure_in_scope(scope, lead.franchise_id)?;
    Ok(lead)
}

fn list_query(scope: &Scope, filters: &LeadFilters) -> Result<SelectQuery, ApiError> {
    let mut query = SelectQuery::new("leads");
    scope.apply(&mut query, "franchise_id");
    if let Some(franchise_id) = filters.franchise_id {
        ensure_in_scope(scope, franchise_id)?;
        query.and_eq_uuid("franchise_id", franchise_id);
    }
    if let Some(status) = filters.status.as_deref() {
        let status: LeadStatus = status
            .parse()
            .map_err(|_| ApiError::bad_request("Unknown lead status"))?;
        query.and_eq_status("status", status.as_str());
    }
    if let Some(source) = filters.source.as_deref() {
        query.and_eq_text("source", source);
    }
    if let Some(assigned_to) = filters.assigned_to {
        query.and_eq_uuid("assigned_to", assigned_to);
    }
    if let Some(q) = filters.q.as_deref() {
        query.and_ilike("name", q);
    }
    Ok(query)
}

/// GET /api/leads
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
    Query(filters): Query<LeadFilters>,
) -> Result<ApiResponse<Paginated<Lead>>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let mut query = list_query(&scope, &filters)?;
    query
        .order(page.sort.as_deref(), page.order.as_deref(), SORTABLE, "created_at")?
        .paginate(&page);

    Ok(ApiResponse::success(query.fetch_paginated(&pool).await?))
}

/// GET /api/leads/:id
pub async fn get(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Lead>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    Ok(ApiResponse::success(scoped_lead(&pool, &scope, id).await?))
}

/// POST /api/leads
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateLead>,
) -> Result<ApiResponse<Lead>, ApiError> {
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let franchise_id = target_franchise(&scope, payload.franchise_id)?;
    require_franchise(&pool, &scope, franchise_id).await?;

    let lead: Lead = sqlx::query_as(
        "INSERT INTO leads (franchise_id, name, email, phone, source, status, assigned_to) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(franchise_id)
    .bind(payload.name.trim())
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.source)
    .bind(payload.status.unwrap_or(LeadStatus::New))
    .bind(payload.assigned_to)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::created(lead))
}

/// PATCH /api/leads/:id
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLead>,
) -> Result<ApiResponse<Lead>, ApiError> {
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_lead(&pool, &scope, id).await?;

    let lead: Lead = sqlx::query_as(
        "UPDATE leads SET \
           name = COALESCE($2, name), \
           email = COALESCE($3, email), \
           phone = COALESCE($4, phone), \
           source = COALESCE($5, source), \
           assigned_to = COALESCE($6, assigned_to), \
           updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.source)
    .bind(payload.assigned_to)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(lead))
}

/// PATCH /api/leads/:id/status
pub async fn update_status(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLeadStatus>,
) -> Result<ApiResponse<Lead>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_lead(&pool, &scope, id).await?;

    let lead: Lead = sqlx::query_as(
        "UPDATE leads SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.status)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(lead))
}

/// DELETE /api/leads/:id - soft delete
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    scoped_lead(&pool, &scope, id).await?;

    sqlx::query("UPDATE leads SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::success(json!({ "id": id })).with_message("Lead deleted"))
}

/// GET /api/leads/export - CSV with the fixed header, honoring list filters.
pub async fn export(
    Extension(auth): Extension<AuthUser>,
    Query(filters): Query<LeadFilters>,
) -> Result<Response, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let mut query = list_query(&scope, &filters)?;
    query.order(None, Some("asc"), SORTABLE, "created_at")?;
    let leads: Vec<Lead> = query.fetch_all(&pool).await?;

    let rows: Vec<Vec<String>> = leads
        .iter()
        .map(|lead| {
            vec![
                lead.name.clone(),
                lead.email.clone().unwrap_or_default(),
                lead.phone.clone().unwrap_or_default(),
                lead.source.clone().unwrap_or_default(),
                lead.status.as_str().to_string(),
                lead.created_at.to_rfc3339(),
            ]
        })
        .collect();

    let body = csv::format_csv(CSV_HEADER, &rows);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"leads.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ImportParams {
    pub franchise_id: Option<Uuid>,
}

/// POST /api/leads/import - CSV body with header
/// `name,email,phone,source,status`. Invalid rows are skipped and reported.
pub async fn import(
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<ImportParams>,
    body: String,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;
    let franchise_id = target_franchise(&scope, params.franchise_id)?;
    require_franchise(&pool, &scope, franchise_id).await?;

    let rows = csv::parse(&body);
    if rows.is_empty() {
        return Err(ApiError::bad_request("Empty CSV body"));
    }

    // First row must be the expected header (created_at column optional)
    let header_ok = rows[0]
        .iter()
        .map(|h| h.trim().to_lowercase())
        .zip(["name", "email", "phone", "source", "status"])
        .all(|(got, want)| got == want);
    if rows[0].len() < 5 || !header_ok {
        return Err(ApiError::bad_request(
            "CSV header must be: name,email,phone,source,status",
        ));
    }

    let mut imported: i64 = 0;
    let mut errors: Vec<serde_json::Value> = vec![];

    for (index, row) in rows.iter().enumerate().skip(1) {
        let line = index + 1;
        if row.len() < 5 {
            errors.push(json!({ "line": line, "message": "Expected 5 columns" }));
            continue;
        }

        let name = row[0].trim();
        if name.is_empty() {
            errors.push(json!({ "line": line, "message": "Name is required" }));
            continue;
        }

        let email = row[1].trim();
        if !email.is_empty() && !email.contains('@') {
            errors.push(json!({ "line": line, "message": "Invalid email address" }));
            continue;
        }

        let status = match row[4].trim() {
            "" => LeadStatus::New,
            raw => match raw.parse::<LeadStatus>() {
                Ok(status) => status,
                Err(_) => {
                    errors.push(json!({ "line": line, "message": "Unknown lead status" }));
                    continue;
                }
            },
        };

        sqlx::query(
            "INSERT INTO leads (franchise_id, name, email, phone, source, status) \
             VALUES ($1, $2, NULLIF($3, ''), NULLIF($4, ''), NULLIF($5, ''), $6)",
        )
        .bind(franchise_id)
        .bind(name)
        .bind(email)
        .bind(row[2].trim())
        .bind(row[3].trim())
        .bind(status)
        .execute(&pool)
        .await?;

        imported += 1;
    }

    let skipped = errors.len();
    tracing::info!(
        franchise_id = %franchise_id,
        imported,
        skipped,
        "Imported leads from CSV"
    );

    Ok(
        ApiResponse::success(json!({
            "imported": imported,
            "skipped": skipped,
            "errors": errors,
        }))
        .with_message(format!("Imported {} leads", imported)),
    )
}
