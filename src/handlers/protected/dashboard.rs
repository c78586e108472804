use axum::extract::Query;
use axum::Extension;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::services::reports::{self, DashboardSummary};
use crate::stats::DateRange;

use super::scope::resolve_scope;

#[derive(Debug, Deserialize)]
pub struct DashboardParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// GET /api/dashboard - role-scoped summary cards: revenue vs previous
/// period, open leads/tasks, royalties due, units by status.
pub async fn summary(
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<DashboardParams>,
) -> Result<ApiResponse<DashboardSummary>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let scope = resolve_scope(&pool, &auth).await?;

    let today = Utc::now().date_naive();
    let range = match (params.from, params.to) {
        (Some(from), Some(to)) => DateRange::new(from, to)
            .ok_or_else(|| ApiError::bad_request("'from' must not be after 'to'"))?,
        _ => DateRange::trailing_days(today, 30),
    };

    let summary = reports::dashboard(&pool, &scope.ids(), range).await?;
    Ok(ApiResponse::success(summary))
}
