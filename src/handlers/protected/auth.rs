use axum::Extension;

use crate::database::manager::DatabaseManager;
use crate::database::models::user::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};

/// GET /api/auth/whoami - Current user from the bearer token.
pub async fn whoami(Extension(auth): Extension<AuthUser>) -> Result<ApiResponse<User>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let user: Option<User> =
        sqlx::query_as("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(auth.user_id)
            .fetch_optional(&pool)
            .await?;

    user.map(ApiResponse::success)
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))
}
