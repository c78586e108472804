use axum::Json;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::auth::{generate_jwt, token_expiry_secs, verify_password, Claims};
use crate::database::manager::DatabaseManager;
use crate::database::models::user::User;
use crate::error::ApiError;
use crate::middleware::ApiResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// POST /auth/login - Authenticate with email and password, receive a JWT.
pub async fn login(
    Json(payload): Json<LoginRequest>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;

    let user: Option<User> =
        sqlx::query_as("SELECT * FROM users WHERE email = $1 AND deleted_at IS NULL")
            .bind(payload.email.trim().to_lowercase())
            .fetch_optional(&pool)
            .await?;

    // One failure message for unknown email and wrong password alike
    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
    if !verify_password(&payload.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }
    if !user.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    let claims = Claims::new(user.id, user.name.clone(), user.role, user.franchise_id);
    let token = generate_jwt(&claims)?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(ApiResponse::success(json!({
        "token": token,
        "user": user,
        "expires_in": token_expiry_secs(),
    })))
}
