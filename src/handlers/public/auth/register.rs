use axum::Json;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::auth::{generate_jwt, hash_password, token_expiry_secs, Claims};
use crate::database::manager::DatabaseManager;
use crate::database::models::user::{User, UserRole};
use crate::error::ApiError;
use crate::middleware::ApiResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub phone: Option<String>,
}

/// POST /auth/register - Create a franchisor account and issue a first token.
///
/// Self-registration always creates a franchisor; staff accounts are created
/// by their franchisor through the protected user endpoints.
pub async fn register(
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;
    let email = payload.email.trim().to_lowercase();

    let taken: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND deleted_at IS NULL)")
            .bind(&email)
            .fetch_one(&pool)
            .await?;
    if taken {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let password_hash = hash_password(&payload.password)?;

    let user: User = sqlx::query_as(
        "INSERT INTO users (name, email, password_hash, role, phone) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(payload.name.trim())
    .bind(&email)
    .bind(&password_hash)
    .bind(UserRole::Franchisor)
    .bind(&payload.phone)
    .fetch_one(&pool)
    .await?;

    let claims = Claims::new(user.id, user.name.clone(), user.role, user.franchise_id);
    let token = generate_jwt(&claims)?;

    tracing::info!(user_id = %user.id, "Registered new franchisor");

    Ok(ApiResponse::created(json!({
        "token": token,
        "user": user,
        "expires_in": token_expiry_secs(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_registration_fields() {
        let payload = RegisterRequest {
            name: "A".to_string(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            phone: None,
        };
        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn accepts_valid_registration() {
        let payload = RegisterRequest {
            name: "Pat Example".to_string(),
            email: "pat@example.com".to_string(),
            password: "a-long-password".to_string(),
            phone: Some("+1 555 0100".to_string()),
        };
        assert!(payload.validate().is_ok());
    }
}
